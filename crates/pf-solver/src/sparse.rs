//! Sparse symmetric linear solver.
//!
//! Solves A x = b where A is symmetric and structurally positive definite,
//! with rows indexed by network node and off-diagonal entries indexed by
//! network link. The matrix is reordered once per project with a
//! minimum-degree heuristic; the fill pattern of the Cholesky factor L
//! falls out of the same elimination (a node's neighbor set in the
//! elimination graph at the moment it is eliminated *is* its column of L).
//! Factorization is LDL' on the compressed-column structure, and callers
//! never see the permutation: accessors take network rows and link slots.

use std::collections::BTreeSet;

const NIL: usize = usize::MAX;

#[derive(Debug, Default)]
pub struct SparseSolver {
    n: usize,

    /// perm[k] = network row eliminated k-th
    perm: Vec<usize>,
    /// invp[row] = elimination order of a network row
    invp: Vec<usize>,

    // compressed-column structure of L (in permuted indices)
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,

    /// maps each link slot to its position in `lnz`
    link_pos: Vec<usize>,

    // numeric values
    lnz: Vec<f64>,
    diag: Vec<f64>,
    rhs: Vec<f64>,

    // factorization work arrays
    temp: Vec<f64>,
    chain: Vec<usize>,
    first: Vec<usize>,
}

impl SparseSolver {
    /// Build the reordering, the symbolic factor structure, and the
    /// link-to-entry map for a network of `n` nodes and the given link
    /// end-node lists.
    pub fn init(n: usize, link_from: &[usize], link_to: &[usize]) -> Self {
        debug_assert_eq!(link_from.len(), link_to.len());

        // adjacency sets; duplicate links merge here
        let mut adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (&u, &v) in link_from.iter().zip(link_to) {
            debug_assert_ne!(u, v, "self loops are rejected upstream");
            adj[u].insert(v);
            adj[v].insert(u);
        }

        // minimum-degree elimination; record each eliminated node's current
        // neighbor set, which is the structure of its column of L
        let mut eliminated = vec![false; n];
        let mut perm = Vec::with_capacity(n);
        let mut invp = vec![0usize; n];
        let mut elim_nbrs: Vec<Vec<usize>> = Vec::with_capacity(n);

        for k in 0..n {
            let v = (0..n)
                .filter(|&i| !eliminated[i])
                .min_by_key(|&i| (adj[i].len(), i))
                .expect("an uneliminated node remains");
            eliminated[v] = true;
            perm.push(v);
            invp[v] = k;

            let nbrs: Vec<usize> = adj[v].iter().copied().collect();
            for (i, &a) in nbrs.iter().enumerate() {
                adj[a].remove(&v);
                for &b in &nbrs[i + 1..] {
                    adj[a].insert(b);
                    adj[b].insert(a);
                }
            }
            elim_nbrs.push(nbrs);
        }

        // compressed-column structure of L in permuted row indices
        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_idx = Vec::new();
        col_ptr.push(0);
        for nbrs in &elim_nbrs {
            let mut rows: Vec<usize> = nbrs.iter().map(|&w| invp[w]).collect();
            rows.sort_unstable();
            row_idx.extend_from_slice(&rows);
            col_ptr.push(row_idx.len());
        }
        let nnzl = row_idx.len();

        // map each link's off-diagonal slot to its L entry
        let mut link_pos = Vec::with_capacity(link_from.len());
        for (&u, &v) in link_from.iter().zip(link_to) {
            let (i, j) = (invp[u], invp[v]);
            let (lo, hi) = if i < j { (i, j) } else { (j, i) };
            let col = &row_idx[col_ptr[lo]..col_ptr[lo + 1]];
            let offset = col
                .binary_search(&hi)
                .expect("a link's entry is in its column's fill pattern");
            link_pos.push(col_ptr[lo] + offset);
        }

        Self {
            n,
            perm,
            invp,
            col_ptr,
            row_idx,
            link_pos,
            lnz: vec![0.0; nnzl],
            diag: vec![0.0; n],
            rhs: vec![0.0; n],
            temp: vec![0.0; n],
            chain: vec![NIL; n],
            first: vec![0; n],
        }
    }

    /// Number of nonzeros in the factor (fill-in included).
    pub fn factor_nnz(&self) -> usize {
        self.row_idx.len()
    }

    /// Zero all accumulated coefficients and the right-hand side.
    pub fn reset(&mut self) {
        self.diag.fill(0.0);
        self.lnz.fill(0.0);
        self.rhs.fill(0.0);
    }

    pub fn add_to_diag(&mut self, row: usize, value: f64) {
        self.diag[self.invp[row]] += value;
    }

    pub fn set_diag(&mut self, row: usize, value: f64) {
        self.diag[self.invp[row]] = value;
    }

    pub fn add_to_off_diag(&mut self, link: usize, value: f64) {
        self.lnz[self.link_pos[link]] += value;
    }

    pub fn add_to_rhs(&mut self, row: usize, value: f64) {
        self.rhs[self.invp[row]] += value;
    }

    pub fn set_rhs(&mut self, row: usize, value: f64) {
        self.rhs[self.invp[row]] = value;
    }

    /// Factorize and solve, leaving the solution in `x` indexed by network
    /// row. On a zero or negative pivot, returns the offending network row.
    pub fn solve(&mut self, x: &mut [f64]) -> Result<(), usize> {
        self.factorize()?;
        self.back_solve();
        for i in 0..self.n {
            x[i] = self.rhs[self.invp[i]];
        }
        Ok(())
    }

    /// Numeric LDL' factorization over the symbolic structure, using
    /// per-row chains of pending column updates.
    fn factorize(&mut self) -> Result<(), usize> {
        self.chain.fill(NIL);
        self.first.fill(0);
        self.temp.fill(0.0);

        for j in 0..self.n {
            let mut dj = self.diag[j];

            // fold in every earlier column k with L[j,k] != 0
            let mut k = self.chain[j];
            self.chain[j] = NIL;
            while k != NIL {
                let next_k = self.chain[k];
                let p = self.first[k];
                let ljk = self.lnz[p];
                let dljk = self.diag[k] * ljk;
                dj -= ljk * dljk;

                let p1 = p + 1;
                let pend = self.col_ptr[k + 1];
                if p1 < pend {
                    for q in p1..pend {
                        self.temp[self.row_idx[q]] += self.lnz[q] * dljk;
                    }
                    self.first[k] = p1;
                    let next_row = self.row_idx[p1];
                    self.chain[k] = self.chain[next_row];
                    self.chain[next_row] = k;
                }
                k = next_k;
            }

            if dj <= 0.0 {
                return Err(self.perm[j]);
            }
            self.diag[j] = dj;

            let cstart = self.col_ptr[j];
            let cend = self.col_ptr[j + 1];
            for p in cstart..cend {
                let i = self.row_idx[p];
                self.lnz[p] = (self.lnz[p] - self.temp[i]) / dj;
                self.temp[i] = 0.0;
            }
            if cstart < cend {
                self.first[j] = cstart;
                let r = self.row_idx[cstart];
                self.chain[j] = self.chain[r];
                self.chain[r] = j;
            }
        }
        Ok(())
    }

    /// Solve L y = b, D z = y, L' x = z in place on the rhs vector.
    fn back_solve(&mut self) {
        for j in 0..self.n {
            let yj = self.rhs[j];
            if yj != 0.0 {
                for p in self.col_ptr[j]..self.col_ptr[j + 1] {
                    self.rhs[self.row_idx[p]] -= self.lnz[p] * yj;
                }
            }
        }
        for j in 0..self.n {
            self.rhs[j] /= self.diag[j];
        }
        for j in (0..self.n).rev() {
            let mut sum = self.rhs[j];
            for p in self.col_ptr[j]..self.col_ptr[j + 1] {
                sum -= self.lnz[p] * self.rhs[self.row_idx[p]];
            }
            self.rhs[j] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // assemble A implicitly from (diag, links, values) and multiply
    fn residual(
        n: usize,
        from: &[usize],
        to: &[usize],
        diag: &[f64],
        off: &[f64],
        x: &[f64],
        b: &[f64],
    ) -> f64 {
        let mut ax = vec![0.0; n];
        for i in 0..n {
            ax[i] += diag[i] * x[i];
        }
        for l in 0..from.len() {
            ax[from[l]] += off[l] * x[to[l]];
            ax[to[l]] += off[l] * x[from[l]];
        }
        ax.iter()
            .zip(b)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn solves_a_tridiagonal_chain() {
        let from = [0, 1];
        let to = [1, 2];
        let mut solver = SparseSolver::init(3, &from, &to);
        solver.reset();
        for i in 0..3 {
            solver.add_to_diag(i, 2.0);
        }
        for l in 0..2 {
            solver.add_to_off_diag(l, -1.0);
        }
        solver.set_rhs(0, 1.0);
        solver.set_rhs(1, 0.0);
        solver.set_rhs(2, 1.0);

        let mut x = vec![0.0; 3];
        solver.solve(&mut x).unwrap();
        for xi in &x {
            assert!((xi - 1.0).abs() < 1e-12, "x = {x:?}");
        }
    }

    #[test]
    fn solves_a_grid_with_fill_in() {
        // 2x2 grid: 0-1, 0-2, 1-3, 2-3
        let from = [0, 0, 1, 2];
        let to = [1, 2, 3, 3];
        let diag = [3.0, 3.0, 3.0, 3.0];
        let off = [-1.0, -1.0, -1.0, -1.0];
        let b = [1.0, 2.0, 3.0, 4.0];

        let mut solver = SparseSolver::init(4, &from, &to);
        solver.reset();
        for i in 0..4 {
            solver.add_to_diag(i, diag[i]);
            solver.set_rhs(i, b[i]);
        }
        for l in 0..4 {
            solver.add_to_off_diag(l, off[l]);
        }

        let mut x = vec![0.0; 4];
        solver.solve(&mut x).unwrap();
        assert!(residual(4, &from, &to, &diag, &off, &x, &b) < 1e-10);
    }

    #[test]
    fn duplicate_links_share_an_entry() {
        // two parallel links between nodes 0 and 1
        let from = [0, 0];
        let to = [1, 1];
        let mut solver = SparseSolver::init(2, &from, &to);
        solver.reset();
        solver.add_to_diag(0, 2.0);
        solver.add_to_diag(1, 2.0);
        solver.add_to_off_diag(0, -0.5);
        solver.add_to_off_diag(1, -0.5);
        solver.set_rhs(0, 1.0);
        solver.set_rhs(1, 1.0);

        let mut x = vec![0.0; 2];
        solver.solve(&mut x).unwrap();
        // A = [[2,-1],[-1,2]], b = [1,1] -> x = [1,1]
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reports_the_offending_row_on_bad_pivot() {
        let from = [0, 1];
        let to = [1, 2];
        let mut solver = SparseSolver::init(3, &from, &to);
        solver.reset();
        solver.add_to_diag(0, 2.0);
        solver.add_to_diag(1, 0.0); // singular row
        solver.add_to_diag(2, 2.0);
        solver.add_to_off_diag(0, -1.0);
        solver.add_to_off_diag(1, -1.0);

        let mut x = vec![0.0; 3];
        match solver.solve(&mut x) {
            Err(row) => assert_eq!(row, 1),
            Ok(()) => panic!("expected an ill-conditioning report"),
        }
    }

    #[test]
    fn larger_random_pattern_solves_consistently() {
        // a ladder network: rungs create moderate fill-in under reordering
        let n = 10;
        let mut from = Vec::new();
        let mut to = Vec::new();
        for i in 0..(n - 1) {
            from.push(i);
            to.push(i + 1);
        }
        for i in 0..(n - 2) {
            from.push(i);
            to.push(i + 2);
        }

        let mut diag = vec![0.0; n];
        let mut off = vec![0.0; from.len()];
        for (l, o) in off.iter_mut().enumerate() {
            *o = -1.0 / (1.0 + (l % 3) as f64);
        }
        for l in 0..from.len() {
            diag[from[l]] += -off[l] + 0.5;
            diag[to[l]] += -off[l] + 0.5;
        }
        let b: Vec<f64> = (0..n).map(|i| (i as f64) - 3.0).collect();

        let mut solver = SparseSolver::init(n, &from, &to);
        solver.reset();
        for i in 0..n {
            solver.add_to_diag(i, diag[i]);
            solver.set_rhs(i, b[i]);
        }
        for l in 0..from.len() {
            solver.add_to_off_diag(l, off[l]);
        }

        let mut x = vec![0.0; n];
        solver.solve(&mut x).unwrap();
        assert!(residual(n, &from, &to, &diag, &off, &x, &b) < 1e-9);
    }

    #[test]
    fn reset_clears_previous_system() {
        let from = [0];
        let to = [1];
        let mut solver = SparseSolver::init(2, &from, &to);
        solver.reset();
        solver.add_to_diag(0, 4.0);
        solver.add_to_diag(1, 4.0);
        solver.add_to_off_diag(0, -2.0);
        solver.set_rhs(0, 2.0);
        solver.set_rhs(1, 2.0);
        let mut x = vec![0.0; 2];
        solver.solve(&mut x).unwrap();

        solver.reset();
        solver.add_to_diag(0, 1.0);
        solver.add_to_diag(1, 1.0);
        solver.set_rhs(0, 5.0);
        solver.set_rhs(1, 7.0);
        solver.solve(&mut x).unwrap();
        assert!((x[0] - 5.0).abs() < 1e-12);
        assert!((x[1] - 7.0).abs() < 1e-12);
    }
}
