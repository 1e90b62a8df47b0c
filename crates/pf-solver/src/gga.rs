//! The Global Gradient Algorithm hydraulic solver.
//!
//! A damped Newton iteration on node heads: each trial assembles the
//! linearized GGA system, solves it with the sparse LDL' solver, derives
//! link flow changes from the head changes, damps the step, and loops until
//! the balance norms meet their tolerances with no link status changes.

use nalgebra::DVector;
use tracing::debug;

use crate::balance::HydBalance;
use crate::sparse::SparseSolver;
use pf_core::constants::ZERO_FLOW;
use pf_core::Quantity;
use pf_network::{LinkStatus, Network, NodeKind, StepSizing};

/// error norm below which relaxation starts probing half steps
const ERROR_THRESHOLD: f64 = 1.0;
/// smallest line-search subdivision
const MIN_LINESEARCH_DELTA: f64 = 0.001;
const HUGE: f64 = f64::MAX;

/// Outcome of a hydraulic solve at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydSolverStatus {
    Successful,
    FailedNoConvergence,
    FailedIllConditioned { node: usize },
}

pub struct GgaSolver {
    matrix: SparseSolver,
    pub balance: HydBalance,

    dh: DVector<f64>,
    dq: DVector<f64>,
    xq: DVector<f64>,

    trials_limit: usize,
    report_trials: bool,
    step_sizing: StepSizing,

    head_err_limit: f64,
    flow_err_limit: f64,
    flow_change_limit: f64,
    flow_ratio_limit: f64,

    tstep: f64,
    theta: f64,
    error_norm: f64,
    old_error_norm: f64,
}

impl GgaSolver {
    pub fn new(net: &Network) -> Self {
        let node_count = net.nodes.len();
        let link_count = net.links.len();
        let from: Vec<usize> = net.links.iter().map(|l| l.from_node).collect();
        let to: Vec<usize> = net.links.iter().map(|l| l.to_node).collect();
        let matrix = SparseSolver::init(node_count, &from, &to);
        debug!(
            nodes = node_count,
            links = link_count,
            factor_nnz = matrix.factor_nnz(),
            "hydraulic matrix initialized"
        );

        Self {
            matrix,
            balance: HydBalance::default(),
            dh: DVector::zeros(node_count),
            dq: DVector::zeros(link_count),
            xq: DVector::zeros(node_count),
            trials_limit: 0,
            report_trials: false,
            step_sizing: StepSizing::Full,
            head_err_limit: 0.0,
            flow_err_limit: 0.0,
            flow_change_limit: 0.0,
            flow_ratio_limit: 0.0,
            tstep: 0.0,
            theta: 0.0,
            error_norm: 0.0,
            old_error_norm: 0.0,
        }
    }

    /// Solve for heads and flows at the current instant. `tstep` is the
    /// upcoming time step used for the dynamic-tank coupling; `trials`
    /// accumulates the Newton trial count.
    pub fn solve(&mut self, net: &mut Network, tstep: i64, trials: &mut usize) -> HydSolverStatus {
        let mut status_changed = true;
        self.error_norm = HUGE;
        self.tstep = tstep as f64;
        *trials = 1;

        // time weighting option for tank updating: 0, or clamped to [0.5, 1]
        let mut theta = net.options.time_weight.min(1.0);
        if theta > 0.0 {
            theta = theta.max(0.5);
        }
        self.theta = theta;

        self.set_convergence_limits(net);
        self.step_sizing = net.options.step_sizing;
        self.report_trials = net.options.report_trials;

        while *trials <= self.trials_limit {
            self.old_error_norm = self.error_norm;

            self.set_fixed_grade_nodes(net);

            // a status change invalidates the old error norm
            if status_changed {
                self.old_error_norm = self.find_error_norm(net, 0.0);
            }
            status_changed = false;

            if let Err(node) = self.find_head_changes(net) {
                net.msg_log.push(format!(
                    "  Hydraulic matrix ill-conditioned at node {}",
                    net.nodes[node].name
                ));
                return HydSolverStatus::FailedIllConditioned { node };
            }
            self.find_flow_changes(net);

            let lamda = self.find_step_size(net, *trials);
            self.update_solution(net, lamda);

            if self.report_trials {
                self.report_trial(net, *trials, lamda);
            }

            // when close to a solution, let links react to it
            if self.has_converged() {
                status_changed = self.links_changed_status(net);
                if !status_changed {
                    break;
                }
            }
            *trials += 1;
        }

        if *trials > self.trials_limit {
            return HydSolverStatus::FailedNoConvergence;
        }
        HydSolverStatus::Successful
    }

    fn set_convergence_limits(&mut self, net: &Network) {
        self.trials_limit = net.options.max_trials;
        self.flow_ratio_limit = net.options.relative_accuracy;
        self.head_err_limit = net.options.head_tolerance / net.ucf(Quantity::Length);
        self.flow_err_limit = net.options.flow_tolerance / net.ucf(Quantity::Flow);
        self.flow_change_limit = net.options.flow_change_limit / net.ucf(Quantity::Flow);

        // fall back to a default head error limit when nothing is set
        if self.flow_ratio_limit == 0.0
            && self.head_err_limit == 0.0
            && self.flow_err_limit == 0.0
            && self.flow_change_limit == 0.0
        {
            self.head_err_limit = 0.005;
        }
        if self.flow_ratio_limit == 0.0 {
            self.flow_ratio_limit = HUGE;
        }
        if self.head_err_limit == 0.0 {
            self.head_err_limit = HUGE;
        }
        if self.flow_err_limit == 0.0 {
            self.flow_err_limit = HUGE;
        }
        if self.flow_change_limit == 0.0 {
            self.flow_change_limit = HUGE;
        }
    }

    /// Pin the control nodes of active PRVs/PSVs and release tanks when the
    /// time-weighted integration is in effect.
    fn set_fixed_grade_nodes(&mut self, net: &mut Network) {
        for i in 0..net.links.len() {
            let link = &net.links[i];
            let node_idx = if link.is_prv() {
                link.to_node
            } else if link.is_psv() {
                link.from_node
            } else {
                continue;
            };
            let active = link.status == LinkStatus::Active;
            let setting = link.setting;
            let node = &mut net.nodes[node_idx];
            if active {
                node.fixed_grade = true;
                node.head = setting + node.elev;
            } else {
                node.fixed_grade = false;
            }
        }

        if self.theta > 0.0 && self.tstep > 0.0 {
            for node in &mut net.nodes {
                if matches!(node.kind, NodeKind::Tank(_)) {
                    node.fixed_grade = false;
                }
            }
        }
    }

    /// Assemble and solve the linearized system; `dh` receives head changes.
    fn find_head_changes(&mut self, net: &mut Network) -> Result<(), usize> {
        self.set_matrix_coeffs(net);

        let mut heads = vec![0.0; net.nodes.len()];
        self.matrix.solve(&mut heads)?;
        for (i, node) in net.nodes.iter().enumerate() {
            self.dh[i] = heads[i] - node.head;
        }
        Ok(())
    }

    /// Back out flow changes from the head changes.
    fn find_flow_changes(&mut self, net: &Network) {
        for (i, link) in net.links.iter().enumerate() {
            self.dq[i] = 0.0;

            // active pressure regulators take whatever their pinned node needs
            if link.hgrad == 0.0 {
                if link.is_prv() {
                    self.dq[i] = -self.xq[link.to_node] - link.flow;
                }
                if link.is_psv() {
                    self.dq[i] = self.xq[link.from_node] - link.flow;
                }
                continue;
            }

            let n1 = link.from_node;
            let n2 = link.to_node;
            let dh = (net.nodes[n1].head + self.dh[n1]) - (net.nodes[n2].head + self.dh[n2]);
            let mut dq = (link.hloss - dh) / link.hgrad;

            // keep constant-HP pumps from being driven to negative flow
            if link.is_hp_pump() && link.status == LinkStatus::Open && dq > link.flow {
                dq = link.flow / 2.0;
            }
            self.dq[i] = -dq;
        }
    }

    /// Pick how much of the head/flow changes to accept. Also leaves the
    /// balance evaluated at the chosen step so gradients are fresh for the
    /// next trial.
    fn find_step_size(&mut self, net: &mut Network, trials: usize) -> f64 {
        let mut lamda = 1.0;
        self.error_norm = self.find_error_norm(net, lamda);

        match self.step_sizing {
            StepSizing::Relaxation => {
                if self.old_error_norm < ERROR_THRESHOLD {
                    lamda = 0.5;
                    let half_norm = self.find_error_norm(net, lamda);
                    if half_norm < self.error_norm {
                        self.error_norm = half_norm;
                    } else {
                        lamda = 1.0;
                        self.error_norm = self.find_error_norm(net, lamda);
                    }
                }
            }
            StepSizing::LineSearch => {
                if trials > 1 && self.error_norm >= self.old_error_norm {
                    lamda = self.line_search(net);
                }
            }
            StepSizing::Full => {}
        }
        lamda
    }

    /// Backtracking range finder: sample step sizes on a refining grid and
    /// take the first subdivision level that produces an improvement.
    fn line_search(&mut self, net: &mut Network) -> f64 {
        let mut best_lamda = 1.0;
        let mut best_norm = self.error_norm;
        let mut delta = 1.0;

        while delta >= MIN_LINESEARCH_DELTA {
            delta /= 2.0;
            // only the odd multiples of delta are new at this level
            let mut k = 1;
            while k as f64 * delta < 1.0 {
                let lamda = k as f64 * delta;
                let norm = self.find_error_norm(net, lamda);
                if norm < best_norm {
                    best_norm = norm;
                    best_lamda = lamda;
                }
                k += 2;
            }
            if best_norm < self.old_error_norm {
                break;
            }
        }

        // leave the network evaluated at the chosen step
        self.error_norm = self.find_error_norm(net, best_lamda);
        best_lamda
    }

    fn find_error_norm(&mut self, net: &mut Network, lamda: f64) -> f64 {
        self.balance.evaluate(
            lamda,
            self.dh.as_slice(),
            self.dq.as_slice(),
            self.xq.as_mut_slice(),
            net,
        )
    }

    fn update_solution(&mut self, net: &mut Network, lamda: f64) {
        for (i, node) in net.nodes.iter_mut().enumerate() {
            node.head += lamda * self.dh[i];
        }
        for (i, link) in net.links.iter_mut().enumerate() {
            link.flow += lamda * self.dq[i];
        }
    }

    fn has_converged(&self) -> bool {
        self.balance.max_head_err < self.head_err_limit
            && self.balance.max_flow_err < self.flow_err_limit
            && self.balance.max_flow_change < self.flow_change_limit
            && self.balance.total_flow_change < self.flow_ratio_limit
    }

    /// Let every link respond to the near-converged solution; returns true
    /// when any status changed.
    fn links_changed_status(&mut self, net: &mut Network) -> bool {
        let mut result = false;
        for i in 0..net.links.len() {
            let (h1, h2, q, old_status) = {
                let link = &net.links[i];
                (
                    net.nodes[link.from_node].head,
                    net.nodes[link.to_node].head,
                    link.flow,
                    link.status,
                )
            };

            {
                let link = &mut net.links[i];
                if link.status == LinkStatus::TempClosed {
                    link.status = LinkStatus::Open;
                }
                link.update_status(q, h1, h2);
            }

            // block flow into full tanks and out of empty ones
            let link = &net.links[i];
            if link.status != LinkStatus::Closed {
                let closed_end = net.nodes[link.from_node].is_closed(q)
                    || net.nodes[link.to_node].is_closed(-q);
                if closed_end {
                    let link = &mut net.links[i];
                    link.status = LinkStatus::TempClosed;
                    link.flow = ZERO_FLOW;
                }
            }

            let link = &net.links[i];
            if old_status != link.status {
                if self.report_trials {
                    let msg = link.write_status_change(old_status);
                    net.msg_log.push(msg);
                }
                result = true;
            }
        }
        result
    }

    /// Build the GGA coefficient matrix and right-hand side.
    fn set_matrix_coeffs(&mut self, net: &mut Network) {
        self.xq.fill(0.0);
        self.matrix.reset();
        self.set_link_coeffs(net);
        self.set_node_coeffs(net);
        self.set_valve_coeffs(net);
    }

    fn set_link_coeffs(&mut self, net: &Network) {
        for (j, link) in net.links.iter().enumerate() {
            if link.hgrad == 0.0 {
                continue;
            }

            let n1 = link.from_node;
            let n2 = link.to_node;
            let node1 = &net.nodes[n1];
            let node2 = &net.nodes[n2];

            self.xq[n1] -= link.flow;
            self.xq[n2] += link.flow;

            let a = 1.0 / link.hgrad;
            let b = a * link.hloss;

            if !node1.fixed_grade && !node2.fixed_grade {
                self.matrix.add_to_off_diag(j, -a);
            }

            if node1.fixed_grade {
                self.matrix.add_to_rhs(n2, a * node1.head);
            } else {
                self.matrix.add_to_diag(n1, a);
                self.matrix.add_to_rhs(n1, b);
            }

            if node2.fixed_grade {
                self.matrix.add_to_rhs(n1, a * node2.head);
            } else {
                self.matrix.add_to_diag(n2, a);
                self.matrix.add_to_rhs(n2, -b);
            }
        }
    }

    fn set_node_coeffs(&mut self, net: &Network) {
        for (i, node) in net.nodes.iter().enumerate() {
            if !node.fixed_grade {
                match &node.kind {
                    NodeKind::Tank(tank) if self.theta != 0.0 => {
                        // dynamic tank: time-weighted area coupling
                        let a = tank.area / (self.theta * self.tstep);
                        self.matrix.add_to_diag(i, a);
                        let b =
                            a * tank.past_head + (1.0 - self.theta) * tank.past_outflow / self.theta;
                        self.matrix.add_to_rhs(i, b);
                    }
                    NodeKind::Junction(_) => {
                        self.xq[i] -= node.outflow;
                        self.matrix.add_to_diag(i, node.q_grad);
                        self.matrix.add_to_rhs(i, node.q_grad * node.head);
                    }
                    _ => {}
                }
                self.matrix.add_to_rhs(i, self.xq[i]);
            } else {
                self.matrix.set_diag(i, 1.0);
                self.matrix.set_rhs(i, node.head);
            }
        }
    }

    fn set_valve_coeffs(&mut self, net: &Network) {
        for link in &net.links {
            if link.hgrad > 0.0 {
                continue;
            }
            // an active PRV forwards its downstream node's net inflow to the
            // upstream row; a PSV does the mirror image
            if link.is_prv() {
                self.matrix.add_to_rhs(link.from_node, self.xq[link.to_node]);
            }
            if link.is_psv() {
                self.matrix.add_to_rhs(link.to_node, self.xq[link.from_node]);
            }
        }
    }

    fn report_trial(&self, net: &mut Network, trials: usize, lamda: f64) {
        let ucf_len = net.ucf(Quantity::Length);
        let ucf_flow = net.ucf(Quantity::Flow);
        net.msg_log.push(String::new());
        net.msg_log.push(format!("    Trial {trials}:"));
        net.msg_log.push(format!("    Step Size   = {lamda:.4}"));
        net.msg_log
            .push(format!("    Error Norm  = {:.6}", self.error_norm));

        let mut line = format!(
            "    Head Error  = {:.6} {}",
            self.balance.max_head_err * ucf_len,
            net.units.name(Quantity::Length)
        );
        if let Some(link) = self.balance.max_head_err_link {
            line.push_str(&format!(" for Link {}", net.links[link].name));
        }
        net.msg_log.push(line);

        let mut line = format!(
            "    Flow Error  = {:.6} {}",
            self.balance.max_flow_err * ucf_flow,
            net.units.name(Quantity::Flow)
        );
        if let Some(node) = self.balance.max_flow_err_node {
            line.push_str(&format!(" at Node {}", net.nodes[node].name));
        }
        net.msg_log.push(line);

        let mut line = format!(
            "    Flow Change = {:.6} {}",
            self.balance.max_flow_change * ucf_flow,
            net.units.name(Quantity::Flow)
        );
        if let Some(link) = self.balance.max_flow_change_link {
            line.push_str(&format!(" for Link {}", net.links[link].name));
        }
        net.msg_log.push(line);

        net.msg_log.push(format!(
            "    Total Flow Change Ratio = {:.6}",
            self.balance.total_flow_change
        ));
    }
}
