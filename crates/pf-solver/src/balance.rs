//! Hydraulic balance evaluation.
//!
//! Measures how badly a trial solution (current heads/flows plus a damped
//! step of changes) violates conservation of energy across links and
//! conservation of flow at nodes. This is the single source of truth for
//! the solution error: the GGA solver calls it both to assemble its next
//! linearization and to pick a step size. As a side effect it refreshes
//! every link's (hLoss, hGrad) and every node's (outflow, qGrad,
//! actualDemand) at the trial point.

use pf_network::link::LinkEvalContext;
use pf_network::{Network, NodeKind};
use pf_models::JunctionDemand;
use pf_core::Quantity;

#[derive(Debug, Clone, Default)]
pub struct HydBalance {
    /// max flow imbalance (cfs)
    pub max_flow_err: f64,
    /// max head loss error (ft)
    pub max_head_err: f64,
    /// max flow change (cfs)
    pub max_flow_change: f64,
    /// (summed flow changes) / (summed flows)
    pub total_flow_change: f64,

    pub max_head_err_link: Option<usize>,
    pub max_flow_err_node: Option<usize>,
    pub max_flow_change_link: Option<usize>,
}

impl HydBalance {
    /// Evaluate the RMS error norm for step size `lamda` applied to head
    /// changes `dh` and flow changes `dq`. `xq` receives each node's flow
    /// imbalance.
    pub fn evaluate(
        &mut self,
        lamda: f64,
        dh: &[f64],
        dq: &[f64],
        xq: &mut [f64],
        net: &mut Network,
    ) -> f64 {
        self.max_flow_err = 0.0;
        self.max_head_err = 0.0;
        self.max_flow_change = 0.0;
        self.max_head_err_link = None;
        self.max_flow_err_node = None;
        self.max_flow_change_link = None;

        xq.fill(0.0);

        let mut norm = self.find_head_error_norm(lamda, dh, dq, xq, net);
        find_node_outflows(lamda, dh, xq, net);
        norm += self.find_flow_error_norm(xq, net);

        self.total_flow_change = find_total_flow_change(lamda, dq, net);
        norm.sqrt()
    }

    /// Error in satisfying the head loss equation across each link,
    /// normalized by link count. Also accumulates link flows into `xq`.
    fn find_head_error_norm(
        &mut self,
        lamda: f64,
        dh: &[f64],
        dq: &[f64],
        xq: &mut [f64],
        net: &mut Network,
    ) -> f64 {
        let mut norm = 0.0;
        let link_count = net.links.len();
        if link_count == 0 {
            return 0.0;
        }

        let ctx = LinkEvalContext {
            headloss: net.headloss_model,
            curves: &net.curves,
            ucf_flow: net.units.factor(Quantity::Flow),
            ucf_head: net.units.factor(Quantity::Length),
        };
        let nodes = &net.nodes;

        for (i, link) in net.links.iter_mut().enumerate() {
            let n1 = link.from_node;
            let n2 = link.to_node;

            let flow_change = lamda * dq[i];
            let flow = link.flow + flow_change;
            xq[n1] -= flow;
            xq[n2] += flow;

            let change = flow_change.abs();
            if change > self.max_flow_change {
                self.max_flow_change = change;
                self.max_flow_change_link = Some(i);
            }

            link.find_head_loss(&ctx, flow);

            let h1 = nodes[n1].head + lamda * dh[n1];
            let h2 = nodes[n2].head + lamda * dh[n2];
            if link.hgrad == 0.0 {
                // active pressure regulators absorb whatever head difference
                // their pinned nodes produce
                link.hloss = h1 - h2;
            }
            let err = h1 - h2 - link.hloss;
            if err.abs() > self.max_head_err {
                self.max_head_err = err.abs();
                self.max_head_err_link = Some(i);
            }
            norm += err * err;
        }
        norm / link_count as f64
    }

    /// Error in satisfying flow continuity at each node, normalized by
    /// node count.
    fn find_flow_error_norm(&mut self, xq: &[f64], net: &Network) -> f64 {
        let mut norm = 0.0;
        for (i, imbalance) in xq.iter().enumerate() {
            if imbalance.abs() > self.max_flow_err {
                self.max_flow_err = imbalance.abs();
                self.max_flow_err_node = Some(i);
            }
            norm += imbalance * imbalance;
        }
        norm / net.nodes.len() as f64
    }
}

/// Refresh each node's external outflow (emitter + demand + leakage) at the
/// trial heads and fold it into the nodal imbalances.
fn find_node_outflows(lamda: f64, dh: &[f64], xq: &mut [f64], net: &mut Network) {
    for node in &mut net.nodes {
        node.outflow = 0.0;
        node.q_grad = 0.0;
    }

    if net.leakage_model.is_some() {
        find_leakage_flows(lamda, dh, xq, net);
    }

    let demand_model = net.demand_model;
    let patterns = &net.patterns;
    for (i, node) in net.nodes.iter_mut().enumerate() {
        let h = node.head + lamda * dh[i];
        match &mut node.kind {
            NodeKind::Junction(junc) => {
                // emitter flow
                if let Some(emitter) = &junc.emitter {
                    let factor = emitter
                        .time_pattern
                        .map(|p| patterns[p.index()].current_factor())
                        .unwrap_or(1.0);
                    let (q, dqdh) = emitter.find_flow_rate(h - node.elev, factor);
                    node.q_grad += dqdh;
                    node.outflow += q;
                    xq[i] -= q;
                }

                // demand flow
                let q = if node.fixed_grade {
                    // a pinned junction absorbs the remaining flow excess
                    let q = xq[i];
                    xq[i] -= q;
                    q
                } else {
                    let junc_demand = JunctionDemand {
                        full_demand: node.full_demand,
                        actual_demand: node.actual_demand,
                        p_min: junc.p_min,
                        p_full: junc.p_full,
                    };
                    let (q, dqdh) = demand_model.find_demand(&junc_demand, h - node.elev);
                    node.q_grad += dqdh;
                    xq[i] -= q;
                    q
                };
                node.actual_demand = q;
                node.outflow += q;
            }
            _ => {
                // tanks and reservoirs absorb all flow excess
                node.outflow = xq[i];
                xq[i] = 0.0;
            }
        }
    }
}

/// Assign each leaking pipe's flow to its end junctions, half to each side
/// with positive pressure (all to one side when only one qualifies).
fn find_leakage_flows(lamda: f64, dh: &[f64], xq: &mut [f64], net: &mut Network) {
    let model = net.leakage_model.expect("leakage model is active");
    let nodes = &mut net.nodes;
    let links = &mut net.links;

    for link in links.iter_mut() {
        link.leakage = 0.0;
        if !link.can_leak() {
            continue;
        }

        let n1 = link.from_node;
        let n2 = link.to_node;
        let can_leak1 = matches!(nodes[n1].kind, NodeKind::Junction(_));
        let can_leak2 = matches!(nodes[n2].kind, NodeKind::Junction(_));
        if !can_leak1 && !can_leak2 {
            continue;
        }

        let h1 = nodes[n1].head + lamda * dh[n1] - nodes[n1].elev;
        let h2 = nodes[n2].head + lamda * dh[n2] - nodes[n2].elev;
        let h = (h1 + h2) / 2.0;
        if h <= 0.0 {
            continue;
        }

        let (leakage, dqdh) = link.find_leakage(&model, h);
        link.leakage = leakage;

        // split between the qualifying endpoints
        let mut q = leakage / 2.0;
        if h1 * h2 <= 0.0 || !(can_leak1 && can_leak2) {
            q = 2.0 * q;
        }
        if h1 > 0.0 && can_leak1 {
            nodes[n1].outflow += q;
            nodes[n1].q_grad += dqdh;
            xq[n1] -= q;
        }
        if h2 > 0.0 && can_leak2 {
            nodes[n2].outflow += q;
            nodes[n2].q_grad += dqdh;
            xq[n2] -= q;
        }
    }
}

/// Sum of all flow changes relative to the sum of all flows.
fn find_total_flow_change(lamda: f64, dq: &[f64], net: &Network) -> f64 {
    let mut q_sum = 0.0;
    let mut dq_sum = 0.0;
    for (i, link) in net.links.iter().enumerate() {
        let change = lamda * dq[i];
        dq_sum += change.abs();
        q_sum += (link.flow + change).abs();
    }
    if q_sum > 0.0 {
        dq_sum / q_sum
    } else {
        dq_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_network::{Junction, LinkKind, NodeKind, Pipe, Reservoir};

    // one reservoir feeding one junction through a Hazen-Williams pipe
    fn single_pipe_net(demand: f64) -> Network {
        let mut net = Network::new();
        net.add_node("R1", NodeKind::Reservoir(Reservoir::default()))
            .unwrap();
        net.add_node("J1", NodeKind::Junction(Junction::default()))
            .unwrap();
        net.add_link(
            "P1",
            0,
            1,
            LinkKind::Pipe(Pipe {
                length: 1000.0,
                roughness: 100.0,
                ..Default::default()
            }),
        )
        .unwrap();
        net.links[0].diameter = 1.0;
        net.create_models();
        let model = net.headloss_model;
        net.links[0].set_resistance(&model);
        net.links[0].initialize(true);

        net.nodes[0].head = 100.0;
        net.nodes[0].fixed_grade = true;
        net.nodes[1].head = 95.0;
        net.nodes[1].full_demand = demand;
        net.nodes[1].actual_demand = demand;
        if let Some(junc) = net.nodes[1].junction_mut() {
            junc.p_min = 0.0;
            junc.p_full = 1.0;
        }
        net
    }

    #[test]
    fn balanced_solution_has_small_norm() {
        let mut net = single_pipe_net(1.0);
        // hand-set the exact solution: q = 1 cfs, hLoss = 4.727*1000/100^1.852
        net.links[0].flow = 1.0;
        net.nodes[1].head = 100.0 - 0.934_452;

        let dh = vec![0.0; 2];
        let dq = vec![0.0; 1];
        let mut xq = vec![0.0; 2];
        let mut balance = HydBalance::default();
        let norm = balance.evaluate(0.0, &dh, &dq, &mut xq, &mut net);
        assert!(norm < 1e-3, "norm = {norm}");
        assert!(balance.max_flow_err < 1e-9);
    }

    #[test]
    fn flow_imbalance_is_detected_at_the_junction() {
        let mut net = single_pipe_net(1.0);
        net.links[0].flow = 0.5; // pipe under-delivers
        let dh = vec![0.0; 2];
        let dq = vec![0.0; 1];
        let mut xq = vec![0.0; 2];
        let mut balance = HydBalance::default();
        balance.evaluate(0.0, &dh, &dq, &mut xq, &mut net);
        assert_eq!(balance.max_flow_err_node, Some(1));
        assert!((balance.max_flow_err - 0.5).abs() < 1e-9);
    }

    #[test]
    fn step_size_scales_flow_changes() {
        let mut net = single_pipe_net(1.0);
        net.links[0].flow = 1.0;
        let dh = vec![0.0; 2];
        let dq = vec![0.5; 1];
        let mut xq = vec![0.0; 2];
        let mut balance = HydBalance::default();
        balance.evaluate(0.5, &dh, &dq, &mut xq, &mut net);
        assert!((balance.max_flow_change - 0.25).abs() < 1e-12);
        assert!((balance.total_flow_change - 0.25 / 1.25).abs() < 1e-9);
    }

    #[test]
    fn reservoir_absorbs_excess_as_outflow() {
        let mut net = single_pipe_net(1.0);
        net.links[0].flow = 1.0;
        let dh = vec![0.0; 2];
        let dq = vec![0.0; 1];
        let mut xq = vec![0.0; 2];
        let mut balance = HydBalance::default();
        balance.evaluate(0.0, &dh, &dq, &mut xq, &mut net);
        // the reservoir supplies 1 cfs, recorded as negative outflow
        assert!((net.nodes[0].outflow + 1.0).abs() < 1e-12);
        assert_eq!(xq[0], 0.0);
    }
}
