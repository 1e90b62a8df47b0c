//! Semantic validation of a loaded network, run before the solvers open.

use tracing::warn;

use crate::network::Network;
use crate::node::NodeKind;
use crate::valve::ValveKind;
use pf_core::error::{EngineError, InputError, NetworkError};
use pf_core::Quantity;

/// Nodes beyond this count are summarized instead of reported individually.
const MAX_UNCONNECTED_REPORTS: usize = 10;

/// Validate the network, logging every problem found and failing with the
/// first structural error (too few nodes, no fixed grade) or a generic
/// input-data error when element checks fail.
pub fn validate_network(net: &mut Network) -> Result<(), EngineError> {
    if net.node_count() < 2 {
        return Err(NetworkError::TooFewNodes.into());
    }
    if !net.nodes.iter().any(|node| node.fixed_grade) {
        return Err(NetworkError::NoFixedGradeNodes.into());
    }

    let mut ok = true;
    ok &= has_valid_tanks(net);
    ok &= has_valid_pumps(net);
    ok &= has_valid_valves(net);
    ok &= has_connected_nodes(net);
    if !ok {
        warn!(
            problems = net.msg_log.lines().len(),
            "network failed validation"
        );
        return Err(InputError::ErrorsInInputData.into());
    }
    Ok(())
}

/// Check tank geometry, reconciling level limits with any volume curve and
/// clamping the initial level into range.
fn has_valid_tanks(net: &mut Network) -> bool {
    let mut ok = true;
    let curves = &net.curves;
    for node in &mut net.nodes {
        let elev = node.elev;
        let name = node.name.clone();
        if let NodeKind::Tank(tank) = &mut node.kind {
            if tank.diameter == 0.0 && tank.vol_curve.is_none() {
                net.msg_log
                    .push(NetworkError::InvalidVolumeCurve(name).to_string());
                ok = false;
                continue;
            }

            if let Some(curve_id) = tank.vol_curve {
                let curve = &curves[curve_id.index()];
                if curve.size() < 2 {
                    net.msg_log
                        .push(NetworkError::InvalidVolumeCurve(name).to_string());
                    ok = false;
                    continue;
                }
                // volume curve is depth vs. volume in user units; narrow the
                // level limits to the range it covers
                let low = curve.x(0) / tank.ucf_length + elev;
                tank.min_head = tank.min_head.max(low);
                let high = curve.x(curve.size() - 1) / tank.ucf_length + elev;
                tank.max_head = tank.max_head.min(high);
            }

            if tank.max_head < tank.min_head {
                net.msg_log
                    .push(NetworkError::InvalidTankLevels(name).to_string());
                ok = false;
                continue;
            }
            tank.init_head = tank.init_head.clamp(tank.min_head, tank.max_head);
        }
    }
    ok
}

/// Fit every pump's head curve, logging fitting failures.
fn has_valid_pumps(net: &mut Network) -> bool {
    let mut ok = true;
    let curves = &net.curves;
    let q_ucf = net.units.factor(Quantity::Flow);
    let h_ucf = net.units.factor(Quantity::Length);
    for link in &mut net.links {
        let name = link.name.clone();
        if let Some(pump) = link.pump_mut() {
            if let Err(err) = pump.curve.setup(&name, curves, q_ucf, h_ucf) {
                net.msg_log.push(err.to_string());
                ok = false;
            }
        }
    }
    ok
}

/// A PRV's downstream node and a PSV's upstream node must not themselves be
/// fixed grade; an active valve could not pin them otherwise.
fn has_valid_valves(net: &mut Network) -> bool {
    let mut ok = true;
    for link in &net.links {
        let Some(valve) = link.valve() else { continue };
        let illegal = match valve.kind {
            ValveKind::Prv => net.nodes[link.to_node].fixed_grade,
            ValveKind::Psv => net.nodes[link.from_node].fixed_grade,
            _ => false,
        };
        if illegal {
            net.msg_log
                .push(NetworkError::IllegalValveConnection(link.name.clone()).to_string());
            ok = false;
        }
    }
    ok
}

/// Every node needs at least one incident link. The first few offenders are
/// reported individually, the rest summarized.
fn has_connected_nodes(net: &mut Network) -> bool {
    let mut incident = vec![0usize; net.node_count()];
    for link in &net.links {
        incident[link.from_node] += 1;
        incident[link.to_node] += 1;
    }

    let mut unconnected = 0;
    for (i, count) in incident.iter().enumerate() {
        if *count == 0 {
            unconnected += 1;
            if unconnected <= MAX_UNCONNECTED_REPORTS {
                net.msg_log
                    .push(NetworkError::UnconnectedNode(net.nodes[i].name.clone()).to_string());
            }
        }
    }
    if unconnected > MAX_UNCONNECTED_REPORTS {
        net.msg_log.push(format!(
            "Network Error 233: no links connected to another {} nodes",
            unconnected - MAX_UNCONNECTED_REPORTS
        ));
    }
    unconnected == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junction::Junction;
    use crate::link::LinkKind;
    use crate::node::{NodeKind, Reservoir};
    use crate::pipe::Pipe;
    use crate::tank::Tank;
    use crate::valve::Valve;

    fn base_net() -> Network {
        let mut net = Network::new();
        net.add_node("R1", NodeKind::Reservoir(Reservoir::default()))
            .unwrap();
        net.add_node("J1", NodeKind::Junction(Junction::default()))
            .unwrap();
        net.add_link("P1", 0, 1, LinkKind::Pipe(Pipe::default()))
            .unwrap();
        net
    }

    #[test]
    fn accepts_a_minimal_network() {
        let mut net = base_net();
        assert!(validate_network(&mut net).is_ok());
    }

    #[test]
    fn rejects_networks_without_fixed_grade() {
        let mut net = Network::new();
        net.add_node("J1", NodeKind::Junction(Junction::default()))
            .unwrap();
        net.add_node("J2", NodeKind::Junction(Junction::default()))
            .unwrap();
        net.add_link("P1", 0, 1, LinkKind::Pipe(Pipe::default()))
            .unwrap();
        assert_eq!(
            validate_network(&mut net).unwrap_err().code(),
            NetworkError::NoFixedGradeNodes.code()
        );
    }

    #[test]
    fn rejects_prv_into_fixed_grade_node() {
        let mut net = base_net();
        net.add_node("R2", NodeKind::Reservoir(Reservoir::default()))
            .unwrap();
        net.add_link("V1", 1, 2, LinkKind::Valve(Valve::new(ValveKind::Prv)))
            .unwrap();
        let err = validate_network(&mut net).unwrap_err();
        assert_eq!(err.code(), 200);
        assert!(net
            .msg_log
            .lines()
            .iter()
            .any(|l| l.contains("illegal valve connection")));
    }

    #[test]
    fn rejects_inverted_tank_levels() {
        let mut net = base_net();
        net.add_node(
            "T1",
            NodeKind::Tank(Tank {
                diameter: 20.0,
                min_head: 50.0,
                max_head: 10.0,
                ..Default::default()
            }),
        )
        .unwrap();
        net.add_link("P2", 1, 2, LinkKind::Pipe(Pipe::default()))
            .unwrap();
        assert!(validate_network(&mut net).is_err());
        assert!(net
            .msg_log
            .lines()
            .iter()
            .any(|l| l.contains("invalid lower/upper levels")));
    }

    #[test]
    fn reports_unconnected_nodes() {
        let mut net = base_net();
        net.add_node("J9", NodeKind::Junction(Junction::default()))
            .unwrap();
        assert!(validate_network(&mut net).is_err());
        assert!(net
            .msg_log
            .lines()
            .iter()
            .any(|l| l.contains("no links connected to node J9")));
    }
}
