//! End-to-end scenario tests driven through the project layer.

use pf_core::constants::PSI_PER_FT;
use pf_network::{LinkStatus, NodeKind};
use pf_project::Project;
use pf_solver::HydSolverStatus;

const SINGLE_PIPE: &str = "
[TITLE]
Single pipe gravity feed

[JUNCTIONS]
J1  0  1.0

[RESERVOIRS]
R1  100

[PIPES]
P1  R1  J1  1000  12  100  0

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W

[TIMES]
DURATION  0
";

#[test]
fn single_pipe_steady_state() {
    let mut project = Project::new();
    project.load_from_str(SINGLE_PIPE).unwrap();
    project.init_solver(false).unwrap();

    let mut t = 0;
    let status = project.run_solver(&mut t).unwrap();
    assert_eq!(status, HydSolverStatus::Successful);

    let net = &project.network;
    let pipe = &net.links[0];
    assert!((pipe.flow - 1.0).abs() < 1e-3, "flow = {}", pipe.flow);

    // hLoss = 4.727 * 1000 / 100^1.852 = 0.9345 ft
    let junction = &net.nodes[net.node_index("J1").unwrap()];
    assert!(
        (junction.head - (100.0 - 0.9345)).abs() < 0.01,
        "head = {}",
        junction.head
    );
}

const CHECK_VALVE: &str = "
[TITLE]
Check valve blocks a reverse-driving source

[JUNCTIONS]
J1  0  1.0

[RESERVOIRS]
R1  100
R2  200

[PIPES]
P1  R1  J1  1000  12  100  0
P2  J1  R2  1000  12  100  0  CV

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W

[TIMES]
DURATION  0
";

#[test]
fn check_valve_pins_reverse_flow_to_zero() {
    let mut project = Project::new();
    project.load_from_str(CHECK_VALVE).unwrap();
    project.init_solver(false).unwrap();

    let mut t = 0;
    let status = project.run_solver(&mut t).unwrap();
    assert_eq!(status, HydSolverStatus::Successful);

    let net = &project.network;
    // R2 sits 100 ft above J1 and would drive flow backwards through the
    // check valve; the smooth penalty holds that flow at essentially zero
    let cv = &net.links[net.link_index("P2").unwrap()];
    assert!(cv.flow.abs() < 1e-3, "cv flow = {}", cv.flow);
    assert_eq!(cv.status, LinkStatus::Open);

    // the whole demand comes from R1
    let supply = &net.links[net.link_index("P1").unwrap()];
    assert!((supply.flow - 1.0).abs() < 1e-3, "supply = {}", supply.flow);
}

const PRV_NET: &str = "
[TITLE]
Active pressure reducing valve

[JUNCTIONS]
J1  0
J2  0
J3  0  0.5

[RESERVOIRS]
R1  200

[PIPES]
P1  R1  J1  1000  12  100  0
P2  J2  J3  1000  12  100  0

[VALVES]
V1  J1  J2  12  PRV  50  0

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W

[TIMES]
DURATION  0
";

#[test]
fn active_prv_holds_its_setpoint() {
    let mut project = Project::new();
    project.load_from_str(PRV_NET).unwrap();
    project.init_solver(false).unwrap();

    let mut t = 0;
    let status = project.run_solver(&mut t).unwrap();
    assert_eq!(status, HydSolverStatus::Successful);

    let net = &project.network;
    let valve = &net.links[net.link_index("V1").unwrap()];
    assert_eq!(valve.status, LinkStatus::Active);

    // 50 psi at elevation 0 pins the downstream head at 50/0.4333 ft
    let setpoint = 50.0 / PSI_PER_FT;
    let downstream = &net.nodes[net.node_index("J2").unwrap()];
    assert!(
        (downstream.head - setpoint).abs() < 0.05,
        "downstream head = {} vs setpoint {setpoint}",
        downstream.head
    );

    let feed = &net.links[net.link_index("P2").unwrap()];
    assert!((feed.flow - 0.5).abs() < 1e-3);
}

const TANK_DRAIN: &str = "
[TITLE]
Tank draining to a constant demand

[JUNCTIONS]
J1  0  1.0

[TANKS]
T1  0  40  5  45  20  0

[PIPES]
P1  T1  J1  100  12  130  0

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W

[TIMES]
DURATION  48:00:00
HYDRAULIC_TIMESTEP  1:00:00
REPORT_TIMESTEP  1:00:00
";

#[test]
fn tank_drain_lands_exactly_on_min_level() {
    let mut project = Project::new();
    project.load_from_str(TANK_DRAIN).unwrap();
    project.init_solver(false).unwrap();

    let mut last_head = f64::MAX;
    let mut hit_min_exactly = false;
    loop {
        let mut t = 0;
        let status = project.run_solver(&mut t).unwrap();
        assert_eq!(status, HydSolverStatus::Successful, "at t = {t}");

        let mut tstep = 0;
        project.advance_solver(&mut tstep).unwrap();

        let net = &project.network;
        let node = &net.nodes[net.node_index("T1").unwrap()];
        let tank = node.tank().unwrap();

        // never crosses the minimum level, and never rises
        assert!(node.head >= tank.min_head - 1e-9);
        assert!(node.head <= last_head + 1e-9);
        if (node.head - tank.min_head).abs() < 1e-9 {
            hit_min_exactly = true;
        }
        last_head = node.head;

        if tstep == 0 {
            break;
        }
    }
    assert!(hit_min_exactly, "the advancer never landed on min level");
}

const TRACER_NET: &str = "
[TITLE]
Source tracing through a PRV

[JUNCTIONS]
J1  0
J2  0
J3  0  0.5

[RESERVOIRS]
R1  200

[PIPES]
P1  R1  J1  1000  12  100  0
P2  J2  J3  1000  12  100  0

[VALVES]
V1  J1  J2  12  PRV  50  0

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W
QUALITY_MODEL  TRACE  R1

[TIMES]
DURATION  24:00:00
HYDRAULIC_TIMESTEP  1:00:00
QUALITY_TIMESTEP  0:01:00
";

#[test]
fn tracer_reaches_full_strength_with_closed_mass_balance() {
    let mut project = Project::new();
    project.load_from_str(TRACER_NET).unwrap();
    project.init_solver(false).unwrap();

    loop {
        let mut t = 0;
        let status = project.run_solver(&mut t).unwrap();
        assert_eq!(status, HydSolverStatus::Successful);
        let mut tstep = 0;
        project.advance_solver(&mut tstep).unwrap();
        if tstep == 0 {
            break;
        }
    }

    let net = &project.network;
    let ccf = net.ucf(pf_core::Quantity::Concen);
    for name in ["J1", "J2", "J3"] {
        let node = &net.nodes[net.node_index(name).unwrap()];
        let percent = node.quality * ccf;
        assert!(
            (percent - 100.0).abs() < 0.01,
            "{name} tracer = {percent}%"
        );
    }

    let summary = project.run_summary();
    let balance = summary.mass_balance.expect("quality run has a balance");
    assert!(
        balance.percent_imbalance.abs() < 0.1,
        "imbalance = {}%",
        balance.percent_imbalance
    );
}

const PATTERN_EPS: &str = "
[TITLE]
Extended period run with a daily demand pattern

[JUNCTIONS]
J1  50  1.0  Day
J2  40  0.5  Day

[RESERVOIRS]
R1  150

[TANKS]
T1  100  15  5  25  40  0

[PIPES]
P1  R1  J1  2000  14  110  0
P2  J1  J2  1500  12  110  0
P3  J2  T1  1500  12  110  0
P4  T1  J1  3000  10  110  0

[PATTERNS]
Day  0.5  0.6  0.7  0.8  1.0  1.2  1.4  1.5  1.4  1.3  1.2  1.1
Day  1.0  1.0  1.1  1.2  1.3  1.4  1.3  1.2  1.0  0.8  0.6  0.5

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W

[TIMES]
DURATION  24:00:00
HYDRAULIC_TIMESTEP  1:00:00
PATTERN_TIMESTEP  1:00:00
REPORT_TIMESTEP  1:00:00
";

#[test]
fn patterned_run_converges_and_respects_tank_bounds() {
    let mut project = Project::new();
    project.load_from_str(PATTERN_EPS).unwrap();
    project.init_solver(false).unwrap();

    let mut steps = 0;
    loop {
        let mut t = 0;
        let status = project.run_solver(&mut t).unwrap();
        assert_eq!(status, HydSolverStatus::Successful, "unconverged at t = {t}");

        {
            let net = &project.network;
            // flow continuity at every junction of the solved state
            for (i, node) in net.nodes.iter().enumerate() {
                if !matches!(node.kind, NodeKind::Junction(_)) {
                    continue;
                }
                let mut inflow = 0.0;
                for link in &net.links {
                    if link.to_node == i {
                        inflow += link.flow;
                    }
                    if link.from_node == i {
                        inflow -= link.flow;
                    }
                }
                assert!(
                    (inflow - node.outflow).abs() < 0.01,
                    "continuity off at {} by {}",
                    node.name,
                    inflow - node.outflow
                );
            }

            let node = &net.nodes[net.node_index("T1").unwrap()];
            let tank = node.tank().unwrap();
            assert!(tank.volume >= tank.min_volume - 1e-6);
            assert!(tank.volume <= tank.max_volume + 1e-6);
        }

        let mut tstep = 0;
        project.advance_solver(&mut tstep).unwrap();
        if tstep == 0 {
            break;
        }
        steps += 1;
        assert!(steps < 200, "advancer failed to terminate");
    }
    assert!(steps >= 24, "expected at least hourly steps, got {steps}");
}
