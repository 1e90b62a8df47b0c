//! Save/load round-trip: a saved project reloads to identical internal
//! state for quantities expressed in canonical units.

use pf_network::{LinkKind, Network, NodeKind};
use pf_project::Project;

const NET: &str = "
[TITLE]
Round trip fixture

[JUNCTIONS]
J1  50  1.0  Day
J2  40

[RESERVOIRS]
R1  150  Day

[TANKS]
T1  100  15  5  25  40  0

[PIPES]
P1  R1  J1  2000  12  100  0
P2  J1  J2  1500  12  100  0.5
P3  J2  T1  1500  12  100  0  CV

[PUMPS]
PU1  J2  J1  HEAD  PC1

[VALVES]
V1  J1  J2  12  FCV  2  0.2

[PATTERNS]
Day  0.5  1.0  1.5  1.0

[CURVES]
PC1  PUMP  0  200  4  150  8  50

[CONTROLS]
LINK P2 CLOSED IF NODE T1 ABOVE 24
LINK P2 OPEN AT TIME 6

[EMITTERS]
J2  0.5  0.5

[DEMANDS]
J2  0.25  Day

[QUALITY]
R1  1.0

[SOURCES]
R1  CONCEN  2.5  Day

[MIXING]
T1  FIFO

[REACTIONS]
ORDER  BULK  1
GLOBAL  BULK  -0.5

[OPTIONS]
FLOW_UNITS  CFS
HEADLOSS_MODEL  H-W
QUALITY_MODEL  CHEMICAL
DEMAND_MULTIPLIER  1.25

[TIMES]
DURATION  24:00:00
HYDRAULIC_TIMESTEP  1:00:00
QUALITY_TIMESTEP  0:05:00
REPORT_TIMESTEP  2:00:00

[END]
";

fn node_field_pairs(net: &Network) -> Vec<(String, f64)> {
    let mut values = Vec::new();
    for node in &net.nodes {
        values.push((format!("{}:elev", node.name), node.elev));
        values.push((format!("{}:initqual", node.name), node.init_qual));
        match &node.kind {
            NodeKind::Junction(junc) => {
                values.push((format!("{}:pmin", node.name), junc.p_min));
                values.push((format!("{}:pfull", node.name), junc.p_full));
                for (i, demand) in junc.demands.iter().enumerate() {
                    values.push((format!("{}:demand{i}", node.name), demand.base_demand));
                }
                if let Some(emitter) = &junc.emitter {
                    values.push((format!("{}:emitcoeff", node.name), emitter.flow_coeff));
                    values.push((format!("{}:emitexp", node.name), emitter.expon));
                }
            }
            NodeKind::Tank(tank) => {
                values.push((format!("{}:inithead", node.name), tank.init_head));
                values.push((format!("{}:minhead", node.name), tank.min_head));
                values.push((format!("{}:maxhead", node.name), tank.max_head));
                values.push((format!("{}:diam", node.name), tank.diameter));
                values.push((format!("{}:minvol", node.name), tank.min_volume));
                values.push((format!("{}:bulk", node.name), tank.bulk_coeff));
            }
            NodeKind::Reservoir(_) => {}
        }
        if let Some(source) = &node.source {
            values.push((format!("{}:srcbase", node.name), source.base));
        }
    }
    values
}

fn link_field_pairs(net: &Network) -> Vec<(String, f64)> {
    let mut values = Vec::new();
    for link in &net.links {
        values.push((format!("{}:diam", link.name), link.diameter));
        values.push((format!("{}:mloss", link.name), link.loss_coeff));
        values.push((format!("{}:initset", link.name), link.init_setting));
        match &link.kind {
            LinkKind::Pipe(pipe) => {
                values.push((format!("{}:length", link.name), pipe.length));
                values.push((format!("{}:rough", link.name), pipe.roughness));
                values.push((format!("{}:bulk", link.name), pipe.bulk_coeff));
                values.push((
                    format!("{}:cv", link.name),
                    if pipe.has_check_valve { 1.0 } else { 0.0 },
                ));
            }
            LinkKind::Pump(pump) => {
                values.push((format!("{}:hp", link.name), pump.curve.horsepower));
            }
            LinkKind::Valve(valve) => {
                values.push((format!("{}:lossfac", link.name), valve.loss_factor));
            }
        }
    }
    values
}

#[test]
fn save_then_load_reproduces_internal_state() {
    let mut first = Project::new();
    first.load_from_str(NET).unwrap();
    let saved = first.save_to_string();

    let mut second = Project::new();
    second
        .load_from_str(&saved)
        .unwrap_or_else(|e| panic!("saved text failed to parse: {e}\n{saved}"));

    let a = &first.network;
    let b = &second.network;

    assert_eq!(a.nodes.len(), b.nodes.len());
    assert_eq!(a.links.len(), b.links.len());
    assert_eq!(a.patterns.len(), b.patterns.len());
    assert_eq!(a.curves.len(), b.curves.len());
    assert_eq!(a.controls.len(), b.controls.len());

    // quantities with exact conversion factors round-trip bit for bit;
    // the rest are allowed the last bit of a multiply/divide pair
    let close = |a: f64, b: f64| (a - b).abs() <= 1e-14 * a.abs().max(b.abs()).max(1.0);

    for ((name_a, va), (name_b, vb)) in node_field_pairs(a)
        .into_iter()
        .zip(node_field_pairs(b))
    {
        assert_eq!(name_a, name_b);
        assert!(close(va, vb), "{name_a}: {va} vs {vb}");
    }
    for ((name_a, va), (name_b, vb)) in link_field_pairs(a)
        .into_iter()
        .zip(link_field_pairs(b))
    {
        assert_eq!(name_a, name_b);
        assert!(close(va, vb), "{name_a}: {va} vs {vb}");
    }

    // pattern factors and option times survive unchanged
    for (pa, pb) in a.patterns.iter().zip(&b.patterns) {
        assert_eq!(pa.factors, pb.factors);
    }
    assert_eq!(a.options.total_duration, b.options.total_duration);
    assert_eq!(a.options.hyd_step, b.options.hyd_step);
    assert_eq!(a.options.qual_step, b.options.qual_step);
    assert_eq!(a.options.report_step, b.options.report_step);
    assert_eq!(a.options.demand_multiplier, b.options.demand_multiplier);
    assert_eq!(a.options.qual_type, b.options.qual_type);
}

#[test]
fn full_run_writes_report_and_output_files() {
    let dir = std::env::temp_dir();
    let pid = std::process::id();
    let inp = dir.join(format!("pf-test-{pid}.inp"));
    let rpt = dir.join(format!("pf-test-{pid}.rpt"));
    let out = dir.join(format!("pf-test-{pid}.out"));

    // a self-contained runnable fixture
    std::fs::write(
        &inp,
        "
[JUNCTIONS]
J1  0  1.0

[RESERVOIRS]
R1  100

[PIPES]
P1  R1  J1  1000  12  100  0

[OPTIONS]
FLOW_UNITS  CFS

[TIMES]
DURATION  4:00:00
HYDRAULIC_TIMESTEP  1:00:00
REPORT_TIMESTEP  1:00:00

[REPORT]
NODES  ALL
LINKS  ALL
",
    )
    .unwrap();

    let mut project = Project::new();
    project
        .run(&inp, &rpt, out.to_str().unwrap())
        .expect("run succeeds");

    let report = std::fs::read_to_string(&rpt).unwrap();
    assert!(report.contains("Number of Junctions"));
    assert!(report.contains("Node Results"));

    // 5 reporting periods: hours 0 through 4
    let mut reader = pf_project::OutputReader::open(&out).unwrap();
    assert_eq!(reader.period_count, 5);
    assert_eq!(reader.node_count, 2);
    let (nodes, links) = reader.read_period(0).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(links.len(), 1);
    // nodes are recorded in insertion order: J1 then R1
    assert!((nodes[1][0] - 100.0).abs() < 0.01, "reservoir head");
    assert!(nodes[0][0] < 100.0, "junction head sits below the reservoir");
    assert!((links[0][0] - 1.0).abs() < 0.01, "pipe flow");

    let _ = std::fs::remove_file(&inp);
    let _ = std::fs::remove_file(&rpt);
    let _ = std::fs::remove_file(&out);
}
