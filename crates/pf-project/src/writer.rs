//! Project writer: renders a loaded (unit-converted) network back into the
//! section-based input format, closing the save/load round trip.

use std::fmt::Write as _;

use pf_core::clock::format_time;
use pf_core::Quantity;
use pf_models::headloss::HeadLossKind;
use pf_network::{
    IfUnbalanced, LeakageModelKind, LinkKind, LinkStatus, Network, NodeKind, PatternKind, QualType,
    ReportedItems, StepSizing, ValveKind,
};

/// Render the network as input-file text in the user's units.
pub fn write_project(net: &Network) -> String {
    let mut out = String::new();
    let lcf = net.ucf(Quantity::Length);
    let dcf = net.ucf(Quantity::Diameter);
    let qcf = net.ucf(Quantity::Flow);
    let pcf = net.ucf(Quantity::Pressure);
    let vcf = net.ucf(Quantity::Volume);
    let wcf = net.ucf(Quantity::Power);

    out.push_str("[TITLE]\n");
    for line in &net.title {
        let _ = writeln!(out, "{line}");
    }

    out.push_str("\n[JUNCTIONS]\n");
    for node in &net.nodes {
        if matches!(node.kind, NodeKind::Junction(_)) {
            let _ = writeln!(out, "{}  {}", node.name, node.elev * lcf);
        }
    }

    out.push_str("\n[RESERVOIRS]\n");
    for node in &net.nodes {
        if let NodeKind::Reservoir(resv) = &node.kind {
            let _ = write!(out, "{}  {}", node.name, node.elev * lcf);
            if let Some(p) = resv.head_pattern {
                let _ = write!(out, "  {}", net.patterns[p.index()].name);
            }
            out.push('\n');
        }
    }

    out.push_str("\n[TANKS]\n");
    for node in &net.nodes {
        if let NodeKind::Tank(tank) = &node.kind {
            let _ = write!(
                out,
                "{}  {}  {}  {}  {}  {}  {}",
                node.name,
                node.elev * lcf,
                (tank.init_head - node.elev) * lcf,
                (tank.min_head - node.elev) * lcf,
                (tank.max_head - node.elev) * lcf,
                tank.diameter * lcf,
                tank.min_volume * vcf
            );
            if let Some(c) = tank.vol_curve {
                let _ = write!(out, "  {}", net.curves[c.index()].name);
            }
            out.push('\n');
        }
    }

    out.push_str("\n[PIPES]\n");
    for link in &net.links {
        if let LinkKind::Pipe(pipe) = &link.kind {
            let roughness = if net.options.headloss_model == HeadLossKind::DarcyWeisbach {
                pipe.roughness * lcf * 1000.0
            } else {
                pipe.roughness
            };
            let _ = write!(
                out,
                "{}  {}  {}  {}  {}  {}  {}",
                link.name,
                net.nodes[link.from_node].name,
                net.nodes[link.to_node].name,
                pipe.length * lcf,
                link.diameter * dcf,
                roughness,
                link.loss_coeff
            );
            if pipe.has_check_valve {
                out.push_str("  CV");
            } else if link.init_status == LinkStatus::Closed {
                out.push_str("  CLOSED");
            }
            out.push('\n');
        }
    }

    out.push_str("\n[PUMPS]\n");
    for link in &net.links {
        if let LinkKind::Pump(pump) = &link.kind {
            let _ = write!(
                out,
                "{}  {}  {}",
                link.name,
                net.nodes[link.from_node].name,
                net.nodes[link.to_node].name
            );
            if let Some(c) = pump.curve.curve {
                let _ = write!(out, "  HEAD {}", net.curves[c.index()].name);
            }
            if pump.curve.horsepower > 0.0 {
                let _ = write!(out, "  POWER {}", pump.curve.horsepower * wcf);
            }
            if link.init_setting != 1.0 {
                let _ = write!(out, "  SPEED {}", link.init_setting);
            }
            if let Some(p) = pump.speed_pattern {
                let _ = write!(out, "  PATTERN {}", net.patterns[p.index()].name);
            }
            out.push('\n');
        }
    }

    out.push_str("\n[VALVES]\n");
    for link in &net.links {
        if let LinkKind::Valve(valve) = &link.kind {
            let setting = match valve.kind {
                ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => {
                    format!("{}", link.init_setting * pcf)
                }
                ValveKind::Fcv => format!("{}", link.init_setting * qcf),
                ValveKind::Gpv => net.curves[link.init_setting as usize].name.clone(),
                _ => format!("{}", link.init_setting),
            };
            let _ = writeln!(
                out,
                "{}  {}  {}  {}  {}  {}  {}",
                link.name,
                net.nodes[link.from_node].name,
                net.nodes[link.to_node].name,
                link.diameter * dcf,
                valve.kind.label(),
                setting,
                link.loss_coeff
            );
        }
    }

    out.push_str("\n[DEMANDS]\n");
    for node in &net.nodes {
        if let NodeKind::Junction(junc) = &node.kind {
            for demand in &junc.demands {
                let _ = write!(out, "{}  {}", node.name, demand.base_demand * qcf);
                if let Some(p) = demand.time_pattern {
                    let _ = write!(out, "  {}", net.patterns[p.index()].name);
                }
                out.push('\n');
            }
        }
    }

    out.push_str("\n[EMITTERS]\n");
    for node in &net.nodes {
        if let NodeKind::Junction(junc) = &node.kind {
            if let Some(emitter) = &junc.emitter {
                // undo the load-time coefficient conversion
                let coeff = emitter.flow_coeff * qcf / pcf.powf(emitter.expon);
                let _ = write!(out, "{}  {}  {}", node.name, coeff, emitter.expon);
                if let Some(p) = emitter.time_pattern {
                    let _ = write!(out, "  {}", net.patterns[p.index()].name);
                }
                out.push('\n');
            }
        }
    }

    out.push_str("\n[STATUS]\n");
    for link in &net.links {
        match &link.kind {
            LinkKind::Pump(_) if link.init_status == LinkStatus::Closed => {
                let _ = writeln!(out, "{}  CLOSED", link.name);
            }
            LinkKind::Valve(valve) if valve.has_fixed_status => {
                let _ = writeln!(out, "{}  {}", link.name, link.init_status.label());
            }
            _ => {}
        }
    }

    out.push_str("\n[PATTERNS]\n");
    for pattern in &net.patterns {
        match &pattern.kind {
            PatternKind::Fixed { .. } => {
                let _ = write!(out, "{}", pattern.name);
                for factor in &pattern.factors {
                    let _ = write!(out, "  {factor}");
                }
                out.push('\n');
            }
            PatternKind::Variable { times } => {
                let _ = write!(out, "{}  VARIABLE", pattern.name);
                for (time, factor) in times.iter().zip(&pattern.factors) {
                    let _ = write!(out, "  {}  {}", *time as f64 / 3600.0, factor);
                }
                out.push('\n');
            }
        }
    }

    out.push_str("\n[CURVES]\n");
    for curve in &net.curves {
        let _ = write!(out, "{}", curve.name);
        if !curve.kind.label().is_empty() {
            let _ = write!(out, "  {}", curve.kind.label());
        }
        for i in 0..curve.size() {
            let _ = write!(out, "  {}  {}", curve.x(i), curve.y(i));
        }
        out.push('\n');
    }

    out.push_str("\n[CONTROLS]\n");
    for control in &net.controls {
        let _ = writeln!(
            out,
            "{}",
            control.to_input_line(&net.nodes, &net.links, lcf, pcf)
        );
    }

    out.push_str("\n[QUALITY]\n");
    let ccf = net.ucf(Quantity::Concen);
    for node in &net.nodes {
        if node.init_qual != 0.0 {
            let _ = writeln!(out, "{}  {}", node.name, node.init_qual * ccf);
        }
    }

    out.push_str("\n[SOURCES]\n");
    for node in &net.nodes {
        if let Some(source) = &node.source {
            let _ = write!(out, "{}  {}  {}", node.name, source.kind.label(), source.base);
            if let Some(p) = source.pattern {
                let _ = write!(out, "  {}", net.patterns[p.index()].name);
            }
            out.push('\n');
        }
    }

    out.push_str("\n[MIXING]\n");
    for node in &net.nodes {
        if let NodeKind::Tank(tank) = &node.kind {
            let _ = write!(out, "{}  {}", node.name, tank.mixing_model.label());
            if tank.mixing_model == pf_network::MixingKind::Mix2 {
                let _ = write!(out, "  {}", tank.frac_mixed);
            }
            out.push('\n');
        }
    }

    out.push_str("\n[OPTIONS]\n");
    let opts = &net.options;
    let _ = writeln!(out, "FLOW_UNITS  {}", opts.flow_units.label());
    if let Some(p) = opts.pressure_units {
        let _ = writeln!(out, "PRESSURE_UNITS  {}", p.label().to_uppercase());
    }
    let _ = writeln!(out, "HEADLOSS_MODEL  {}", opts.headloss_model.label());
    let _ = writeln!(out, "DEMAND_MODEL  {}", opts.demand_model.label());
    if let Some(model) = opts.leakage_model {
        let label = match model {
            LeakageModelKind::Power => "POWER",
            LeakageModelKind::Favad => "FAVAD",
        };
        let _ = writeln!(out, "LEAKAGE_MODEL  {label}");
    }
    let _ = writeln!(
        out,
        "STEP_SIZING  {}",
        match opts.step_sizing {
            StepSizing::Full => "FULL",
            StepSizing::Relaxation => "RELAXATION",
            StepSizing::LineSearch => "LINESEARCH",
        }
    );
    let _ = writeln!(out, "MAXIMUM_TRIALS  {}", opts.max_trials);
    let _ = writeln!(
        out,
        "IF_UNBALANCED  {}",
        match opts.if_unbalanced {
            IfUnbalanced::Stop => "STOP",
            IfUnbalanced::Continue => "CONTINUE",
        }
    );
    let _ = writeln!(out, "SPECIFIC_GRAVITY  {}", opts.spec_gravity);
    let _ = writeln!(out, "SPECIFIC_VISCOSITY  {}", opts.kin_viscosity);
    let _ = writeln!(out, "DEMAND_MULTIPLIER  {}", opts.demand_multiplier);
    if !opts.demand_pattern_name.is_empty() {
        let _ = writeln!(out, "DEMAND_PATTERN  {}", opts.demand_pattern_name);
    }
    let _ = writeln!(out, "MINIMUM_PRESSURE  {}", opts.minimum_pressure);
    let _ = writeln!(out, "SERVICE_PRESSURE  {}", opts.service_pressure);
    let _ = writeln!(out, "PRESSURE_EXPONENT  {}", opts.pressure_exponent);
    let _ = writeln!(out, "EMITTER_EXPONENT  {}", opts.emitter_exponent);
    if opts.head_tolerance > 0.0 {
        let _ = writeln!(out, "HEAD_TOLERANCE  {}", opts.head_tolerance);
    }
    if opts.flow_tolerance > 0.0 {
        let _ = writeln!(out, "FLOW_TOLERANCE  {}", opts.flow_tolerance);
    }
    if opts.relative_accuracy > 0.0 {
        let _ = writeln!(out, "RELATIVE_ACCURACY  {}", opts.relative_accuracy);
    }
    if opts.time_weight > 0.0 {
        let _ = writeln!(out, "TIME_WEIGHT  {}", opts.time_weight);
    }
    match opts.qual_type {
        QualType::NoQual => {}
        QualType::Age => {
            let _ = writeln!(out, "QUALITY_MODEL  AGE");
        }
        QualType::Trace => {
            let _ = writeln!(out, "QUALITY_MODEL  TRACE  {}", opts.trace_node_name);
        }
        QualType::Chem => {
            let _ = writeln!(out, "QUALITY_MODEL  CHEMICAL");
            let _ = writeln!(out, "QUALITY_NAME  {}", opts.qual_name);
        }
    }

    out.push_str("\n[REACTIONS]\n");
    let _ = writeln!(out, "ORDER  BULK  {}", opts.bulk_order);
    let _ = writeln!(out, "ORDER  WALL  {}", opts.wall_order);
    let _ = writeln!(out, "ORDER  TANK  {}", opts.tank_order);
    let _ = writeln!(out, "GLOBAL  BULK  {}", opts.bulk_coeff);
    let _ = writeln!(out, "GLOBAL  WALL  {}", opts.wall_coeff);
    if opts.limiting_concen > 0.0 {
        let _ = writeln!(out, "LIMITING  POTENTIAL  {}", opts.limiting_concen);
    }

    out.push_str("\n[TIMES]\n");
    let _ = writeln!(out, "DURATION  {}", format_time(opts.total_duration));
    let _ = writeln!(out, "HYDRAULIC_TIMESTEP  {}", format_time(opts.hyd_step));
    let _ = writeln!(out, "QUALITY_TIMESTEP  {}", format_time(opts.qual_step));
    let _ = writeln!(out, "PATTERN_TIMESTEP  {}", format_time(opts.pattern_step));
    let _ = writeln!(out, "PATTERN_START  {}", format_time(opts.pattern_start));
    let _ = writeln!(out, "REPORT_TIMESTEP  {}", format_time(opts.report_step));
    let _ = writeln!(out, "REPORT_START  {}", format_time(opts.report_start));
    let _ = writeln!(out, "START_CLOCKTIME  {}", format_time(opts.start_time));

    out.push_str("\n[REPORT]\n");
    let _ = writeln!(out, "SUMMARY  {}", if opts.report_summary { "YES" } else { "NO" });
    let _ = writeln!(out, "ENERGY  {}", if opts.report_energy { "YES" } else { "NO" });
    let _ = writeln!(out, "STATUS  {}", if opts.report_status { "YES" } else { "NO" });
    let _ = writeln!(out, "TRIALS  {}", if opts.report_trials { "YES" } else { "NO" });
    let _ = writeln!(
        out,
        "NODES  {}",
        if opts.report_nodes == ReportedItems::All { "ALL" } else { "NONE" }
    );
    let _ = writeln!(
        out,
        "LINKS  {}",
        if opts.report_links == ReportedItems::All { "ALL" } else { "NONE" }
    );

    out.push_str("\n[COORDINATES]\n");
    for node in &net.nodes {
        if node.x_coord != 0.0 || node.y_coord != 0.0 {
            let _ = writeln!(out, "{}  {}  {}", node.name, node.x_coord, node.y_coord);
        }
    }

    out.push_str("\n[END]\n");
    out
}
