//! Section parsers: the object-creation pass and the property pass.

use crate::reader::{LineParser, Section};
use pf_core::clock::parse_seconds;
use pf_core::error::InputError;
use pf_core::{FlowUnits, Id, PressureUnits};
use pf_models::headloss::HeadLossKind;
use pf_network::{
    Control, ControlAction, ControlKind, Curve, CurveKind, Demand, DemandModelKind, Emitter,
    Junction, LeakageModelKind, LevelKind, LinkKind, LinkStatus, MixingKind, Network, NodeKind,
    Pattern, PatternKind, Pipe, Pump, QualSource, QualType, QualUnits, ReportedItems, Reservoir,
    SourceKind, StepSizing, Tank, Valve, ValveKind,
};

fn parse_number(token: &str) -> Result<f64, InputError> {
    token
        .parse()
        .map_err(|_| InputError::InvalidNumber(token.to_string()))
}

fn parse_time(tokens: &[&str], index: usize) -> Result<i64, InputError> {
    let time = tokens
        .get(index)
        .ok_or(InputError::TooFewItems)?;
    let units = tokens.get(index + 1).copied().unwrap_or("");
    parse_seconds(time, units).ok_or_else(|| InputError::InvalidTime(time.to_string()))
}

fn node_index(net: &Network, name: &str) -> Result<usize, InputError> {
    net.node_index(name)
        .ok_or_else(|| InputError::UndefinedObject(name.to_string()))
}

fn link_index(net: &Network, name: &str) -> Result<usize, InputError> {
    net.link_index(name)
        .ok_or_else(|| InputError::UndefinedObject(name.to_string()))
}

fn pattern_id(net: &Network, name: &str) -> Result<Id, InputError> {
    net.pattern_index(name)
        .map(Id::from_index)
        .ok_or_else(|| InputError::UndefinedObject(name.to_string()))
}

fn curve_id(net: &Network, name: &str) -> Result<Id, InputError> {
    net.curve_index(name)
        .map(Id::from_index)
        .ok_or_else(|| InputError::UndefinedObject(name.to_string()))
}

/// Pass 1: create every named object so cross-references resolve in pass 2.
#[derive(Default)]
pub struct ObjectParser;

impl ObjectParser {
    pub fn new() -> Self {
        Self
    }
}

impl LineParser for ObjectParser {
    fn parse_line(
        &mut self,
        net: &mut Network,
        section: Section,
        line: &str,
    ) -> Result<(), InputError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let name = tokens[0];

        match section {
            Section::Title => net.add_title_line(line.trim()),
            Section::Junctions => {
                net.add_node(name, NodeKind::Junction(Junction::default()))
                    .map(|_| ())?
            }
            Section::Reservoirs => {
                net.add_node(name, NodeKind::Reservoir(Reservoir::default()))
                    .map(|_| ())?
            }
            Section::Tanks => net
                .add_node(name, NodeKind::Tank(Tank::default()))
                .map(|_| ())?,
            Section::Pipes => net
                .add_link(name, 0, 0, LinkKind::Pipe(Pipe::default()))
                .map(|_| ())?,
            Section::Pumps => net
                .add_link(name, 0, 0, LinkKind::Pump(Pump::default()))
                .map(|_| ())?,
            Section::Valves => net
                .add_link(name, 0, 0, LinkKind::Valve(Valve::new(ValveKind::Tcv)))
                .map(|_| ())?,
            Section::Patterns => {
                if net.pattern_index(name).is_none() {
                    let pattern = match tokens.get(1).map(|t| t.to_ascii_uppercase()) {
                        Some(kind) if kind == "VARIABLE" => Pattern::variable(name),
                        _ => Pattern::fixed(name),
                    };
                    net.add_pattern(pattern)?;
                }
            }
            Section::Curves => {
                if net.curve_index(name).is_none() {
                    net.add_curve(Curve::new(name))?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Pass 2: assign properties, resolving references by name.
#[derive(Default)]
pub struct PropertyParser {
    rules_warned: bool,
}

impl PropertyParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for PropertyParser {
    fn parse_line(
        &mut self,
        net: &mut Network,
        section: Section,
        line: &str,
    ) -> Result<(), InputError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match section {
            Section::Title | Section::End => Ok(()),
            Section::Junctions => parse_junction(net, &tokens),
            Section::Reservoirs => parse_reservoir(net, &tokens),
            Section::Tanks => parse_tank(net, &tokens),
            Section::Pipes => parse_pipe(net, &tokens),
            Section::Pumps => parse_pump(net, &tokens),
            Section::Valves => parse_valve(net, &tokens),
            Section::Patterns => parse_pattern(net, &tokens),
            Section::Curves => parse_curve(net, &tokens),
            Section::Controls => parse_control(net, &tokens),
            Section::Emitters => parse_emitter(net, &tokens),
            Section::Demands => parse_demand(net, &tokens),
            Section::Status => parse_status(net, &tokens),
            Section::Leakage => parse_leakage(net, &tokens),
            Section::Energy => parse_energy(net, &tokens),
            Section::Quality => parse_quality(net, &tokens),
            Section::Sources => parse_source(net, &tokens),
            Section::Reactions => parse_reaction(net, &tokens),
            Section::Mixing => parse_mixing(net, &tokens),
            Section::Options => parse_option(net, &tokens),
            Section::Times => parse_time_option(net, &tokens),
            Section::Report => parse_report_option(net, &tokens),
            Section::Coordinates => parse_coordinates(net, &tokens),
            Section::Rules => {
                if !self.rules_warned {
                    net.msg_log
                        .push("  WARNING - rule-based controls are not supported and were ignored.");
                    self.rules_warned = true;
                }
                Ok(())
            }
            // recognized but carrying no simulation data
            Section::Roughness
            | Section::Vertices
            | Section::Labels
            | Section::Map
            | Section::Backdrop
            | Section::Tags => Ok(()),
        }
    }
}

fn parse_junction(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let elev = parse_number(tokens[1])?;
    let base_demand = match tokens.get(2) {
        Some(t) => parse_number(t)?,
        None => 0.0,
    };
    let pattern = match tokens.get(3) {
        Some(&"*") | None => None,
        Some(name) => Some(pattern_id(net, name)?),
    };

    let node = &mut net.nodes[index];
    node.elev = elev;
    if let NodeKind::Junction(junc) = &mut node.kind {
        junc.primary_demand.base_demand = base_demand;
        junc.primary_demand.time_pattern = pattern;
    }
    Ok(())
}

fn parse_reservoir(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let elev = parse_number(tokens[1])?;
    let pattern = match tokens.get(2) {
        Some(&"*") | None => None,
        Some(name) => Some(pattern_id(net, name)?),
    };

    let node = &mut net.nodes[index];
    node.elev = elev;
    if let NodeKind::Reservoir(resv) = &mut node.kind {
        resv.head_pattern = pattern;
    }
    Ok(())
}

fn parse_tank(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 7 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let elev = parse_number(tokens[1])?;
    let init_level = parse_number(tokens[2])?;
    let min_level = parse_number(tokens[3])?;
    let max_level = parse_number(tokens[4])?;
    let diameter = parse_number(tokens[5])?;
    let min_volume = parse_number(tokens[6])?;
    let vol_curve = match tokens.get(7) {
        Some(&"*") | None => None,
        Some(name) => Some(curve_id(net, name)?),
    };

    let node = &mut net.nodes[index];
    node.elev = elev;
    if let NodeKind::Tank(tank) = &mut node.kind {
        // levels are water depths above the tank bottom
        tank.init_head = elev + init_level;
        tank.min_head = elev + min_level;
        tank.max_head = elev + max_level;
        tank.diameter = diameter;
        tank.min_volume = min_volume;
        tank.vol_curve = vol_curve;
    }
    Ok(())
}

fn link_end_nodes(net: &Network, tokens: &[&str]) -> Result<(usize, usize), InputError> {
    let from = node_index(net, tokens[1])?;
    let to = node_index(net, tokens[2])?;
    Ok((from, to))
}

fn parse_pipe(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 6 {
        return Err(InputError::TooFewItems);
    }
    let index = link_index(net, tokens[0])?;
    let (from, to) = link_end_nodes(net, tokens)?;
    let length = parse_number(tokens[3])?;
    let diameter = parse_number(tokens[4])?;
    let roughness = parse_number(tokens[5])?;
    let loss_coeff = match tokens.get(6) {
        Some(t) if t.parse::<f64>().is_ok() => parse_number(t)?,
        _ => 0.0,
    };
    if length <= 0.0 || diameter <= 0.0 || roughness <= 0.0 || loss_coeff < 0.0 {
        return Err(InputError::InvalidNumber(tokens[3].to_string()));
    }

    let link = &mut net.links[index];
    link.from_node = from;
    link.to_node = to;
    link.diameter = diameter;
    link.loss_coeff = loss_coeff;
    if let LinkKind::Pipe(pipe) = &mut link.kind {
        pipe.length = length;
        pipe.roughness = roughness;
    }

    // trailing keyword: OPEN | CLOSED | CV
    if let Some(status) = tokens.last() {
        match status.to_ascii_uppercase().as_str() {
            "CV" => {
                if let LinkKind::Pipe(pipe) = &mut net.links[index].kind {
                    pipe.has_check_valve = true;
                }
            }
            "CLOSED" => net.links[index].init_status = LinkStatus::Closed,
            "OPEN" => net.links[index].init_status = LinkStatus::Open,
            _ => {}
        }
    }
    Ok(())
}

fn parse_pump(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    let index = link_index(net, tokens[0])?;
    let (from, to) = link_end_nodes(net, tokens)?;
    net.links[index].from_node = from;
    net.links[index].to_node = to;

    // keyword/value pairs: HEAD curve | POWER hp | SPEED s | PATTERN p
    let mut i = 3;
    while i + 1 < tokens.len() {
        let keyword = tokens[i].to_ascii_uppercase();
        let value = tokens[i + 1];
        match keyword.as_str() {
            "HEAD" => {
                let curve = curve_id(net, value)?;
                if let Some(pump) = net.links[index].pump_mut() {
                    pump.curve.curve = Some(curve);
                }
            }
            "POWER" => {
                let hp = parse_number(value)?;
                if let Some(pump) = net.links[index].pump_mut() {
                    pump.curve.horsepower = hp;
                }
            }
            "SPEED" => {
                let speed = parse_number(value)?;
                if speed < 0.0 {
                    return Err(InputError::InvalidNumber(value.to_string()));
                }
                let link = &mut net.links[index];
                link.init_setting = speed;
                if let Some(pump) = link.pump_mut() {
                    pump.speed = speed;
                }
            }
            "PATTERN" => {
                let pattern = pattern_id(net, value)?;
                if let Some(pump) = net.links[index].pump_mut() {
                    pump.speed_pattern = Some(pattern);
                }
            }
            _ => return Err(InputError::InvalidKeyword(keyword)),
        }
        i += 2;
    }
    Ok(())
}

fn parse_valve(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 6 {
        return Err(InputError::TooFewItems);
    }
    let index = link_index(net, tokens[0])?;
    let (from, to) = link_end_nodes(net, tokens)?;
    let diameter = parse_number(tokens[3])?;
    if diameter <= 0.0 {
        return Err(InputError::InvalidNumber(tokens[3].to_string()));
    }
    let kind = ValveKind::from_keyword(tokens[4])
        .ok_or_else(|| InputError::InvalidKeyword(tokens[4].to_string()))?;

    // a GPV's setting is its head loss curve
    let setting = if kind == ValveKind::Gpv {
        curve_id(net, tokens[5])?.index() as f64
    } else {
        parse_number(tokens[5])?
    };
    let loss_coeff = match tokens.get(6) {
        Some(t) => parse_number(t)?,
        None => 0.0,
    };
    if loss_coeff < 0.0 {
        return Err(InputError::InvalidNumber(tokens[6].to_string()));
    }

    let link = &mut net.links[index];
    link.from_node = from;
    link.to_node = to;
    link.diameter = diameter;
    link.loss_coeff = loss_coeff;
    link.init_setting = setting;
    if let LinkKind::Valve(valve) = &mut link.kind {
        valve.kind = kind;
    }
    Ok(())
}

fn parse_pattern(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    let index = net
        .pattern_index(tokens[0])
        .ok_or_else(|| InputError::UndefinedObject(tokens[0].to_string()))?;
    let pattern = &mut net.patterns[index];

    let mut values = &tokens[1..];
    // skip a type keyword repeated on continuation lines
    if let Some(first) = values.first() {
        let upper = first.to_ascii_uppercase();
        if upper == "FIXED" || upper == "VARIABLE" {
            values = &values[1..];
        }
    }

    match &mut pattern.kind {
        PatternKind::Fixed { .. } => {
            for token in values {
                pattern.factors.push(parse_number(token)?);
            }
        }
        PatternKind::Variable { times } => {
            // (time, factor) pairs; times in decimal hours
            let mut i = 0;
            while i + 1 < values.len() {
                let time = parse_seconds(values[i], "")
                    .ok_or_else(|| InputError::InvalidTime(values[i].to_string()))?;
                times.push(time);
                pattern.factors.push(parse_number(values[i + 1])?);
                i += 2;
            }
        }
    }
    Ok(())
}

fn parse_curve(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    let index = net
        .curve_index(tokens[0])
        .ok_or_else(|| InputError::UndefinedObject(tokens[0].to_string()))?;

    let mut values = &tokens[1..];
    if let Some(kind) = values.first().and_then(|t| CurveKind::from_keyword(t)) {
        net.curves[index].kind = kind;
        values = &values[1..];
    }

    let mut i = 0;
    while i + 1 < values.len() {
        let x = parse_number(values[i])?;
        let y = parse_number(values[i + 1])?;
        net.curves[index].add_point(x, y);
        i += 2;
    }
    Ok(())
}

fn parse_control(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    // LINK id action IF NODE id ABOVE/BELOW value
    // LINK id action AT TIME t / AT CLOCKTIME t
    if tokens.len() < 5 || !tokens[0].eq_ignore_ascii_case("LINK") {
        return Err(InputError::TooFewItems);
    }
    let link = link_index(net, tokens[1])?;
    let action = match tokens[2].to_ascii_uppercase().as_str() {
        "OPEN" => ControlAction::Status(LinkStatus::Open),
        "CLOSED" => ControlAction::Status(LinkStatus::Closed),
        value => ControlAction::Setting(parse_number(value)?),
    };

    let keyword = tokens[3].to_ascii_uppercase();
    let control = if keyword == "IF" {
        if tokens.len() < 8 || !tokens[4].eq_ignore_ascii_case("NODE") {
            return Err(InputError::TooFewItems);
        }
        let node = node_index(net, tokens[5])?;
        let level_kind = match tokens[6].to_ascii_uppercase().as_str() {
            "ABOVE" => LevelKind::High,
            "BELOW" => LevelKind::Low,
            other => return Err(InputError::InvalidKeyword(other.to_string())),
        };
        let value = parse_number(tokens[7])?;
        let kind = if net.nodes[node].tank().is_some() {
            ControlKind::TankLevel
        } else {
            ControlKind::PressureLevel
        };
        Control {
            name: format!("{}", net.controls.len() + 1),
            kind,
            link,
            action,
            node: Some(node),
            head: value,
            volume: 0.0,
            level_kind,
            time: 0,
        }
    } else if keyword == "AT" {
        let kind = match tokens[4].to_ascii_uppercase().as_str() {
            "TIME" => ControlKind::ElapsedTime,
            "CLOCKTIME" => ControlKind::TimeOfDay,
            other => return Err(InputError::InvalidKeyword(other.to_string())),
        };
        let time = parse_time(tokens, 5)?;
        Control {
            name: format!("{}", net.controls.len() + 1),
            kind,
            link,
            action,
            node: None,
            head: 0.0,
            volume: 0.0,
            level_kind: LevelKind::Low,
            time,
        }
    } else {
        return Err(InputError::InvalidKeyword(keyword));
    };

    net.add_control(control);
    Ok(())
}

fn parse_emitter(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let coeff = parse_number(tokens[1])?;
    let expon = match tokens.get(2) {
        Some(t) if t.parse::<f64>().is_ok() => parse_number(t)?,
        _ => net.options.emitter_exponent,
    };
    let pattern = match tokens.last() {
        Some(t) if t.parse::<f64>().is_err() && !t.eq_ignore_ascii_case(tokens[0]) => {
            Some(pattern_id(net, t)?)
        }
        _ => None,
    };

    if let Some(junc) = net.nodes[index].junction_mut() {
        junc.emitter = Some(Emitter {
            flow_coeff: coeff,
            expon,
            time_pattern: pattern,
        });
    }
    Ok(())
}

fn parse_demand(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let base_demand = parse_number(tokens[1])?;
    let pattern = match tokens.get(2) {
        Some(&"*") | None => None,
        Some(name) => Some(pattern_id(net, name)?),
    };

    if let Some(junc) = net.nodes[index].junction_mut() {
        junc.demands.push(Demand {
            base_demand,
            full_demand: 0.0,
            time_pattern: pattern,
        });
    }
    Ok(())
}

fn parse_status(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = link_index(net, tokens[0])?;
    let link = &mut net.links[index];
    match tokens[1].to_ascii_uppercase().as_str() {
        "OPEN" => {
            link.init_status = LinkStatus::Open;
            if link.pump().is_some() {
                link.init_setting = 1.0;
            }
            if let Some(valve) = link.valve_mut() {
                valve.has_fixed_status = true;
            }
        }
        "CLOSED" => {
            link.init_status = LinkStatus::Closed;
            if link.pump().is_some() {
                link.init_setting = 0.0;
            }
            if let Some(valve) = link.valve_mut() {
                valve.has_fixed_status = true;
            }
        }
        value => {
            let setting = parse_number(value)?;
            link.init_setting = setting;
            if link.pump().is_some() {
                link.init_status = if setting <= 0.0 {
                    LinkStatus::Closed
                } else {
                    LinkStatus::Open
                };
            }
        }
    }
    Ok(())
}

fn parse_leakage(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    if tokens[0].eq_ignore_ascii_case("GLOBAL") {
        net.options.leakage_coeff1 = parse_number(tokens[1])?;
        net.options.leakage_coeff2 = parse_number(tokens[2])?;
        return Ok(());
    }
    let index = link_index(net, tokens[0])?;
    let c1 = parse_number(tokens[1])?;
    let c2 = parse_number(tokens[2])?;
    if let Some(pipe) = net.links[index].pipe_mut() {
        pipe.leak_coeff1 = c1;
        pipe.leak_coeff2 = c2;
    }
    Ok(())
}

fn parse_energy(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    match tokens[0].to_ascii_uppercase().as_str() {
        "GLOBAL" => match tokens[1].to_ascii_uppercase().as_str() {
            "EFFIC" | "EFFICIENCY" => net.options.pump_efficiency = parse_number(tokens[2])?,
            "PRICE" => net.options.energy_price = parse_number(tokens[2])?,
            "PATTERN" => {
                let id = pattern_id(net, tokens[2])?;
                net.options.energy_price_pattern = Some(id.index());
                net.options.energy_price_pattern_name = tokens[2].to_string();
            }
            other => return Err(InputError::InvalidKeyword(other.to_string())),
        },
        "PUMP" => {
            if tokens.len() < 4 {
                return Err(InputError::TooFewItems);
            }
            let index = link_index(net, tokens[1])?;
            let keyword = tokens[2].to_ascii_uppercase();
            let value = tokens[3];
            let (effic_curve, cost_pattern) = match keyword.as_str() {
                "EFFIC" | "EFFICIENCY" => (Some(curve_id(net, value)?), None),
                "PATTERN" => (None, Some(pattern_id(net, value)?)),
                "PRICE" => {
                    let price = parse_number(value)?;
                    if let Some(pump) = net.links[index].pump_mut() {
                        pump.cost_per_kwh = price;
                    }
                    return Ok(());
                }
                other => return Err(InputError::InvalidKeyword(other.to_string())),
            };
            if let Some(pump) = net.links[index].pump_mut() {
                if let Some(curve) = effic_curve {
                    pump.effic_curve = Some(curve);
                }
                if let Some(pattern) = cost_pattern {
                    pump.cost_pattern = Some(pattern);
                }
            }
        }
        "DEMAND" => {
            // DEMAND CHARGE value
            net.options.peaking_charge = parse_number(tokens[2])?;
        }
        other => return Err(InputError::InvalidKeyword(other.to_string())),
    }
    Ok(())
}

fn parse_quality(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let value = parse_number(tokens[1])?;
    if value < 0.0 {
        return Err(InputError::InvalidNumber(tokens[1].to_string()));
    }
    net.nodes[index].init_qual = value;
    Ok(())
}

fn parse_source(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let kind = SourceKind::from_keyword(tokens[1])
        .ok_or_else(|| InputError::InvalidKeyword(tokens[1].to_string()))?;
    let base = parse_number(tokens[2])?;
    let pattern = match tokens.get(3) {
        Some(&"*") | None => None,
        Some(name) => Some(pattern_id(net, name)?),
    };
    net.nodes[index].source = Some(QualSource::new(kind, base, pattern));
    Ok(())
}

fn parse_reaction(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    let first = tokens[0].to_ascii_uppercase();
    let second = tokens[1].to_ascii_uppercase();
    match first.as_str() {
        "ORDER" => {
            let value = parse_number(tokens[2])?;
            match second.as_str() {
                "BULK" => net.options.bulk_order = value,
                "WALL" => net.options.wall_order = value,
                "TANK" => net.options.tank_order = value,
                other => return Err(InputError::InvalidKeyword(other.to_string())),
            }
        }
        "GLOBAL" => {
            let value = parse_number(tokens[2])?;
            match second.as_str() {
                "BULK" => net.options.bulk_coeff = value,
                "WALL" => net.options.wall_coeff = value,
                other => return Err(InputError::InvalidKeyword(other.to_string())),
            }
        }
        "LIMITING" => {
            // LIMITING POTENTIAL value
            net.options.limiting_concen = parse_number(tokens[2])?;
        }
        "ROUGHNESS" => {
            // ROUGHNESS CORRELATION value
            net.options.roughness_factor = parse_number(tokens[2])?;
        }
        "BULK" | "WALL" => {
            let index = link_index(net, tokens[1])?;
            let value = parse_number(tokens[2])?;
            if let Some(pipe) = net.links[index].pipe_mut() {
                if first == "BULK" {
                    pipe.bulk_coeff = value;
                } else {
                    pipe.wall_coeff = value;
                }
            }
        }
        "TANK" => {
            let index = node_index(net, tokens[1])?;
            let value = parse_number(tokens[2])?;
            if let Some(tank) = net.nodes[index].tank_mut() {
                tank.bulk_coeff = value;
            }
        }
        other => return Err(InputError::InvalidKeyword(other.to_string())),
    }
    Ok(())
}

fn parse_mixing(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    let kind = MixingKind::from_keyword(tokens[1])
        .ok_or_else(|| InputError::InvalidKeyword(tokens[1].to_string()))?;
    let frac = match tokens.get(2) {
        Some(t) if kind == MixingKind::Mix2 => {
            let f = parse_number(t)?;
            if !(0.0..=1.0).contains(&f) {
                return Err(InputError::InvalidNumber(t.to_string()));
            }
            f
        }
        _ => 1.0,
    };
    if let Some(tank) = net.nodes[index].tank_mut() {
        tank.mixing_model = kind;
        tank.frac_mixed = frac;
    }
    Ok(())
}

fn yes_no(token: &str) -> Result<bool, InputError> {
    match token.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" => Ok(true),
        "NO" | "FALSE" | "OFF" => Ok(false),
        other => Err(InputError::InvalidKeyword(other.to_string())),
    }
}

fn parse_option(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let keyword = tokens[0].to_ascii_uppercase();
    let value = tokens[1];
    let upper = value.to_ascii_uppercase();

    match keyword.as_str() {
        "FLOW_UNITS" | "UNITS" => {
            net.options.flow_units = upper
                .parse::<FlowUnits>()
                .map_err(|_| InputError::InvalidKeyword(value.to_string()))?;
        }
        "PRESSURE_UNITS" | "PRESSURE" => {
            net.options.pressure_units = Some(
                upper
                    .parse::<PressureUnits>()
                    .map_err(|_| InputError::InvalidKeyword(value.to_string()))?,
            );
        }
        "HEADLOSS_MODEL" | "HEADLOSS" => {
            net.options.headloss_model = match upper.as_str() {
                "H-W" | "HW" => HeadLossKind::HazenWilliams,
                "D-W" | "DW" => HeadLossKind::DarcyWeisbach,
                "C-M" | "CM" => HeadLossKind::ChezyManning,
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        "DEMAND_MODEL" => {
            net.options.demand_model = match upper.as_str() {
                "FIXED" => DemandModelKind::Fixed,
                "CONSTRAINED" => DemandModelKind::Constrained,
                "POWER" => DemandModelKind::Power,
                "LOGISTIC" => DemandModelKind::Logistic,
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        "LEAKAGE_MODEL" => {
            net.options.leakage_model = match upper.as_str() {
                "NONE" => None,
                "POWER" => Some(LeakageModelKind::Power),
                "FAVAD" => Some(LeakageModelKind::Favad),
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        "STEP_SIZING" => {
            net.options.step_sizing = match upper.as_str() {
                "FULL" => StepSizing::Full,
                "RELAXATION" => StepSizing::Relaxation,
                "LINESEARCH" => StepSizing::LineSearch,
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        // only one hydraulic and one matrix solver exist; accept the names
        "HYDRAULIC_SOLVER" | "MATRIX_SOLVER" => {}
        "QUALITY_MODEL" | "QUALITY" => {
            net.options.qual_type = match upper.as_str() {
                "NONE" => QualType::NoQual,
                "AGE" => QualType::Age,
                "TRACE" => {
                    if let Some(node) = tokens.get(2) {
                        net.options.trace_node_name = node.to_string();
                    }
                    QualType::Trace
                }
                "CHEMICAL" => QualType::Chem,
                _ => {
                    // an unrecognized value names the chemical itself
                    net.options.qual_name = value.to_string();
                    QualType::Chem
                }
            };
        }
        "QUALITY_NAME" => net.options.qual_name = value.to_string(),
        "QUALITY_UNITS" => {
            net.options.qual_units = match upper.as_str() {
                "MG/L" | "MGL" => QualUnits::Mgl,
                "UG/L" | "UGL" => QualUnits::Ugl,
                "HRS" | "HOURS" => QualUnits::Hrs,
                "PERCENT" | "%" => QualUnits::Pcnt,
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        "TRACE_NODE" => net.options.trace_node_name = value.to_string(),
        "DEMAND_PATTERN" | "PATTERN" => {
            net.options.demand_pattern = Some(pattern_id(net, value)?.index());
            net.options.demand_pattern_name = value.to_string();
        }
        "DEMAND_MULTIPLIER" => net.options.demand_multiplier = parse_number(value)?,
        "MINIMUM_PRESSURE" => net.options.minimum_pressure = parse_number(value)?,
        "SERVICE_PRESSURE" => net.options.service_pressure = parse_number(value)?,
        "PRESSURE_EXPONENT" => net.options.pressure_exponent = parse_number(value)?,
        "EMITTER_EXPONENT" => net.options.emitter_exponent = parse_number(value)?,
        "SPECIFIC_GRAVITY" => net.options.spec_gravity = parse_number(value)?,
        "SPECIFIC_VISCOSITY" | "VISCOSITY" => net.options.kin_viscosity = parse_number(value)?,
        "SPECIFIC_DIFFUSIVITY" | "DIFFUSIVITY" => {
            net.options.molec_diffusivity = parse_number(value)?
        }
        "MAXIMUM_TRIALS" | "TRIALS" => {
            net.options.max_trials = parse_number(value)? as usize;
        }
        "RELATIVE_ACCURACY" | "ACCURACY" => net.options.relative_accuracy = parse_number(value)?,
        "HEAD_TOLERANCE" => net.options.head_tolerance = parse_number(value)?,
        "FLOW_TOLERANCE" => net.options.flow_tolerance = parse_number(value)?,
        "FLOW_CHANGE_LIMIT" => net.options.flow_change_limit = parse_number(value)?,
        "TIME_WEIGHT" => net.options.time_weight = parse_number(value)?,
        "QUALITY_TOLERANCE" | "TOLERANCE" => net.options.qual_tolerance = parse_number(value)?,
        "IF_UNBALANCED" | "UNBALANCED" => {
            net.options.if_unbalanced = match upper.as_str() {
                "STOP" => pf_network::IfUnbalanced::Stop,
                "CONTINUE" => pf_network::IfUnbalanced::Continue,
                _ => return Err(InputError::InvalidKeyword(value.to_string())),
            };
        }
        // legacy tuning knobs with no counterpart here
        "CHECKFREQ" | "MAXCHECK" | "DAMPLIMIT" | "SEGMENTS" => {}
        other => return Err(InputError::InvalidKeyword(other.to_string())),
    }
    Ok(())
}

fn parse_time_option(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    // keywords may be one token (DURATION) or two (REPORT START)
    let mut keyword = tokens[0].to_ascii_uppercase();
    let mut value_index = 1;
    if tokens.len() > 2 && tokens[1].parse::<f64>().is_err() && !tokens[1].contains(':') {
        keyword = format!("{}_{}", keyword, tokens[1].to_ascii_uppercase());
        value_index = 2;
    }
    if keyword == "STATISTIC" {
        return Ok(());
    }

    let seconds = parse_time(tokens, value_index)?;
    match keyword.as_str() {
        "DURATION" | "TOTAL_DURATION" => net.options.total_duration = seconds,
        "HYDRAULIC_TIMESTEP" => net.options.hyd_step = seconds,
        "QUALITY_TIMESTEP" => net.options.qual_step = seconds,
        "PATTERN_TIMESTEP" => net.options.pattern_step = seconds,
        "PATTERN_START" => net.options.pattern_start = seconds,
        "REPORT_TIMESTEP" => net.options.report_step = seconds,
        "REPORT_START" => net.options.report_start = seconds,
        "START_CLOCKTIME" => net.options.start_time = seconds,
        "RULE_TIMESTEP" => net.options.rule_step = seconds,
        other => return Err(InputError::InvalidKeyword(other.to_string())),
    }
    Ok(())
}

fn parse_report_option(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 2 {
        return Err(InputError::TooFewItems);
    }
    let keyword = tokens[0].to_ascii_uppercase();
    let value = tokens[1];
    match keyword.as_str() {
        "SUMMARY" => net.options.report_summary = yes_no(value)?,
        "ENERGY" => net.options.report_energy = yes_no(value)?,
        "STATUS" => net.options.report_status = yes_no(value)?,
        "TRIALS" => net.options.report_trials = yes_no(value)?,
        "NODES" => {
            net.options.report_nodes = if value.eq_ignore_ascii_case("ALL") {
                ReportedItems::All
            } else {
                ReportedItems::None
            };
        }
        "LINKS" => {
            net.options.report_links = if value.eq_ignore_ascii_case("ALL") {
                ReportedItems::All
            } else {
                ReportedItems::None
            };
        }
        // page layout options are accepted and ignored
        "PAGESIZE" | "PAGE" | "FILE" | "PRECISION" => {}
        other => return Err(InputError::InvalidKeyword(other.to_string())),
    }
    Ok(())
}

fn parse_coordinates(net: &mut Network, tokens: &[&str]) -> Result<(), InputError> {
    if tokens.len() < 3 {
        return Err(InputError::TooFewItems);
    }
    let index = node_index(net, tokens[0])?;
    net.nodes[index].x_coord = parse_number(tokens[1])?;
    net.nodes[index].y_coord = parse_number(tokens[2])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::InputReader;

    const SMALL_NET: &str = "
[TITLE]
Small test network

[JUNCTIONS]
J1   100   5.0   DayPat
J2   95

[RESERVOIRS]
R1   200

[TANKS]
T1   120   15   5   25   40   0

[PIPES]
P1   R1   J1   1000   12   100   0
P2   J1   J2   2000   10   100   0.5
P3   J2   T1   1500   12   100   0   CV

[PUMPS]
;; no pumps

[PATTERNS]
DayPat   1.0   1.2   0.8

[CONTROLS]
LINK P2 CLOSED IF NODE T1 ABOVE 24
LINK P2 OPEN AT TIME 6

[QUALITY]
R1   1.0

[MIXING]
T1   2COMP   0.35

[OPTIONS]
FLOW_UNITS   GPM
HEADLOSS_MODEL   H-W
QUALITY_MODEL   CHEMICAL

[TIMES]
DURATION   24
HYDRAULIC_TIMESTEP   1:00
REPORT_START   2

[END]
";

    fn load(text: &str) -> Network {
        let mut net = Network::new();
        InputReader::new().read(text, &mut net).unwrap();
        net
    }

    #[test]
    fn two_pass_parse_builds_the_network() {
        let net = load(SMALL_NET);
        assert_eq!(net.nodes.len(), 4);
        assert_eq!(net.links.len(), 3);
        assert_eq!(net.patterns.len(), 1);
        assert_eq!(net.controls.len(), 2);
        assert_eq!(net.title.len(), 1);

        // forward reference from J1's demand pattern resolved
        let junc = net.nodes[net.node_index("J1").unwrap()]
            .junction()
            .unwrap();
        assert!(junc.primary_demand.time_pattern.is_some());
        assert_eq!(junc.primary_demand.base_demand, 5.0);

        // check valve flag carried from the trailing keyword
        let p3 = &net.links[net.link_index("P3").unwrap()];
        assert!(p3.pipe().unwrap().has_check_valve);

        // tank levels are depths above the bottom elevation
        let tank = net.nodes[net.node_index("T1").unwrap()].tank().unwrap();
        assert_eq!(tank.min_head, 125.0);
        assert_eq!(tank.max_head, 145.0);
        assert_eq!(tank.mixing_model, MixingKind::Mix2);
        assert!((tank.frac_mixed - 0.35).abs() < 1e-12);

        assert_eq!(net.options.total_duration, 24 * 3600);
        assert_eq!(net.options.hyd_step, 3600);
        assert_eq!(net.options.report_start, 7200);
        assert_eq!(net.options.qual_type, QualType::Chem);
    }

    #[test]
    fn controls_parse_both_forms() {
        let net = load(SMALL_NET);
        assert_eq!(net.controls[0].kind, ControlKind::TankLevel);
        assert_eq!(net.controls[0].level_kind, LevelKind::High);
        assert_eq!(net.controls[1].kind, ControlKind::ElapsedTime);
        assert_eq!(net.controls[1].time, 6 * 3600);
    }

    #[test]
    fn duplicate_ids_fail_the_parse() {
        let text = "
[JUNCTIONS]
J1  100
J1  200
";
        let mut net = Network::new();
        assert!(InputReader::new().read(text, &mut net).is_err());
        assert!(!net.msg_log.is_empty());
    }

    #[test]
    fn bad_numbers_are_reported_per_line() {
        let text = "
[JUNCTIONS]
J1  not-a-number
";
        let mut net = Network::new();
        assert!(InputReader::new().read(text, &mut net).is_err());
        assert!(net
            .msg_log
            .lines()
            .iter()
            .any(|l| l.contains("invalid number")));
    }

    #[test]
    fn undefined_references_are_caught() {
        let text = "
[JUNCTIONS]
J1  100  1.0  GhostPattern
";
        let mut net = Network::new();
        assert!(InputReader::new().read(text, &mut net).is_err());
        assert!(net
            .msg_log
            .lines()
            .iter()
            .any(|l| l.contains("undefined object")));
    }
}
