//! The network: every element of the system being analyzed, stored in
//! insertion order with name-to-index tables alongside.

use std::collections::HashMap;

use crate::control::Control;
use crate::curve::Curve;
use crate::link::{Link, LinkKind};
use crate::msglog::MsgLog;
use crate::node::{Node, NodeKind};
use crate::options::{DemandModelKind, LeakageModelKind, Options, QualType};
use crate::pattern::Pattern;
use crate::valve::ValveKind;
use pf_core::constants::{FT3_PER_L, MISSING, M_PER_FT, PSI_PER_FT};
use pf_core::error::InputError;
use pf_core::{PressureUnits, Quantity, UnitSystem, Units};
use pf_models::headloss::HeadLossModel;
use pf_models::reaction::ChemicalReaction;
use pf_models::{DemandModel, LeakageModel, ReactionModel};

const MIN_VALVE_LOSS_COEFF: f64 = 0.1;

#[derive(Debug, Default)]
pub struct Network {
    pub title: Vec<String>,

    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub patterns: Vec<Pattern>,
    pub curves: Vec<Curve>,
    pub controls: Vec<Control>,

    pub options: Options,
    pub units: Units,
    pub msg_log: MsgLog,

    // computational sub-models, created when the engines open
    pub headloss_model: HeadLossModel,
    pub demand_model: DemandModel,
    pub leakage_model: Option<LeakageModel>,
    pub reaction_model: Option<ReactionModel>,

    node_table: HashMap<String, usize>,
    link_table: HashMap<String, usize>,
    pattern_table: HashMap<String, usize>,
    curve_table: HashMap<String, usize>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn pump_count(&self) -> usize {
        self.links
            .iter()
            .filter(|link| matches!(link.kind, LinkKind::Pump(_)))
            .count()
    }

    pub fn add_title_line(&mut self, line: impl Into<String>) {
        self.title.push(line.into());
    }

    /// Add a node, rejecting duplicate IDs.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> Result<usize, InputError> {
        if self.node_table.contains_key(name) {
            return Err(InputError::DuplicateId(name.to_string()));
        }
        let index = self.nodes.len();
        self.nodes.push(Node::new(name, kind));
        self.node_table.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn add_link(
        &mut self,
        name: &str,
        from_node: usize,
        to_node: usize,
        kind: LinkKind,
    ) -> Result<usize, InputError> {
        if self.link_table.contains_key(name) {
            return Err(InputError::DuplicateId(name.to_string()));
        }
        let index = self.links.len();
        self.links.push(Link::new(name, from_node, to_node, kind));
        self.link_table.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn add_pattern(&mut self, pattern: Pattern) -> Result<usize, InputError> {
        if self.pattern_table.contains_key(&pattern.name) {
            return Err(InputError::DuplicateId(pattern.name.clone()));
        }
        let index = self.patterns.len();
        self.pattern_table.insert(pattern.name.clone(), index);
        self.patterns.push(pattern);
        Ok(index)
    }

    pub fn add_curve(&mut self, curve: Curve) -> Result<usize, InputError> {
        if self.curve_table.contains_key(&curve.name) {
            return Err(InputError::DuplicateId(curve.name.clone()));
        }
        let index = self.curves.len();
        self.curve_table.insert(curve.name.clone(), index);
        self.curves.push(curve);
        Ok(index)
    }

    pub fn add_control(&mut self, control: Control) -> usize {
        let index = self.controls.len();
        self.controls.push(control);
        index
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.node_table.get(name).copied()
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.link_table.get(name).copied()
    }

    pub fn pattern_index(&self, name: &str) -> Option<usize> {
        self.pattern_table.get(name).copied()
    }

    pub fn curve_index(&self, name: &str) -> Option<usize> {
        self.curve_table.get(name).copied()
    }

    /// Unit conversion factor (user units per internal unit).
    pub fn ucf(&self, quantity: Quantity) -> f64 {
        self.units.factor(quantity)
    }

    /// Create the computational sub-models the options call for.
    pub fn create_models(&mut self) {
        self.headloss_model =
            HeadLossModel::new(self.options.headloss_model, self.options.kin_viscosity);

        self.demand_model = match self.options.demand_model {
            DemandModelKind::Fixed => DemandModel::Fixed,
            DemandModelKind::Constrained => DemandModel::Constrained,
            DemandModelKind::Power => DemandModel::Power {
                expon: self.options.pressure_exponent,
            },
            DemandModelKind::Logistic => DemandModel::Logistic,
        };

        let ucf_length = self.ucf(Quantity::Length);
        self.leakage_model = self.options.leakage_model.map(|kind| match kind {
            LeakageModelKind::Power => LeakageModel::Power {
                ucf_length,
                ucf_flow: self.ucf(Quantity::Flow),
                ucf_pressure: if ucf_length == 1.0 { PSI_PER_FT } else { M_PER_FT },
            },
            LeakageModelKind::Favad => LeakageModel::Favad { ucf_length },
        });

        self.reaction_model = match self.options.qual_type {
            QualType::NoQual => None,
            QualType::Age => Some(ReactionModel::Age),
            QualType::Trace => Some(ReactionModel::Trace {
                node: self.options.trace_node.unwrap_or(0),
            }),
            QualType::Chem => Some(ReactionModel::Chemical(ChemicalReaction {
                diffusivity: self.options.molec_diffusivity,
                viscosity: self.options.kin_viscosity,
                pipe_order: self.options.bulk_order,
                tank_order: self.options.tank_order,
                wall_order: self.options.wall_order,
                c_limit: self.options.limiting_concen / FT3_PER_L,
            })),
        };
    }

    /// Whether any pipe or tank carries a nonzero reaction coefficient.
    pub fn has_reactive_elements(&self) -> bool {
        self.links.iter().any(|link| link.is_reactive())
            || self.nodes.iter().any(|node| node.is_reactive())
    }

    /// Convert every element's properties from user units to internal ones.
    /// Called once after the input file has been parsed.
    pub fn convert_units(&mut self) {
        // flow units pick the unit system; pressure units default from it
        let system = self.options.flow_units.system();
        let pressure = self.options.pressure_units.unwrap_or(match system {
            UnitSystem::US => PressureUnits::Psi,
            UnitSystem::SI => PressureUnits::Meters,
        });
        self.options.unit_system = self.units.set_units(self.options.flow_units, pressure);
        self.options.pressure_units = Some(pressure);

        let ucf_length = self.ucf(Quantity::Length);
        let ucf_diam = self.ucf(Quantity::Diameter);
        let ucf_flow = self.ucf(Quantity::Flow);
        let ucf_pressure = self.ucf(Quantity::Pressure);
        let ucf_concen = self.ucf(Quantity::Concen);
        let ucf_volume = self.ucf(Quantity::Volume);
        let ucf_power = self.ucf(Quantity::Power);

        for node in &mut self.nodes {
            node.elev /= ucf_length;
            node.init_qual /= ucf_concen;
            match &mut node.kind {
                NodeKind::Junction(junc) => {
                    // fold the primary demand into the category list
                    if junc.demands.is_empty() {
                        junc.demands.push(junc.primary_demand);
                    }
                    for demand in &mut junc.demands {
                        demand.base_demand /= ucf_flow;
                    }
                    if let Some(emitter) = &mut junc.emitter {
                        emitter.convert_units(&self.units);
                    }
                    if junc.p_min == MISSING {
                        junc.p_min = self.options.minimum_pressure;
                    }
                    if junc.p_full == MISSING {
                        junc.p_full = self.options.service_pressure;
                    }
                    junc.p_min /= ucf_pressure;
                    junc.p_full /= ucf_pressure;
                }
                NodeKind::Reservoir(_) => {}
                NodeKind::Tank(tank) => {
                    tank.ucf_length = ucf_length;
                    tank.init_head /= ucf_length;
                    tank.min_head /= ucf_length;
                    tank.max_head /= ucf_length;
                    tank.diameter /= ucf_length;
                    tank.area = std::f64::consts::PI * tank.diameter * tank.diameter / 4.0;
                    tank.min_volume /= ucf_volume;
                    if tank.bulk_coeff == MISSING {
                        tank.bulk_coeff = self.options.bulk_coeff;
                    }
                }
            }
        }

        for link in &mut self.links {
            match &mut link.kind {
                LinkKind::Pipe(pipe) => {
                    link.diameter /= ucf_diam;
                    pipe.length /= ucf_length;
                    pipe.loss_factor = 0.02517 * link.loss_coeff / link.diameter.powi(4);
                    if self.options.headloss_model
                        == pf_models::headloss::HeadLossKind::DarcyWeisbach
                    {
                        // D-W roughness arrives in millifeet or millimeters
                        pipe.roughness = pipe.roughness / ucf_length / 1000.0;
                    }
                    if pipe.leak_coeff1 == MISSING {
                        pipe.leak_coeff1 = self.options.leakage_coeff1;
                    }
                    if pipe.leak_coeff2 == MISSING {
                        pipe.leak_coeff2 = self.options.leakage_coeff2;
                    }
                    if pipe.bulk_coeff == MISSING {
                        pipe.bulk_coeff = self.options.bulk_coeff;
                    }
                    if pipe.wall_coeff == MISSING {
                        pipe.wall_coeff = self.options.wall_coeff;
                    }
                }
                LinkKind::Pump(pump) => {
                    pump.curve.horsepower /= ucf_power;
                }
                LinkKind::Valve(valve) => {
                    link.diameter /= ucf_diam;
                    let c = link.loss_coeff.max(MIN_VALVE_LOSS_COEFF);
                    valve.loss_factor = 0.02517 * c / link.diameter.powi(4);
                    valve.elev = match valve.kind {
                        ValveKind::Prv => self.nodes[link.to_node].elev,
                        ValveKind::Psv => self.nodes[link.from_node].elev,
                        _ => 0.0,
                    };
                    link.init_setting = match valve.kind {
                        ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => {
                            link.init_setting / ucf_pressure
                        }
                        ValveKind::Fcv => link.init_setting / ucf_flow,
                        _ => link.init_setting,
                    };
                }
            }
        }

        let nodes = &self.nodes;
        let links = &self.links;
        for control in &mut self.controls {
            match control.kind {
                crate::control::ControlKind::TankLevel => {
                    let node = &nodes[control.node.expect("tank control has a node")];
                    control.head = control.head / ucf_length + node.elev;
                    if let Some(tank) = node.tank() {
                        control.volume = tank.find_volume(node.elev, control.head, &self.curves);
                    }
                }
                crate::control::ControlKind::PressureLevel => {
                    let node = &nodes[control.node.expect("pressure control has a node")];
                    control.head = control.head / ucf_pressure + node.elev;
                }
                _ => {}
            }
            if let crate::control::ControlAction::Setting(value) = control.action {
                let link = &links[control.link];
                if let Some(valve) = link.valve() {
                    let converted = match valve.kind {
                        ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => value / ucf_pressure,
                        ValveKind::Fcv => value / ucf_flow,
                        _ => value,
                    };
                    control.action = crate::control::ControlAction::Setting(converted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junction::Junction;
    use crate::node::Reservoir;
    use crate::pipe::Pipe;
    use pf_core::FlowUnits;

    fn two_node_net() -> Network {
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
    fn duplicate_ids_are_rejected() {
        let mut net = two_node_net();
        assert!(matches!(
            net.add_node("J1", NodeKind::Junction(Junction::default())),
            Err(InputError::DuplicateId(_))
        ));
        assert!(matches!(
            net.add_link("P1", 0, 1, LinkKind::Pipe(Pipe::default())),
            Err(InputError::DuplicateId(_))
        ));
    }

    #[test]
    fn name_lookup_matches_insertion_order() {
        let net = two_node_net();
        assert_eq!(net.node_index("R1"), Some(0));
        assert_eq!(net.node_index("J1"), Some(1));
        assert_eq!(net.node_index("nope"), None);
        assert_eq!(net.link_index("P1"), Some(0));
    }

    #[test]
    fn convert_units_scales_junction_and_pipe_data() {
        let mut net = two_node_net();
        net.options.flow_units = FlowUnits::GPM;
        {
            let node = &mut net.nodes[1];
            node.elev = 100.0; // ft already in US units
            let junc = node.junction_mut().unwrap();
            junc.primary_demand.base_demand = 448.831; // gpm -> 1 cfs
        }
        {
            let link = &mut net.links[0];
            link.diameter = 12.0; // inches -> 1 ft
            link.pipe_mut().unwrap().length = 1000.0;
        }
        net.convert_units();

        assert_eq!(net.options.unit_system, UnitSystem::US);
        let junc = net.nodes[1].junction().unwrap();
        assert!((junc.demands[0].base_demand - 1.0).abs() < 1e-6);
        assert!((net.links[0].diameter - 1.0).abs() < 1e-12);
    }

    #[test]
    fn si_flow_units_select_metric_pressure() {
        let mut net = two_node_net();
        net.options.flow_units = FlowUnits::LPS;
        net.convert_units();
        assert_eq!(net.options.pressure_units, Some(PressureUnits::Meters));
        assert_eq!(net.options.unit_system, UnitSystem::SI);
    }
}
