//! Network nodes: a shared computed-state header plus a tagged variant for
//! junctions, reservoirs, and tanks.

use crate::junction::Junction;
use crate::source::QualSource;
use crate::tank::Tank;
use pf_core::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Junction,
    Tank,
    Reservoir,
}

impl NodeType {
    pub fn label(self) -> &'static str {
        match self {
            NodeType::Junction => "Junction",
            NodeType::Tank => "Tank",
            NodeType::Reservoir => "Reservoir",
        }
    }
}

/// A reservoir is an infinite source at a fixed (possibly pattern-scaled)
/// head; its elevation doubles as that head.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reservoir {
    pub head_pattern: Option<PatternId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Junction(Junction),
    Reservoir(Reservoir),
    Tank(Tank),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub rpt_flag: bool,
    /// elevation (ft); the fixed water surface elevation for reservoirs
    pub elev: f64,
    pub x_coord: f64,
    pub y_coord: f64,
    /// initial water quality concentration (mass/ft3)
    pub init_qual: f64,
    pub source: Option<QualSource>,

    // computed state
    pub fixed_grade: bool,
    /// hydraulic head (ft)
    pub head: f64,
    /// gradient of outflow with respect to head (cfs/ft)
    pub q_grad: f64,
    /// full demand required (cfs)
    pub full_demand: f64,
    /// actual demand delivered (cfs)
    pub actual_demand: f64,
    /// demand + emitter + leakage flow (cfs); net inflow for tanks/reservoirs
    pub outflow: f64,
    /// water quality concentration (mass/ft3)
    pub quality: f64,

    pub kind: NodeKind,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let fixed_grade = !matches!(kind, NodeKind::Junction(_));
        Self {
            name: name.into(),
            rpt_flag: false,
            elev: 0.0,
            x_coord: 0.0,
            y_coord: 0.0,
            init_qual: 0.0,
            source: None,
            fixed_grade,
            head: 0.0,
            q_grad: 0.0,
            full_demand: 0.0,
            actual_demand: 0.0,
            outflow: 0.0,
            quality: 0.0,
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Junction(_) => NodeType::Junction,
            NodeKind::Reservoir(_) => NodeType::Reservoir,
            NodeKind::Tank(_) => NodeType::Tank,
        }
    }

    pub fn junction(&self) -> Option<&Junction> {
        match &self.kind {
            NodeKind::Junction(j) => Some(j),
            _ => None,
        }
    }

    pub fn junction_mut(&mut self) -> Option<&mut Junction> {
        match &mut self.kind {
            NodeKind::Junction(j) => Some(j),
            _ => None,
        }
    }

    pub fn tank(&self) -> Option<&Tank> {
        match &self.kind {
            NodeKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    pub fn tank_mut(&mut self) -> Option<&mut Tank> {
        match &mut self.kind {
            NodeKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    /// Whether quality reactions can occur at this node.
    pub fn is_reactive(&self) -> bool {
        match &self.kind {
            NodeKind::Tank(t) => t.bulk_coeff != 0.0,
            _ => false,
        }
    }

    /// Flow `flow` leaving this node is refused by a level-locked tank.
    pub fn is_closed(&self, flow: f64) -> bool {
        match &self.kind {
            NodeKind::Tank(t) => t.is_closed(self.fixed_grade, self.head, flow),
            _ => false,
        }
    }

    /// Stored water volume (tanks only).
    pub fn volume(&self) -> f64 {
        match &self.kind {
            NodeKind::Tank(t) => t.volume,
            _ => 0.0,
        }
    }
}
