//! Water quality sources attached to nodes.

use pf_core::constants::FT3_PER_L;
use pf_core::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Blends source strength into external inflow at the node.
    Concen,
    /// Adds a fixed mass rate to the node's outflow.
    Mass,
    /// Raises outflow quality to a setpoint when below it.
    Setpoint,
    /// Adds a fixed concentration to the outflow quality.
    FlowPaced,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Concen => "CONCEN",
            SourceKind::Mass => "MASS",
            SourceKind::Setpoint => "SETPOINT",
            SourceKind::FlowPaced => "FLOWPACED",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONCEN" => Some(SourceKind::Concen),
            "MASS" => Some(SourceKind::Mass),
            "SETPOINT" => Some(SourceKind::Setpoint),
            "FLOWPACED" => Some(SourceKind::FlowPaced),
            _ => None,
        }
    }
}

/// A constituent source at a node. `strength`, `outflow` and `quality` are
/// staged by the quality engine each step.
#[derive(Debug, Clone, Copy)]
pub struct QualSource {
    pub kind: SourceKind,
    /// baseline strength in user units (mass/L, or mass/min for MASS)
    pub base: f64,
    pub pattern: Option<PatternId>,
    /// current pattern-adjusted strength in internal units
    pub strength: f64,
    /// flow leaving the node into the network (cfs)
    pub outflow: f64,
    /// most recent source-amended outflow quality (mass/ft3)
    pub quality: f64,
}

impl QualSource {
    pub fn new(kind: SourceKind, base: f64, pattern: Option<PatternId>) -> Self {
        Self {
            kind,
            base,
            pattern,
            strength: 0.0,
            outflow: 0.0,
            quality: 0.0,
        }
    }

    /// Refresh `strength` from the base value and a pattern factor,
    /// converting user units to internal ones.
    pub fn set_strength(&mut self, pattern_factor: f64) {
        let mut strength = self.base * pattern_factor;
        if self.kind == SourceKind::Mass {
            strength *= 60.0; // mass/min -> mass/sec
        } else {
            strength /= FT3_PER_L; // mass/L -> mass/ft3
        }
        self.strength = strength;
    }
}
