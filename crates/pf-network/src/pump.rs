//! Pump links.

use crate::pumpcurve::PumpCurve;
use pf_core::PatternId;
use pf_core::{CurveId, Id};
use pf_models::PumpEnergy;

#[derive(Debug, Clone, Copy)]
pub struct Pump {
    pub curve: PumpCurve,
    /// relative speed setting (1 = nominal)
    pub speed: f64,
    pub speed_pattern: Option<PatternId>,
    pub effic_curve: Option<CurveId>,
    /// energy price for this pump (overrides the global price when > 0)
    pub cost_per_kwh: f64,
    pub cost_pattern: Option<Id>,
    pub energy: PumpEnergy,
}

impl Default for Pump {
    fn default() -> Self {
        Self {
            curve: PumpCurve::default(),
            speed: 1.0,
            speed_pattern: None,
            effic_curve: None,
            cost_per_kwh: 0.0,
            cost_pattern: None,
            energy: PumpEnergy::default(),
        }
    }
}
