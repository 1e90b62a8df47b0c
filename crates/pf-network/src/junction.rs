//! Junction nodes: demand-carrying connection points.

use crate::demand::Demand;
use crate::emitter::Emitter;
use pf_core::constants::MISSING;

#[derive(Debug, Clone)]
pub struct Junction {
    /// demand read off the junction's own input line
    pub primary_demand: Demand,
    /// all demand categories (the primary one included after conversion)
    pub demands: Vec<Demand>,
    pub emitter: Option<Emitter>,
    /// pressure head below which demand is zero (ft)
    pub p_min: f64,
    /// pressure head needed to supply full demand (ft)
    pub p_full: f64,
}

impl Default for Junction {
    fn default() -> Self {
        Self {
            primary_demand: Demand::default(),
            demands: Vec::new(),
            emitter: None,
            p_min: MISSING,
            p_full: MISSING,
        }
    }
}

impl Junction {
    /// Sum of pattern-adjusted category demands.
    pub fn find_full_demand(
        &mut self,
        multiplier: f64,
        pattern_factor: f64,
        category_factors: &[Option<f64>],
    ) -> f64 {
        let mut total = 0.0;
        for (demand, own) in self.demands.iter_mut().zip(category_factors) {
            total += demand.full_demand(multiplier, pattern_factor, *own);
        }
        total
    }
}
