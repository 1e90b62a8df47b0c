//! Demand categories attached to junctions.

use pf_core::PatternId;

/// One (base demand, time pattern) pair. A junction's full demand is the
/// sum over its categories, scaled by the global multiplier and the global
/// demand pattern factor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Demand {
    /// base demand flow (cfs after unit conversion)
    pub base_demand: f64,
    /// pattern-adjusted demand from the last update (cfs)
    pub full_demand: f64,
    pub time_pattern: Option<PatternId>,
}

impl Demand {
    /// Pattern-adjusted demand. A category with its own pattern overrides
    /// the global demand pattern factor.
    pub fn full_demand(&mut self, multiplier: f64, pattern_factor: f64, own_factor: Option<f64>) -> f64 {
        let factor = own_factor.unwrap_or(pattern_factor);
        self.full_demand = multiplier * self.base_demand * factor;
        self.full_demand
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pattern_overrides_global_factor() {
        let mut d = Demand {
            base_demand: 2.0,
            ..Default::default()
        };
        assert_eq!(d.full_demand(1.5, 2.0, None), 6.0);
        assert_eq!(d.full_demand(1.5, 2.0, Some(0.5)), 1.5);
    }
}
