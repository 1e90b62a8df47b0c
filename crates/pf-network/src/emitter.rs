//! Emitters: pressure-driven orifice outflows at junctions, q = C * h^gamma.

use pf_core::{PatternId, Quantity, Units};

#[derive(Debug, Clone, Copy)]
pub struct Emitter {
    /// flow coefficient (cfs per ft^expon after conversion)
    pub flow_coeff: f64,
    /// discharge exponent
    pub expon: f64,
    pub time_pattern: Option<PatternId>,
}

impl Emitter {
    /// Convert the flow coefficient from user flow units per user pressure
    /// unit raised to the exponent, into cfs per ft of head.
    pub fn convert_units(&mut self, units: &Units) {
        let q_ucf = units.factor(Quantity::Flow);
        let p_ucf = units.factor(Quantity::Pressure);
        self.flow_coeff *= p_ucf.powf(self.expon) / q_ucf;
    }

    /// Outflow (cfs) at pressure head `h` (ft) and its gradient, with the
    /// coefficient scaled by `pattern_factor`.
    pub fn find_flow_rate(&self, h: f64, pattern_factor: f64) -> (f64, f64) {
        if h <= 0.0 {
            return (0.0, 0.0);
        }
        let a = self.flow_coeff * pattern_factor;
        let q = a * h.powf(self.expon);
        (q, self.expon * q / h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flow_at_non_positive_pressure() {
        let e = Emitter {
            flow_coeff: 1.0,
            expon: 0.5,
            time_pattern: None,
        };
        assert_eq!(e.find_flow_rate(0.0, 1.0), (0.0, 0.0));
        assert_eq!(e.find_flow_rate(-10.0, 1.0), (0.0, 0.0));
    }

    #[test]
    fn gradient_matches_power_law() {
        let e = Emitter {
            flow_coeff: 2.0,
            expon: 0.5,
            time_pattern: None,
        };
        let h = 16.0;
        let (q, dqdh) = e.find_flow_rate(h, 1.0);
        assert_eq!(q, 8.0);
        assert!((dqdh - 0.5 * q / h).abs() < 1e-12);
    }
}
