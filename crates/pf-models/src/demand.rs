//! Nodal demand models.
//!
//! A demand model maps a junction's pressure head to the demand actually
//! delivered and the gradient of that demand with respect to head.

/// Demand state of a junction as seen by a demand model.
#[derive(Debug, Clone, Copy, Default)]
pub struct JunctionDemand {
    /// demand requested at full service pressure (cfs)
    pub full_demand: f64,
    /// demand currently being delivered (cfs)
    pub actual_demand: f64,
    /// pressure head below which no demand is served (ft)
    pub p_min: f64,
    /// pressure head at and above which full demand is served (ft)
    pub p_full: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DemandModel {
    /// Demand is always met in full regardless of pressure.
    #[default]
    Fixed,
    /// Full demand, but deficient junctions are pinned and re-solved with
    /// reduced demands by the hydraulic engine.
    Constrained,
    /// Delivered fraction is ((p - pMin)/(pFull - pMin))^expon.
    Power { expon: f64 },
    /// Delivered fraction follows a logistic curve calibrated to deliver
    /// ~1% of demand at pMin and ~99.9% at pFull.
    Logistic,
}

impl DemandModel {
    /// Demand delivered at pressure head `p` and its gradient w.r.t. head.
    pub fn find_demand(&self, junc: &JunctionDemand, p: f64) -> (f64, f64) {
        match *self {
            DemandModel::Fixed => (junc.full_demand, 0.0),
            DemandModel::Constrained => (junc.actual_demand, 0.0),
            DemandModel::Power { expon } => power_demand(junc, p, expon),
            DemandModel::Logistic => logistic_demand(junc, p),
        }
    }

    /// Whether this model subjects junctions to the pressure-deficiency
    /// pin-and-re-solve treatment.
    pub fn is_constrained(&self) -> bool {
        matches!(self, DemandModel::Constrained)
    }
}

fn power_demand(junc: &JunctionDemand, p: f64, expon: f64) -> (f64, f64) {
    let q_full = junc.full_demand;
    let p_range = junc.p_full - junc.p_min;
    if q_full <= 0.0 || p_range <= 0.0 {
        return (q_full, 0.0);
    }

    let f = (p - junc.p_min) / p_range;
    if f <= 0.0 {
        (0.0, 0.0)
    } else if f >= 1.0 {
        (q_full, 0.0)
    } else {
        let factor = f.powf(expon);
        let dqdh = q_full * expon / p_range * factor / f;
        (q_full * factor, dqdh)
    }
}

fn logistic_demand(junc: &JunctionDemand, p: f64) -> (f64, f64) {
    let q_full = junc.full_demand;
    if q_full <= 0.0 || junc.p_full <= junc.p_min {
        return (q_full, 0.0);
    }

    // coefficients giving 1% of demand at pMin and 99.9% at pFull
    let p_range = junc.p_full - junc.p_min;
    let a = (-4.595 * junc.p_full - 6.907 * junc.p_min) / p_range;
    let b = 11.502 / p_range;

    // clamp the exponential argument against overflow
    let arg = (a + b * p).clamp(-100.0, 100.0);
    let e = arg.exp();
    let f = (e / (1.0 + e)).clamp(0.0, 1.0);
    let dfdh = b * f * (1.0 - f);
    (q_full * f, q_full * dfdh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junc() -> JunctionDemand {
        JunctionDemand {
            full_demand: 2.0,
            actual_demand: 1.5,
            p_min: 10.0,
            p_full: 40.0,
        }
    }

    #[test]
    fn fixed_ignores_pressure() {
        let j = junc();
        assert_eq!(DemandModel::Fixed.find_demand(&j, -50.0), (2.0, 0.0));
    }

    #[test]
    fn constrained_reports_actual() {
        let j = junc();
        assert_eq!(DemandModel::Constrained.find_demand(&j, 5.0), (1.5, 0.0));
        assert!(DemandModel::Constrained.is_constrained());
    }

    #[test]
    fn power_clamps_to_pressure_range() {
        let j = junc();
        let m = DemandModel::Power { expon: 0.5 };
        assert_eq!(m.find_demand(&j, 0.0), (0.0, 0.0));
        assert_eq!(m.find_demand(&j, 100.0), (2.0, 0.0));

        let (q, dqdh) = m.find_demand(&j, 25.0);
        assert!((q - 2.0 * (0.5f64).sqrt()).abs() < 1e-12);
        assert!(dqdh > 0.0);
    }

    #[test]
    fn logistic_hits_calibration_points() {
        let j = junc();
        let m = DemandModel::Logistic;
        let (q_min, _) = m.find_demand(&j, j.p_min);
        let (q_full, _) = m.find_demand(&j, j.p_full);
        assert!((q_min / j.full_demand - 0.01).abs() < 0.005);
        assert!(q_full / j.full_demand > 0.99);
    }

    #[test]
    fn logistic_survives_extreme_pressures() {
        let j = junc();
        let (q_lo, _) = DemandModel::Logistic.find_demand(&j, -1.0e6);
        let (q_hi, _) = DemandModel::Logistic.find_demand(&j, 1.0e6);
        assert!(q_lo.is_finite() && q_lo >= 0.0);
        assert!((q_hi - j.full_demand).abs() < 1e-9);
    }
}
