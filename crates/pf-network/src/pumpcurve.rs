//! Pump head curves.
//!
//! Four flavors: constant horsepower, a power function fitted through one
//! or three points, or a general custom curve evaluated segment by segment.
//! All report the *head loss* across the pump (the negative of head gain)
//! and its gradient, in internal units.

use crate::curve::Curve;
use pf_core::error::NetworkError;
use pf_core::CurveId;

const BIG_NUMBER: f64 = 1.0e10;
const TINY_NUMBER: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpCurveKind {
    #[default]
    NoCurve,
    ConstHp,
    PowerFunc,
    Custom,
}

#[derive(Debug, Clone, Copy)]
pub struct PumpCurve {
    pub kind: PumpCurveKind,
    pub curve: Option<CurveId>,
    /// rated horsepower for constant-HP pumps (internal power units)
    pub horsepower: f64,
    /// initial flow estimate (cfs)
    pub q_init: f64,
    /// maximum deliverable flow (user units)
    pub q_max: f64,
    /// shutoff head (user units)
    pub h_max: f64,
    // fitted coefficients of head = h0 + r*q^n (user units)
    pub h0: f64,
    pub r: f64,
    pub n: f64,
    // unit conversion factors captured at setup
    pub q_ucf: f64,
    pub h_ucf: f64,
}

impl Default for PumpCurve {
    fn default() -> Self {
        Self {
            kind: PumpCurveKind::NoCurve,
            curve: None,
            horsepower: 0.0,
            q_init: 0.0,
            q_max: 0.0,
            h_max: 0.0,
            h0: 0.0,
            r: 0.0,
            n: 0.0,
            q_ucf: 1.0,
            h_ucf: 1.0,
        }
    }
}

impl PumpCurve {
    /// Extract curve parameters from the assigned data, returning the kind
    /// of error a network validation pass reports for a bad pump.
    pub fn setup(
        &mut self,
        name: &str,
        curves: &[Curve],
        q_ucf: f64,
        h_ucf: f64,
    ) -> Result<(), NetworkError> {
        self.q_ucf = q_ucf;
        self.h_ucf = h_ucf;

        if self.horsepower > 0.0 && self.curve.is_none() {
            self.setup_const_hp();
        } else if let Some(curve_id) = self.curve {
            let curve = &curves[curve_id.index()];
            if curve.size() == 1 || (curve.size() == 3 && curve.x(0) == 0.0) {
                self.setup_power_func(name, curve)?;
            } else {
                self.setup_custom(name, curve)?;
            }
        } else {
            return Err(NetworkError::NoPumpCurve(name.to_string()));
        }
        self.q_init /= self.q_ucf;
        Ok(())
    }

    /// Head loss (negative of pump head) and its gradient at relative speed
    /// `speed` and flow `flow`, in internal units.
    pub fn find_head_loss(&self, curves: &[Curve], speed: f64, flow: f64) -> (f64, f64) {
        let q = flow.abs();
        match self.kind {
            PumpCurveKind::Custom => self.custom_head_loss(curves, speed, q),
            PumpCurveKind::ConstHp => self.const_hp_head_loss(speed, flow),
            PumpCurveKind::PowerFunc => self.power_func_head_loss(speed, q),
            PumpCurveKind::NoCurve => (0.0, 0.0),
        }
    }

    pub fn is_const_hp(&self) -> bool {
        self.kind == PumpCurveKind::ConstHp
    }

    fn setup_const_hp(&mut self) {
        self.kind = PumpCurveKind::ConstHp;
        // head = h0 + r*q^n with r < 0
        self.h0 = 0.0;
        self.r = -8.814 * self.horsepower;
        self.n = -1.0;
        self.q_ucf = 1.0;
        self.h_ucf = 1.0;
        self.h_max = BIG_NUMBER;
        self.q_max = BIG_NUMBER;
        self.q_init = 1.0;
    }

    fn setup_power_func(&mut self, name: &str, curve: &Curve) -> Result<(), NetworkError> {
        let (q1, h1, q2, h2);
        if curve.size() == 1 {
            // single design point: extend to a 1.33x shutoff head and a
            // max flow of twice the design flow
            self.kind = PumpCurveKind::PowerFunc;
            q1 = curve.x(0);
            h1 = curve.y(0);
            self.h0 = 1.33334 * h1;
            q2 = 2.0 * q1;
            h2 = 0.0;
        } else {
            self.kind = PumpCurveKind::PowerFunc;
            self.h0 = curve.y(0);
            q1 = curve.x(1);
            h1 = curve.y(1);
            q2 = curve.x(2);
            h2 = curve.y(2);
        }

        // control points must describe a monotone decreasing head curve
        if self.h0 < TINY_NUMBER
            || self.h0 - h1 < TINY_NUMBER
            || h1 - h2 < TINY_NUMBER
            || q1 < TINY_NUMBER
            || q2 - q1 < TINY_NUMBER
        {
            return Err(NetworkError::InvalidPumpCurve(name.to_string()));
        }

        let h4 = self.h0 - h1;
        let h5 = self.h0 - h2;
        self.n = (h5 / h4).ln() / (q2 / q1).ln();
        if self.n <= 0.0 || self.n > 20.0 {
            return Err(NetworkError::InvalidPumpCurve(name.to_string()));
        }
        self.r = -h4 / q1.powf(self.n);
        if self.r >= 0.0 {
            return Err(NetworkError::InvalidPumpCurve(name.to_string()));
        }

        self.h_max = self.h0;
        self.q_max = (-self.h0 / self.r).powf(1.0 / self.n);
        self.q_init = q1;
        Ok(())
    }

    fn setup_custom(&mut self, name: &str, curve: &Curve) -> Result<(), NetworkError> {
        // head must decrease as flow increases
        for m in 1..curve.size() {
            if curve.y(m - 1) - curve.y(m) < TINY_NUMBER || curve.y(m) < 0.0 {
                return Err(NetworkError::InvalidPumpCurve(name.to_string()));
            }
        }

        // extrapolate to zero flow for the shutoff head
        let slope = (curve.y(0) - curve.y(1)) / (curve.x(1) - curve.x(0));
        self.h_max = curve.y(0) + slope * curve.x(0);

        // extrapolate to zero head for the max flow
        let k = curve.size() - 1;
        let slope = (curve.x(k) - curve.x(k - 1)) / (curve.y(k - 1) - curve.y(k));
        self.q_max = curve.x(k) + slope * curve.y(k);

        self.n = 1.0;
        self.q_init = (curve.x(0) + curve.x(k)) / 2.0;
        self.kind = PumpCurveKind::Custom;
        Ok(())
    }

    fn custom_head_loss(&self, curves: &[Curve], speed: f64, q: f64) -> (f64, f64) {
        let curve = &curves[self.curve.expect("custom pump has a curve").index()];
        let q_user = q * self.q_ucf;
        let (mut r, mut h0) = curve.find_segment(q_user);

        // affinity-law adjustment of the segment for pump speed
        h0 *= speed * speed;
        r *= speed;

        let head_loss = -(h0 + r * q_user) / self.h_ucf;
        let gradient = -r * self.q_ucf / self.h_ucf;
        (head_loss, gradient)
    }

    fn const_hp_head_loss(&self, speed: f64, flow: f64) -> (f64, f64) {
        let w = speed * speed * self.r;
        let q = flow.max(1.0e-6);
        let head_loss = w / q;
        (head_loss, (head_loss / q).abs())
    }

    fn power_func_head_loss(&self, speed: f64, q: f64) -> (f64, f64) {
        let q_user = q * self.q_ucf;
        let mut h01 = self.h0;
        let mut w = 1.0;
        if speed != 1.0 {
            w = speed * speed;
            h01 *= w;
            w /= speed.powf(self.n);
        }

        let r1 = w * self.r * q_user.powf(self.n);
        let head_loss = -(h01 + r1) / self.h_ucf;
        let gradient = -(self.n * r1 / q_user) * self.q_ucf / self.h_ucf;
        (head_loss, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKind;
    use pf_core::Id;

    fn three_point_curve() -> Curve {
        let mut c = Curve::new("pc");
        c.kind = CurveKind::Pump;
        c.add_point(0.0, 200.0);
        c.add_point(4.0, 150.0);
        c.add_point(8.0, 50.0);
        c
    }

    #[test]
    fn three_point_curve_passes_through_its_points() {
        let curves = vec![three_point_curve()];
        let mut pc = PumpCurve {
            curve: Some(Id::from_index(0)),
            ..Default::default()
        };
        pc.setup("P1", &curves, 1.0, 1.0).unwrap();
        assert_eq!(pc.kind, PumpCurveKind::PowerFunc);

        for (q, h) in [(0.0, 200.0), (4.0, 150.0), (8.0, 50.0)] {
            let head = pc.h0 + pc.r * f64::powf(q, pc.n);
            assert!((head - h).abs() < 1e-6, "q={q}: {head} vs {h}");
        }
        // head loss is the negative of delivered head
        let (hloss, hgrad) = pc.find_head_loss(&curves, 1.0, 4.0);
        assert!((hloss + 150.0).abs() < 1e-6);
        assert!(hgrad > 0.0);
    }

    #[test]
    fn single_point_curve_extends_to_shutoff() {
        let mut c = Curve::new("pc1");
        c.kind = CurveKind::Pump;
        c.add_point(4.0, 120.0);
        let curves = vec![c];
        let mut pc = PumpCurve {
            curve: Some(Id::from_index(0)),
            ..Default::default()
        };
        pc.setup("P1", &curves, 1.0, 1.0).unwrap();
        assert!((pc.h_max - 1.33334 * 120.0).abs() < 1e-9);
        assert!((pc.q_max - 8.0).abs() < 1e-6);
    }

    #[test]
    fn rising_custom_curve_is_rejected() {
        let mut c = Curve::new("bad");
        c.kind = CurveKind::Pump;
        c.add_point(0.0, 50.0);
        c.add_point(4.0, 80.0);
        let curves = vec![c];
        let mut pc = PumpCurve {
            curve: Some(Id::from_index(0)),
            ..Default::default()
        };
        assert!(matches!(
            pc.setup("P1", &curves, 1.0, 1.0),
            Err(NetworkError::InvalidPumpCurve(_))
        ));
    }

    #[test]
    fn missing_curve_is_an_error() {
        let mut pc = PumpCurve::default();
        assert!(matches!(
            pc.setup("P1", &[], 1.0, 1.0),
            Err(NetworkError::NoPumpCurve(_))
        ));
    }

    #[test]
    fn const_hp_head_scales_inversely_with_flow() {
        let mut pc = PumpCurve {
            horsepower: 10.0,
            ..Default::default()
        };
        pc.setup("P1", &[], 1.0, 1.0).unwrap();
        let (h1, _) = pc.find_head_loss(&[], 1.0, 1.0);
        let (h2, _) = pc.find_head_loss(&[], 1.0, 2.0);
        assert!((h1 - 2.0 * h2).abs() < 1e-9);
        assert!(h1 < 0.0);
    }

    #[test]
    fn speed_scaling_raises_shutoff_head() {
        let curves = vec![three_point_curve()];
        let mut pc = PumpCurve {
            curve: Some(Id::from_index(0)),
            ..Default::default()
        };
        pc.setup("P1", &curves, 1.0, 1.0).unwrap();
        let (h_full, _) = pc.find_head_loss(&curves, 1.0, 1e-9);
        let (h_fast, _) = pc.find_head_loss(&curves, 1.2, 1e-9);
        assert!(-h_fast > -h_full);
    }
}
