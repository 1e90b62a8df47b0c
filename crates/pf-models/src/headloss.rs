//! Pipe head loss models: Hazen-Williams, Darcy-Weisbach, Chezy-Manning.
//!
//! Each model precomputes a resistance factor from pipe geometry, then maps
//! a flow rate to a (head loss, gradient) pair. Gradients are floored at
//! `MIN_GRADIENT` so the Jacobian stays well conditioned near zero flow.

use pf_core::constants::{GRAVITY, HEAD_EPSILON, HIGH_RESISTANCE, MIN_GRADIENT};

const HW_EXP: f64 = 1.852;

// Constants for the Darcy-Weisbach friction factor and the Dunlop
// interpolating polynomial used over the 2000 < Re < 4000 transition.
const A1: f64 = 0.314159265359e4; // 1000*PI
const A2: f64 = 0.157079632679e4; // 500*PI
const A8: f64 = 4.61841319859; // 5.74*(PI/4)^0.9
const A9: f64 = -8.685889638e-01; // -2/ln(10)
const AA: f64 = -1.5634601348; // -2*0.9*2/ln(10)
const AB: f64 = 3.28895476345e-03; // 5.74/(4000^0.9)
const AC: f64 = -5.14214965799e-03; // AA*AB

/// The hydraulic properties of a pipe that head loss evaluation needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeHydraulics {
    /// pipe length (ft)
    pub length: f64,
    /// pipe diameter (ft)
    pub diameter: f64,
    /// roughness (model-specific units; ft for Darcy-Weisbach)
    pub roughness: f64,
    /// precomputed flow resistance
    pub resistance: f64,
    /// minor loss factor on a flow^2 basis
    pub loss_factor: f64,
}

/// Which head loss relation the project uses, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadLossKind {
    #[default]
    HazenWilliams,
    DarcyWeisbach,
    ChezyManning,
}

impl HeadLossKind {
    pub fn label(self) -> &'static str {
        match self {
            HeadLossKind::HazenWilliams => "H-W",
            HeadLossKind::DarcyWeisbach => "D-W",
            HeadLossKind::ChezyManning => "C-M",
        }
    }
}

/// A head loss model: the relation plus the water viscosity it evaluates with.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadLossModel {
    pub kind: HeadLossKind,
    /// kinematic viscosity (ft2/sec), used by Darcy-Weisbach
    pub viscosity: f64,
}

impl HeadLossModel {
    pub fn new(kind: HeadLossKind, viscosity: f64) -> Self {
        Self { kind, viscosity }
    }

    /// Precompute a pipe's flow resistance from its geometry and roughness.
    pub fn resistance(&self, pipe: &PipeHydraulics) -> f64 {
        let d = pipe.diameter;
        let r = match self.kind {
            HeadLossKind::HazenWilliams => {
                4.727 * pipe.length / pipe.roughness.powf(HW_EXP) / d.powf(4.871)
            }
            HeadLossKind::DarcyWeisbach => {
                let a = std::f64::consts::PI * d * d / 4.0;
                pipe.length / 2.0 / GRAVITY / d / a / a
            }
            HeadLossKind::ChezyManning => {
                let r = 4.0 * pipe.roughness / (1.49 * std::f64::consts::PI * d * d);
                r * r * (d / 4.0).powf(-1.333) * pipe.length
            }
        };
        r.min(HIGH_RESISTANCE)
    }

    /// Head loss across a pipe and its gradient d(hLoss)/dq at flow `flow`.
    pub fn find_head_loss(&self, pipe: &PipeHydraulics, flow: f64) -> (f64, f64) {
        match self.kind {
            HeadLossKind::HazenWilliams => hw_head_loss(pipe, flow),
            HeadLossKind::DarcyWeisbach => dw_head_loss(pipe, flow, self.viscosity),
            HeadLossKind::ChezyManning => cm_head_loss(pipe, flow),
        }
    }
}

/// Head loss stub for a closed link: a steep linear relation that pins flow
/// to zero without making the matrix singular.
pub fn closed_head_loss(flow: f64) -> (f64, f64) {
    (HIGH_RESISTANCE * flow, HIGH_RESISTANCE)
}

/// Smooth penalty added to links with a check valve so that reverse flow is
/// resisted without a hard discontinuity at q = 0.
pub fn add_cv_head_loss(flow: f64, hloss: &mut f64, hgrad: &mut f64) {
    let a = HIGH_RESISTANCE * flow;
    let b = (a * a + HEAD_EPSILON).sqrt();
    *hloss += (a - b) / 2.0;
    *hgrad += HIGH_RESISTANCE * (1.0 - a / b) / 2.0;
}

fn hw_head_loss(pipe: &PipeHydraulics, flow: f64) -> (f64, f64) {
    let q = flow.abs();
    let r = pipe.resistance;
    let k = pipe.loss_factor;

    let mut hgrad = HW_EXP * r * q.powf(HW_EXP - 1.0);
    let mut hloss;
    if hgrad < MIN_GRADIENT {
        hgrad = MIN_GRADIENT;
        hloss = q * hgrad;
    } else {
        hloss = q * hgrad / HW_EXP;
    }
    if k > 0.0 {
        hloss += k * q * q;
        hgrad += 2.0 * k * q;
    }
    if flow < 0.0 {
        hloss = -hloss;
    }
    (hloss, hgrad)
}

fn cm_head_loss(pipe: &PipeHydraulics, flow: f64) -> (f64, f64) {
    let q = flow.abs();
    let r = pipe.resistance;
    let k = pipe.loss_factor;

    let mut hgrad = 2.0 * r * q;
    let mut hloss;
    if hgrad < MIN_GRADIENT {
        hgrad = MIN_GRADIENT;
        hloss = q * hgrad;
    } else {
        hloss = q * hgrad / 2.0;
    }
    if k > 0.0 {
        hloss += k * q * q;
        hgrad += 2.0 * k * q;
    }
    if flow < 0.0 {
        hloss = -hloss;
    }
    (hloss, hgrad)
}

fn dw_head_loss(pipe: &PipeHydraulics, flow: f64, viscosity: f64) -> (f64, f64) {
    let q = flow.abs();
    let r = pipe.resistance;
    let k = pipe.loss_factor;
    let s = viscosity * pipe.diameter;

    // Hagen-Poiseuille for laminar flow (Re <= 2000)
    if q <= A2 * s {
        let rl = 16.0 * std::f64::consts::PI * s * r;
        (flow * (rl + k * q), rl + 2.0 * k * q)
    } else {
        let e = pipe.roughness / pipe.diameter;
        let (f, dfdq) = friction_factor(q, e, s);
        let r1 = f * r + k;
        (r1 * q * flow, 2.0 * r1 * q + dfdq * r * q * q)
    }
}

/// Darcy-Weisbach friction factor and its flow derivative. Uses the
/// Colebrook formula for Re >= 4000 and Dunlop's interpolating polynomial
/// through the transition region below it.
fn friction_factor(q: f64, e: f64, s: f64) -> (f64, f64) {
    let w = q / s; // Re*PI/4

    if w >= A1 {
        let y1 = A8 / w.powf(0.9);
        let y2 = e / 3.7 + y1;
        let y3 = A9 * y2.ln();
        let f = 1.0 / (y3 * y3);
        let dfdq = 1.8 * f * y1 * A9 / y2 / y3 / q;
        (f, dfdq)
    } else {
        let y2 = e / 3.7 + AB;
        let y3 = A9 * y2.ln();
        let fa = 1.0 / (y3 * y3);
        let fb = (2.0 + AC / (y2 * y3)) * fa;
        let r = w / A2;
        let x1 = 7.0 * fa - fb;
        let x2 = 0.128 - 17.0 * fa + 2.5 * fb;
        let x3 = -0.128 + 13.0 * fa - (fb + fb);
        let x4 = r * (0.032 - 3.0 * fa + 0.5 * fb);
        let f = x1 + r * (x2 + r * (x3 + x4));
        let dfdq = (x2 + 2.0 * r * (x3 + x4)) / s / A2;
        (f, dfdq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::constants::VISCOSITY;
    use proptest::prelude::*;

    fn test_pipe(kind: HeadLossKind) -> (HeadLossModel, PipeHydraulics) {
        let model = HeadLossModel::new(kind, VISCOSITY);
        let mut pipe = PipeHydraulics {
            length: 1000.0,
            diameter: 1.0,
            roughness: match kind {
                HeadLossKind::HazenWilliams => 100.0,
                HeadLossKind::DarcyWeisbach => 0.00085,
                HeadLossKind::ChezyManning => 0.011,
            },
            resistance: 0.0,
            loss_factor: 0.0,
        };
        pipe.resistance = model.resistance(&pipe);
        (model, pipe)
    }

    #[test]
    fn hazen_williams_single_pipe_benchmark() {
        // 1000 ft of 1 ft pipe at C=100 carrying 1 cfs:
        // hLoss = 4.727 * 1000 / 100^1.852 = 0.9345 ft
        let (model, pipe) = test_pipe(HeadLossKind::HazenWilliams);
        let (hloss, hgrad) = model.find_head_loss(&pipe, 1.0);
        assert!((hloss - 0.9345).abs() < 0.001, "hloss = {hloss}");
        assert!((hgrad - HW_EXP * hloss).abs() < 1e-9);
    }

    #[test]
    fn zero_flow_loses_no_head() {
        for kind in [
            HeadLossKind::HazenWilliams,
            HeadLossKind::DarcyWeisbach,
            HeadLossKind::ChezyManning,
        ] {
            let (model, pipe) = test_pipe(kind);
            let (hloss, hgrad) = model.find_head_loss(&pipe, 0.0);
            assert_eq!(hloss, 0.0, "{kind:?}");
            assert!(hgrad >= MIN_GRADIENT, "{kind:?}");
        }
    }

    #[test]
    fn darcy_weisbach_is_continuous_at_laminar_boundary() {
        let (model, pipe) = test_pipe(HeadLossKind::DarcyWeisbach);
        let q_lam = A2 * VISCOSITY * pipe.diameter;
        let (h1, _) = model.find_head_loss(&pipe, q_lam * 0.999);
        let (h2, _) = model.find_head_loss(&pipe, q_lam * 1.001);
        assert!((h1 - h2).abs() < 0.05 * h2.abs().max(1e-12));
    }

    #[test]
    fn closed_stub_pins_flow() {
        let (hloss, hgrad) = closed_head_loss(1e-6);
        assert_eq!(hgrad, HIGH_RESISTANCE);
        assert!((hloss - HIGH_RESISTANCE * 1e-6).abs() < 1e-9);
    }

    #[test]
    fn check_valve_penalizes_reverse_flow_only() {
        let mut h_fwd = 0.0;
        let mut g_fwd = 0.0;
        add_cv_head_loss(1.0, &mut h_fwd, &mut g_fwd);
        assert!(h_fwd.abs() < 1e-6);

        let mut h_rev = 0.0;
        let mut g_rev = 0.0;
        add_cv_head_loss(-1.0, &mut h_rev, &mut g_rev);
        assert!(h_rev < -1e7);
        assert!(g_rev > 1e7);
    }

    proptest! {
        // hLoss is an odd function of flow and the gradient never drops
        // below the conditioning floor
        #[test]
        fn head_loss_is_odd_and_gradient_floored(q in 1e-9_f64..10.0) {
            for kind in [HeadLossKind::HazenWilliams,
                         HeadLossKind::DarcyWeisbach,
                         HeadLossKind::ChezyManning] {
                let (model, pipe) = test_pipe(kind);
                let (h_pos, g_pos) = model.find_head_loss(&pipe, q);
                let (h_neg, g_neg) = model.find_head_loss(&pipe, -q);
                prop_assert!((h_pos + h_neg).abs() <= 1e-9 * h_pos.abs().max(1.0));
                prop_assert!(g_pos >= MIN_GRADIENT);
                prop_assert!((g_pos - g_neg).abs() <= 1e-9 * g_pos.abs().max(1.0));
            }
        }
    }
}
