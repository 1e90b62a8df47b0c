//! Valve links: TCV, PBV, FCV, GPV and the PRV/PSV pressure regulators.

use crate::link::LinkStatus;
use pf_core::constants::{MIN_GRADIENT, ZERO_FLOW};
use pf_core::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveKind {
    /// pressure reducing: caps downstream pressure at the setting
    Prv,
    /// pressure sustaining: keeps upstream pressure at the setting
    Psv,
    /// flow control: caps flow at the setting
    Fcv,
    /// throttle control: setting is a minor loss coefficient
    Tcv,
    /// pressure breaker: forces a fixed head drop
    Pbv,
    /// general purpose: head loss from a user curve
    Gpv,
}

impl ValveKind {
    pub fn label(self) -> &'static str {
        match self {
            ValveKind::Prv => "PRV",
            ValveKind::Psv => "PSV",
            ValveKind::Fcv => "FCV",
            ValveKind::Tcv => "TCV",
            ValveKind::Pbv => "PBV",
            ValveKind::Gpv => "GPV",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRV" => Some(ValveKind::Prv),
            "PSV" => Some(ValveKind::Psv),
            "FCV" => Some(ValveKind::Fcv),
            "TCV" => Some(ValveKind::Tcv),
            "PBV" => Some(ValveKind::Pbv),
            "GPV" => Some(ValveKind::Gpv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Valve {
    pub kind: ValveKind,
    /// fully-open minor loss factor on a flow^2 basis
    pub loss_factor: f64,
    pub setting_pattern: Option<PatternId>,
    /// true once a control or [STATUS] line has pinned the valve OPEN/CLOSED
    pub has_fixed_status: bool,
    /// elevation of the controlled node (PRV: downstream, PSV: upstream)
    pub elev: f64,
}

impl Valve {
    pub fn new(kind: ValveKind) -> Self {
        Self {
            kind,
            loss_factor: 0.0,
            setting_pattern: None,
            has_fixed_status: false,
            elev: 0.0,
        }
    }
}

/// Head loss and gradient through a fully open valve.
pub fn open_head_loss(loss_factor: f64, q: f64) -> (f64, f64) {
    let mut hgrad = 2.0 * loss_factor * q.abs();
    let hloss;
    if hgrad < MIN_GRADIENT {
        hgrad = MIN_GRADIENT;
        hloss = hgrad * q;
    } else {
        hloss = hgrad * q / 2.0;
    }
    (hloss, hgrad)
}

/// One iteration of the pressure reducing valve's state machine. `h_set` is
/// the target head (setting + controlled node elevation).
pub fn next_prv_status(status: LinkStatus, q: f64, h1: f64, h2: f64, h_set: f64) -> LinkStatus {
    match status {
        LinkStatus::Active => {
            if q < -ZERO_FLOW {
                LinkStatus::Closed
            } else if h1 < h_set {
                LinkStatus::Open
            } else {
                status
            }
        }
        LinkStatus::Open => {
            if q < -ZERO_FLOW {
                LinkStatus::Closed
            } else if h2 > h_set {
                LinkStatus::Active
            } else {
                status
            }
        }
        LinkStatus::Closed => {
            if h1 > h_set && h2 < h_set {
                LinkStatus::Active
            } else if h1 < h_set && h1 > h2 {
                LinkStatus::Open
            } else {
                status
            }
        }
        LinkStatus::TempClosed => status,
    }
}

/// The pressure sustaining valve is the PRV's mirror image with respect to
/// the upstream setpoint.
pub fn next_psv_status(status: LinkStatus, q: f64, h1: f64, h2: f64, h_set: f64) -> LinkStatus {
    match status {
        LinkStatus::Active => {
            if q < -ZERO_FLOW {
                LinkStatus::Closed
            } else if h2 > h_set {
                LinkStatus::Open
            } else {
                status
            }
        }
        LinkStatus::Open => {
            if q < -ZERO_FLOW {
                LinkStatus::Closed
            } else if h1 < h_set {
                LinkStatus::Active
            } else {
                status
            }
        }
        LinkStatus::Closed => {
            if h2 < h_set && h1 > h_set {
                LinkStatus::Active
            } else if h2 > h_set && h1 > h2 {
                LinkStatus::Open
            } else {
                status
            }
        }
        LinkStatus::TempClosed => status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_valve_gradient_floor() {
        let (hloss, hgrad) = open_head_loss(0.0, 0.5);
        assert_eq!(hgrad, MIN_GRADIENT);
        assert_eq!(hloss, MIN_GRADIENT * 0.5);
    }

    #[test]
    fn prv_closes_on_reverse_flow() {
        let s = next_prv_status(LinkStatus::Active, -1.0, 120.0, 100.0, 110.0);
        assert_eq!(s, LinkStatus::Closed);
        let s = next_prv_status(LinkStatus::Open, -1.0, 120.0, 100.0, 110.0);
        assert_eq!(s, LinkStatus::Closed);
    }

    #[test]
    fn prv_opens_when_upstream_sags_below_setpoint() {
        let s = next_prv_status(LinkStatus::Active, 1.0, 100.0, 90.0, 110.0);
        assert_eq!(s, LinkStatus::Open);
    }

    #[test]
    fn prv_activates_when_spanning_setpoint() {
        let s = next_prv_status(LinkStatus::Closed, 0.0, 120.0, 100.0, 110.0);
        assert_eq!(s, LinkStatus::Active);
        let s = next_prv_status(LinkStatus::Open, 1.0, 120.0, 115.0, 110.0);
        assert_eq!(s, LinkStatus::Active);
    }

    #[test]
    fn psv_mirrors_prv() {
        // upstream head above setpoint with demand downstream -> open
        let s = next_psv_status(LinkStatus::Active, 1.0, 120.0, 115.0, 110.0);
        assert_eq!(s, LinkStatus::Open);
        // upstream sagging to the setpoint -> active
        let s = next_psv_status(LinkStatus::Open, 1.0, 105.0, 90.0, 110.0);
        assert_eq!(s, LinkStatus::Active);
    }
}
