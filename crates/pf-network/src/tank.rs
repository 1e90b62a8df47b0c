//! Storage tank nodes.
//!
//! Tanks hold computed state for the current step (volume, surface area)
//! plus a snapshot of the previous step used by the solver's time-weighted
//! head integration.

use crate::curve::Curve;
use pf_core::constants::MISSING;
use pf_core::CurveId;

/// How a tank blends water quality (chosen per tank, used by the quality
/// engine's mixing machinery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixingKind {
    /// single completely mixed compartment
    #[default]
    Mix1,
    /// mixing zone plus stagnant zone
    Mix2,
    /// plug flow
    Fifo,
    /// stacked (last in, first out)
    Lifo,
}

impl MixingKind {
    pub fn label(self) -> &'static str {
        match self {
            MixingKind::Mix1 => "MIXED",
            MixingKind::Mix2 => "2COMP",
            MixingKind::Fifo => "FIFO",
            MixingKind::Lifo => "LIFO",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MIXED" => Some(MixingKind::Mix1),
            "2COMP" => Some(MixingKind::Mix2),
            "FIFO" => Some(MixingKind::Fifo),
            "LIFO" => Some(MixingKind::Lifo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tank {
    // input properties (internal units after conversion)
    pub init_head: f64,
    pub min_head: f64,
    pub max_head: f64,
    pub diameter: f64,
    pub min_volume: f64,
    pub bulk_coeff: f64,
    pub vol_curve: Option<CurveId>,
    pub mixing_model: MixingKind,
    pub frac_mixed: f64,

    // computed state
    pub max_volume: f64,
    pub volume: f64,
    pub area: f64,
    /// user length units per ft, kept because volume curves stay in user units
    pub ucf_length: f64,
    pub past_head: f64,
    pub past_volume: f64,
    pub past_outflow: f64,
}

impl Default for Tank {
    fn default() -> Self {
        Self {
            init_head: 0.0,
            min_head: 0.0,
            max_head: 0.0,
            diameter: 0.0,
            min_volume: 0.0,
            bulk_coeff: MISSING,
            vol_curve: None,
            mixing_model: MixingKind::default(),
            frac_mixed: 1.0,
            max_volume: 0.0,
            volume: 0.0,
            area: 0.0,
            ucf_length: 1.0,
            past_head: 0.0,
            past_volume: 0.0,
            past_outflow: 0.0,
        }
    }
}

impl Tank {
    /// Volume (ft3) at water surface elevation `head`, for a tank whose
    /// bottom sits at `elev`.
    pub fn find_volume(&self, elev: f64, head: f64, curves: &[Curve]) -> f64 {
        let mut depth = head - elev;

        if let Some(curve_id) = self.vol_curve {
            // the curve is depth vs. volume in the user's original units
            let curve = &curves[curve_id.index()];
            depth *= self.ucf_length;
            let (slope, intercept) = curve.find_segment(depth);
            let ucf_area = self.ucf_length * self.ucf_length;
            return (slope * depth + intercept) / (ucf_area * self.ucf_length);
        }

        if self.min_volume > 0.0 {
            depth = (head - self.min_head).max(0.0);
        }
        self.min_volume + self.area * depth
    }

    /// Water surface elevation at volume `volume`.
    pub fn find_head(&self, elev: f64, volume: f64, curves: &[Curve]) -> f64 {
        if let Some(curve_id) = self.vol_curve {
            let curve = &curves[curve_id.index()];
            let ucf_area = self.ucf_length * self.ucf_length;
            let v = volume * ucf_area * self.ucf_length;
            elev + curve.x_of_y(v) / self.ucf_length
        } else {
            let v = (volume - self.min_volume).max(0.0);
            self.min_head + v / self.area
        }
    }

    /// Refresh the surface area from the current depth (only meaningful for
    /// tanks with a volume curve; a cylinder's area never changes).
    pub fn update_area(&mut self, elev: f64, head: f64, curves: &[Curve]) {
        if let Some(curve_id) = self.vol_curve {
            let curve = &curves[curve_id.index()];
            let depth = head - elev;
            let (slope, _) = curve.find_segment(depth * self.ucf_length);
            // segment slope (dV/dy) is the average area over the interval
            self.area = slope / self.ucf_length / self.ucf_length;
        }
    }

    /// Integrate the tank volume over a time step, saturating at the
    /// min/max volumes (and pinning head there when saturation occurs).
    pub fn update_volume(&mut self, elev: f64, tstep: i64, outflow: f64, curves: &[Curve]) -> f64 {
        self.volume += outflow * tstep as f64;

        // check if min/max levels reached within one more second of flow
        let v1 = self.volume + outflow;
        if v1 <= self.min_volume {
            self.volume = self.min_volume;
            self.min_head
        } else if v1 >= self.max_volume {
            self.volume = self.max_volume;
            self.max_head
        } else {
            self.find_head(elev, self.volume, curves)
        }
    }

    /// Time (sec) to fill or drain to volume `v` at the current outflow,
    /// or None when the tank is not moving toward `v`.
    pub fn time_to_volume(&self, outflow: f64, v: f64) -> Option<i64> {
        let v = v.clamp(self.min_volume, self.max_volume);
        if (v - self.volume) * outflow <= 0.0 {
            return None;
        }
        let t = (v - self.volume) / outflow;
        Some((t + 0.5) as i64)
    }

    /// Whether flow `flow` out of this tank (positive = draining) must be
    /// refused because the tank is pinned at an empty or full level.
    pub fn is_closed(&self, fixed_grade: bool, head: f64, flow: f64) -> bool {
        if !fixed_grade {
            return false;
        }
        (head >= self.max_head && flow < 0.0) || (head <= self.min_head && flow > 0.0)
    }
}
