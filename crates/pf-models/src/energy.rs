//! Pump energy usage accounting.
//!
//! Each pump carries an accumulator of time-weighted energy statistics that
//! the hydraulic engine updates once per time step.

use pf_core::constants::KW_PER_HP;

/// Flow below which a pump is considered off line (cfs, = 0.1 gpm).
pub const NO_FLOW: f64 = 2.23e-4;

/// Time-averaged energy usage statistics for one pump.
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpEnergy {
    /// hours the pump has been on line
    pub hrs_online: f64,
    /// average efficiency (%)
    pub efficiency: f64,
    /// average kw-hrs consumed per cfs of flow
    pub kw_hrs_per_cfs: f64,
    /// average kwatts consumed
    pub kw_hrs: f64,
    /// peak kwatts consumed
    pub max_kwatts: f64,
    /// average energy cost per hour
    pub total_cost: f64,
}

impl PumpEnergy {
    pub fn init(&mut self) {
        *self = PumpEnergy::default();
    }

    /// Fold one time step of operation into the running averages.
    ///
    /// `head` is the head gain across the pump (ft), `flow` its flow (cfs),
    /// `effic` the efficiency in percent, `cost_factor` the pattern-adjusted
    /// price per kwh and `dt` the step length in seconds. Returns the kwatts
    /// drawn over the step.
    pub fn update(
        &mut self,
        head: f64,
        flow: f64,
        spec_gravity: f64,
        effic: f64,
        cost_factor: f64,
        dt: i64,
    ) -> f64 {
        let kw = head * flow * spec_gravity / 8.814 / (effic / 100.0) * KW_PER_HP;

        let hrs = dt as f64 / 3600.0;
        let total_hrs = self.hrs_online + hrs;

        self.efficiency = ((self.efficiency * self.hrs_online) + (effic * hrs)) / total_hrs;
        self.kw_hrs = ((self.kw_hrs * self.hrs_online) + (kw * hrs)) / total_hrs;
        self.kw_hrs_per_cfs =
            ((self.kw_hrs_per_cfs * self.hrs_online) + (kw / flow * hrs)) / total_hrs;
        self.total_cost =
            ((self.total_cost * self.hrs_online) + (kw * cost_factor * hrs)) / total_hrs;

        self.hrs_online = total_hrs;
        self.max_kwatts = self.max_kwatts.max(kw);
        kw
    }
}

/// Adjust an efficiency-curve value for a pump running at a relative speed
/// other than 1 (the Sarbu and Borza correction).
pub fn speed_adjusted_efficiency(effic: f64, speed: f64) -> f64 {
    let e = 100.0 - ((100.0 - effic) * (1.0 / speed).powf(0.1));
    e.clamp(1.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_step_sets_averages_directly() {
        let mut e = PumpEnergy::default();
        let kw = e.update(100.0, 2.0, 1.0, 75.0, 0.10, 3600);
        assert!(kw > 0.0);
        assert!((e.hrs_online - 1.0).abs() < 1e-12);
        assert!((e.efficiency - 75.0).abs() < 1e-12);
        assert!((e.kw_hrs - kw).abs() < 1e-12);
        assert!((e.max_kwatts - kw).abs() < 1e-12);
        assert!((e.total_cost - kw * 0.10).abs() < 1e-12);
    }

    #[test]
    fn averages_are_time_weighted() {
        let mut e = PumpEnergy::default();
        e.update(100.0, 2.0, 1.0, 80.0, 0.0, 3600);
        e.update(100.0, 2.0, 1.0, 60.0, 0.0, 10_800);
        // 1 hr at 80% then 3 hrs at 60% averages to 65%
        assert!((e.efficiency - 65.0).abs() < 1e-9);
        assert!((e.hrs_online - 4.0).abs() < 1e-12);
    }

    #[test]
    fn peak_tracks_maximum() {
        let mut e = PumpEnergy::default();
        let kw1 = e.update(50.0, 1.0, 1.0, 75.0, 0.0, 3600);
        let kw2 = e.update(150.0, 1.0, 1.0, 75.0, 0.0, 3600);
        assert!(kw2 > kw1);
        assert!((e.max_kwatts - kw2).abs() < 1e-12);
    }

    #[test]
    fn speed_adjustment_is_neutral_at_full_speed() {
        assert!((speed_adjusted_efficiency(70.0, 1.0) - 70.0).abs() < 1e-12);
        assert!(speed_adjusted_efficiency(70.0, 0.5) < 70.0);
        assert!(speed_adjusted_efficiency(70.0, 0.5) >= 1.0);
    }
}
