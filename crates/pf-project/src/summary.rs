//! Serializable run summary, written as JSON alongside the report.

use chrono::Local;
use serde::Serialize;

use pf_network::Network;
use pf_sim::QualBalance;

#[derive(Debug, Clone, Serialize)]
pub struct MassBalanceSummary {
    pub initial_mass: f64,
    pub inflow_mass: f64,
    pub outflow_mass: f64,
    pub reacted_mass: f64,
    pub stored_mass: f64,
    pub percent_imbalance: f64,
}

impl From<&QualBalance> for MassBalanceSummary {
    fn from(balance: &QualBalance) -> Self {
        Self {
            initial_mass: balance.init_mass,
            inflow_mass: balance.inflow_mass,
            outflow_mass: balance.outflow_mass,
            reacted_mass: balance.reacted_mass,
            stored_mass: balance.stored_mass,
            percent_imbalance: balance.percent_imbalance(),
        }
    }
}

/// A machine-readable digest of one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub input_file: String,
    pub node_count: usize,
    pub link_count: usize,
    pub pump_count: usize,
    pub pattern_count: usize,
    pub curve_count: usize,
    pub control_count: usize,
    /// total simulation duration (sec)
    pub duration: i64,
    /// number of hydraulic steps taken
    pub step_count: usize,
    /// Newton trials accumulated over the whole run
    pub total_trials: usize,
    /// reporting periods written to the output file
    pub period_count: i32,
    pub peak_kwatts: f64,
    pub mass_balance: Option<MassBalanceSummary>,
}

impl RunSummary {
    pub fn new(
        net: &Network,
        input_file: &str,
        step_count: usize,
        total_trials: usize,
        period_count: i32,
        peak_kwatts: f64,
        mass_balance: Option<&QualBalance>,
    ) -> Self {
        Self {
            finished_at: Local::now().to_rfc3339(),
            input_file: input_file.to_string(),
            node_count: net.nodes.len(),
            link_count: net.links.len(),
            pump_count: net.pump_count(),
            pattern_count: net.patterns.len(),
            curve_count: net.curves.len(),
            control_count: net.controls.len(),
            duration: net.options.total_duration,
            step_count,
            total_trials,
            period_count,
            peak_kwatts,
            mass_balance: mass_balance.map(MassBalanceSummary::from),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_to_json() {
        let net = Network::new();
        let summary = RunSummary::new(&net, "test.inp", 24, 120, 25, 14.2, None);
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"total_trials\": 120"));
        assert!(json.contains("\"mass_balance\": null"));
    }
}
