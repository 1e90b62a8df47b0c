//! User-supplied analysis options.
//!
//! The original index-array design is replaced by a plain struct with typed
//! fields; the input parser maps option keywords onto them.

use pf_core::constants::{DIFFUSIVITY, VISCOSITY};
use pf_core::{FlowUnits, PressureUnits, UnitSystem};
use pf_models::headloss::HeadLossKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfUnbalanced {
    #[default]
    Stop,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualType {
    #[default]
    NoQual,
    Age,
    Trace,
    Chem,
}

impl QualType {
    pub fn ordinal(self) -> i32 {
        match self {
            QualType::NoQual => 0,
            QualType::Age => 1,
            QualType::Trace => 2,
            QualType::Chem => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualUnits {
    #[default]
    NoUnits,
    Hrs,
    Pcnt,
    Mgl,
    Ugl,
}

impl QualUnits {
    pub fn label(self) -> &'static str {
        match self {
            QualUnits::NoUnits => "",
            QualUnits::Hrs => "hrs",
            QualUnits::Pcnt => "%",
            QualUnits::Mgl => "mg/L",
            QualUnits::Ugl => "ug/L",
        }
    }

    pub fn ordinal(self) -> i32 {
        match self {
            QualUnits::NoUnits => 0,
            QualUnits::Hrs => 1,
            QualUnits::Pcnt => 2,
            QualUnits::Mgl => 3,
            QualUnits::Ugl => 4,
        }
    }
}

/// Newton step-sizing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepSizing {
    #[default]
    Full,
    Relaxation,
    LineSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemandModelKind {
    #[default]
    Fixed,
    Constrained,
    Power,
    Logistic,
}

impl DemandModelKind {
    pub fn label(self) -> &'static str {
        match self {
            DemandModelKind::Fixed => "FIXED",
            DemandModelKind::Constrained => "CONSTRAINED",
            DemandModelKind::Power => "POWER",
            DemandModelKind::Logistic => "LOGISTIC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakageModelKind {
    Power,
    Favad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportedItems {
    #[default]
    None,
    All,
}

#[derive(Debug, Clone)]
pub struct Options {
    // unit choices
    pub unit_system: UnitSystem,
    pub flow_units: FlowUnits,
    /// None until set explicitly or derived from the unit system
    pub pressure_units: Option<PressureUnits>,

    // model choices
    pub headloss_model: HeadLossKind,
    pub demand_model: DemandModelKind,
    pub leakage_model: Option<LeakageModelKind>,
    pub step_sizing: StepSizing,

    // hydraulic properties
    pub spec_gravity: f64,
    pub kin_viscosity: f64,
    pub demand_multiplier: f64,
    /// global minimum pressure to supply demand (user pressure units until
    /// conversion, then ft)
    pub minimum_pressure: f64,
    /// global pressure to supply full demand
    pub service_pressure: f64,
    pub pressure_exponent: f64,
    pub emitter_exponent: f64,
    pub leakage_coeff1: f64,
    pub leakage_coeff2: f64,

    // hydraulic solver limits
    pub max_trials: usize,
    pub if_unbalanced: IfUnbalanced,
    pub relative_accuracy: f64,
    pub head_tolerance: f64,
    pub flow_tolerance: f64,
    pub flow_change_limit: f64,
    /// time weighting for variable head tanks (0 = classic fixed-head solve)
    pub time_weight: f64,

    // global patterns
    pub demand_pattern: Option<usize>,
    pub demand_pattern_name: String,
    pub energy_price_pattern: Option<usize>,
    pub energy_price_pattern_name: String,

    // water quality
    pub qual_type: QualType,
    pub qual_name: String,
    pub qual_units: QualUnits,
    pub trace_node: Option<usize>,
    pub trace_node_name: String,
    pub molec_diffusivity: f64,
    pub qual_tolerance: f64,
    pub bulk_order: f64,
    pub wall_order: f64,
    pub tank_order: f64,
    pub bulk_coeff: f64,
    pub wall_coeff: f64,
    pub limiting_concen: f64,
    pub roughness_factor: f64,

    // energy
    pub energy_price: f64,
    pub peaking_charge: f64,
    pub pump_efficiency: f64,

    // times (sec)
    pub start_time: i64,
    pub hyd_step: i64,
    pub qual_step: i64,
    pub pattern_step: i64,
    pub pattern_start: i64,
    pub report_step: i64,
    pub report_start: i64,
    pub rule_step: i64,
    pub total_duration: i64,
    pub report_statistic: i32,

    // report content
    pub report_summary: bool,
    pub report_energy: bool,
    pub report_status: bool,
    pub report_trials: bool,
    pub report_nodes: ReportedItems,
    pub report_links: ReportedItems,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::US,
            flow_units: FlowUnits::GPM,
            pressure_units: None,
            headloss_model: HeadLossKind::HazenWilliams,
            demand_model: DemandModelKind::Fixed,
            leakage_model: None,
            step_sizing: StepSizing::Full,
            spec_gravity: 1.0,
            kin_viscosity: VISCOSITY,
            demand_multiplier: 1.0,
            minimum_pressure: 0.0,
            service_pressure: 0.0,
            pressure_exponent: 0.5,
            emitter_exponent: 0.5,
            leakage_coeff1: 0.0,
            leakage_coeff2: 0.0,
            max_trials: 100,
            if_unbalanced: IfUnbalanced::Stop,
            relative_accuracy: 0.0,
            head_tolerance: 0.0,
            flow_tolerance: 0.0,
            flow_change_limit: 0.0,
            time_weight: 0.0,
            demand_pattern: None,
            demand_pattern_name: String::new(),
            energy_price_pattern: None,
            energy_price_pattern_name: String::new(),
            qual_type: QualType::NoQual,
            qual_name: "Chemical".to_string(),
            qual_units: QualUnits::NoUnits,
            trace_node: None,
            trace_node_name: String::new(),
            molec_diffusivity: DIFFUSIVITY,
            qual_tolerance: 0.01,
            bulk_order: 1.0,
            wall_order: 1.0,
            tank_order: 1.0,
            bulk_coeff: 0.0,
            wall_coeff: 0.0,
            limiting_concen: 0.0,
            roughness_factor: 0.0,
            energy_price: 0.0,
            peaking_charge: 0.0,
            pump_efficiency: 75.0,
            start_time: 0,
            hyd_step: 3600,
            qual_step: 300,
            pattern_step: 3600,
            pattern_start: 0,
            report_step: 3600,
            report_start: 0,
            rule_step: 300,
            total_duration: 0,
            report_statistic: 0,
            report_summary: true,
            report_energy: false,
            report_status: false,
            report_trials: false,
            report_nodes: ReportedItems::None,
            report_links: ReportedItems::None,
        }
    }
}

impl Options {
    /// Reconcile options after a project loads: quality units follow the
    /// quality model, and the quality step never exceeds the hydraulic step.
    pub fn adjust(&mut self) {
        match self.qual_type {
            QualType::Age => {
                self.qual_units = QualUnits::Hrs;
                self.qual_name = "Age".to_string();
            }
            QualType::Trace => {
                self.qual_units = QualUnits::Pcnt;
                self.qual_name = format!("Trace {}", self.trace_node_name);
            }
            QualType::Chem => {
                if self.qual_units == QualUnits::NoUnits {
                    self.qual_units = QualUnits::Mgl;
                }
            }
            QualType::NoQual => {
                self.qual_units = QualUnits::NoUnits;
            }
        }
        if self.hyd_step <= 0 {
            self.hyd_step = 3600;
        }
        if self.report_step <= 0 {
            self.report_step = self.hyd_step;
        }
        if self.pattern_step <= 0 {
            self.pattern_step = self.hyd_step;
        }
        if self.qual_step <= 0 {
            self.qual_step = 300;
        }
        if self.qual_step > self.hyd_step {
            self.qual_step = self.hyd_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_caps_quality_step_at_hydraulic_step() {
        let mut opts = Options {
            qual_step: 7200,
            hyd_step: 3600,
            ..Default::default()
        };
        opts.adjust();
        assert_eq!(opts.qual_step, 3600);
    }

    #[test]
    fn adjust_sets_quality_units_from_model() {
        let mut opts = Options {
            qual_type: QualType::Age,
            ..Default::default()
        };
        opts.adjust();
        assert_eq!(opts.qual_units, QualUnits::Hrs);

        let mut opts = Options {
            qual_type: QualType::Chem,
            ..Default::default()
        };
        opts.adjust();
        assert_eq!(opts.qual_units, QualUnits::Mgl);
    }
}
