//! User <-> internal unit conversions.
//!
//! Internally every quantity is in feet / cfs / ft3 / mass-per-ft3. The
//! flow-unit keyword chosen by the user determines the unit system (US or
//! SI) and, with the pressure-unit choice, fills in a table of conversion
//! factors (user units per internal unit). Quantities are converted once on
//! load and once on output.

use crate::constants::*;
use std::str::FromStr;

/// Unit system derived from the flow units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    US,
    SI,
}

/// Flow rate units a project can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowUnits {
    CFS,
    #[default]
    GPM,
    MGD,
    IMGD,
    AFD,
    LPS,
    LPM,
    MLD,
    CMH,
    CMD,
}

impl FlowUnits {
    /// User flow units per cfs.
    pub fn factor(self) -> f64 {
        match self {
            FlowUnits::CFS => 1.0,
            FlowUnits::GPM => GPM_PER_CFS,
            FlowUnits::MGD => MGD_PER_CFS,
            FlowUnits::IMGD => IMGD_PER_CFS,
            FlowUnits::AFD => AFD_PER_CFS,
            FlowUnits::LPS => LPS_PER_CFS,
            FlowUnits::LPM => LPM_PER_CFS,
            FlowUnits::MLD => MLD_PER_CFS,
            FlowUnits::CMH => CMH_PER_CFS,
            FlowUnits::CMD => CMD_PER_CFS,
        }
    }

    pub fn system(self) -> UnitSystem {
        match self {
            FlowUnits::CFS | FlowUnits::GPM | FlowUnits::MGD | FlowUnits::IMGD | FlowUnits::AFD => {
                UnitSystem::US
            }
            _ => UnitSystem::SI,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FlowUnits::CFS => "CFS",
            FlowUnits::GPM => "GPM",
            FlowUnits::MGD => "MGD",
            FlowUnits::IMGD => "IMGD",
            FlowUnits::AFD => "AFD",
            FlowUnits::LPS => "LPS",
            FlowUnits::LPM => "LPM",
            FlowUnits::MLD => "MLD",
            FlowUnits::CMH => "CMH",
            FlowUnits::CMD => "CMD",
        }
    }

    /// Index recorded in the binary output file header.
    pub fn ordinal(self) -> i32 {
        match self {
            FlowUnits::CFS => 0,
            FlowUnits::GPM => 1,
            FlowUnits::MGD => 2,
            FlowUnits::IMGD => 3,
            FlowUnits::AFD => 4,
            FlowUnits::LPS => 5,
            FlowUnits::LPM => 6,
            FlowUnits::MLD => 7,
            FlowUnits::CMH => 8,
            FlowUnits::CMD => 9,
        }
    }
}

impl FromStr for FlowUnits {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_uppercase().as_str() {
            "CFS" => Ok(FlowUnits::CFS),
            "GPM" => Ok(FlowUnits::GPM),
            "MGD" => Ok(FlowUnits::MGD),
            "IMGD" => Ok(FlowUnits::IMGD),
            "AFD" => Ok(FlowUnits::AFD),
            "LPS" => Ok(FlowUnits::LPS),
            "LPM" => Ok(FlowUnits::LPM),
            "MLD" => Ok(FlowUnits::MLD),
            "CMH" => Ok(FlowUnits::CMH),
            "CMD" => Ok(FlowUnits::CMD),
            _ => Err(()),
        }
    }
}

/// Pressure units, independent of the flow-unit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressureUnits {
    #[default]
    Psi,
    Meters,
    Kpa,
}

impl PressureUnits {
    pub fn label(self) -> &'static str {
        match self {
            PressureUnits::Psi => "psi",
            PressureUnits::Meters => "m",
            PressureUnits::Kpa => "kpa",
        }
    }

    pub fn ordinal(self) -> i32 {
        match self {
            PressureUnits::Psi => 0,
            PressureUnits::Meters => 1,
            PressureUnits::Kpa => 2,
        }
    }
}

impl FromStr for PressureUnits {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_uppercase().as_str() {
            "PSI" => Ok(PressureUnits::Psi),
            "METERS" => Ok(PressureUnits::Meters),
            "KPA" => Ok(PressureUnits::Kpa),
            _ => Err(()),
        }
    }
}

/// The convertible quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Diameter,
    Length,
    Volume,
    Power,
    Velocity,
    HeadLoss,
    Flow,
    Pressure,
    Concen,
}

const QUANTITY_COUNT: usize = 9;

/// Table of conversion factors (user units per internal unit) and names.
#[derive(Debug, Clone)]
pub struct Units {
    factors: [f64; QUANTITY_COUNT],
    names: [&'static str; QUANTITY_COUNT],
}

impl Default for Units {
    fn default() -> Self {
        let mut units = Units {
            factors: [1.0; QUANTITY_COUNT],
            names: [""; QUANTITY_COUNT],
        };
        units.set_units(FlowUnits::GPM, PressureUnits::Psi);
        units
    }
}

impl Units {
    /// User units per internal unit for a quantity.
    pub fn factor(&self, quantity: Quantity) -> f64 {
        self.factors[quantity as usize]
    }

    /// Display name for a quantity's user units.
    pub fn name(&self, quantity: Quantity) -> &'static str {
        self.names[quantity as usize]
    }

    /// Rebuild the factor table for the given flow and pressure units.
    /// Returns the unit system the flow units imply.
    pub fn set_units(&mut self, flow: FlowUnits, pressure: PressureUnits) -> UnitSystem {
        let system = flow.system();

        self.factors[Quantity::Flow as usize] = flow.factor();
        self.names[Quantity::Flow as usize] = flow.label();

        let (pf, pn) = match pressure {
            PressureUnits::Kpa => (KPA_PER_PSI * PSI_PER_FT, "kpa"),
            PressureUnits::Psi => (PSI_PER_FT, "psi"),
            PressureUnits::Meters => (M_PER_FT, "m"),
        };
        self.factors[Quantity::Pressure as usize] = pf;
        self.names[Quantity::Pressure as usize] = pn;

        self.factors[Quantity::Concen as usize] = FT3_PER_L;
        self.names[Quantity::Concen as usize] = "mg/L";

        match system {
            UnitSystem::US => {
                self.factors[Quantity::Diameter as usize] = 12.0;
                self.factors[Quantity::Length as usize] = 1.0;
                self.factors[Quantity::Volume as usize] = 1.0;
                self.factors[Quantity::Power as usize] = 1.0;
                self.factors[Quantity::Velocity as usize] = 1.0;
                self.factors[Quantity::HeadLoss as usize] = 1000.0;
                self.names[Quantity::Diameter as usize] = "in";
                self.names[Quantity::Length as usize] = "ft";
                self.names[Quantity::Volume as usize] = "ft3";
                self.names[Quantity::Power as usize] = "hp";
                self.names[Quantity::Velocity as usize] = "ft/s";
                self.names[Quantity::HeadLoss as usize] = "ft/kft";
            }
            UnitSystem::SI => {
                self.factors[Quantity::Diameter as usize] = M_PER_FT * 1000.0;
                self.factors[Quantity::Length as usize] = M_PER_FT;
                self.factors[Quantity::Volume as usize] = M3_PER_FT3;
                self.factors[Quantity::Power as usize] = KW_PER_HP;
                self.factors[Quantity::Velocity as usize] = M_PER_FT;
                self.factors[Quantity::HeadLoss as usize] = 1000.0;
                self.names[Quantity::Diameter as usize] = "mm";
                self.names[Quantity::Length as usize] = "m";
                self.names[Quantity::Volume as usize] = "m3";
                self.names[Quantity::Power as usize] = "kw";
                self.names[Quantity::Velocity as usize] = "m/s";
                self.names[Quantity::HeadLoss as usize] = "m/km";
            }
        }
        system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flow_units_imply_system() {
        assert_eq!(FlowUnits::GPM.system(), UnitSystem::US);
        assert_eq!(FlowUnits::LPS.system(), UnitSystem::SI);
    }

    #[test]
    fn si_table_uses_metric_lengths() {
        let mut units = Units::default();
        let system = units.set_units(FlowUnits::LPS, PressureUnits::Meters);
        assert_eq!(system, UnitSystem::SI);
        assert_eq!(units.name(Quantity::Length), "m");
        assert!((units.factor(Quantity::Length) - M_PER_FT).abs() < 1e-12);
        assert_eq!(units.name(Quantity::Diameter), "mm");
    }

    #[test]
    fn kpa_factor_composes_psi_per_ft() {
        let mut units = Units::default();
        units.set_units(FlowUnits::LPS, PressureUnits::Kpa);
        assert!((units.factor(Quantity::Pressure) - KPA_PER_PSI * PSI_PER_FT).abs() < 1e-12);
    }

    proptest! {
        // convert_to_internal(convert_to_user(q)) == q within float precision
        #[test]
        fn unit_round_trip(value in -1.0e6_f64..1.0e6) {
            let mut units = Units::default();
            units.set_units(FlowUnits::MGD, PressureUnits::Psi);
            for q in [Quantity::Flow, Quantity::Pressure, Quantity::Diameter, Quantity::Volume] {
                let f = units.factor(q);
                let round = (value * f) / f;
                prop_assert!((round - value).abs() <= 1e-9 * value.abs().max(1.0));
            }
        }
    }
}
