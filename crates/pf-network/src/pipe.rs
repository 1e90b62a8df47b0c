//! Pipe links.

use pf_core::constants::MISSING;

#[derive(Debug, Clone, Copy)]
pub struct Pipe {
    pub has_check_valve: bool,
    /// length (ft)
    pub length: f64,
    /// roughness (model-specific; ft for Darcy-Weisbach)
    pub roughness: f64,
    /// precomputed flow resistance
    pub resistance: f64,
    /// minor loss factor on a flow^2 basis
    pub loss_factor: f64,
    /// leakage coefficients (model-specific meaning)
    pub leak_coeff1: f64,
    pub leak_coeff2: f64,
    /// bulk reaction coefficient (1/days)
    pub bulk_coeff: f64,
    /// wall reaction coefficient
    pub wall_coeff: f64,
}

impl Default for Pipe {
    fn default() -> Self {
        Self {
            has_check_valve: false,
            length: 0.0,
            roughness: 0.0,
            resistance: 0.0,
            loss_factor: 0.0,
            leak_coeff1: MISSING,
            leak_coeff2: MISSING,
            bulk_coeff: MISSING,
            wall_coeff: MISSING,
        }
    }
}

impl Pipe {
    pub fn is_reactive(&self) -> bool {
        self.bulk_coeff != 0.0 || self.wall_coeff != 0.0
    }

    pub fn can_leak(&self) -> bool {
        self.leak_coeff1 > 0.0
    }
}
