//! Water quality reaction kinetics.
//!
//! Three constituent models: a reactive chemical (bulk + wall kinetics), a
//! source tracer, and water age. Reactions operate on a single segment
//! concentration over a time step and never fail; concentrations are
//! clamped at zero.

use pf_core::constants::{FT3_PER_L, L_PER_FT3, SEC_PER_DAY};

const SMALL: f64 = 1.0e-6;

/// Tracer concentration held at a traced node (100% on a mass/ft3 scale).
pub const C_TRACE: f64 = 100.0 * L_PER_FT3;

/// Reaction-relevant properties of a pipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeReaction {
    /// bulk reaction rate coefficient (1/days)
    pub bulk_coeff: f64,
    /// wall reaction rate coefficient (ft/day based)
    pub wall_coeff: f64,
    /// pipe diameter (ft)
    pub diameter: f64,
    /// pipe length (ft)
    pub length: f64,
}

/// Parameters of a reactive chemical constituent.
#[derive(Debug, Clone, Copy)]
pub struct ChemicalReaction {
    /// molecular diffusivity (ft2/sec)
    pub diffusivity: f64,
    /// kinematic viscosity (ft2/sec)
    pub viscosity: f64,
    /// bulk reaction order in pipes
    pub pipe_order: f64,
    /// bulk reaction order in tanks
    pub tank_order: f64,
    /// wall reaction order (0 or 1)
    pub wall_order: f64,
    /// limiting concentration for growth/decay (mass/ft3); 0 = none
    pub c_limit: f64,
}

impl Default for ChemicalReaction {
    fn default() -> Self {
        Self {
            diffusivity: pf_core::constants::DIFFUSIVITY,
            viscosity: pf_core::constants::VISCOSITY,
            pipe_order: 1.0,
            tank_order: 1.0,
            wall_order: 1.0,
            c_limit: 0.0,
        }
    }
}

impl ChemicalReaction {
    fn schmidt(&self) -> f64 {
        if self.diffusivity > 0.0 {
            self.viscosity / self.diffusivity
        } else {
            0.0
        }
    }

    /// volume conversion applied to bulk rate expressions of order != 1
    fn pipe_ucf(&self) -> f64 {
        L_PER_FT3.powf(1.0 - self.pipe_order)
    }

    fn tank_ucf(&self) -> f64 {
        L_PER_FT3.powf(1.0 - self.tank_order)
    }

    /// Mass transfer coefficient (ft/sec) between the bulk flow and the
    /// pipe wall at flow rate `flow`. Sherwood number from the
    /// Notter-Sleicher form for turbulent flow and the Graetz solution for
    /// laminar flow.
    pub fn mass_transfer_coeff(&self, pipe: &PipeReaction, flow: f64) -> f64 {
        if pipe.wall_coeff == 0.0 || self.diffusivity == 0.0 {
            return 0.0;
        }
        let d = pipe.diameter;
        let area = std::f64::consts::PI * d * d / 4.0;
        let re = flow.abs() / area * d / self.viscosity;
        let sc = self.schmidt();

        let sh = if re < 1.0 {
            2.0
        } else if re >= 2300.0 {
            0.026 * re.powf(0.8) * sc.powf(1.0 / 3.0)
        } else {
            let y = re * sc * (d / pipe.length);
            1.62 * y.powf(1.0 / 3.0)
        };
        sh * self.diffusivity / d
    }

    fn bulk_rate(&self, kb: f64, order: f64, c: f64) -> f64 {
        let mut c = c;
        if order == 0.0 {
            c = 1.0;
        } else if order < 0.0 {
            // Michaelis-Menten kinetics
            let mut c1 = self.c_limit + kb.signum() * c;
            if c1.abs() < SMALL {
                c1 = c1.signum() * SMALL;
            }
            c /= c1;
        } else {
            // n-th order kinetics with an optional limiting potential
            let c1 = if self.c_limit == 0.0 {
                c
            } else {
                (kb.signum() * (self.c_limit - c)).max(0.0)
            };
            if order == 1.0 {
                c = c1;
            } else if order == 2.0 {
                c = c1 * c;
            } else {
                c = c1 * c.max(0.0).powf(order - 1.0);
            }
        }
        kb * c.max(0.0)
    }

    fn wall_rate(&self, kw: f64, diameter: f64, mass_trans: f64, c: f64) -> f64 {
        if diameter == 0.0 {
            return 0.0;
        }
        let rh = diameter / 4.0; // hydraulic radius

        if mass_trans == 0.0 {
            let c = if self.wall_order == 0.0 { 1.0 } else { c };
            return c * kw / rh;
        }

        if self.wall_order == 0.0 {
            // zero-order rate limited by mass transfer
            let kf = kw.signum() * c * mass_trans;
            let k = if kf.abs() < kw.abs() { kf } else { kw };
            k / rh
        } else {
            c * kw * mass_trans / (mass_trans + kw.abs()) / rh
        }
    }
}

/// The water quality constituent being simulated.
#[derive(Debug, Clone, Copy)]
pub enum ReactionModel {
    /// A chemical subject to bulk and wall kinetics.
    Chemical(ChemicalReaction),
    /// Fraction of flow originating at a traced node.
    Trace {
        /// index of the traced node
        node: usize,
    },
    /// Water age in hours.
    Age,
}

impl ReactionModel {
    /// Whether any reaction at all occurs in pipes or tanks.
    /// Chemical models also require a nonzero rate coefficient somewhere,
    /// which the caller determines from the network.
    pub fn reacts_in_time(&self) -> bool {
        !matches!(self, ReactionModel::Trace { .. })
    }

    /// React a pipe segment concentration over `tstep` seconds.
    pub fn pipe_react(&self, pipe: &PipeReaction, mass_trans: f64, c: f64, tstep: f64) -> f64 {
        match self {
            ReactionModel::Chemical(chem) => {
                let mut dcdt = 0.0;
                let kb = pipe.bulk_coeff / SEC_PER_DAY;
                if kb != 0.0 {
                    dcdt = chem.bulk_rate(kb, chem.pipe_order, c) * chem.pipe_ucf();
                }
                let kw = pipe.wall_coeff / SEC_PER_DAY;
                if kw != 0.0 {
                    dcdt += chem.wall_rate(kw, pipe.diameter, mass_trans, c);
                }
                (c + dcdt * tstep).max(0.0)
            }
            ReactionModel::Trace { .. } => c,
            ReactionModel::Age => c + tstep / 3600.0 * L_PER_FT3,
        }
    }

    /// React a tank segment concentration over `tstep` seconds.
    pub fn tank_react(&self, tank_bulk_coeff: f64, c: f64, tstep: f64) -> f64 {
        match self {
            ReactionModel::Chemical(chem) => {
                let kb = tank_bulk_coeff / SEC_PER_DAY;
                if kb == 0.0 {
                    return c;
                }
                (c + chem.bulk_rate(kb, chem.tank_order, c) * chem.tank_ucf() * tstep).max(0.0)
            }
            ReactionModel::Trace { .. } => c,
            ReactionModel::Age => c + tstep / 3600.0 * L_PER_FT3,
        }
    }
}

/// User-units concentration factor (mg/L per mass/ft3 basis).
pub fn concen_ucf() -> f64 {
    FT3_PER_L
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> PipeReaction {
        PipeReaction {
            bulk_coeff: -1.0, // 1/day decay
            wall_coeff: 0.0,
            diameter: 1.0,
            length: 1000.0,
        }
    }

    #[test]
    fn first_order_decay_loses_mass() {
        let model = ReactionModel::Chemical(ChemicalReaction::default());
        let c0 = 1.0;
        let c1 = model.pipe_react(&pipe(), 0.0, c0, 3600.0);
        // one hour of 1/day decay removes about 1/24 of the mass
        let expected = c0 * (1.0 - 1.0 / 24.0);
        assert!((c1 - expected).abs() < 1e-3, "c1 = {c1}");
    }

    #[test]
    fn concentrations_never_go_negative() {
        let model = ReactionModel::Chemical(ChemicalReaction::default());
        let mut p = pipe();
        p.bulk_coeff = -1000.0;
        let c1 = model.pipe_react(&p, 0.0, 0.5, 86_400.0);
        assert_eq!(c1, 0.0);
    }

    #[test]
    fn zero_order_rate_ignores_concentration() {
        let chem = ChemicalReaction {
            pipe_order: 0.0,
            ..ChemicalReaction::default()
        };
        let model = ReactionModel::Chemical(chem);
        let mut p = pipe();
        p.bulk_coeff = 2.0;
        let a = model.pipe_react(&p, 0.0, 0.1, 60.0) - 0.1;
        let b = model.pipe_react(&p, 0.0, 5.0, 60.0) - 5.0;
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn age_grows_one_hour_per_hour() {
        let model = ReactionModel::Age;
        let c1 = model.pipe_react(&pipe(), 0.0, 0.0, 3600.0);
        assert!((c1 - L_PER_FT3).abs() < 1e-12);
        let c2 = model.tank_react(0.0, c1, 1800.0);
        assert!((c2 - 1.5 * L_PER_FT3).abs() < 1e-12);
    }

    #[test]
    fn trace_does_not_react() {
        let model = ReactionModel::Trace { node: 0 };
        assert_eq!(model.pipe_react(&pipe(), 0.0, 42.0, 3600.0), 42.0);
        assert!(!model.reacts_in_time());
    }

    #[test]
    fn mass_transfer_regimes_are_ordered() {
        let chem = ChemicalReaction::default();
        let mut p = pipe();
        p.wall_coeff = 1.0;
        let stagnant = chem.mass_transfer_coeff(&p, 1e-9);
        let laminar = chem.mass_transfer_coeff(&p, 0.005);
        let turbulent = chem.mass_transfer_coeff(&p, 5.0);
        assert!(stagnant > 0.0 && laminar > 0.0 && turbulent > 0.0);
        assert!(turbulent > laminar);
    }
}
