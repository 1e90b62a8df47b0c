//! pf-models: stateless constitutive models for the pipeflow engine.
//!
//! Every model is a small `Copy` value exposing pure functions that return a
//! quantity *and* its gradient with respect to the primary independent
//! variable, so Newton assembly costs O(1) per link or node. Models never
//! fail; they clamp at their domain boundaries instead.

pub mod demand;
pub mod energy;
pub mod headloss;
pub mod leakage;
pub mod reaction;

pub use demand::{DemandModel, JunctionDemand};
pub use energy::{speed_adjusted_efficiency, PumpEnergy};
pub use headloss::{add_cv_head_loss, closed_head_loss, HeadLossKind, HeadLossModel, PipeHydraulics};
pub use leakage::LeakageModel;
pub use reaction::{ChemicalReaction, PipeReaction, ReactionModel, C_TRACE};
