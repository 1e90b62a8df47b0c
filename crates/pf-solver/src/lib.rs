//! pf-solver: the hydraulic solution machinery.
//!
//! Contains the sparse symmetric LDL' solver with minimum-degree
//! reordering, the hydraulic balance evaluator, and the GGA Newton solver
//! that couples them.

pub mod balance;
pub mod gga;
pub mod sparse;

pub use balance::HydBalance;
pub use gga::{GgaSolver, HydSolverStatus};
pub use sparse::SparseSolver;
