//! pf-core: stable foundation for the pipeflow engine.
//!
//! Contains:
//! - error (numbered error taxonomy shared by every crate)
//! - constants (physical constants, unit factors, solver guards)
//! - units (user <-> internal unit conversion tables)
//! - ids (stable compact IDs for network objects)
//! - clock (simulation time parsing and formatting)

pub mod clock;
pub mod constants;
pub mod error;
pub mod ids;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{EngineError, EngineResult, FileError, InputError, NetworkError, SystemError};
pub use ids::*;
pub use units::{FlowUnits, PressureUnits, Quantity, UnitSystem, Units};
