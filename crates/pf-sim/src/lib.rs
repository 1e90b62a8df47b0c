//! pf-sim: the simulation engines.
//!
//! The hydraulic engine advances an extended-period run event by event
//! around the GGA solver; the quality engine transports a constituent
//! through each solved flow field using pooled volume segments and tank
//! mixing models.

pub mod hydraulics;
pub mod mixing;
pub mod quality;
pub mod segment;

pub use hydraulics::HydEngine;
pub use mixing::TankMixState;
pub use quality::{QualBalance, QualEngine};
pub use segment::{SegId, SegPool, Segment};
