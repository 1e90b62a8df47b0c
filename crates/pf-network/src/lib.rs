//! pf-network: the data model of a pressurized pipe network.
//!
//! Contains the element types (nodes, links, patterns, curves, controls),
//! the analysis options, the network container with its name tables and
//! unit conversion, and semantic validation. Solvers in downstream crates
//! hold `&mut Network` and mutate only the computed-state fields.

pub mod control;
pub mod curve;
pub mod demand;
pub mod emitter;
pub mod junction;
pub mod link;
pub mod msglog;
pub mod network;
pub mod node;
pub mod options;
pub mod pattern;
pub mod pipe;
pub mod pump;
pub mod pumpcurve;
pub mod source;
pub mod tank;
pub mod validate;
pub mod valve;

pub use control::{Control, ControlAction, ControlKind, LevelKind};
pub use curve::{Curve, CurveKind};
pub use demand::Demand;
pub use emitter::Emitter;
pub use junction::Junction;
pub use link::{Link, LinkEvalContext, LinkKind, LinkStatus, LinkType};
pub use msglog::MsgLog;
pub use network::Network;
pub use node::{Node, NodeKind, NodeType, Reservoir};
pub use options::{
    DemandModelKind, IfUnbalanced, LeakageModelKind, Options, QualType, QualUnits, ReportedItems,
    StepSizing,
};
pub use pattern::{Pattern, PatternKind};
pub use pipe::Pipe;
pub use pump::Pump;
pub use pumpcurve::{PumpCurve, PumpCurveKind};
pub use source::{QualSource, SourceKind};
pub use tank::{MixingKind, Tank};
pub use validate::validate_network;
pub use valve::{Valve, ValveKind};
