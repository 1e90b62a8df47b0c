//! pf-project: project I/O and the top-level driver.
//!
//! Couples the text input reader, the project writer, the binary output
//! file, and the report writer around the hydraulic and quality engines.

pub mod output;
pub mod parser;
pub mod project;
pub mod reader;
pub mod report;
pub mod summary;
pub mod writer;

pub use output::{OutputFile, OutputReader};
pub use project::Project;
pub use reader::{InputReader, Section};
pub use report::ReportWriter;
pub use summary::RunSummary;
pub use writer::write_project;
