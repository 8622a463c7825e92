//! Blueprint-to-load: HVAC design loads from extracted architectural drawings.
//!
//! Raw text and vector primitives from a plan set go in; a calibrated
//! heating/cooling load, equipment size and a confidence score with
//! uncertainty bands come out. See [`analysis::Analyzer`] for the pipeline.

pub mod analysis;
pub mod config;
pub mod confidence;
pub mod error;
pub mod geom;
pub mod io;
pub mod name;
pub mod plan;
pub mod sim;
pub mod uid;
pub mod validation;

// Prelude
pub use analysis::{AnalysisReport, Analyzer, ReportStatus, analyze};
pub use config::AnalysisConfig;
pub use error::InputError;
pub use io::UserInputs;
pub use uid::UID;
