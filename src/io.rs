//! Input contracts.
//!
//! The core never parses PDFs itself. Raw text/vector primitives arrive through
//! [`extraction::DocumentSource`]; foundation, mechanical and energy-spec
//! records come from their own extractors; user inputs come from the caller.

pub mod ancillary;
pub mod extraction;
pub mod inputs;

pub use ancillary::{AncillaryRecords, EnergySpecRecord, FoundationRecord, MechanicalRecord};
pub use extraction::{
    DocumentExtraction, DocumentHandle, DocumentSource, ExtractionBudget, ExtractionInterrupted,
    ExtractionTier, JsonDocumentSource, PageExtraction,
};
pub use inputs::UserInputs;
