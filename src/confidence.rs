//! Provenance tracking and confidence scoring.

pub mod provenance;
pub mod scorer;

pub use provenance::{ProvenanceRecord, RunLog, Source, Stage};
pub use scorer::{
    ConfidenceConfig, ConfidenceLevel, ConfidenceScore, ConfidenceScorer, Contributor, Distribution, ScoringFacts,
    UncertaintyBand,
};
