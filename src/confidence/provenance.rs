//! Where every value came from.
//!
//! Each stage records whether a value was detected on the drawing, supplied by
//! the user, inferred from other values, or filled in from a default. The
//! confidence scorer works off this log rather than guessing.

use serde::{Deserialize, Serialize};

use crate::validation::{Severity, ValidationIssue};

/// Pipeline stage that produced a record or issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extraction,
    Scale,
    Geometry,
    Spaces,
    RoomGraph,
    Boundaries,
    Envelope,
    Loads,
}

impl Stage {
    pub const SCORED: [Stage; 7] = [
        Stage::Scale,
        Stage::Geometry,
        Stage::Spaces,
        Stage::RoomGraph,
        Stage::Boundaries,
        Stage::Envelope,
        Stage::Loads,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    UserProvided,
    Detected,
    Inferred,
    Defaulted,
}

impl Source {
    /// How much a value of this origin is trusted relative to a measurement.
    pub fn reliability(&self) -> f64 {
        match self {
            Source::UserProvided => 1.0,
            Source::Detected => 1.0,
            Source::Inferred => 0.75,
            Source::Defaulted => 0.45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub stage: Stage,
    pub field: String,
    pub source: Source,
    /// Confidence of the value itself in [0, 1].
    pub confidence: f64,
    pub note: String,
}

impl ProvenanceRecord {
    /// Confidence discounted by how the value was obtained.
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0) * self.source.reliability()
    }
}

/// Per-run accumulator of provenance records and validation issues.
///
/// Page workers each own one and the orchestrator merges them in page order,
/// so no state is shared across threads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub provenance: Vec<ProvenanceRecord>,
    pub issues: Vec<ValidationIssue>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        stage: Stage,
        field: &str,
        source: Source,
        confidence: f64,
        note: impl Into<String>,
    ) {
        self.provenance.push(ProvenanceRecord {
            stage,
            field: field.to_string(),
            source,
            confidence: confidence.clamp(0.0, 1.0),
            note: note.into(),
        });
    }

    pub fn detected(&mut self, stage: Stage, field: &str, confidence: f64, note: impl Into<String>) {
        self.record(stage, field, Source::Detected, confidence, note);
    }

    pub fn inferred(&mut self, stage: Stage, field: &str, confidence: f64, note: impl Into<String>) {
        self.record(stage, field, Source::Inferred, confidence, note);
    }

    pub fn defaulted(&mut self, stage: Stage, field: &str, confidence: f64, note: impl Into<String>) {
        self.record(stage, field, Source::Defaulted, confidence, note);
    }

    pub fn user(&mut self, stage: Stage, field: &str, note: impl Into<String>) {
        self.record(stage, field, Source::UserProvided, 1.0, note);
    }

    pub fn issue(&mut self, stage: Stage, severity: Severity, code: &str, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(stage, severity, code, message));
    }

    pub fn info(&mut self, stage: Stage, code: &str, message: impl Into<String>) {
        self.issue(stage, Severity::Info, code, message);
    }

    pub fn warning(&mut self, stage: Stage, code: &str, message: impl Into<String>) {
        self.issue(stage, Severity::Warning, code, message);
    }

    pub fn critical(&mut self, stage: Stage, code: &str, message: impl Into<String>) {
        self.issue(stage, Severity::Critical, code, message);
    }

    pub fn merge(&mut self, other: RunLog) {
        self.provenance.extend(other.provenance);
        self.issues.extend(other.issues);
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &ProvenanceRecord> {
        self.provenance.iter().filter(move |r| r.stage == stage)
    }

    /// Fields filled in from defaults, in record order, without duplicates.
    pub fn defaulted_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.provenance {
            if r.source == Source::Defaulted && !out.contains(&r.field) {
                out.push(r.field.clone());
            }
        }
        out
    }

    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_confidence() {
        let mut log = RunLog::new();
        log.detected(Stage::Scale, "pixels_per_foot", 0.9, "title block");
        log.defaulted(Stage::Envelope, "wall_r", 0.8, "era default");
        let recs = &log.provenance;
        assert!((recs[0].effective_confidence() - 0.9).abs() < 1e-12);
        assert!((recs[1].effective_confidence() - 0.36).abs() < 1e-12);
        assert_eq!(log.defaulted_fields(), vec!["wall_r".to_string()]);
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut a = RunLog::new();
        a.warning(Stage::Spaces, "first", "a");
        let mut b = RunLog::new();
        b.warning(Stage::Spaces, "second", "b");
        b.user(Stage::Loads, "ach50", "blower door");
        a.merge(b);
        assert_eq!(a.issues.len(), 2);
        assert_eq!(a.issues[1].code, "second");
        assert!(a.has_issue("first"));
        assert_eq!(a.for_stage(Stage::Loads).count(), 1);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut log = RunLog::new();
        log.detected(Stage::Scale, "x", 1.7, "");
        assert!((log.provenance[0].confidence - 1.0).abs() < 1e-12);
    }
}
