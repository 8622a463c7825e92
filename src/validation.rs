//! Validation issues raised by the pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::provenance::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    /// Blocks the final output.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub stage: Stage,
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `room_overlap`.
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(stage: Stage, severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {:?}/{}: {}",
            self.severity, self.stage, self.code, self.message
        )
    }
}

/// Counts issues by severity.
pub fn count_by_severity(issues: &[ValidationIssue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}

pub fn has_critical(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Critical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let issues = vec![
            ValidationIssue::new(Stage::Spaces, Severity::Warning, "a", "x"),
            ValidationIssue::new(Stage::Spaces, Severity::Info, "b", "y"),
            ValidationIssue::new(Stage::RoomGraph, Severity::Warning, "c", "z"),
        ];
        assert_eq!(count_by_severity(&issues, Severity::Warning), 2);
        assert!(!has_critical(&issues));
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(
            issues[0].to_string(),
            "[Warning] Spaces/a: x"
        );
    }
}
