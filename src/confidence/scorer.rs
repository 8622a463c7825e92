//! Confidence Scorer.
//!
//! Turns the provenance log into one overall confidence and asymmetric
//! uncertainty bands around the final loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::provenance::{RunLog, Source, Stage};
use crate::validation::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub stage_weights: Vec<(Stage, f64)>,
    /// Score of a stage that recorded nothing.
    pub empty_stage_score: f64,
    pub warning_penalty: f64,
    pub critical_penalty: f64,
    pub no_rooms_cap: f64,
    pub default_geometry_cap: f64,
    pub unresolved_scale_cap: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub low_threshold: f64,
    /// Relative band half-width at full confidence.
    pub band_base: f64,
    /// Additional relative width per unit of missing confidence.
    pub band_slope: f64,
    pub upper_skew: f64,
    pub lower_skew: f64,
    /// Below this relative width the band is reported as normal.
    pub normal_band_limit: f64,
    pub top_contributors: usize,
}

impl ConfidenceConfig {
    pub fn new() -> Self {
        Self {
            stage_weights: vec![
                (Stage::Scale, 0.15),
                (Stage::Geometry, 0.20),
                (Stage::Spaces, 0.15),
                (Stage::RoomGraph, 0.05),
                (Stage::Boundaries, 0.10),
                (Stage::Envelope, 0.15),
                (Stage::Loads, 0.20),
            ],
            empty_stage_score: 0.5,
            warning_penalty: 0.02,
            critical_penalty: 0.15,
            no_rooms_cap: 0.35,
            default_geometry_cap: 0.40,
            unresolved_scale_cap: 0.60,
            high_threshold: 0.75,
            medium_threshold: 0.5,
            low_threshold: 0.25,
            band_base: 0.08,
            band_slope: 0.5,
            upper_skew: 1.25,
            lower_skew: 0.8,
            normal_band_limit: 0.1,
            top_contributors: 3,
        }
    }

    pub fn weight(&self, stage: Stage) -> f64 {
        self.stage_weights
            .iter()
            .find(|(s, _)| *s == stage)
            .map_or(0.0, |(_, w)| *w)
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Failed,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    Normal,
    LogNormal,
}

/// What the pipeline could not establish, as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringFacts {
    pub rooms_detected: usize,
    pub default_geometry: bool,
    pub scale_resolved: bool,
}

/// One value that pulls the overall confidence down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub stage: Stage,
    pub field: String,
    pub source: Source,
    /// Share of the overall score lost to this value.
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub overall_confidence: f64,
    pub level: ConfidenceLevel,
    pub stage_scores: BTreeMap<Stage, f64>,
    pub issue_penalty: f64,
    pub caps_applied: Vec<String>,
    pub contributors: Vec<Contributor>,
    pub defaulted_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub nominal: f64,
    pub lower: f64,
    pub upper: f64,
    pub distribution: Distribution,
}

impl UncertaintyBand {
    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    pub config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    /// Mean effective confidence of a stage's records.
    pub fn stage_score(&self, log: &RunLog, stage: Stage) -> f64 {
        let (sum, n) = log
            .for_stage(stage)
            .fold((0.0, 0usize), |(s, n), r| (s + r.effective_confidence(), n + 1));
        if n == 0 {
            self.config.empty_stage_score
        } else {
            sum / n as f64
        }
    }

    pub fn level(&self, confidence: f64) -> ConfidenceLevel {
        let cfg = &self.config;
        if confidence >= cfg.high_threshold {
            ConfidenceLevel::High
        } else if confidence >= cfg.medium_threshold {
            ConfidenceLevel::Medium
        } else if confidence >= cfg.low_threshold {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Failed
        }
    }

    pub fn score(&self, log: &RunLog, facts: &ScoringFacts) -> ConfidenceScore {
        let cfg = &self.config;
        let mut stage_scores = BTreeMap::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for stage in Stage::SCORED {
            let w = cfg.weight(stage);
            let s = self.stage_score(log, stage);
            stage_scores.insert(stage, s);
            weighted += w * s;
            total_weight += w;
        }
        let base = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };

        let issue_penalty: f64 = log
            .issues
            .iter()
            .map(|i| match i.severity {
                Severity::Info => 0.0,
                Severity::Warning => cfg.warning_penalty,
                Severity::Critical => cfg.critical_penalty,
            })
            .sum();
        let mut overall = (base - issue_penalty).clamp(0.0, 1.0);

        let mut caps_applied = Vec::new();
        let caps = [
            (facts.rooms_detected == 0, cfg.no_rooms_cap, "no rooms detected"),
            (facts.default_geometry, cfg.default_geometry_cap, "default geometry"),
            (!facts.scale_resolved, cfg.unresolved_scale_cap, "scale unresolved"),
        ];
        for (applies, cap, reason) in caps {
            if applies && overall > cap {
                overall = cap;
                caps_applied.push(format!("{reason}: capped at {cap}"));
            }
        }

        let score = ConfidenceScore {
            overall_confidence: overall,
            level: self.level(overall),
            stage_scores,
            issue_penalty,
            caps_applied,
            contributors: self.contributors(log, total_weight),
            defaulted_fields: log.defaulted_fields(),
        };
        tracing::info!(
            overall = score.overall_confidence,
            level = ?score.level,
            penalty = score.issue_penalty,
            caps = score.caps_applied.len(),
            "confidence scored"
        );
        score
    }

    /// Records that cost the most confidence, largest first.
    fn contributors(&self, log: &RunLog, total_weight: f64) -> Vec<Contributor> {
        if total_weight <= 0.0 {
            return Vec::new();
        }
        let mut out: Vec<Contributor> = Vec::new();
        for stage in Stage::SCORED {
            let n = log.for_stage(stage).count();
            if n == 0 {
                continue;
            }
            let share = self.config.weight(stage) / total_weight / n as f64;
            for r in log.for_stage(stage) {
                let impact = share * (1.0 - r.effective_confidence());
                if impact > 0.0 {
                    out.push(Contributor {
                        stage,
                        field: r.field.clone(),
                        source: r.source,
                        impact,
                    });
                }
            }
        }
        out.sort_by(|a, b| {
            b.impact
                .total_cmp(&a.impact)
                .then_with(|| a.field.cmp(&b.field))
        });
        out.truncate(self.config.top_contributors);
        out
    }

    /// Band around `nominal`, wider above than below.
    pub fn band(&self, nominal: f64, confidence: f64) -> UncertaintyBand {
        let cfg = &self.config;
        let u = cfg.band_base + cfg.band_slope * (1.0 - confidence.clamp(0.0, 1.0));
        let distribution = if u < cfg.normal_band_limit {
            Distribution::Normal
        } else {
            Distribution::LogNormal
        };
        UncertaintyBand {
            nominal,
            lower: (nominal * (1.0 - cfg.lower_skew * u)).max(0.0),
            upper: nominal * (1.0 + cfg.upper_skew * u),
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ScoringFacts {
        ScoringFacts {
            rooms_detected: 6,
            default_geometry: false,
            scale_resolved: true,
        }
    }

    #[test]
    fn test_all_detected_is_high() {
        let mut log = RunLog::new();
        for stage in Stage::SCORED {
            log.detected(stage, "x", 0.9, "");
        }
        let score = ConfidenceScorer::default().score(&log, &resolved());
        assert!((score.overall_confidence - 0.9).abs() < 1e-9);
        assert_eq!(score.level, ConfidenceLevel::High);
        assert!(score.caps_applied.is_empty());
    }

    #[test]
    fn test_defaults_and_issues_lower_score() {
        let mut log = RunLog::new();
        for stage in Stage::SCORED {
            log.detected(stage, "x", 0.9, "");
        }
        let clean = ConfidenceScorer::default().score(&log, &resolved());
        log.defaulted(Stage::Envelope, "wall_r", 0.4, "quality default");
        log.warning(Stage::Spaces, "low_confidence_room", "Den");
        let degraded = ConfidenceScorer::default().score(&log, &resolved());
        assert!(degraded.overall_confidence < clean.overall_confidence);
        assert!((degraded.issue_penalty - 0.02).abs() < 1e-12);
        assert_eq!(degraded.contributors[0].field, "wall_r");
        assert_eq!(degraded.defaulted_fields, vec!["wall_r".to_string()]);
    }

    #[test]
    fn test_caps() {
        let mut log = RunLog::new();
        for stage in Stage::SCORED {
            log.user(stage, "x", "");
        }
        let scorer = ConfidenceScorer::default();
        let facts = ScoringFacts {
            rooms_detected: 0,
            default_geometry: true,
            scale_resolved: false,
        };
        let score = scorer.score(&log, &facts);
        assert!((score.overall_confidence - 0.35).abs() < 1e-12);
        assert_eq!(score.level, ConfidenceLevel::Low);

        let facts = ScoringFacts {
            scale_resolved: false,
            ..resolved()
        };
        assert!((scorer.score(&log, &facts).overall_confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_critical_issue_can_fail() {
        let mut log = RunLog::new();
        log.defaulted(Stage::Scale, "pixels_per_foot", 0.3, "");
        for _ in 0..3 {
            log.critical(Stage::RoomGraph, "room_overlap", "");
        }
        let score = ConfidenceScorer::default().score(&log, &resolved());
        assert_eq!(score.level, ConfidenceLevel::Failed);
    }

    #[test]
    fn test_band_is_asymmetric() {
        let scorer = ConfidenceScorer::default();
        let band = scorer.band(40_000.0, 0.6);
        let u = 0.08 + 0.5 * 0.4;
        assert!((band.upper - 40_000.0 * (1.0 + 1.25 * u)).abs() < 1e-6);
        assert!((band.lower - 40_000.0 * (1.0 - 0.8 * u)).abs() < 1e-6);
        assert!(band.upper - band.nominal > band.nominal - band.lower);
        assert_eq!(band.distribution, Distribution::LogNormal);
        assert!(band.contains(40_000.0));

        let tight = scorer.band(40_000.0, 1.0);
        assert_eq!(tight.distribution, Distribution::Normal);
        assert!(tight.upper - tight.lower < band.upper - band.lower);
    }
}
