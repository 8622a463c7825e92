//! Scale Resolver: pixels-per-foot from title blocks, dimensions, doors and grids.
//!
//! Estimates from all methods are consolidated by snapping each one to the
//! nearest standard architectural scale and voting. An explicit title-block
//! notation is taken at face value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::{RunLog, Stage};
use crate::io::PageExtraction;

pub mod methods;

/// Paper inches per real foot of the nine standard architectural scales,
/// from 1" = 1'-0" down to 1/16" = 1'-0".
pub const STANDARD_SCALE_INCHES: [f64; 9] =
    [1.0, 0.75, 0.5, 0.375, 0.25, 0.1875, 0.125, 0.09375, 0.0625];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleMethod {
    UserOverride,
    TitleBlock,
    DimensionRansac,
    KnownObject,
    GridSpacing,
    Default,
}

impl fmt::Display for ScaleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One hypothesis from one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleEstimate {
    pub pixels_per_foot: f64,
    pub method: ScaleMethod,
    pub confidence: f64,
    pub evidence: String,
}

impl ScaleEstimate {
    pub fn new(pixels_per_foot: f64, method: ScaleMethod, confidence: f64, evidence: &str) -> Self {
        Self {
            pixels_per_foot,
            method,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: evidence.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleResult {
    pub pixels_per_foot: f64,
    pub method: ScaleMethod,
    pub confidence: f64,
    /// Number of independent estimates agreeing with the chosen value.
    pub corroborations: usize,
    pub needs_override: bool,
    /// Nearest standard scale in px/ft, if the value is close to one.
    pub standard_scale: Option<f64>,
    pub estimates: Vec<ScaleEstimate>,
}

impl ScaleResult {
    /// Resolved results can be used without asking the user.
    ///
    /// A user override is always resolved; anything detected needs at least
    /// `min_corroborations` agreeing estimates and `resolved_confidence`.
    pub fn is_resolved(&self, cfg: &ScaleConfig) -> bool {
        if self.method == ScaleMethod::UserOverride {
            return true;
        }
        !self.needs_override
            && self.corroborations >= cfg.min_corroborations
            && self.confidence >= cfg.resolved_confidence
    }

    pub fn feet(&self, pixels: f64) -> f64 {
        if self.pixels_per_foot > 0.0 {
            pixels / self.pixels_per_foot
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Raster resolution the extractor reports coordinates in.
    pub render_dpi: f64,
    /// A title-block estimate at or above this is taken as-is.
    pub explicit_accept_confidence: f64,
    /// Relative distance for two scales to count as agreeing.
    pub agreement_tolerance: f64,
    pub min_corroborations: usize,
    pub resolved_confidence: f64,
    pub default_pixels_per_foot: f64,
    pub default_confidence: f64,
    pub ransac_iterations: usize,
    pub ransac_inlier_tolerance: f64,
    pub ransac_min_inliers: usize,
    pub ransac_seed: u64,
    /// Fraction trimmed from each end when refining the inlier mean.
    pub trim_fraction: f64,
    pub door_width_ft: (f64, f64),
    pub door_sweep_deg: (f64, f64),
    pub hallway_width_ft: (f64, f64),
    pub min_grid_lines: usize,
    /// Max coefficient of variation for grid spacings to count as regular.
    pub grid_regularity: f64,
    pub bay_sizes_ft: Vec<f64>,
}

impl ScaleConfig {
    pub fn new() -> Self {
        Self {
            render_dpi: 192.0,
            explicit_accept_confidence: 0.95,
            agreement_tolerance: 0.05,
            min_corroborations: 2,
            resolved_confidence: 0.6,
            default_pixels_per_foot: 48.0,
            default_confidence: 0.3,
            ransac_iterations: 200,
            ransac_inlier_tolerance: 0.05,
            ransac_min_inliers: 2,
            ransac_seed: 0x5ca1e,
            trim_fraction: 0.1,
            door_width_ft: (2.5, 3.0),
            door_sweep_deg: (75.0, 105.0),
            hallway_width_ft: (3.0, 4.5),
            min_grid_lines: 4,
            grid_regularity: 0.05,
            bay_sizes_ft: vec![10.0, 12.0, 14.0, 15.0, 16.0, 20.0, 24.0, 25.0, 30.0],
        }
    }

    /// Standard scales in px/ft at the configured resolution.
    pub fn standard_scales(&self) -> Vec<f64> {
        STANDARD_SCALE_INCHES
            .iter()
            .map(|inch| inch * self.render_dpi)
            .collect()
    }

    /// Nearest standard scale and its relative distance.
    pub fn nearest_standard(&self, pixels_per_foot: f64) -> (f64, f64) {
        let mut best = (self.default_pixels_per_foot, f64::MAX);
        for s in self.standard_scales() {
            let rel = relative_difference(pixels_per_foot, s);
            if rel < best.1 {
                best = (s, rel);
            }
        }
        best
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// |a - b| relative to b.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    if b.abs() < f64::EPSILON {
        return f64::MAX;
    }
    ((a - b) / b).abs()
}

/// Resolves the drawing scale of one page.
#[derive(Debug, Clone, Default)]
pub struct ScaleResolver {
    pub config: ScaleConfig,
}

impl ScaleResolver {
    pub fn new(config: ScaleConfig) -> Self {
        Self { config }
    }

    /// Runs every method on the page and returns a consolidated result.
    ///
    /// A user override short-circuits detection.
    pub fn detect_scale(
        &self,
        page: &PageExtraction,
        user_override: Option<f64>,
        log: &mut RunLog,
    ) -> ScaleResult {
        if let Some(ppf) = user_override
            && ppf > 0.0
        {
            log.user(Stage::Scale, "pixels_per_foot", "user override");
            let (standard, rel) = self.config.nearest_standard(ppf);
            return ScaleResult {
                pixels_per_foot: ppf,
                method: ScaleMethod::UserOverride,
                confidence: 1.0,
                corroborations: 1,
                needs_override: false,
                standard_scale: (rel <= self.config.agreement_tolerance).then_some(standard),
                estimates: vec![ScaleEstimate::new(
                    ppf,
                    ScaleMethod::UserOverride,
                    1.0,
                    "user override",
                )],
            };
        }

        let cfg = &self.config;
        let title = methods::title_block_estimates(page, cfg);
        let mut estimates: Vec<ScaleEstimate> = Vec::new();
        if let Some(best) = methods::best_title_block(&title) {
            estimates.push(best);
        }
        estimates.extend(methods::dimension_ransac(page, cfg));
        estimates.extend(methods::known_objects(page, cfg));
        estimates.extend(methods::grid_spacing(page, cfg));

        for e in &estimates {
            tracing::debug!(
                page = page.index,
                method = %e.method,
                px_per_ft = e.pixels_per_foot,
                confidence = e.confidence,
                "scale estimate"
            );
        }

        let result = self.resolve(estimates);
        self.record(&result, page.index, log);
        result
    }

    /// Chooses a scale from a set of estimates.
    ///
    /// An explicit title-block notation at or above the acceptance confidence
    /// wins outright; otherwise estimates are consolidated by vote.
    pub fn resolve(&self, estimates: Vec<ScaleEstimate>) -> ScaleResult {
        let cfg = &self.config;
        let explicit = estimates
            .iter()
            .filter(|e| {
                e.method == ScaleMethod::TitleBlock
                    && e.confidence >= cfg.explicit_accept_confidence
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .cloned();

        if let Some(title) = explicit {
            let agreeing = estimates
                .iter()
                .filter(|e| e.method != ScaleMethod::TitleBlock)
                .filter(|e| {
                    relative_difference(e.pixels_per_foot, title.pixels_per_foot)
                        <= cfg.agreement_tolerance
                })
                .count();
            let (standard, rel) = cfg.nearest_standard(title.pixels_per_foot);
            let corroborations = 1 + agreeing;
            return ScaleResult {
                pixels_per_foot: title.pixels_per_foot,
                method: ScaleMethod::TitleBlock,
                confidence: title.confidence,
                corroborations,
                needs_override: corroborations < cfg.min_corroborations,
                standard_scale: (rel <= cfg.agreement_tolerance).then_some(standard),
                estimates,
            };
        }

        self.consolidate(estimates)
    }

    /// Groups estimates by nearest standard scale and picks the best group.
    ///
    /// The group with the most members wins; ties go to the larger summed
    /// confidence. Estimates far from every standard scale group among
    /// themselves.
    pub fn consolidate(&self, estimates: Vec<ScaleEstimate>) -> ScaleResult {
        let cfg = &self.config;
        let mut groups: Vec<ScaleGroup> = Vec::new();
        for (i, e) in estimates.iter().enumerate() {
            if e.pixels_per_foot <= 0.0 || !e.pixels_per_foot.is_finite() {
                continue;
            }
            let (standard, rel) = cfg.nearest_standard(e.pixels_per_foot);
            let key = if rel <= cfg.agreement_tolerance {
                Some(standard)
            } else {
                None
            };
            let existing = groups.iter_mut().find(|g| match (g.standard, key) {
                (Some(a), Some(b)) => (a - b).abs() < 1e-9,
                (None, None) => {
                    relative_difference(e.pixels_per_foot, g.anchor) <= cfg.agreement_tolerance
                }
                _ => false,
            });
            match existing {
                Some(g) => g.members.push(i),
                None => groups.push(ScaleGroup {
                    standard: key,
                    anchor: e.pixels_per_foot,
                    members: vec![i],
                }),
            }
        }

        let summed = |g: &ScaleGroup| -> f64 {
            g.members.iter().map(|&i| estimates[i].confidence).sum()
        };
        let winner = groups.iter().max_by(|a, b| {
            a.members
                .len()
                .cmp(&b.members.len())
                .then(summed(a).total_cmp(&summed(b)))
        });

        let Some(winner) = winner else {
            return self.default_result(estimates, "no scale cues found");
        };

        let n = winner.members.len();
        let weight: f64 = summed(winner);
        let value = if weight > 0.0 {
            winner
                .members
                .iter()
                .map(|&i| estimates[i].pixels_per_foot * estimates[i].confidence)
                .sum::<f64>()
                / weight
        } else {
            winner.anchor
        };
        let mean_conf = weight / n as f64;
        let confidence = (mean_conf + 0.05 * (n as f64 - 1.0)).min(0.99);
        let method = winner
            .members
            .iter()
            .map(|&i| &estimates[i])
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|e| e.method)
            .unwrap_or(ScaleMethod::Default);

        if n < cfg.min_corroborations {
            let reason = format!("only {n} estimate(s) support {value:.1} px/ft");
            return self.default_result(estimates, &reason);
        }

        ScaleResult {
            pixels_per_foot: value,
            method,
            confidence,
            corroborations: n,
            needs_override: confidence < cfg.resolved_confidence,
            standard_scale: winner.standard,
            estimates,
        }
    }

    fn default_result(&self, estimates: Vec<ScaleEstimate>, reason: &str) -> ScaleResult {
        tracing::info!(reason, "falling back to default scale");
        let cfg = &self.config;
        ScaleResult {
            pixels_per_foot: cfg.default_pixels_per_foot,
            method: ScaleMethod::Default,
            confidence: cfg.default_confidence.min(0.3),
            corroborations: estimates
                .iter()
                .filter(|e| {
                    relative_difference(e.pixels_per_foot, cfg.default_pixels_per_foot)
                        <= cfg.agreement_tolerance
                })
                .count(),
            needs_override: true,
            standard_scale: Some(cfg.default_pixels_per_foot),
            estimates,
        }
    }

    fn record(&self, result: &ScaleResult, page: usize, log: &mut RunLog) {
        let note = format!(
            "page {page}: {:.2} px/ft via {} ({} corroborating)",
            result.pixels_per_foot, result.method, result.corroborations
        );
        if result.method == ScaleMethod::Default {
            log.defaulted(Stage::Scale, "pixels_per_foot", result.confidence, note);
            log.warning(
                Stage::Scale,
                "scale_unresolved",
                format!("page {page}: scale could not be determined, assuming 1/4\" = 1'-0\"; please confirm"),
            );
        } else {
            log.detected(Stage::Scale, "pixels_per_foot", result.confidence, note);
            if result.needs_override && result.corroborations < self.config.min_corroborations {
                log.warning(
                    Stage::Scale,
                    "scale_uncorroborated",
                    format!(
                        "page {page}: scale {:.1} px/ft rests on a single cue; please confirm",
                        result.pixels_per_foot
                    ),
                );
            } else if result.needs_override {
                log.warning(
                    Stage::Scale,
                    "scale_low_confidence",
                    format!(
                        "page {page}: scale {:.1} px/ft has low confidence {:.2}",
                        result.pixels_per_foot, result.confidence
                    ),
                );
            }
        }
    }
}

#[derive(Debug)]
struct ScaleGroup {
    standard: Option<f64>,
    anchor: f64,
    members: Vec<usize>,
}
