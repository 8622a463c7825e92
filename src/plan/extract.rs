//! Per-page extraction on a small worker pool.
//!
//! Each worker opens its own [`DocumentHandle`] and keeps it for its whole
//! lifetime; handles never cross worker boundaries. Every page is tried on the
//! full tier first and drops down the ladder (full, element-limited,
//! bounding-box only) when its budget runs out. Outcomes come back in page
//! order whatever order the workers finish in.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::confidence::{RunLog, Source, Stage};
use crate::io::extraction::{
    DocumentHandle, DocumentSource, ExtractionBudget, ExtractionInterrupted, ExtractionTier,
    PageExtraction,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Worker count, clamped to 1..=3.
    pub workers: usize,
    /// Deadline for one extraction attempt.
    pub timeout_ms: u64,
    /// Elements between deadline and memory checks.
    pub check_interval: usize,
    pub memory_limit_mb: Option<u64>,
    /// Element cap on the limited tier.
    pub limited_max_elements: usize,
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self {
            workers: 2,
            timeout_ms: 5_000,
            check_interval: 256,
            memory_limit_mb: Some(2048),
            limited_max_elements: 2_000,
        }
    }

    fn ladder(&self) -> [ExtractionTier; 3] {
        [
            ExtractionTier::Full,
            ExtractionTier::Limited {
                max_elements: self.limited_max_elements,
            },
            ExtractionTier::BoundingBoxOnly,
        ]
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What came out of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOutcome {
    pub page: usize,
    /// Tier that produced `extraction`, `None` if every tier ran out of budget.
    pub tier: Option<ExtractionTier>,
    pub attempts: usize,
    pub kind: PageKind,
    pub extraction: PageExtraction,
    #[serde(skip)]
    pub log: RunLog,
}

/// Drawing type of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageKind {
    FloorPlan,
    SitePlan,
    Elevation,
    Section,
    Schedule,
    Other,
}

impl PageKind {
    /// Classifies a sheet from its title text, falling back to its content.
    pub fn classify(page: &PageExtraction) -> Self {
        let text = page.all_text_upper();
        if text.contains("SITE PLAN") || text.contains("PLOT PLAN") {
            return PageKind::SitePlan;
        }
        if text.contains("FLOOR PLAN")
            || text.contains("BASEMENT PLAN")
            || text.contains("MAIN LEVEL")
            || text.contains("UPPER LEVEL")
        {
            return PageKind::FloorPlan;
        }
        if text.contains("ELEVATION") {
            return PageKind::Elevation;
        }
        if text.contains("SECTION") {
            return PageKind::Section;
        }
        if text.contains("SCHEDULE") && page.lines.len() + page.rectangles.len() < 20 {
            return PageKind::Schedule;
        }
        if page.rectangles.len() >= 4 || page.lines.len() >= 20 {
            return PageKind::FloorPlan;
        }
        PageKind::Other
    }

    pub fn is_plan(&self) -> bool {
        matches!(self, PageKind::FloorPlan)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageExtractor {
    pub config: ExtractionConfig,
}

impl PageExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extracts every page of the document at `path`.
    ///
    /// Only hard input errors (missing or corrupt file, failing pool) are
    /// returned as `Err`. Budget exhaustion degrades the page instead.
    pub fn extract_all(&self, source: &dyn DocumentSource, path: &Path) -> Result<Vec<PageOutcome>> {
        let page_count = source.open(path)?.page_count();
        if page_count == 0 {
            return Ok(Vec::new());
        }
        let workers = self.config.workers.clamp(1, 3).min(page_count);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("page-extract-{i}"))
            .build()
            .context("Failed to build extraction pool")?;

        let per_worker: Vec<Vec<PageOutcome>> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|worker| {
                    let mut handle = source.open(path)?;
                    let mut out = Vec::new();
                    for index in (worker..page_count).step_by(workers) {
                        out.push(self.extract_page(handle.as_mut(), index)?);
                    }
                    tracing::debug!(worker, pages = out.len(), "extraction worker done");
                    Ok(out)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut outcomes: Vec<PageOutcome> = per_worker.into_iter().flatten().collect();
        outcomes.sort_by_key(|o| o.page);
        tracing::info!(pages = outcomes.len(), workers, "document extracted");
        Ok(outcomes)
    }

    /// Walks the degradation ladder for one page.
    pub fn extract_page(&self, handle: &mut dyn DocumentHandle, index: usize) -> Result<PageOutcome> {
        let cfg = &self.config;
        let mut log = RunLog::new();
        let mut attempts = 0;
        for (step, tier) in cfg.ladder().into_iter().enumerate() {
            attempts += 1;
            let mut budget = ExtractionBudget::new(
                tier,
                Duration::from_millis(cfg.timeout_ms),
                cfg.check_interval,
                cfg.memory_limit_mb,
            );
            match handle.extract_page(index, &mut budget) {
                Ok(extraction) => {
                    let confidence = [1.0, 0.7, 0.4][step];
                    let source = if step == 0 { Source::Detected } else { Source::Inferred };
                    log.record(
                        Stage::Extraction,
                        &format!("page{index}.primitives"),
                        source,
                        confidence,
                        format!("{tier:?}, {} elements", extraction.element_count()),
                    );
                    let kind = PageKind::classify(&extraction);
                    return Ok(PageOutcome {
                        page: index,
                        tier: Some(tier),
                        attempts,
                        kind,
                        extraction,
                        log,
                    });
                }
                Err(e) => match e.downcast_ref::<ExtractionInterrupted>() {
                    Some(reason) => {
                        tracing::warn!(page = index, ?tier, %reason, "extraction degraded");
                        log.warning(
                            Stage::Extraction,
                            "extraction_degraded",
                            format!("page {index}: {reason} on {tier:?} tier"),
                        );
                    }
                    None => return Err(e),
                },
            }
        }

        log.warning(
            Stage::Extraction,
            "extraction_failed",
            format!("page {index}: no tier finished within budget"),
        );
        log.defaulted(Stage::Extraction, &format!("page{index}.primitives"), 0.1, "empty page");
        Ok(PageOutcome {
            page: index,
            tier: None,
            attempts,
            kind: PageKind::Other,
            extraction: PageExtraction {
                index,
                ..PageExtraction::default()
            },
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::geom::bboxes::BoundingBox;
    use crate::geom::point::Point;
    use crate::io::extraction::{
        DocumentExtraction, InMemoryDocumentSource, LinePrimitive, TextBlock,
    };

    fn page(title: &str, lines: usize) -> PageExtraction {
        PageExtraction {
            width_px: 1000.0,
            height_px: 800.0,
            lines: (0..lines)
                .map(|i| LinePrimitive::new(Point::new(0., i as f64), Point::new(100., i as f64)))
                .collect(),
            text_blocks: vec![TextBlock::new(
                title,
                BoundingBox::new(Point::new(10., 10.), Point::new(200., 30.)),
            )],
            ..PageExtraction::default()
        }
    }

    /// Runs out of budget on every tier richer than `works_on`.
    struct StubbornSource {
        pages: usize,
        works_on: usize,
    }

    struct StubbornHandle {
        pages: usize,
        works_on: usize,
    }

    impl DocumentSource for StubbornSource {
        fn open(&self, _path: &Path) -> Result<Box<dyn DocumentHandle>> {
            Ok(Box::new(StubbornHandle {
                pages: self.pages,
                works_on: self.works_on,
            }))
        }
    }

    impl DocumentHandle for StubbornHandle {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn extract_page(&mut self, index: usize, budget: &mut ExtractionBudget) -> Result<PageExtraction> {
            let rank = match budget.tier {
                ExtractionTier::Full => 0,
                ExtractionTier::Limited { .. } => 1,
                ExtractionTier::BoundingBoxOnly => 2,
            };
            if rank < self.works_on {
                return Err(ExtractionInterrupted::Deadline.into());
            }
            Ok(PageExtraction {
                index,
                tier: budget.tier,
                ..page("FLOOR PLAN", 3)
            })
        }
    }

    #[test]
    fn test_pages_come_back_in_order() {
        let doc = DocumentExtraction {
            pages: (0..7)
                .map(|i| {
                    let mut p = page("FIRST FLOOR PLAN", 5 + i);
                    p.index = i;
                    p
                })
                .collect(),
        };
        let source = InMemoryDocumentSource::new(doc);
        let extractor = PageExtractor::new(ExtractionConfig {
            workers: 3,
            ..ExtractionConfig::new()
        });
        let out = extractor.extract_all(&source, Path::new("mem.json")).unwrap();
        assert_eq!(out.len(), 7);
        for (i, o) in out.iter().enumerate() {
            assert_eq!(o.page, i);
            assert_eq!(o.extraction.lines.len(), 5 + i);
            assert_eq!(o.tier, Some(ExtractionTier::Full));
            assert_eq!(o.attempts, 1);
            assert_eq!(o.kind, PageKind::FloorPlan);
        }
    }

    #[test]
    fn test_ladder_degrades() {
        let extractor = PageExtractor::default();
        let source = StubbornSource { pages: 2, works_on: 1 };
        let out = extractor.extract_all(&source, Path::new("x")).unwrap();
        assert_eq!(out[1].attempts, 2);
        assert!(matches!(out[1].tier, Some(ExtractionTier::Limited { .. })));
        assert!(out[1].log.has_issue("extraction_degraded"));

        let source = StubbornSource { pages: 1, works_on: 3 };
        let out = extractor.extract_all(&source, Path::new("x")).unwrap();
        assert_eq!(out[0].tier, None);
        assert_eq!(out[0].attempts, 3);
        assert!(out[0].log.has_issue("extraction_failed"));
        assert!(out[0].extraction.lines.is_empty());
    }

    #[test]
    fn test_missing_file_is_hard_error() {
        let err = PageExtractor::default()
            .extract_all(
                &crate::io::JsonDocumentSource::new(),
                Path::new("/nonexistent/plan.json"),
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::FileMissing(_))
        ));
    }

    #[test]
    fn test_classify() {
        assert_eq!(PageKind::classify(&page("SITE PLAN", 50)), PageKind::SitePlan);
        assert_eq!(PageKind::classify(&page("FRONT ELEVATION", 50)), PageKind::Elevation);
        assert_eq!(PageKind::classify(&page("SECOND FLOOR PLAN", 0)), PageKind::FloorPlan);
        assert_eq!(PageKind::classify(&page("WINDOW SCHEDULE", 2)), PageKind::Schedule);
        assert_eq!(PageKind::classify(&page("GENERAL NOTES", 30)), PageKind::FloorPlan);
        assert_eq!(PageKind::classify(&page("GENERAL NOTES", 2)), PageKind::Other);
    }
}
