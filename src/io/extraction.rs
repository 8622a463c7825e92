//! Raw text/vector extraction contract.
//!
//! A [`DocumentSource`] opens a document and hands back a [`DocumentHandle`].
//! Handles are deliberately not `Send`: each worker opens, uses and drops its
//! own handle, so nothing native crosses a thread boundary.
//!
//! [`JsonDocumentSource`] reads pre-extracted primitive dumps (the format the
//! upstream PDF extractor writes), which is also what the CLI and tests use.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::InputError;
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::segment::Segment;

/// Straight vector stroke, page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePrimitive {
    pub start: Point,
    pub end: Point,
    #[serde(default)]
    pub stroke_width: f64,
}

impl LinePrimitive {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            stroke_width: 1.0,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.start, self.end)
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }
}

/// Axis-aligned rectangle path, page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectPrimitive {
    pub min: Point,
    pub max: Point,
}

impl RectPrimitive {
    pub fn new(min: Point, max: Point) -> Self {
        let bb = BoundingBox::new(min, max);
        Self {
            min: bb.min,
            max: bb.max,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.min, self.max)
    }

    pub fn edges(&self) -> [Segment; 4] {
        let c = self.bbox().corners();
        [
            Segment::new(c[0], c[1]),
            Segment::new(c[1], c[2]),
            Segment::new(c[2], c[3]),
            Segment::new(c[3], c[0]),
        ]
    }
}

/// Circular arc, page pixels. Door swings are drawn as ~90° arcs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePrimitive {
    pub center: Point,
    pub radius: f64,
    #[serde(default)]
    pub start_angle_deg: f64,
    pub sweep_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextBlock {
    pub fn new(text: &str, bbox: BoundingBox) -> Self {
        Self {
            text: text.to_string(),
            bbox,
        }
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Dimension annotation: a length label and the two points it measures between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionLabel {
    pub text: String,
    pub anchor_a: Point,
    pub anchor_b: Point,
    /// Parsed value if the extractor already did it.
    #[serde(default)]
    pub value_ft: Option<f64>,
}

impl DimensionLabel {
    pub fn pixel_length(&self) -> f64 {
        self.anchor_a.distance(&self.anchor_b)
    }

    pub fn midpoint(&self) -> Point {
        self.anchor_a.midpoint(&self.anchor_b)
    }
}

/// One window or door schedule row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub mark: String,
    pub width_ft: f64,
    pub height_ft: f64,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Facing direction if the schedule states it (e.g. "S", "NE").
    #[serde(default)]
    pub orientation: Option<String>,
}

fn default_count() -> u32 {
    1
}

impl ScheduleEntry {
    pub fn total_area(&self) -> f64 {
        self.width_ft.max(0.0) * self.height_ft.max(0.0) * self.count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningSchedule {
    #[serde(default)]
    pub windows: Vec<ScheduleEntry>,
    #[serde(default)]
    pub doors: Vec<ScheduleEntry>,
}

impl OpeningSchedule {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.doors.is_empty()
    }
}

/// Degradation ladder tier used to extract a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionTier {
    #[default]
    Full,
    /// Keep at most this many vector elements (longest strokes first).
    Limited { max_elements: usize },
    /// Only the extents of the drawing survive, as a single rectangle.
    BoundingBoxOnly,
}

/// Everything the extractor found on one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub width_px: f64,
    #[serde(default)]
    pub height_px: f64,
    #[serde(default)]
    pub lines: Vec<LinePrimitive>,
    #[serde(default)]
    pub rectangles: Vec<RectPrimitive>,
    #[serde(default)]
    pub curves: Vec<CurvePrimitive>,
    #[serde(default)]
    pub text_blocks: Vec<TextBlock>,
    #[serde(default)]
    pub dimension_labels: Vec<DimensionLabel>,
    /// Clockwise angle from page-up to the drawn north arrow, if found.
    #[serde(default)]
    pub north_angle_deg: Option<f64>,
    #[serde(default)]
    pub schedule: Option<OpeningSchedule>,
    #[serde(default)]
    pub tier: ExtractionTier,
}

impl PageExtraction {
    pub fn element_count(&self) -> usize {
        self.lines.len()
            + self.rectangles.len()
            + self.curves.len()
            + self.text_blocks.len()
            + self.dimension_labels.len()
    }

    /// Concatenated page text, upper-cased, for keyword scans.
    pub fn all_text_upper(&self) -> String {
        self.text_blocks
            .iter()
            .map(|t| t.text.to_uppercase())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extents of all vector content.
    pub fn drawing_extents(&self) -> Option<BoundingBox> {
        let mut pts: Vec<Point> = Vec::new();
        for l in &self.lines {
            pts.push(l.start);
            pts.push(l.end);
        }
        for r in &self.rectangles {
            pts.push(r.min);
            pts.push(r.max);
        }
        BoundingBox::from_points(&pts)
    }
}

/// A whole extracted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtraction {
    #[serde(default)]
    pub pages: Vec<PageExtraction>,
}

/// Reason a cooperative extraction stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionInterrupted {
    #[error("extraction deadline exceeded")]
    Deadline,
    #[error("memory pressure above {limit_mb} MB")]
    MemoryPressure { limit_mb: u64 },
}

/// Cooperative cancellation state for one page extraction attempt.
///
/// Extractors call [`ExtractionBudget::tick`] once per element; every
/// `check_interval` ticks it checks the deadline and the process memory.
#[derive(Debug, Clone)]
pub struct ExtractionBudget {
    pub tier: ExtractionTier,
    deadline: Instant,
    check_interval: usize,
    memory_limit_mb: Option<u64>,
    iterations: usize,
}

impl ExtractionBudget {
    pub fn new(
        tier: ExtractionTier,
        timeout: Duration,
        check_interval: usize,
        memory_limit_mb: Option<u64>,
    ) -> Self {
        Self {
            tier,
            deadline: Instant::now() + timeout,
            check_interval: check_interval.max(1),
            memory_limit_mb,
            iterations: 0,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(
            ExtractionTier::Full,
            Duration::from_secs(3600),
            usize::MAX,
            None,
        )
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn tick(&mut self) -> std::result::Result<(), ExtractionInterrupted> {
        self.iterations += 1;
        if self.iterations % self.check_interval != 0 {
            return Ok(());
        }
        if Instant::now() >= self.deadline {
            return Err(ExtractionInterrupted::Deadline);
        }
        if let Some(limit_mb) = self.memory_limit_mb
            && let Some(rss) = resident_memory_mb()
            && rss > limit_mb
        {
            return Err(ExtractionInterrupted::MemoryPressure { limit_mb });
        }
        Ok(())
    }
}

/// Resident set size of this process in MB, where the platform exposes it.
pub fn resident_memory_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_mb(&status)
}

/// Reads the `VmRSS:` line of a `/proc/<pid>/status` dump. The kernel
/// reports it in kB regardless of page size.
fn parse_vm_rss_mb(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let kb: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(kb / 1024),
        Some(_) => None,
    }
}

/// Opens documents. Shared across workers, hence `Sync`.
pub trait DocumentSource: Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentHandle>>;
}

/// An open document. Owned by a single worker for its whole lifetime.
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Extracts one page under the given budget.
    ///
    /// Returns [`ExtractionInterrupted`] (inside the `anyhow::Error`) when the
    /// budget runs out, so the caller can retry on a cheaper tier.
    fn extract_page(&mut self, index: usize, budget: &mut ExtractionBudget)
    -> Result<PageExtraction>;
}

/// Reads JSON dumps of [`DocumentExtraction`].
#[derive(Debug, Clone, Default)]
pub struct JsonDocumentSource;

impl JsonDocumentSource {
    pub fn new() -> Self {
        Self
    }

    pub fn read(path: &Path) -> Result<DocumentExtraction> {
        if !path.exists() {
            return Err(InputError::FileMissing(path.to_path_buf()).into());
        }
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let doc: DocumentExtraction =
            serde_json::from_reader(reader).map_err(|e| InputError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(doc)
    }
}

impl DocumentSource for JsonDocumentSource {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentHandle>> {
        let doc = Self::read(path)?;
        Ok(Box::new(JsonDocumentHandle {
            path: path.to_path_buf(),
            doc,
            _not_send: std::marker::PhantomData,
        }))
    }
}

/// Serves an in-memory extraction, e.g. one built by a caller or a test.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentSource {
    pub doc: DocumentExtraction,
}

impl InMemoryDocumentSource {
    pub fn new(doc: DocumentExtraction) -> Self {
        Self { doc }
    }
}

impl DocumentSource for InMemoryDocumentSource {
    fn open(&self, path: &Path) -> Result<Box<dyn DocumentHandle>> {
        Ok(Box::new(JsonDocumentHandle {
            path: path.to_path_buf(),
            doc: self.doc.clone(),
            _not_send: std::marker::PhantomData,
        }))
    }
}

struct JsonDocumentHandle {
    path: PathBuf,
    doc: DocumentExtraction,
    // Keeps the handle !Send like a native document handle.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl DocumentHandle for JsonDocumentHandle {
    fn page_count(&self) -> usize {
        self.doc.pages.len()
    }

    fn extract_page(
        &mut self,
        index: usize,
        budget: &mut ExtractionBudget,
    ) -> Result<PageExtraction> {
        let page_count = self.doc.pages.len();
        let page = self
            .doc
            .pages
            .get(index)
            .ok_or(InputError::PageOutOfRange { index, page_count })?;

        let mut out = PageExtraction {
            index,
            width_px: page.width_px,
            height_px: page.height_px,
            north_angle_deg: page.north_angle_deg,
            schedule: page.schedule.clone(),
            tier: budget.tier,
            ..PageExtraction::default()
        };

        for t in &page.text_blocks {
            budget.tick()?;
            out.text_blocks.push(t.clone());
        }

        match budget.tier {
            ExtractionTier::Full => {
                for l in &page.lines {
                    budget.tick()?;
                    out.lines.push(*l);
                }
                for r in &page.rectangles {
                    budget.tick()?;
                    out.rectangles.push(*r);
                }
                for c in &page.curves {
                    budget.tick()?;
                    out.curves.push(*c);
                }
                for d in &page.dimension_labels {
                    budget.tick()?;
                    out.dimension_labels.push(d.clone());
                }
            }
            ExtractionTier::Limited { max_elements } => {
                let mut lines = page.lines.clone();
                lines.sort_by(|a, b| b.length().total_cmp(&a.length()));
                for l in lines.into_iter().take(max_elements) {
                    budget.tick()?;
                    out.lines.push(l);
                }
                let remaining = max_elements.saturating_sub(out.lines.len());
                for r in page.rectangles.iter().take(remaining) {
                    budget.tick()?;
                    out.rectangles.push(*r);
                }
                for d in page.dimension_labels.iter().take(max_elements) {
                    budget.tick()?;
                    out.dimension_labels.push(d.clone());
                }
            }
            ExtractionTier::BoundingBoxOnly => {
                if let Some(bb) = page.drawing_extents() {
                    out.rectangles.push(RectPrimitive::new(bb.min, bb.max));
                }
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            page = index,
            tier = ?budget.tier,
            elements = out.element_count(),
            "page extracted"
        );
        Ok(out)
    }
}
