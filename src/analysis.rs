//! The analysis pipeline.
//!
//! [`Analyzer`] wires the stages together in a fixed order:
//! extraction, then per plan page scale, exterior geometry and rooms, then the
//! building-wide room graph, boundaries, envelope, loads and confidence. Each
//! stage returns a new value; the run log is the only thing threaded through.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::confidence::{
    ConfidenceScore, ConfidenceScorer, ProvenanceRecord, RunLog, ScoringFacts, Stage, UncertaintyBand,
};
use crate::config::AnalysisConfig;
use crate::io::ancillary::FoundationType;
use crate::io::extraction::{DocumentSource, ExtractionTier, JsonDocumentSource, OpeningSchedule};
use crate::io::inputs::UserInputs;
use crate::plan::extract::{PageExtractor, PageKind, PageOutcome};
use crate::plan::geometry::{ExteriorGeometry, GeometryContext, GeometryExtractor, GeometrySource};
use crate::plan::graph::{RoomAdjacencyGraph, RoomGraphValidator};
use crate::plan::scale::{ScaleResolver, ScaleResult};
use crate::plan::space::detect::page_floor_level;
use crate::plan::space::validate::validate_building;
use crate::plan::space::{Evidence, RoomType, Space, SpaceDetector};
use crate::sim::energy::climate::resolve_climate;
use crate::sim::energy::envelope::EnvelopeInputs;
use crate::sim::energy::{
    BoundaryReasoner, BuildingEnvelope, BuildingLoad, BuiltinClimateTable, ClimateData, ClimateLookup,
    LoadCalculationEngine, ThermalEnvelopeBuilder, ThermalZone,
};
use crate::uid::UID;
use crate::validation::{Severity, ValidationIssue, count_by_severity, has_critical};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Complete,
    /// Usable, but a person should confirm the scale or low-confidence inputs.
    NeedsReview,
    /// A critical issue was found; the loads must not be used.
    Blocked,
}

/// How one page went through extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub kind: PageKind,
    pub tier: Option<ExtractionTier>,
    pub attempts: usize,
    /// Floor level the page was read as, for plan pages.
    pub floor_level: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageScale {
    pub page: usize,
    pub floor_level: i32,
    pub result: ScaleResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportBands {
    pub design_heating_btuh: UncertaintyBand,
    pub design_cooling_btuh: UncertaintyBand,
    pub tonnage: UncertaintyBand,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: UID,
    pub status: ReportStatus,
    pub pages: Vec<PageSummary>,
    pub scale: Vec<PageScale>,
    pub geometry: BTreeMap<i32, ExteriorGeometry>,
    pub conditioned_area_ft2: f64,
    pub spaces: Vec<Space>,
    pub graph: RoomAdjacencyGraph,
    pub climate: ClimateData,
    pub envelope: BuildingEnvelope,
    pub zones: Vec<ThermalZone>,
    pub loads: BuildingLoad,
    pub confidence: ConfidenceScore,
    pub bands: ReportBands,
    pub issues: Vec<ValidationIssue>,
    pub provenance: Vec<ProvenanceRecord>,
}

impl AnalysisReport {
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn is_blocked(&self) -> bool {
        self.status == ReportStatus::Blocked
    }
}

/// Per-floor results of the page stages.
struct PlanReading {
    pages: Vec<PageSummary>,
    scales: Vec<PageScale>,
    geometry: BTreeMap<i32, ExteriorGeometry>,
    spaces: Vec<Space>,
}

pub struct Analyzer {
    pub config: AnalysisConfig,
    source: Box<dyn DocumentSource>,
    climate: Box<dyn ClimateLookup>,
    extractor: PageExtractor,
    scale: ScaleResolver,
    geometry: GeometryExtractor,
    spaces: SpaceDetector,
    graph: RoomGraphValidator,
    boundaries: BoundaryReasoner,
    envelope: ThermalEnvelopeBuilder,
    loads: LoadCalculationEngine,
    scorer: ConfidenceScorer,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, source: Box<dyn DocumentSource>, climate: Box<dyn ClimateLookup>) -> Self {
        Self {
            source,
            climate,
            extractor: PageExtractor::new(config.extraction.clone()),
            scale: ScaleResolver::new(config.scale.clone()),
            geometry: GeometryExtractor::new(config.geometry.clone()),
            spaces: SpaceDetector::new(config.spaces.clone()),
            graph: RoomGraphValidator::new(config.graph.clone()),
            boundaries: BoundaryReasoner::new(),
            envelope: ThermalEnvelopeBuilder::new(config.envelope.clone()),
            loads: LoadCalculationEngine::new(config.loads.clone()),
            scorer: ConfidenceScorer::new(config.confidence.clone()),
            config,
        }
    }

    /// JSON extraction dumps and the built-in climate table.
    pub fn with_defaults(config: AnalysisConfig) -> Self {
        Self::new(
            config,
            Box::new(JsonDocumentSource::new()),
            Box::new(BuiltinClimateTable::new()),
        )
    }

    /// Runs the whole pipeline on one document.
    ///
    /// Only hard input errors are returned as `Err`; everything else degrades
    /// and shows up in the report's issues and confidence.
    pub fn analyze(&self, path: &Path, zip: &str, inputs: &UserInputs) -> Result<AnalysisReport> {
        inputs.validate()?;
        let mut log = RunLog::new();

        let outcomes = self.extractor.extract_all(self.source.as_ref(), path)?;
        for o in &outcomes {
            log.merge(o.log.clone());
        }
        let reading = self.read_plans(&outcomes, inputs, &mut log);

        validate_building(&reading.spaces, &mut log);
        let footprints: BTreeMap<i32, f64> = reading
            .geometry
            .iter()
            .map(|(level, g)| (*level, g.floor_area_ft2))
            .collect();
        let graph = self.graph.validate(&reading.spaces, &footprints, &mut log);

        let (foundation, foundation_confidence) = match (inputs.foundation_type, &inputs.ancillary.foundation) {
            (Some(t), _) => (t, 1.0),
            (None, Some(r)) => (r.foundation_type, r.confidence),
            (None, None) => (FoundationType::Slab, 0.4),
        };
        let spaces = self.boundaries.assign(
            &reading.spaces,
            &graph,
            foundation,
            foundation_confidence,
            inputs,
            &mut log,
        );

        let conditioned_area_ft2 = self.conditioned_area(&reading.geometry, &spaces, inputs, &mut log);
        let notes = outcomes
            .iter()
            .map(|o| o.extraction.all_text_upper())
            .collect::<Vec<_>>()
            .join("\n");
        let (envelope, zones) = self.envelope.build(
            &EnvelopeInputs {
                floors: &reading.geometry,
                spaces: &spaces,
                ancillary: &inputs.ancillary,
                user: inputs,
                notes: &notes,
                conditioned_area_ft2,
            },
            &mut log,
        );

        let climate = resolve_climate(self.climate.as_ref(), zip, &mut log);
        let loads = self.loads.calculate(&envelope, &zones, &climate, inputs, &mut log);

        let facts = ScoringFacts {
            rooms_detected: spaces.len(),
            default_geometry: reading
                .geometry
                .values()
                .all(|g| g.source == GeometrySource::Default),
            scale_resolved: !reading.scales.is_empty()
                && reading
                    .scales
                    .iter()
                    .all(|s| s.result.is_resolved(&self.config.scale)),
        };
        let confidence = self.scorer.score(&log, &facts);
        let c = confidence.overall_confidence;
        let bands = ReportBands {
            design_heating_btuh: self.scorer.band(loads.design_heating_btuh, c),
            design_cooling_btuh: self.scorer.band(loads.design_cooling_btuh, c),
            tonnage: self.scorer.band(loads.tonnage.nominal_tons, c),
        };

        let status = if has_critical(&log.issues) {
            ReportStatus::Blocked
        } else if !facts.scale_resolved || confidence.overall_confidence < self.config.confidence.medium_threshold {
            ReportStatus::NeedsReview
        } else {
            ReportStatus::Complete
        };
        tracing::info!(
            ?status,
            heating = loads.design_heating_btuh,
            cooling = loads.design_cooling_btuh,
            confidence = c,
            warnings = count_by_severity(&log.issues, Severity::Warning),
            critical = count_by_severity(&log.issues, Severity::Critical),
            "analysis finished"
        );

        Ok(AnalysisReport {
            run_id: UID::new(),
            status,
            pages: reading.pages,
            scale: reading.scales,
            geometry: reading.geometry,
            conditioned_area_ft2,
            spaces,
            graph,
            climate,
            envelope,
            zones,
            loads,
            confidence,
            bands,
            issues: log.issues,
            provenance: log.provenance,
        })
    }

    /// Scale, exterior geometry and rooms for every plan page, in page order.
    fn read_plans(&self, outcomes: &[PageOutcome], inputs: &UserInputs, log: &mut RunLog) -> PlanReading {
        let mut plan_pages: Vec<&PageOutcome> = outcomes.iter().filter(|o| o.kind.is_plan()).collect();
        if plan_pages.is_empty() && !outcomes.is_empty() {
            log.info(
                Stage::Extraction,
                "no_floor_plan_pages",
                "no sheet looks like a floor plan; reading every page as one",
            );
            plan_pages = outcomes.iter().collect();
        }

        // Pages that name their floor keep it; the rest take the lowest free level from 1 up.
        let mut used: BTreeSet<i32> = plan_pages
            .iter()
            .filter_map(|o| page_floor_level(&o.extraction))
            .collect();
        let mut levels: BTreeMap<usize, (i32, bool)> = BTreeMap::new();
        for o in &plan_pages {
            let level = match page_floor_level(&o.extraction) {
                Some(l) => (l, true),
                None => {
                    let mut l = 1;
                    while used.contains(&l) {
                        l += 1;
                    }
                    used.insert(l);
                    (l, false)
                }
            };
            levels.insert(o.page, level);
        }

        let detected_floors = used.len();
        let floor_count = match inputs.floor_count {
            Some(n) => {
                log.user(Stage::Geometry, "floor_count", format!("{n} floors"));
                n as usize
            }
            None if detected_floors > 0 => {
                log.detected(Stage::Geometry, "floor_count", 0.8, format!("{detected_floors} plan levels"));
                detected_floors
            }
            None => {
                log.defaulted(Stage::Geometry, "floor_count", 0.3, "assumed one story");
                1
            }
        };
        let area_hint = inputs.conditioned_area_ft2.map(|a| a / floor_count.max(1) as f64);
        let building_schedule: Option<&OpeningSchedule> = outcomes
            .iter()
            .filter_map(|o| o.extraction.schedule.as_ref())
            .find(|s| !s.is_empty());
        let entry_level = levels
            .values()
            .map(|(l, _)| *l)
            .filter(|l| *l >= 1)
            .min()
            .or_else(|| levels.values().map(|(l, _)| *l).min())
            .unwrap_or(1);

        let mut reading = PlanReading {
            pages: Vec::with_capacity(outcomes.len()),
            scales: Vec::new(),
            geometry: BTreeMap::new(),
            spaces: Vec::new(),
        };
        for o in outcomes {
            reading.pages.push(PageSummary {
                page: o.page,
                kind: o.kind,
                tier: o.tier,
                attempts: o.attempts,
                floor_level: levels.get(&o.page).map(|(l, _)| *l),
            });
        }

        for o in plan_pages {
            let Some(&(level, from_page)) = levels.get(&o.page) else {
                continue;
            };
            let page = &o.extraction;
            let scale = self
                .scale
                .detect_scale(page, inputs.scale_override_px_per_ft, log);

            let (schedule, schedule_share) = match page.schedule.as_ref().filter(|s| !s.is_empty()) {
                Some(s) => (Some(s), 1.0),
                None => (building_schedule, 1.0 / floor_count.max(1) as f64),
            };
            let ctx = GeometryContext {
                north_angle_deg: inputs.north_angle_deg.or(page.north_angle_deg).unwrap_or(0.0),
                wall_height_ft: inputs.ceiling_height_ft,
                floor_area_hint_ft2: area_hint,
                schedule,
                schedule_share,
                is_entry_level: level == entry_level,
            };
            let geometry = self.geometry.extract(page, &scale, &ctx, log);

            let mut rooms = self.spaces.detect(page, &scale, log);
            if !from_page {
                for r in &mut rooms {
                    let from_label = r.evidence.iter().any(|e| matches!(e, Evidence::FloorFromLabel(_)));
                    if !from_label {
                        r.floor_level = level;
                    }
                }
            }
            tracing::debug!(page = o.page, level, rooms = rooms.len(), "plan page read");

            if reading.geometry.contains_key(&level) {
                log.info(
                    Stage::Geometry,
                    "duplicate_floor_page",
                    format!("page {} repeats floor {level}; keeping the first outline", o.page),
                );
            } else {
                reading.geometry.insert(level, geometry);
            }
            reading.scales.push(PageScale {
                page: o.page,
                floor_level: level,
                result: scale,
            });
            reading.spaces.extend(rooms);
        }

        self.reconcile_floor_count(&mut reading, floor_count, area_hint, building_schedule, log);
        reading
    }

    /// Adds default outlines for floors that were declared but not drawn, and
    /// drops drawn floors beyond the declared count.
    fn reconcile_floor_count(
        &self,
        reading: &mut PlanReading,
        floor_count: usize,
        area_hint: Option<f64>,
        schedule: Option<&OpeningSchedule>,
        log: &mut RunLog,
    ) {
        while reading.geometry.len() > floor_count {
            let Some((&top, _)) = reading.geometry.iter().next_back() else {
                break;
            };
            reading.geometry.remove(&top);
            log.warning(
                Stage::Geometry,
                "floor_page_ignored",
                format!("floor {top} is beyond the declared {floor_count} floors"),
            );
        }
        let template_area = area_hint.or_else(|| reading.geometry.values().next().map(|g| g.floor_area_ft2));
        let mut level = 1;
        while reading.geometry.len() < floor_count {
            if !reading.geometry.contains_key(&level) {
                let ctx = GeometryContext {
                    north_angle_deg: 0.0,
                    wall_height_ft: None,
                    floor_area_hint_ft2: template_area,
                    schedule,
                    schedule_share: 1.0 / floor_count.max(1) as f64,
                    is_entry_level: reading.geometry.is_empty(),
                };
                let reason = format!("floor {level} has no plan page");
                let g = self.geometry.default_envelope(&ctx, log, &reason);
                reading.geometry.insert(level, g);
            }
            level += 1;
        }
    }

    /// User input, then measured geometry, then the sum of rooms, then the
    /// default outlines.
    fn conditioned_area(
        &self,
        geometry: &BTreeMap<i32, ExteriorGeometry>,
        spaces: &[Space],
        inputs: &UserInputs,
        log: &mut RunLog,
    ) -> f64 {
        if let Some(a) = inputs.conditioned_area_ft2 {
            log.user(Stage::Geometry, "conditioned_area", format!("{a:.0} ft²"));
            return a;
        }
        let garage: f64 = spaces
            .iter()
            .filter(|s| s.room_type == RoomType::Garage)
            .map(|s| s.area_ft2)
            .sum();
        let measured = !geometry.is_empty() && geometry.values().all(|g| g.source != GeometrySource::Default);
        if measured {
            let gross: f64 = geometry.values().map(|g| g.floor_area_ft2).sum();
            let area = (gross - garage).max(gross * 0.2);
            let confidence = geometry.values().map(|g| g.confidence).sum::<f64>() / geometry.len() as f64;
            log.detected(
                Stage::Geometry,
                "conditioned_area",
                confidence,
                format!("{area:.0} ft² from exterior outlines"),
            );
            return area;
        }
        let rooms: f64 = spaces
            .iter()
            .filter(|s| s.room_type.is_conditioned())
            .map(|s| s.area_ft2)
            .sum();
        if rooms > 0.0 {
            log.inferred(Stage::Geometry, "conditioned_area", 0.6, format!("{rooms:.0} ft² from rooms"));
            return rooms;
        }
        let area: f64 = geometry.values().map(|g| g.floor_area_ft2).sum();
        let area = if area > 0.0 {
            area
        } else {
            self.config.geometry.default_floor_area_ft2
        };
        log.defaulted(Stage::Geometry, "conditioned_area", 0.3, format!("{area:.0} ft² default outline"));
        area
    }
}

/// Analyzes a JSON extraction dump with default calibration and the built-in
/// climate table.
pub fn analyze(path: &Path, zip: &str, inputs: &UserInputs) -> Result<AnalysisReport> {
    Analyzer::with_defaults(AnalysisConfig::default()).analyze(path, zip, inputs)
}
