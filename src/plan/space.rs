//! Space Detector: rooms from text labels and rectangular vector paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::{RunLog, Source, Stage};
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::io::PageExtraction;
use crate::name::HasName;
use crate::plan::scale::ScaleResult;

pub mod detect;
pub mod validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomType {
    Bedroom,
    Bathroom,
    Kitchen,
    Living,
    Dining,
    Hallway,
    Storage,
    Garage,
    Other,
}

impl RoomType {
    pub fn is_conditioned(&self) -> bool {
        !matches!(self, RoomType::Garage)
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CeilingType {
    #[default]
    Flat,
    Vaulted,
    OpenToBelow,
}

/// Thermal condition on the other side of a floor or ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryCondition {
    Ground,
    Crawlspace,
    Attic,
    Garage,
    Conditioned,
    Unconditioned,
    Adiabatic,
    Exterior,
}

impl BoundaryCondition {
    /// True if heat flows through a surface facing this boundary.
    pub fn is_thermal(&self) -> bool {
        !matches!(self, BoundaryCondition::Conditioned | BoundaryCondition::Adiabatic)
    }
}

/// Why a room was classified the way it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Evidence {
    /// Room-name keyword in a text label.
    Label(String),
    /// Explicit area text such as "180 SQ FT".
    AreaText(String),
    /// Width x depth text such as "12'-0\" X 14'-0\"".
    DimensionText(String),
    /// Closed rectangular path, in ft².
    Rectangle(f64),
    /// No area found; typical size for the room type used.
    TypicalSize(f64),
    FloorFromPage(i32),
    FloorFromLabel(i32),
    CeilingFromLabel(String),
}

impl Evidence {
    /// Whether this evidence measured the room area rather than assumed it.
    pub fn is_measurement(&self) -> bool {
        matches!(
            self,
            Evidence::AreaText(_) | Evidence::DimensionText(_) | Evidence::Rectangle(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub room_type: RoomType,
    /// 0 = basement, 1 = first floor.
    pub floor_level: i32,
    pub area_ft2: f64,
    pub ceiling: CeilingType,
    /// Boundary below the floor, set by the boundary reasoner.
    pub floor_over: Option<BoundaryCondition>,
    /// Boundary above the ceiling, set by the boundary reasoner.
    pub ceiling_under: Option<BoundaryCondition>,
    pub is_over_garage: bool,
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
    /// Label or rectangle center in plan feet.
    pub centroid: Point,
    /// Measured outline in plan feet.
    pub footprint: Option<Polygon>,
    pub area_source: Source,
    pub page: usize,
}

impl Space {
    pub fn has_measured_area(&self) -> bool {
        self.evidence.iter().any(|e| e.is_measurement())
    }
}

impl HasName for Space {
    fn get_name(&self) -> &str {
        &self.name
    }
}

/// Size statistics and keywords for one room type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomProfile {
    pub room_type: RoomType,
    pub keywords: Vec<String>,
    pub typical_area_ft2: f64,
    pub min_area_ft2: f64,
    pub max_area_ft2: f64,
}

impl RoomProfile {
    fn new(room_type: RoomType, keywords: &[&str], typical: f64, min: f64, max: f64) -> Self {
        Self {
            room_type,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            typical_area_ft2: typical,
            min_area_ft2: min,
            max_area_ft2: max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub max_label_chars: usize,
    /// Profiles in match priority order (first match wins).
    pub profiles: Vec<RoomProfile>,
    /// Fragments that mark code or note text rather than room names. Matched
    /// against the upper-cased label with a leading space.
    pub denylist: Vec<String>,
    /// Relative slack on the plausible size range.
    pub size_tolerance: f64,
    pub geometry_area_band_ft2: (f64, f64),
    /// Geometry replaces text when it finds this much more area...
    pub geometry_area_advantage: f64,
    /// ...or this many more rooms.
    pub geometry_room_advantage: usize,
    pub duplicate_area_tolerance: f64,
    /// Radius around a label searched for its area text.
    pub area_search_radius_ft: f64,
}

impl SpaceConfig {
    pub fn new() -> Self {
        use RoomType::*;
        Self {
            max_label_chars: 50,
            profiles: vec![
                RoomProfile::new(Garage, &["GARAGE", "CARPORT"], 450.0, 180.0, 1200.0),
                RoomProfile::new(
                    Bathroom,
                    &["BATH", "BATHROOM", "BA", "POWDER", "WC", "LAV", "ENSUITE"],
                    60.0,
                    25.0,
                    200.0,
                ),
                RoomProfile::new(Kitchen, &["KITCHEN", "KIT"], 180.0, 60.0, 500.0),
                RoomProfile::new(
                    Storage,
                    &[
                        "CLOSET", "CLO", "CL", "WIC", "WALK IN", "STORAGE", "PANTRY", "LAUNDRY",
                        "UTILITY", "MECH", "LINEN",
                    ],
                    30.0,
                    8.0,
                    300.0,
                ),
                RoomProfile::new(
                    Dining,
                    &["DINING", "DINETTE", "NOOK", "BREAKFAST"],
                    180.0,
                    80.0,
                    500.0,
                ),
                RoomProfile::new(
                    Bedroom,
                    &["BEDROOM", "BDRM", "BED", "BR", "MASTER", "GUEST", "NURSERY"],
                    150.0,
                    80.0,
                    500.0,
                ),
                RoomProfile::new(
                    Living,
                    &[
                        "LIVING", "FAMILY", "GREAT ROOM", "DEN", "REC ROOM", "MEDIA", "OFFICE",
                        "STUDY", "BONUS", "LOFT", "SUNROOM",
                    ],
                    300.0,
                    120.0,
                    900.0,
                ),
                RoomProfile::new(
                    Hallway,
                    &[
                        "HALL", "HALLWAY", "CORRIDOR", "FOYER", "ENTRY", "STAIR", "STAIRS",
                        "LANDING", "GALLERY", "MUDROOM",
                    ],
                    60.0,
                    15.0,
                    400.0,
                ),
                RoomProfile::new(Other, &[], 120.0, 20.0, 1500.0),
            ],
            denylist: [
                "CODE", "SECTION", "IRC", "IBC", "ASHRAE", "SHALL", "REQUIRED", "MINIMUM",
                "MAXIMUM", "NOTE", "SEE ", "DETAIL", "SCHEDULE", "TYP", " R-", " U-", "SHEET",
                "SCALE", "ELEVATION", "INSULATION", "SMOKE", "DETECTOR", "EGRESS", "HEADER",
                "JOIST", "RAFTER", "TRUSS", "FOOTING", "CONCRETE", "PROVIDE", "INSTALL",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            size_tolerance: 0.2,
            geometry_area_band_ft2: (50.0, 1500.0),
            geometry_area_advantage: 1.2,
            geometry_room_advantage: 2,
            duplicate_area_tolerance: 0.10,
            area_search_radius_ft: 8.0,
        }
    }

    pub fn profile(&self, room_type: RoomType) -> Option<&RoomProfile> {
        self.profiles.iter().find(|p| p.room_type == room_type)
    }

    pub fn typical_area(&self, room_type: RoomType) -> f64 {
        self.profile(room_type)
            .map(|p| p.typical_area_ft2)
            .unwrap_or(120.0)
    }
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Detects rooms on one page.
#[derive(Debug, Clone, Default)]
pub struct SpaceDetector {
    pub config: SpaceConfig,
}

impl SpaceDetector {
    pub fn new(config: SpaceConfig) -> Self {
        Self { config }
    }

    /// Text and geometry detection, merged and validated.
    pub fn detect(&self, page: &PageExtraction, scale: &ScaleResult, log: &mut RunLog) -> Vec<Space> {
        let page_level = detect::page_floor_level(page);
        let text_rooms = detect::detect_from_text(page, scale, page_level, &self.config);
        let geo_rooms = detect::detect_from_geometry(page, scale, page_level, &self.config);
        let (rooms, geometry_won) = detect::merge(text_rooms, geo_rooms, &self.config);
        if geometry_won {
            log.info(
                Stage::Spaces,
                "geometry_rooms_preferred",
                format!("page {}: rectangle detection found materially more rooms or area", page.index),
            );
        }
        let rooms = validate::validate_spaces(rooms, &self.config, log);
        for r in &rooms {
            let note = format!("{} ({}) {:.0} ft²", r.id, r.room_type, r.area_ft2);
            log.record(Stage::Spaces, &format!("{}.area", r.id), r.area_source, r.confidence, note);
        }
        tracing::debug!(
            page = page.index,
            rooms = rooms.len(),
            level = page_level.unwrap_or(1),
            geometry_won,
            "spaces detected"
        );
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bboxes::BoundingBox;
    use crate::io::extraction::{RectPrimitive, TextBlock};
    use crate::plan::scale::ScaleMethod;

    pub(crate) fn scale48() -> ScaleResult {
        ScaleResult {
            pixels_per_foot: 48.0,
            method: ScaleMethod::TitleBlock,
            confidence: 0.98,
            corroborations: 1,
            needs_override: false,
            standard_scale: Some(48.0),
            estimates: vec![],
        }
    }

    pub(crate) fn label(text: &str, x: f64, y: f64) -> TextBlock {
        TextBlock::new(text, BoundingBox::new(Point::new(x, y), Point::new(x + 60.0, y + 12.0)))
    }

    #[test]
    fn test_detect_labeled_rooms() {
        let page = PageExtraction {
            index: 0,
            text_blocks: vec![
                label("FIRST FLOOR PLAN", 0.0, 2000.0),
                label("KITCHEN", 100.0, 100.0),
                label("12'-0\" X 14'-0\"", 100.0, 120.0),
                label("MASTER BEDROOM", 900.0, 100.0),
                label("ALL WORK SHALL COMPLY WITH IRC", 900.0, 1500.0),
            ],
            rectangles: vec![
                RectPrimitive::new(Point::new(0.0, 0.0), Point::new(1920.0, 1200.0)),
                RectPrimitive::new(Point::new(800.0, 0.0), Point::new(1376.0, 672.0)),
            ],
            ..PageExtraction::default()
        };
        let detector = SpaceDetector::default();
        let mut log = RunLog::new();
        let rooms = detector.detect(&page, &scale48(), &mut log);
        assert_eq!(rooms.len(), 2, "{rooms:?}");
        let kitchen = rooms.iter().find(|r| r.room_type == RoomType::Kitchen).unwrap();
        assert!((kitchen.area_ft2 - 168.0).abs() < 1e-9);
        assert_eq!(kitchen.floor_level, 1);
        assert_eq!(kitchen.id, "p0-r1");
        let bed = rooms.iter().find(|r| r.room_type == RoomType::Bedroom).unwrap();
        // 12 ft x 14 ft rectangle around the label
        assert!((bed.area_ft2 - 168.0).abs() < 1e-9);
        assert!(bed.footprint.is_some());
        assert_eq!(bed.area_source, Source::Detected);
    }
}
