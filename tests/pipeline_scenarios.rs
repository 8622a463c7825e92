//! End-to-end runs of the analyzer on synthetic two-story plan sets.
//!
//! Both floors are 40 ft x 25 ft drawn at 1/4" = 1'-0" (48 px/ft at 192 dpi).

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use blueprint_load::analysis::{Analyzer, ReportStatus, analyze};
use blueprint_load::config::AnalysisConfig;
use blueprint_load::error::InputError;
use blueprint_load::geom::bboxes::BoundingBox;
use blueprint_load::geom::point::Point;
use blueprint_load::io::extraction::{DimensionLabel, InMemoryDocumentSource, RectPrimitive, TextBlock};
use blueprint_load::io::{DocumentExtraction, PageExtraction, UserInputs};
use blueprint_load::plan::scale::{ScaleConfig, ScaleEstimate, ScaleMethod, ScaleResolver};
use blueprint_load::sim::energy::BuiltinClimateTable;
use blueprint_load::validation::Severity;

const PPF: f64 = 48.0;

fn px(ft: f64) -> f64 {
    ft * PPF
}

fn text(s: &str, x_ft: f64, y_ft: f64) -> TextBlock {
    TextBlock::new(
        s,
        BoundingBox::new(
            Point::new(px(x_ft) - 40.0, px(y_ft) - 8.0),
            Point::new(px(x_ft) + 40.0, px(y_ft) + 8.0),
        ),
    )
}

fn dimension(text: &str, a: (f64, f64), b: (f64, f64)) -> DimensionLabel {
    DimensionLabel {
        text: text.to_string(),
        anchor_a: Point::new(px(a.0), px(a.1)),
        anchor_b: Point::new(px(b.0), px(b.1)),
        value_ft: None,
    }
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RectPrimitive {
    RectPrimitive::new(Point::new(px(x0), px(y0)), Point::new(px(x1), px(y1)))
}

/// One floor: the outline with its two overall dimensions, plus five rooms
/// that tile it.
fn floor_page(index: usize, title: &str, labels: [&str; 5], with_rooms: bool) -> PageExtraction {
    let mut rectangles = vec![rect(0.0, 0.0, 40.0, 25.0)];
    let mut text_blocks = vec![
        text(title, 20.0, 28.0),
        text("SCALE: 1/4\" = 1'-0\"", 20.0, 30.0),
    ];
    if with_rooms {
        let cells = [
            (0.0, 0.0, 20.0, 15.0),
            (20.0, 0.0, 40.0, 15.0),
            (0.0, 15.0, 20.0, 25.0),
            (20.0, 15.0, 30.0, 25.0),
            (30.0, 15.0, 40.0, 25.0),
        ];
        for ((x0, y0, x1, y1), label) in cells.into_iter().zip(labels) {
            rectangles.push(rect(x0, y0, x1, y1));
            text_blocks.push(text(label, (x0 + x1) / 2.0, (y0 + y1) / 2.0));
        }
    }
    PageExtraction {
        index,
        width_px: px(48.0),
        height_px: px(36.0),
        rectangles,
        text_blocks,
        dimension_labels: vec![
            dimension("40'-0\"", (0.0, -2.0), (40.0, -2.0)),
            dimension("25'-0\"", (-2.0, 0.0), (-2.0, 25.0)),
        ],
        ..PageExtraction::default()
    }
}

fn two_story_house(with_rooms: bool) -> DocumentExtraction {
    DocumentExtraction {
        pages: vec![
            floor_page(
                0,
                "FIRST FLOOR PLAN",
                ["LIVING ROOM", "KITCHEN", "DINING", "BATH", "LAUNDRY"],
                with_rooms,
            ),
            floor_page(
                1,
                "SECOND FLOOR PLAN",
                ["BEDROOM 1", "BEDROOM 2", "BEDROOM 3", "BATH 2", "CLOSET"],
                with_rooms,
            ),
        ],
    }
}

fn analyzer(doc: DocumentExtraction) -> Analyzer {
    Analyzer::new(
        AnalysisConfig::default(),
        Box::new(InMemoryDocumentSource::new(doc)),
        Box::new(BuiltinClimateTable::new()),
    )
}

fn blower_door(ach50: f64) -> UserInputs {
    UserInputs {
        ach50: Some(ach50),
        ..UserInputs::new()
    }
}

#[test]
fn test_two_story_house_end_to_end() {
    let report = analyzer(two_story_house(true))
        .analyze(Path::new("house.json"), "10001", &blower_door(5.0))
        .unwrap();

    assert_ne!(report.status, ReportStatus::Blocked);
    assert_eq!(report.geometry.len(), 2);
    assert!((report.conditioned_area_ft2 - 2000.0).abs() < 1.0, "{}", report.conditioned_area_ft2);
    assert_eq!(report.spaces.len(), 10);
    let scale_cfg = ScaleConfig::new();
    for s in &report.scale {
        assert_eq!(s.result.pixels_per_foot, 48.0);
        assert!(s.result.corroborations >= 2);
        assert!(s.result.is_resolved(&scale_cfg));
    }

    let per_ft2 = report.loads.heating_btuh_per_ft2;
    assert!((15.0..=60.0).contains(&per_ft2), "heating {per_ft2:.1} BTU/h per ft²");
    assert!(report.loads.design_cooling_btuh > 0.0);
    assert!(report.loads.tonnage.nominal_tons >= 1.5);
    assert_eq!(report.loads.floors.len(), 2);

    assert!(report.confidence.overall_confidence >= 0.4, "{}", report.confidence.overall_confidence);
    let band = report.bands.design_heating_btuh;
    assert!(band.lower < band.nominal && band.nominal < band.upper);
    assert!(band.contains(report.loads.design_heating_btuh));
}

#[test]
fn test_house_without_rooms_degrades() {
    let report = analyzer(two_story_house(false))
        .analyze(Path::new("house.json"), "10001", &blower_door(5.0))
        .unwrap();

    assert!(report.spaces.is_empty());
    assert!(report.confidence.overall_confidence <= 0.4);
    let codes: BTreeSet<&str> = report.warnings().map(|w| w.code.as_str()).collect();
    for code in [
        "no_rooms_detected",
        "room_coverage_unknown",
        "boundaries_defaulted",
        "zones_from_outline",
    ] {
        assert!(codes.contains(code), "missing {code} in {codes:?}");
    }
    assert!(report.warnings().count() >= 6, "{codes:?}");
    assert!(!report.issues.iter().any(|i| i.severity == Severity::Critical));
    assert!(!report.is_blocked());
    assert!(report.loads.design_heating_btuh > 0.0);
}

#[test]
fn test_repeated_runs_agree() {
    let analyzer = analyzer(two_story_house(true));
    let inputs = blower_door(5.0);
    let a = analyzer.analyze(Path::new("house.json"), "10001", &inputs).unwrap();
    let b = analyzer.analyze(Path::new("house.json"), "10001", &inputs).unwrap();

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.loads, b.loads);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.issues, b.issues);
}

#[test]
fn test_leakier_house_needs_more_heat() {
    let analyzer = analyzer(two_story_house(true));
    let tight = analyzer
        .analyze(Path::new("house.json"), "10001", &blower_door(3.0))
        .unwrap();
    let leaky = analyzer
        .analyze(Path::new("house.json"), "10001", &blower_door(10.0))
        .unwrap();
    assert!(leaky.loads.design_heating_btuh > tight.loads.design_heating_btuh);
}

#[test]
fn test_explicit_scale_is_exact() {
    let page = floor_page(0, "FIRST FLOOR PLAN", ["", "", "", "", ""], false);
    let resolver = ScaleResolver::new(ScaleConfig::new());
    let mut log = blueprint_load::confidence::RunLog::new();
    let result = resolver.detect_scale(&page, None, &mut log);
    assert_eq!(result.pixels_per_foot, 48.0);
    assert_eq!(result.method, ScaleMethod::TitleBlock);
    assert!(result.confidence >= 0.95);
    assert!(result.is_resolved(&resolver.config));
}

#[test]
fn test_consolidation_outvotes_outlier() {
    let resolver = ScaleResolver::new(ScaleConfig::new());
    let estimates = vec![
        ScaleEstimate::new(96.0, ScaleMethod::DimensionRansac, 0.8, "dims"),
        ScaleEstimate::new(96.0, ScaleMethod::KnownObject, 0.7, "door"),
        ScaleEstimate::new(96.5, ScaleMethod::GridSpacing, 0.6, "grid"),
        ScaleEstimate::new(150.0, ScaleMethod::DimensionRansac, 0.9, "outlier"),
    ];
    let result = resolver.consolidate(estimates);
    assert!((result.pixels_per_foot - 96.0).abs() < 1.0, "{}", result.pixels_per_foot);
    assert_eq!(result.corroborations, 3);
}

#[test]
fn test_json_dump_through_free_function() {
    let doc = two_story_house(true);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&doc).unwrap().as_bytes())
        .unwrap();

    let report = analyze(file.path(), "10001", &blower_door(5.0)).unwrap();
    assert_eq!(report.spaces.len(), 10);
    assert!(!report.is_blocked());
}

#[test]
fn test_missing_file_is_an_input_error() {
    let err = analyze(Path::new("/no/such/plans.json"), "10001", &UserInputs::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::FileMissing(_))
    ));
}
