//! Property tests for wall areas, infiltration and floor redistribution.

use std::collections::BTreeMap;

use blueprint_load::confidence::RunLog;
use blueprint_load::geom::point::Point;
use blueprint_load::geom::wall::{MAX_OPENING_FRACTION, Orientation, Wall};
use blueprint_load::io::ancillary::{AncillaryRecords, Ventilation};
use blueprint_load::io::extraction::{OpeningSchedule, RectPrimitive, ScheduleEntry};
use blueprint_load::io::{PageExtraction, UserInputs};
use blueprint_load::plan::geometry::{ExteriorGeometry, GeometryContext, GeometryExtractor};
use blueprint_load::plan::scale::{ScaleMethod, ScaleResult};
use blueprint_load::sim::energy::envelope::EnvelopeInputs;
use blueprint_load::sim::energy::ThermalEnvelopeBuilder;
use blueprint_load::sim::energy::LoadConfig;
use blueprint_load::sim::energy::boundary::Season;
use blueprint_load::sim::energy::infiltration::{InfiltrationInputs, calculate_infiltration};
use blueprint_load::sim::energy::multistory::{FloorSlice, redistribute};
use proptest::prelude::*;

fn house(season: Season, ach50: f64, ventilation: Ventilation) -> InfiltrationInputs {
    let (indoor_f, outdoor_f) = match season {
        Season::Heating => (70.0, 15.0),
        Season::Cooling => (75.0, 89.0),
    };
    InfiltrationInputs {
        season,
        ach50,
        volume_ft3: 16_000.0,
        stories: 2,
        stack_height_ft: 17.0,
        indoor_f,
        outdoor_f,
        wind_mph: 15.0,
        shielding_class: 4,
        terrain_class: 3,
        ventilation,
        grains_difference: 30.0,
    }
}

const PPF: f64 = 48.0;

fn scale() -> ScaleResult {
    ScaleResult {
        pixels_per_foot: PPF,
        method: ScaleMethod::UserOverride,
        confidence: 1.0,
        corroborations: 1,
        needs_override: false,
        standard_scale: Some(PPF),
        estimates: vec![],
    }
}

fn schedule_entry() -> impl Strategy<Value = ScheduleEntry> {
    (
        1.0f64..8.0,
        1.0f64..8.0,
        1u32..12,
        prop::option::of(prop::sample::select(vec!["N", "S", "E", "W", "NE", "SW"])),
    )
        .prop_map(|(width_ft, height_ft, count, orientation)| ScheduleEntry {
            mark: "W".to_string(),
            width_ft,
            height_ft,
            count,
            orientation: orientation.map(str::to_string),
        })
}

fn schedule() -> impl Strategy<Value = Option<OpeningSchedule>> {
    prop::option::of(
        (
            prop::collection::vec(schedule_entry(), 0..5),
            prop::collection::vec(schedule_entry(), 0..3),
        )
            .prop_map(|(windows, doors)| OpeningSchedule { windows, doors }),
    )
}

/// A rectangular floor drawn at 48 px/ft, or the default outline when
/// `drawn` is false.
fn floor(width_ft: f64, depth_ft: f64, drawn: bool, schedule: Option<&OpeningSchedule>, entry: bool) -> ExteriorGeometry {
    let ctx = GeometryContext {
        floor_area_hint_ft2: Some(width_ft * depth_ft),
        schedule,
        schedule_share: 1.0,
        is_entry_level: entry,
        ..GeometryContext::default()
    };
    let extractor = GeometryExtractor::default();
    let mut log = RunLog::new();
    if !drawn {
        return extractor.default_envelope(&ctx, &mut log, "not drawn");
    }
    let page = PageExtraction {
        rectangles: vec![RectPrimitive::new(
            Point::new(0.0, 0.0),
            Point::new(width_ft * PPF, depth_ft * PPF),
        )],
        ..PageExtraction::default()
    };
    extractor.extract(&page, &scale(), &ctx, &mut log)
}

fn season() -> impl Strategy<Value = Season> {
    prop_oneof![Just(Season::Heating), Just(Season::Cooling)]
}

#[test]
fn proptest_net_wall_area() {
    proptest!(|(
        length in 1.0f64..80.0,
        height in 7.0f64..12.0,
        windows in 0.0f64..500.0,
        doors in 0.0f64..100.0,
    )| {
        let wall = Wall::new(Point::new(0.0, 0.0), Point::new(length, 0.0), height, Orientation::S)
            .with_openings(windows, doors);
        let gross = wall.gross_area();
        let openings = wall.window_area() + wall.door_area();
        prop_assert!(openings <= gross * MAX_OPENING_FRACTION + 1e-9);
        prop_assert!((wall.net_area() - (gross - openings)).abs() < 1e-9);
        if windows + doors <= gross * MAX_OPENING_FRACTION {
            prop_assert!((wall.window_area() - windows).abs() < 1e-9);
            prop_assert!((wall.door_area() - doors).abs() < 1e-9);
        }
    });
}

#[test]
fn proptest_built_envelope_net_wall_area() {
    proptest!(ProptestConfig::with_cases(64), |(
        outlines in prop::collection::vec((12.0f64..80.0, 12.0f64..60.0, any::<bool>()), 1..4),
        schedule in schedule(),
        height in prop::option::of(7.5f64..12.0),
    )| {
        let floors: BTreeMap<i32, ExteriorGeometry> = outlines
            .iter()
            .enumerate()
            .map(|(i, (w, d, drawn))| {
                (i as i32 + 1, floor(*w, *d, *drawn, schedule.as_ref(), i == 0))
            })
            .collect();
        let area: f64 = floors.values().map(|g| g.floor_area_ft2).sum();
        let user = UserInputs {
            ceiling_height_ft: height,
            ..UserInputs::new()
        };
        let ancillary = AncillaryRecords::default();
        let mut log = RunLog::new();
        let (envelope, zones) = ThermalEnvelopeBuilder::default().build(
            &EnvelopeInputs {
                floors: &floors,
                spaces: &[],
                ancillary: &ancillary,
                user: &user,
                notes: "",
                conditioned_area_ft2: area,
            },
            &mut log,
        );

        prop_assert_eq!(zones.len(), floors.len());
        let gross = envelope.gross_wall_area();
        let openings = envelope.window_area() + envelope.door_area();
        let net = envelope.net_wall_area();
        prop_assert!(gross > 0.0);
        prop_assert!(net >= 0.0);
        prop_assert!((net - (gross - openings)).abs() < 1e-6 * gross.max(1.0));
        prop_assert!(openings <= gross * MAX_OPENING_FRACTION + 1e-6);
    });
}

#[test]
fn proptest_infiltration_grows_with_ach50() {
    let cfg = LoadConfig::new();
    proptest!(|(season in season(), low in 0.5f64..15.0, extra in 0.1f64..10.0)| {
        let a = calculate_infiltration(&house(season, low, Ventilation::None), &cfg);
        let b = calculate_infiltration(&house(season, low + extra, Ventilation::None), &cfg);
        prop_assert!(b.infiltration_cfm > a.infiltration_cfm);
        prop_assert!(b.sensible_btuh > a.sensible_btuh);
    });
}

#[test]
fn proptest_balanced_ventilation_never_adds_infiltration() {
    let cfg = LoadConfig::new();
    proptest!(|(
        season in season(),
        ach50 in 1.0f64..12.0,
        cfm in 0.0f64..300.0,
        more in 0.0f64..200.0,
        recovery in 0.0f64..0.9,
    )| {
        let bare = calculate_infiltration(&house(season, ach50, Ventilation::None), &cfg);
        let some = calculate_infiltration(
            &house(season, ach50, Ventilation::Balanced { cfm, recovery_efficiency: recovery }),
            &cfg,
        );
        let most = calculate_infiltration(
            &house(season, ach50, Ventilation::Balanced { cfm: cfm + more, recovery_efficiency: recovery }),
            &cfg,
        );
        prop_assert!(some.infiltration_cfm <= bare.infiltration_cfm + 1e-9);
        prop_assert!(most.infiltration_cfm <= some.infiltration_cfm + 1e-9);
        prop_assert!(most.infiltration_cfm >= 0.5 * bare.infiltration_cfm - 1e-9);
    });
}

#[test]
fn proptest_redistribution_conserves_flow() {
    let cfg = LoadConfig::new();
    proptest!(|(
        season in season(),
        areas in prop::collection::vec(200.0f64..2000.0, 1..4),
        total in 0.0f64..500.0,
        stack in 0.0f64..200.0,
        wind in 0.0f64..200.0,
    )| {
        let slices: Vec<FloorSlice> = areas
            .iter()
            .enumerate()
            .map(|(i, a)| FloorSlice {
                floor_level: i as i32 + 1,
                bottom_ft: i as f64 * 9.0,
                top_ft: i as f64 * 9.0 + 8.0,
                area_ft2: *a,
            })
            .collect();
        let parts = redistribute(total, &slices, stack, wind, season, &cfg);
        prop_assert_eq!(parts.len(), slices.len());
        prop_assert!(parts.iter().all(|p| *p >= -1e-9));
        let sum: f64 = parts.iter().sum();
        prop_assert!((sum - total).abs() < 1e-6 * total.max(1.0));
    });
}
