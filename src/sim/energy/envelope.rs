//! Thermal Envelope Builder.
//!
//! Fuses per-floor exterior geometry, rooms with their boundary conditions,
//! construction selections and the ancillary extractor records into one
//! [`BuildingEnvelope`] plus a [`ThermalZone`] per floor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::EnvelopeConfig;
use super::construction::{
    ConstructionContext, ConstructionSelector, EnvelopeProperty, Selection, below_grade_u,
    effective_u, slab_f_factor,
};
use super::zone::{ThermalZone, scale_boundaries};
use crate::confidence::{RunLog, Stage};
use crate::geom::wall::{Orientation, Wall};
use crate::io::ancillary::{AncillaryRecords, FoundationRecord, FoundationType, MechanicalRecord};
use crate::io::inputs::UserInputs;
use crate::plan::geometry::ExteriorGeometry;
use crate::plan::space::{BoundaryCondition, RoomType, Space};

/// The building's thermal shell.
///
/// Owns every exterior wall; zones refer to walls by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingEnvelope {
    walls: Vec<Wall>,
    pub floor_count: usize,
    pub conditioned_area_ft2: f64,
    /// Ground-floor footprint.
    pub footprint_area_ft2: f64,
    pub perimeter_ft: f64,
    pub ceiling_height_ft: f64,
    /// Height of the conditioned stack, floor of the lowest to ceiling of the highest story.
    pub stack_height_ft: f64,
    pub volume_ft3: f64,
    pub wall_r: f64,
    pub ceiling_r: f64,
    pub floor_r: f64,
    pub window_u: f64,
    pub window_shgc: f64,
    pub ach50: f64,
    pub wall_u: f64,
    pub ceiling_u: f64,
    pub floor_u: f64,
    pub door_u: f64,
    pub foundation: FoundationRecord,
    pub slab_f_factor: f64,
    pub below_grade_u: f64,
    /// Depth of below-grade walls on basement levels.
    pub below_grade_depth_ft: f64,
    pub mechanical: MechanicalRecord,
    pub selections: BTreeMap<EnvelopeProperty, Selection>,
    pub confidence: f64,
    pub notes: Vec<String>,
}

impl BuildingEnvelope {
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn gross_wall_area(&self) -> f64 {
        self.walls.iter().map(|w| w.gross_area()).sum()
    }

    pub fn window_area(&self) -> f64 {
        self.walls.iter().map(|w| w.window_area()).sum()
    }

    pub fn door_area(&self) -> f64 {
        self.walls.iter().map(|w| w.door_area()).sum()
    }

    pub fn net_wall_area(&self) -> f64 {
        self.walls.iter().map(|w| w.net_area()).sum()
    }

    pub fn window_to_wall_ratio(&self) -> f64 {
        let gross = self.gross_wall_area();
        if gross > 0.0 { self.window_area() / gross } else { 0.0 }
    }

    pub fn window_area_by_orientation(&self) -> BTreeMap<Orientation, f64> {
        let mut out = BTreeMap::new();
        for w in &self.walls {
            *out.entry(w.orientation()).or_insert(0.0) += w.window_area();
        }
        out
    }

    /// Perimeter over the square root of the footprint.
    pub fn shape_factor(&self) -> f64 {
        if self.footprint_area_ft2 > 0.0 {
            self.perimeter_ft / self.footprint_area_ft2.sqrt()
        } else {
            0.0
        }
    }

    /// Total exterior surface (walls, roof over the top floor, ground floor).
    pub fn shell_area_ft2(&self) -> f64 {
        self.gross_wall_area() + 2.0 * self.footprint_area_ft2
    }
}

/// Everything the builder fuses.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeInputs<'a> {
    /// Exterior geometry per floor level.
    pub floors: &'a BTreeMap<i32, ExteriorGeometry>,
    /// Rooms with boundary conditions assigned.
    pub spaces: &'a [Space],
    pub ancillary: &'a AncillaryRecords,
    pub user: &'a UserInputs,
    /// Upper-cased text of all pages, for insulation notes.
    pub notes: &'a str,
    pub conditioned_area_ft2: f64,
}

#[derive(Default)]
pub struct ThermalEnvelopeBuilder {
    pub config: EnvelopeConfig,
    pub selector: ConstructionSelector,
}

impl ThermalEnvelopeBuilder {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            config,
            selector: ConstructionSelector::new(),
        }
    }

    pub fn build(&self, inputs: &EnvelopeInputs, log: &mut RunLog) -> (BuildingEnvelope, Vec<ThermalZone>) {
        let cfg = &self.config;
        let mut notes = Vec::new();

        let ctx = ConstructionContext {
            inputs: inputs.user,
            energy_spec: inputs.ancillary.energy_spec.as_ref(),
            notes: inputs.notes,
        };
        let selections: BTreeMap<EnvelopeProperty, Selection> = EnvelopeProperty::ALL
            .iter()
            .map(|p| (*p, self.selector.select(*p, &ctx)))
            .collect();
        for (p, s) in &selections {
            log.record(
                Stage::Envelope,
                p.field(),
                s.source,
                s.confidence,
                format!("{} from {}", s.value, s.strategy),
            );
        }
        let value = |p: EnvelopeProperty| selections.get(&p).map_or(0.0, |s| s.value);

        let (foundation, foundation_consumed) = self.resolve_foundation(inputs, log);
        let (mechanical, mechanical_consumed) = self.resolve_mechanical(inputs, log);

        let ceiling_height = inputs.user.ceiling_height_ft.unwrap_or_else(|| {
            let n = inputs.floors.len().max(1) as f64;
            let sum: f64 = inputs.floors.values().map(|g| g.wall_height_ft).sum();
            if sum > 0.0 { sum / n } else { 8.0 }
        });

        let (walls, zones) = self.build_zones(inputs, &foundation, ceiling_height, &mut notes, log);
        let floor_count = zones.len().max(1);
        let ground = inputs.floors.values().next();
        let footprint_area_ft2 = ground.map_or(0.0, |g| g.floor_area_ft2);
        let perimeter_ft = ground.map_or(0.0, |g| g.perimeter_ft);
        let volume_ft3 = zones.iter().map(|z| z.volume_ft3()).sum();

        let slab_edge_r = foundation.slab_edge_r.unwrap_or(cfg.default_slab_edge_r);
        let bg_wall_r = foundation
            .below_grade_wall_r
            .unwrap_or(cfg.default_below_grade_wall_r);

        let mut envelope = BuildingEnvelope {
            walls,
            floor_count,
            conditioned_area_ft2: inputs.conditioned_area_ft2,
            footprint_area_ft2,
            perimeter_ft,
            ceiling_height_ft: ceiling_height,
            stack_height_ft: floor_count as f64 * (ceiling_height + cfg.floor_assembly_height_ft)
                - cfg.floor_assembly_height_ft,
            volume_ft3,
            wall_r: value(EnvelopeProperty::WallR),
            ceiling_r: value(EnvelopeProperty::CeilingR),
            floor_r: value(EnvelopeProperty::FloorR),
            window_u: value(EnvelopeProperty::WindowU),
            window_shgc: value(EnvelopeProperty::WindowShgc),
            ach50: value(EnvelopeProperty::Ach50),
            wall_u: effective_u(value(EnvelopeProperty::WallR), cfg.wall_framing_factor, cfg.wall_assembly_r),
            ceiling_u: effective_u(
                value(EnvelopeProperty::CeilingR),
                cfg.ceiling_framing_factor,
                cfg.ceiling_assembly_r,
            ),
            floor_u: effective_u(value(EnvelopeProperty::FloorR), cfg.floor_framing_factor, cfg.floor_assembly_r),
            door_u: cfg.door_u,
            slab_f_factor: slab_f_factor(slab_edge_r),
            below_grade_u: below_grade_u(bg_wall_r),
            below_grade_depth_ft: foundation
                .below_grade_depth_ft
                .unwrap_or(cfg.default_below_grade_depth_ft),
            foundation,
            mechanical,
            selections,
            confidence: 0.0,
            notes,
        };

        let mut confidence = self.base_confidence(&envelope, inputs);
        if let Some(c) = foundation_consumed {
            confidence *= c;
        }
        if let Some(c) = mechanical_consumed {
            confidence *= c;
        }
        confidence *= self.validate(&envelope, log);
        envelope.confidence = confidence.clamp(0.0, 1.0);

        tracing::info!(
            floors = envelope.floor_count,
            area = envelope.conditioned_area_ft2,
            wwr = envelope.window_to_wall_ratio(),
            ach50 = envelope.ach50,
            confidence = envelope.confidence,
            "envelope built"
        );
        (envelope, zones)
    }

    /// User input, then the foundation record, then a slab default.
    ///
    /// Returns the record confidence when an extractor record was used.
    fn resolve_foundation(&self, inputs: &EnvelopeInputs, log: &mut RunLog) -> (FoundationRecord, Option<f64>) {
        let record = inputs.ancillary.foundation.clone();
        match (inputs.user.foundation_type, record) {
            (Some(t), record) => {
                log.user(Stage::Envelope, "foundation_type", format!("{t:?}"));
                let mut r = record.unwrap_or_else(|| FoundationRecord::new(t, 1.0));
                r.foundation_type = t;
                r.confidence = 1.0;
                (r, None)
            }
            (None, Some(r)) => {
                log.detected(
                    Stage::Envelope,
                    "foundation_type",
                    r.confidence,
                    format!("{:?} from foundation extractor", r.foundation_type),
                );
                let c = r.confidence;
                (r, Some(c))
            }
            (None, None) => {
                log.defaulted(Stage::Envelope, "foundation_type", 0.4, "assumed slab on grade");
                (FoundationRecord::new(FoundationType::Slab, 0.4), None)
            }
        }
    }

    fn resolve_mechanical(&self, inputs: &EnvelopeInputs, log: &mut RunLog) -> (MechanicalRecord, Option<f64>) {
        let user = inputs.user;
        let (mut record, consumed) = match &inputs.ancillary.mechanical {
            Some(r) => {
                log.detected(
                    Stage::Envelope,
                    "mechanical",
                    r.confidence,
                    format!("{:?}, ducts in {:?}", r.system, r.duct_location),
                );
                (r.clone(), Some(r.confidence))
            }
            None => {
                log.defaulted(Stage::Envelope, "mechanical", 0.4, "assumed furnace with attic ducts");
                (MechanicalRecord::new(0.4), None)
            }
        };
        if let Some(loc) = user.duct_location {
            record.duct_location = loc;
            log.user(Stage::Envelope, "duct_location", format!("{loc:?}"));
        }
        if let Some(v) = user.ventilation {
            record.ventilation = v;
            log.user(Stage::Envelope, "ventilation", format!("{v:?}"));
        }
        if record.duct_r.is_none() {
            record.duct_r = Some(self.config.default_duct_r);
        }
        (record, consumed)
    }

    /// One zone per floor with geometry; garages are left out of the
    /// conditioned area.
    fn build_zones(
        &self,
        inputs: &EnvelopeInputs,
        foundation: &FoundationRecord,
        ceiling_height: f64,
        notes: &mut Vec<String>,
        log: &mut RunLog,
    ) -> (Vec<Wall>, Vec<ThermalZone>) {
        let mut walls = Vec::new();
        let levels: Vec<i32> = inputs.floors.keys().copied().collect();
        let lowest = levels.first().copied().unwrap_or(1);
        let top = levels.last().copied().unwrap_or(1);

        let conditioned_basis: BTreeMap<i32, f64> = inputs
            .floors
            .iter()
            .map(|(level, g)| {
                let garage: f64 = inputs
                    .spaces
                    .iter()
                    .filter(|s| s.floor_level == *level && s.room_type == RoomType::Garage)
                    .map(|s| s.area_ft2)
                    .sum();
                (*level, (g.floor_area_ft2 - garage).max(g.floor_area_ft2 * 0.2))
            })
            .collect();
        let basis_total: f64 = conditioned_basis.values().sum();

        let bedrooms_total = inputs
            .spaces
            .iter()
            .filter(|s| s.room_type == RoomType::Bedroom)
            .count();
        let occupants_total = (bedrooms_total + 1).max(2) as f64;

        let mut zones = Vec::new();
        for (level, geometry) in inputs.floors {
            let share = if basis_total > 0.0 {
                conditioned_basis.get(level).copied().unwrap_or(0.0) / basis_total
            } else {
                1.0 / levels.len().max(1) as f64
            };
            let area = inputs.conditioned_area_ft2 * share;
            let rooms: Vec<&Space> = inputs
                .spaces
                .iter()
                .filter(|s| s.floor_level == *level && s.room_type.is_conditioned())
                .collect();

            let mut floor_by = BTreeMap::new();
            let mut ceiling_by = BTreeMap::new();
            for r in &rooms {
                if let Some(b) = r.floor_over {
                    *floor_by.entry(b).or_insert(0.0) += r.area_ft2;
                }
                if let Some(b) = r.ceiling_under {
                    *ceiling_by.entry(b).or_insert(0.0) += r.area_ft2;
                }
            }
            let floor_fallback = if *level <= 0 {
                BoundaryCondition::Ground
            } else if *level == lowest {
                match foundation.foundation_type {
                    FoundationType::Slab => BoundaryCondition::Ground,
                    FoundationType::Crawlspace => BoundaryCondition::Crawlspace,
                    FoundationType::ConditionedBasement => BoundaryCondition::Conditioned,
                    FoundationType::UnconditionedBasement => BoundaryCondition::Unconditioned,
                }
            } else {
                BoundaryCondition::Conditioned
            };
            let ceiling_fallback = if *level == top {
                BoundaryCondition::Attic
            } else {
                BoundaryCondition::Conditioned
            };
            if rooms.is_empty() {
                notes.push(format!(
                    "floor {level}: no rooms, boundaries assumed {floor_fallback:?} below and {ceiling_fallback:?} above"
                ));
                log.warning(
                    Stage::Envelope,
                    "zones_from_outline",
                    format!("floor {level}: zone built from the exterior outline alone, {area:.0} ft²"),
                );
            }

            let start = walls.len();
            walls.extend(geometry.walls.iter().cloned());
            let wall_indices: Vec<usize> = (start..walls.len()).collect();

            let bedrooms = rooms.iter().filter(|r| r.room_type == RoomType::Bedroom).count();
            zones.push(ThermalZone {
                id: format!("zone-L{level}"),
                name: format!("Floor {level}"),
                floor_level: *level,
                space_ids: rooms.iter().map(|r| r.id.clone()).collect(),
                conditioned_area_ft2: area,
                ceiling_height_ft: ceiling_height,
                wall_indices,
                exposed_perimeter_ft: geometry.perimeter_ft,
                floor_boundaries: scale_boundaries(&floor_by, area, floor_fallback),
                ceiling_boundaries: scale_boundaries(&ceiling_by, area, ceiling_fallback),
                bedrooms,
                has_kitchen: rooms.iter().any(|r| r.room_type == RoomType::Kitchen),
                occupants: occupants_total * share,
            });
        }
        (walls, zones)
    }

    fn base_confidence(&self, envelope: &BuildingEnvelope, inputs: &EnvelopeInputs) -> f64 {
        let n = envelope.selections.len().max(1) as f64;
        let props: f64 = envelope
            .selections
            .values()
            .map(|s| s.confidence * s.source.reliability())
            .sum::<f64>()
            / n;
        let geometry = if inputs.floors.is_empty() {
            0.2
        } else {
            inputs.floors.values().map(|g| g.confidence).sum::<f64>() / inputs.floors.len() as f64
        };
        0.6 * props + 0.4 * geometry
    }

    /// Plausibility checks. Returns the confidence multiplier.
    fn validate(&self, env: &BuildingEnvelope, log: &mut RunLog) -> f64 {
        let cfg = &self.config;
        let mut k = 1.0;
        let mut flag = |log: &mut RunLog, code: &str, msg: String| {
            log.warning(Stage::Envelope, code, msg);
            k *= cfg.implausible_penalty;
        };

        let sf = env.shape_factor();
        if sf > 0.0 && !in_band(sf, cfg.shape_factor_band) {
            flag(log, "implausible_shape_factor", format!("shape factor {sf:.2} outside {:?}", cfg.shape_factor_band));
        }
        let wwr = env.window_to_wall_ratio();
        if !in_band(wwr, cfg.window_wall_ratio_band) {
            flag(
                log,
                "window_wall_ratio",
                format!("window-to-wall ratio {:.1}% outside {:?}", wwr * 100.0, cfg.window_wall_ratio_band),
            );
        }
        if !in_band(env.wall_r, cfg.wall_r_band) {
            flag(log, "implausible_r_value", format!("wall R-{} outside {:?}", env.wall_r, cfg.wall_r_band));
        }
        if !in_band(env.ceiling_r, cfg.ceiling_r_band) {
            flag(log, "implausible_r_value", format!("ceiling R-{} outside {:?}", env.ceiling_r, cfg.ceiling_r_band));
        }
        if !in_band(env.ach50, cfg.ach50_band) {
            flag(log, "implausible_ach50", format!("ACH50 {} outside {:?}", env.ach50, cfg.ach50_band));
        }
        k
    }
}

fn in_band(v: f64, (lo, hi): (f64, f64)) -> bool {
    (lo..=hi).contains(&v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Source;
    use crate::geom::point::Point;
    use crate::plan::geometry::{GeometryContext, GeometryExtractor};

    fn default_floor(area: f64) -> ExteriorGeometry {
        let ctx = GeometryContext {
            floor_area_hint_ft2: Some(area),
            is_entry_level: true,
            schedule_share: 1.0,
            ..GeometryContext::default()
        };
        GeometryExtractor::default().default_envelope(&ctx, &mut RunLog::new(), "test")
    }

    fn inputs<'a>(
        floors: &'a BTreeMap<i32, ExteriorGeometry>,
        spaces: &'a [Space],
        ancillary: &'a AncillaryRecords,
        user: &'a UserInputs,
        area: f64,
    ) -> EnvelopeInputs<'a> {
        EnvelopeInputs {
            floors,
            spaces,
            ancillary,
            user,
            notes: "",
            conditioned_area_ft2: area,
        }
    }

    #[test]
    fn test_two_floor_build() {
        let floors = BTreeMap::from([(1, default_floor(1000.0)), (2, default_floor(1000.0))]);
        let ancillary = AncillaryRecords::default();
        let mut user = UserInputs::new();
        user.ach50 = Some(5.0);
        let mut log = RunLog::new();
        let (env, zones) = ThermalEnvelopeBuilder::default()
            .build(&inputs(&floors, &[], &ancillary, &user, 2000.0), &mut log);

        assert_eq!(env.floor_count, 2);
        assert_eq!(zones.len(), 2);
        assert_eq!(env.walls().len(), 8);
        assert!((zones.iter().map(|z| z.conditioned_area_ft2).sum::<f64>() - 2000.0).abs() < 1e-9);
        assert!((env.ach50 - 5.0).abs() < 1e-12);
        assert_eq!(env.selections[&EnvelopeProperty::Ach50].source, Source::UserProvided);
        assert_eq!(zones[0].floor_boundaries.get(&BoundaryCondition::Ground).copied(), Some(1000.0));
        assert!(zones[1].ceiling_boundaries.contains_key(&BoundaryCondition::Attic));
        assert!(zones[0].ceiling_boundaries.contains_key(&BoundaryCondition::Conditioned));
        assert!((env.stack_height_ft - 17.0).abs() < 1e-9);
        assert!(
            (env.net_wall_area() - (env.gross_wall_area() - env.window_area() - env.door_area())).abs()
                < 1e-9
        );
        assert!(env.confidence > 0.0 && env.confidence < 1.0);
        for z in &zones {
            assert_eq!(z.walls(&env).count(), 4);
        }
        let outline_only = log
            .issues
            .iter()
            .filter(|i| i.code == "zones_from_outline")
            .count();
        assert_eq!(outline_only, 2);
    }

    #[test]
    fn test_records_multiply_confidence() {
        let floors = BTreeMap::from([(1, default_floor(1500.0))]);
        let user = UserInputs::new();
        let none = AncillaryRecords::default();
        let (base, _) = ThermalEnvelopeBuilder::default()
            .build(&inputs(&floors, &[], &none, &user, 1500.0), &mut RunLog::new());
        let with_records = AncillaryRecords {
            foundation: Some(FoundationRecord::new(FoundationType::Crawlspace, 0.5)),
            mechanical: None,
            energy_spec: None,
        };
        let (env, zones) = ThermalEnvelopeBuilder::default()
            .build(&inputs(&floors, &[], &with_records, &user, 1500.0), &mut RunLog::new());
        assert_eq!(env.foundation.foundation_type, FoundationType::Crawlspace);
        assert!(zones[0].floor_boundaries.contains_key(&BoundaryCondition::Crawlspace));
        assert!(env.confidence < base.confidence);
    }

    #[test]
    fn test_implausible_values_warn() {
        let floors = BTreeMap::from([(1, default_floor(1500.0))]);
        let mut user = UserInputs::new();
        user.ach50 = Some(40.0);
        user.wall_r = Some(1.0);
        let mut log = RunLog::new();
        let ancillary = AncillaryRecords::default();
        ThermalEnvelopeBuilder::default().build(&inputs(&floors, &[], &ancillary, &user, 1500.0), &mut log);
        assert!(log.has_issue("implausible_ach50"));
        assert!(log.has_issue("implausible_r_value"));
    }

    #[test]
    fn test_garage_excluded_from_zone_area() {
        let floors = BTreeMap::from([(1, default_floor(1500.0))]);
        let garage = Space {
            id: "p0-r1".to_string(),
            name: "GARAGE".to_string(),
            room_type: RoomType::Garage,
            floor_level: 1,
            area_ft2: 400.0,
            ceiling: crate::plan::space::CeilingType::Flat,
            floor_over: Some(BoundaryCondition::Ground),
            ceiling_under: Some(BoundaryCondition::Attic),
            is_over_garage: false,
            confidence: 0.8,
            evidence: vec![],
            centroid: Point::new(0., 0.),
            footprint: None,
            area_source: Source::Detected,
            page: 0,
        };
        let user = UserInputs::new();
        let ancillary = AncillaryRecords::default();
        let (_, zones) = ThermalEnvelopeBuilder::default().build(
            &inputs(&floors, std::slice::from_ref(&garage), &ancillary, &user, 1100.0),
            &mut RunLog::new(),
        );
        assert!(zones[0].space_ids.is_empty());
        assert!((zones[0].conditioned_area_ft2 - 1100.0).abs() < 1e-9);
    }
}
