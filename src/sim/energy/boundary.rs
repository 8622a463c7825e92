//! Boundary Reasoner: what lies below each room's floor and above its ceiling.
//!
//! Floors and ceilings each have an ordered strategy chain; the first strategy
//! with an answer wins, so the precedence can be read off
//! [`BoundaryReasoner::new`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::climate::ClimateData;
use crate::confidence::{RunLog, Source, Stage};
use crate::io::ancillary::FoundationType;
use crate::io::inputs::UserInputs;
use crate::plan::graph::RoomAdjacencyGraph;
use crate::plan::space::{BoundaryCondition, CeilingType, RoomType, Space};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Heating,
    Cooling,
}

/// Design temperatures of unconditioned spaces next to the house, °F.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryTemperatures {
    pub winter_attic_f: f64,
    pub winter_garage_f: f64,
    pub winter_ground_f: f64,
    pub winter_crawlspace_f: f64,
    pub winter_unconditioned_f: f64,
    /// Attic temperature above outdoor design in summer.
    pub summer_attic_rise_f: f64,
    pub summer_garage_rise_f: f64,
    pub summer_ground_f: f64,
    /// Crawlspace temperature below outdoor design in summer.
    pub summer_crawlspace_drop_f: f64,
    pub summer_unconditioned_drop_f: f64,
}

impl BoundaryTemperatures {
    pub fn new() -> Self {
        Self {
            winter_attic_f: 20.0,
            winter_garage_f: 40.0,
            winter_ground_f: 45.0,
            winter_crawlspace_f: 40.0,
            winter_unconditioned_f: 50.0,
            summer_attic_rise_f: 35.0,
            summer_garage_rise_f: 10.0,
            summer_ground_f: 60.0,
            summer_crawlspace_drop_f: 10.0,
            summer_unconditioned_drop_f: 5.0,
        }
    }

    /// Design temperature on the far side of a boundary.
    ///
    /// `None` for boundaries with no design temperature difference
    /// (conditioned neighbours, adiabatic partitions).
    pub fn design_boundary_temp(
        &self,
        boundary: BoundaryCondition,
        season: Season,
        climate: &ClimateData,
    ) -> Option<f64> {
        use BoundaryCondition::*;
        let outdoor = match season {
            Season::Heating => climate.winter_design_temp_f,
            Season::Cooling => climate.summer_design_temp_f,
        };
        let t = match (season, boundary) {
            (_, Conditioned | Adiabatic) => return None,
            (_, Exterior) => outdoor,
            (Season::Heating, Attic) => self.winter_attic_f.max(outdoor),
            (Season::Heating, Garage) => self.winter_garage_f.max(outdoor),
            (Season::Heating, Ground) => self.winter_ground_f,
            (Season::Heating, Crawlspace) => self.winter_crawlspace_f.max(outdoor),
            (Season::Heating, Unconditioned) => self.winter_unconditioned_f.max(outdoor),
            (Season::Cooling, Attic) => outdoor + self.summer_attic_rise_f,
            (Season::Cooling, Garage) => outdoor + self.summer_garage_rise_f,
            (Season::Cooling, Ground) => self.summer_ground_f,
            (Season::Cooling, Crawlspace) => outdoor - self.summer_crawlspace_drop_f,
            (Season::Cooling, Unconditioned) => outdoor - self.summer_unconditioned_drop_f,
        };
        Some(t)
    }

    /// Temperature difference driving heat loss (heating) or gain (cooling)
    /// across a boundary. Never negative.
    pub fn design_delta_t(
        &self,
        boundary: BoundaryCondition,
        season: Season,
        climate: &ClimateData,
        indoor_f: f64,
    ) -> f64 {
        match self.design_boundary_temp(boundary, season, climate) {
            None => 0.0,
            Some(t) => match season {
                Season::Heating => (indoor_f - t).max(0.0),
                Season::Cooling => (t - indoor_f).max(0.0),
            },
        }
    }
}

impl Default for BoundaryTemperatures {
    fn default() -> Self {
        Self::new()
    }
}

/// Building facts shared by all strategies.
pub struct BoundaryContext<'a> {
    pub graph: &'a RoomAdjacencyGraph,
    pub rooms: HashMap<&'a str, &'a Space>,
    pub foundation: FoundationType,
    pub lowest_level: i32,
    pub top_level: i32,
    pub inputs: &'a UserInputs,
}

impl<'a> BoundaryContext<'a> {
    pub fn new(
        spaces: &'a [Space],
        graph: &'a RoomAdjacencyGraph,
        foundation: FoundationType,
        inputs: &'a UserInputs,
    ) -> Self {
        let lowest_level = spaces.iter().map(|s| s.floor_level).min().unwrap_or(1);
        let top_level = spaces.iter().map(|s| s.floor_level).max().unwrap_or(1);
        Self {
            graph,
            rooms: spaces.iter().map(|s| (s.id.as_str(), s)).collect(),
            foundation,
            lowest_level,
            top_level,
            inputs,
        }
    }

    /// Rooms on the adjacent floor (`offset` = -1 below, +1 above) that
    /// overlap `space` in plan, largest overlap first.
    fn vertical_neighbors(&self, space: &Space, offset: i32) -> Vec<&'a Space> {
        let mut found: Vec<(&'a Space, f64)> = self
            .graph
            .vertical_neighbors(&space.id)
            .into_iter()
            .filter_map(|(id, overlap)| self.rooms.get(id).map(|s| (*s, overlap)))
            .filter(|(s, _)| s.floor_level == space.floor_level + offset)
            .collect();
        found.sort_by(|a, b| b.1.total_cmp(&a.1));
        found.into_iter().map(|(s, _)| s).collect()
    }
}

/// One rule in a boundary chain.
pub trait BoundaryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn source(&self) -> Source;

    fn floor(&self, _space: &Space, _ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        None
    }

    fn ceiling(&self, _space: &Space, _ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        None
    }
}

/// Per-room attributes: user overrides, labels like "OVER GARAGE".
struct ExplicitAttribute;

impl BoundaryStrategy for ExplicitAttribute {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn source(&self) -> Source {
        Source::UserProvided
    }

    fn floor(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        let user = ctx
            .inputs
            .floor_boundaries
            .get(&space.id)
            .or_else(|| ctx.inputs.floor_boundaries.get(&space.name))
            .copied();
        let over_garage = space.is_over_garage || ctx.inputs.over_garage_rooms.contains(&space.id);
        user.or(space.floor_over)
            .or(over_garage.then_some(BoundaryCondition::Garage))
    }

    fn ceiling(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        ctx.inputs
            .ceiling_boundaries
            .get(&space.id)
            .or_else(|| ctx.inputs.ceiling_boundaries.get(&space.name))
            .copied()
            .or(space.ceiling_under)
    }
}

/// Lowest-floor rooms sit on whatever the foundation is.
struct FoundationRule;

impl BoundaryStrategy for FoundationRule {
    fn name(&self) -> &'static str {
        "foundation"
    }

    fn source(&self) -> Source {
        Source::Inferred
    }

    fn floor(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        if space.floor_level <= 0 || space.room_type == RoomType::Garage {
            return Some(BoundaryCondition::Ground);
        }
        if space.floor_level != ctx.lowest_level || space.floor_level > 1 {
            return None;
        }
        Some(match ctx.foundation {
            FoundationType::Slab => BoundaryCondition::Ground,
            FoundationType::Crawlspace => BoundaryCondition::Crawlspace,
            FoundationType::ConditionedBasement => BoundaryCondition::Conditioned,
            FoundationType::UnconditionedBasement => BoundaryCondition::Unconditioned,
        })
    }
}

/// Vaulted ceilings follow the roof; open-to-below rooms look up into the attic.
struct CeilingShape;

impl BoundaryStrategy for CeilingShape {
    fn name(&self) -> &'static str {
        "ceiling_shape"
    }

    fn source(&self) -> Source {
        Source::Detected
    }

    fn ceiling(&self, space: &Space, _ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        match space.ceiling {
            CeilingType::Vaulted => Some(BoundaryCondition::Exterior),
            CeilingType::OpenToBelow => Some(BoundaryCondition::Attic),
            CeilingType::Flat => None,
        }
    }
}

/// Whatever room overlaps most on the floor below or above.
struct VerticalNeighbor;

impl BoundaryStrategy for VerticalNeighbor {
    fn name(&self) -> &'static str {
        "vertical_neighbor"
    }

    fn source(&self) -> Source {
        Source::Detected
    }

    fn floor(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        let below = *ctx.vertical_neighbors(space, -1).first()?;
        Some(neighbour_boundary(below))
    }

    fn ceiling(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        let above = *ctx.vertical_neighbors(space, 1).first()?;
        Some(neighbour_boundary(above))
    }
}

fn neighbour_boundary(room: &Space) -> BoundaryCondition {
    match room.room_type {
        RoomType::Garage => BoundaryCondition::Garage,
        t if t.is_conditioned() => BoundaryCondition::Conditioned,
        _ => BoundaryCondition::Unconditioned,
    }
}

/// Last resort from the room's type and position in the stack.
struct TypeDefault;

impl BoundaryStrategy for TypeDefault {
    fn name(&self) -> &'static str {
        "type_default"
    }

    fn source(&self) -> Source {
        Source::Defaulted
    }

    fn floor(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        if space.room_type == RoomType::Garage || space.floor_level <= ctx.lowest_level {
            return Some(BoundaryCondition::Ground);
        }
        Some(BoundaryCondition::Conditioned)
    }

    fn ceiling(&self, space: &Space, ctx: &BoundaryContext) -> Option<BoundaryCondition> {
        if space.floor_level >= ctx.top_level {
            Some(BoundaryCondition::Attic)
        } else {
            Some(BoundaryCondition::Conditioned)
        }
    }
}

pub struct BoundaryReasoner {
    floor_chain: Vec<Box<dyn BoundaryStrategy>>,
    ceiling_chain: Vec<Box<dyn BoundaryStrategy>>,
}

impl BoundaryReasoner {
    pub fn new() -> Self {
        Self {
            floor_chain: vec![
                Box::new(ExplicitAttribute),
                Box::new(FoundationRule),
                Box::new(VerticalNeighbor),
                Box::new(TypeDefault),
            ],
            ceiling_chain: vec![
                Box::new(ExplicitAttribute),
                Box::new(CeilingShape),
                Box::new(VerticalNeighbor),
                Box::new(TypeDefault),
            ],
        }
    }

    pub fn floor_chain(&self) -> Vec<&'static str> {
        self.floor_chain.iter().map(|s| s.name()).collect()
    }

    pub fn ceiling_chain(&self) -> Vec<&'static str> {
        self.ceiling_chain.iter().map(|s| s.name()).collect()
    }

    /// Returns copies of `spaces` with `floor_over` and `ceiling_under` set.
    pub fn assign(
        &self,
        spaces: &[Space],
        graph: &RoomAdjacencyGraph,
        foundation: FoundationType,
        foundation_confidence: f64,
        inputs: &UserInputs,
        log: &mut RunLog,
    ) -> Vec<Space> {
        if spaces.is_empty() {
            log.warning(
                Stage::Boundaries,
                "boundaries_defaulted",
                format!("no rooms to reason about; floors follow the {foundation:?} foundation and top ceilings the attic"),
            );
            return Vec::new();
        }
        let ctx = BoundaryContext::new(spaces, graph, foundation, inputs);
        let mut out = Vec::with_capacity(spaces.len());
        let mut defaulted = 0;
        for space in spaces {
            let (floor, floor_by) = first_answer(&self.floor_chain, |s| s.floor(space, &ctx));
            let (ceiling, ceiling_by) = first_answer(&self.ceiling_chain, |s| s.ceiling(space, &ctx));
            defaulted += [floor_by, ceiling_by].iter().filter(|by| **by == TypeDefault.name()).count();
            for (field, value, by) in [("floor_over", floor, floor_by), ("ceiling_under", ceiling, ceiling_by)] {
                let source = self.source_of(by, field, space, inputs);
                let confidence = match (by, source) {
                    (_, Source::UserProvided) => 1.0,
                    ("foundation", _) => 0.6 + 0.3 * foundation_confidence,
                    ("explicit", _) => 0.8,
                    ("ceiling_shape", _) => 0.8,
                    ("vertical_neighbor", _) => 0.75,
                    _ => 0.5,
                };
                log.record(
                    Stage::Boundaries,
                    &format!("{}.{field}", space.id),
                    source,
                    confidence,
                    format!("{value:?} by {by}"),
                );
            }
            tracing::debug!(room = %space.id, ?floor, floor_by, ?ceiling, ceiling_by, "boundaries assigned");
            out.push(Space {
                floor_over: Some(floor),
                ceiling_under: Some(ceiling),
                ..space.clone()
            });
        }
        let answers = spaces.len() * 2;
        if defaulted * 2 > answers {
            log.warning(
                Stage::Boundaries,
                "boundaries_defaulted",
                format!("{defaulted} of {answers} room boundaries fell back to the room-type default"),
            );
        }
        out
    }

    /// Explicit answers from user input for this field are user-provided;
    /// label-derived ones count as detected.
    fn source_of(&self, by: &str, field: &str, space: &Space, inputs: &UserInputs) -> Source {
        if by != "explicit" {
            return self
                .floor_chain
                .iter()
                .chain(self.ceiling_chain.iter())
                .find(|s| s.name() == by)
                .map_or(Source::Defaulted, |s| s.source());
        }
        let from_user = match field {
            "floor_over" => {
                inputs.floor_boundaries.contains_key(&space.id)
                    || inputs.floor_boundaries.contains_key(&space.name)
                    || inputs.over_garage_rooms.contains(&space.id)
            }
            _ => {
                inputs.ceiling_boundaries.contains_key(&space.id)
                    || inputs.ceiling_boundaries.contains_key(&space.name)
            }
        };
        if from_user { Source::UserProvided } else { Source::Detected }
    }
}

impl Default for BoundaryReasoner {
    fn default() -> Self {
        Self::new()
    }
}

fn first_answer(
    chain: &[Box<dyn BoundaryStrategy>],
    ask: impl Fn(&dyn BoundaryStrategy) -> Option<BoundaryCondition>,
) -> (BoundaryCondition, &'static str) {
    chain
        .iter()
        .find_map(|s| ask(s.as_ref()).map(|b| (b, s.name())))
        .unwrap_or((BoundaryCondition::Conditioned, "none"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;
    use crate::geom::polygon::Polygon;
    use crate::plan::graph::RoomGraphValidator;
    use std::collections::BTreeMap;

    fn room(id: &str, rt: RoomType, level: i32, x0: f64, x1: f64) -> Space {
        let fp = Polygon::rectangle(id, Point::new(x0, 0.), Point::new(x1, 20.)).unwrap();
        Space {
            id: id.to_string(),
            name: id.to_uppercase(),
            room_type: rt,
            floor_level: level,
            area_ft2: fp.area(),
            ceiling: CeilingType::Flat,
            floor_over: None,
            ceiling_under: None,
            is_over_garage: false,
            confidence: 0.8,
            evidence: vec![],
            centroid: fp.centroid(),
            footprint: Some(fp),
            area_source: Source::Detected,
            page: level.max(0) as usize,
        }
    }

    fn assign(spaces: &[Space], foundation: FoundationType, inputs: &UserInputs) -> (Vec<Space>, RunLog) {
        let mut log = RunLog::new();
        let graph = RoomGraphValidator::default().validate(spaces, &BTreeMap::new(), &mut log);
        let out = BoundaryReasoner::new().assign(spaces, &graph, foundation, 0.8, inputs, &mut log);
        (out, log)
    }

    #[test]
    fn test_no_rooms_warns() {
        let (out, log) = assign(&[], FoundationType::Slab, &UserInputs::new());
        assert!(out.is_empty());
        assert!(log.has_issue("boundaries_defaulted"));
    }

    #[test]
    fn test_two_story_with_garage() {
        let spaces = vec![
            room("garage", RoomType::Garage, 1, 0., 20.),
            room("living", RoomType::Living, 1, 20., 40.),
            room("bonus", RoomType::Bedroom, 2, 0., 20.),
            room("bed", RoomType::Bedroom, 2, 20., 40.),
        ];
        let (out, log) = assign(&spaces, FoundationType::Crawlspace, &UserInputs::new());
        let get = |id: &str| out.iter().find(|s| s.id == id).unwrap();
        assert_eq!(get("living").floor_over, Some(BoundaryCondition::Crawlspace));
        assert_eq!(get("living").ceiling_under, Some(BoundaryCondition::Conditioned));
        assert_eq!(get("bonus").floor_over, Some(BoundaryCondition::Garage));
        assert_eq!(get("bed").floor_over, Some(BoundaryCondition::Conditioned));
        assert_eq!(get("bed").ceiling_under, Some(BoundaryCondition::Attic));
        assert!(log.for_stage(Stage::Boundaries).count() >= 8);
        // Inputs are left untouched
        assert!(spaces.iter().all(|s| s.floor_over.is_none()));
    }

    #[test]
    fn test_explicit_and_shape_win() {
        let mut vaulted = room("great", RoomType::Living, 1, 0., 20.);
        vaulted.ceiling = CeilingType::Vaulted;
        let mut over = room("bonus", RoomType::Bedroom, 2, 100., 120.);
        over.is_over_garage = true;
        let mut inputs = UserInputs::new();
        inputs
            .floor_boundaries
            .insert("great".to_string(), BoundaryCondition::Unconditioned);
        let (out, log) = assign(&[vaulted, over], FoundationType::Slab, &inputs);
        assert_eq!(out[0].floor_over, Some(BoundaryCondition::Unconditioned));
        assert_eq!(out[0].ceiling_under, Some(BoundaryCondition::Exterior));
        assert_eq!(out[1].floor_over, Some(BoundaryCondition::Garage));
        let user = log
            .provenance
            .iter()
            .find(|r| r.field == "great.floor_over")
            .unwrap();
        assert_eq!(user.source, Source::UserProvided);
    }

    #[test]
    fn test_user_floor_leaves_labelled_ceiling_detected() {
        let mut den = room("den", RoomType::Other, 1, 0., 20.);
        den.ceiling_under = Some(BoundaryCondition::Attic);
        let mut inputs = UserInputs::new();
        inputs
            .floor_boundaries
            .insert("den".to_string(), BoundaryCondition::Crawlspace);
        let (out, log) = assign(&[den], FoundationType::Slab, &inputs);
        assert_eq!(out[0].floor_over, Some(BoundaryCondition::Crawlspace));
        assert_eq!(out[0].ceiling_under, Some(BoundaryCondition::Attic));
        let source = |field: &str| {
            log.provenance
                .iter()
                .find(|r| r.field == field)
                .map(|r| r.source)
        };
        assert_eq!(source("den.floor_over"), Some(Source::UserProvided));
        assert_eq!(source("den.ceiling_under"), Some(Source::Detected));
    }

    #[test]
    fn test_foundation_rules() {
        let reasoner_floor = |f: FoundationType| {
            let (out, _) = assign(&[room("a", RoomType::Living, 1, 0., 20.)], f, &UserInputs::new());
            out[0].floor_over
        };
        assert_eq!(reasoner_floor(FoundationType::Slab), Some(BoundaryCondition::Ground));
        assert_eq!(
            reasoner_floor(FoundationType::ConditionedBasement),
            Some(BoundaryCondition::Conditioned)
        );
        assert_eq!(
            reasoner_floor(FoundationType::UnconditionedBasement),
            Some(BoundaryCondition::Unconditioned)
        );
        let (out, _) = assign(
            &[room("rec", RoomType::Living, 0, 0., 20.)],
            FoundationType::ConditionedBasement,
            &UserInputs::new(),
        );
        assert_eq!(out[0].floor_over, Some(BoundaryCondition::Ground));
    }

    #[test]
    fn test_design_temperatures() {
        let t = BoundaryTemperatures::new();
        let climate = ClimateData::new("4A", 15.0, 89.0, 15.0, 37.0, "test");
        let h = |b| t.design_delta_t(b, Season::Heating, &climate, 70.0);
        let c = |b| t.design_delta_t(b, Season::Cooling, &climate, 75.0);
        assert!((h(BoundaryCondition::Exterior) - 55.0).abs() < 1e-12);
        assert!((h(BoundaryCondition::Attic) - 50.0).abs() < 1e-12);
        assert!((h(BoundaryCondition::Garage) - 30.0).abs() < 1e-12);
        assert!((h(BoundaryCondition::Ground) - 25.0).abs() < 1e-12);
        assert!(h(BoundaryCondition::Conditioned).abs() < 1e-12);
        assert!((c(BoundaryCondition::Attic) - 49.0).abs() < 1e-12);
        assert!((c(BoundaryCondition::Garage) - 24.0).abs() < 1e-12);
        assert!(c(BoundaryCondition::Ground).abs() < 1e-12);
        // Mild winter: the attic is never colder than outdoors
        let mild = ClimateData::new("2B", 38.0, 110.0, 15.0, 0.0, "test");
        assert!(
            (t.design_delta_t(BoundaryCondition::Attic, Season::Heating, &mild, 70.0) - 32.0).abs()
                < 1e-12
        );
    }
}
