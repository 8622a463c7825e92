//! Room Graph Validator and the room adjacency graph.
//!
//! Rooms become polygons (measured outline, or a square of the room's area
//! around its label), are checked for overlaps and floor coverage, and are
//! linked by shared walls on the same floor and by plan overlap between
//! adjacent floors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::confidence::{RunLog, Stage};
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::polygon::boolean::polygon_overlap_area;
use crate::geom::polygon::relations::{polygon_distance, shared_edge_length};
use crate::name::{HasName, SortByName};
use crate::plan::space::Space;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Rooms closer than this share a wall.
    pub wall_gap_ft: f64,
    pub parallel_tolerance_deg: f64,
    /// Overlap fraction of the smaller room that raises a warning.
    pub overlap_warning: f64,
    /// Overlap fraction of the smaller room that blocks the result.
    pub overlap_critical: f64,
    pub coverage_band: (f64, f64),
    pub min_vertical_overlap_ft2: f64,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self {
            wall_gap_ft: 1.0,
            parallel_tolerance_deg: 5.0,
            overlap_warning: 0.10,
            overlap_critical: 0.20,
            coverage_band: (0.70, 1.20),
            min_vertical_overlap_ft2: 10.0,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    SharedWall,
    /// Rooms on adjacent floors whose plans overlap.
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEdge {
    pub a: String,
    pub b: String,
    pub kind: EdgeKind,
    pub shared_length_ft: f64,
    pub overlap_area_ft2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPolygon {
    pub id: String,
    pub floor_level: i32,
    pub polygon: Polygon,
    /// False for squares estimated from the room's area.
    pub measured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorCoverage {
    pub floor_level: i32,
    pub room_area_ft2: f64,
    pub footprint_area_ft2: Option<f64>,
    pub ratio: Option<f64>,
}

/// Undirected graph over room ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAdjacencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<RoomEdge>,
    pub polygons: Vec<RoomPolygon>,
    pub coverage: Vec<FloorCoverage>,
    pub isolated: Vec<String>,
    pub components: usize,
}

impl RoomAdjacencyGraph {
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.a == id {
                    Some(e.b.as_str())
                } else if e.b == id {
                    Some(e.a.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn shared_wall_length(&self, id: &str) -> f64 {
        self.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::SharedWall && (e.a == id || e.b == id))
            .map(|e| e.shared_length_ft)
            .sum()
    }

    /// Vertically overlapping rooms with their overlap area.
    pub fn vertical_neighbors(&self, id: &str) -> Vec<(&str, f64)> {
        self.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Vertical)
            .filter_map(|e| {
                if e.a == id {
                    Some((e.b.as_str(), e.overlap_area_ft2))
                } else if e.b == id {
                    Some((e.a.as_str(), e.overlap_area_ft2))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.components <= 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomGraphValidator {
    pub config: GraphConfig,
}

impl RoomGraphValidator {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Builds the graph and records plausibility issues.
    ///
    /// `footprints` maps floor level to the exterior footprint area of that floor.
    pub fn validate(
        &self,
        spaces: &[Space],
        footprints: &BTreeMap<i32, f64>,
        log: &mut RunLog,
    ) -> RoomAdjacencyGraph {
        let cfg = &self.config;
        let polygons = self.room_polygons(spaces, log);
        let aligned = align_floors(&polygons);

        let mut edges = Vec::new();
        for i in 0..polygons.len() {
            for j in (i + 1)..polygons.len() {
                let (a, b) = (&polygons[i], &polygons[j]);
                if a.floor_level == b.floor_level {
                    self.check_overlap(a, b, log);
                    let gap = polygon_distance(&a.polygon, &b.polygon);
                    if gap < cfg.wall_gap_ft {
                        edges.push(RoomEdge {
                            a: a.id.clone(),
                            b: b.id.clone(),
                            kind: EdgeKind::SharedWall,
                            shared_length_ft: shared_edge_length(
                                &a.polygon,
                                &b.polygon,
                                cfg.wall_gap_ft,
                                cfg.parallel_tolerance_deg,
                            ),
                            overlap_area_ft2: 0.0,
                        });
                    }
                } else if (a.floor_level - b.floor_level).abs() == 1 {
                    let overlap = polygon_overlap_area(&aligned[i], &aligned[j]);
                    if overlap >= cfg.min_vertical_overlap_ft2 {
                        edges.push(RoomEdge {
                            a: a.id.clone(),
                            b: b.id.clone(),
                            kind: EdgeKind::Vertical,
                            shared_length_ft: 0.0,
                            overlap_area_ft2: overlap,
                        });
                    }
                }
            }
        }

        let nodes: Vec<String> = polygons.iter().map(|p| p.id.clone()).collect();
        let isolated: Vec<String> = nodes
            .iter()
            .filter(|n| !edges.iter().any(|e| &e.a == *n || &e.b == *n))
            .cloned()
            .collect();
        let components = count_components(&nodes, &edges);
        if nodes.len() > 1 && !isolated.is_empty() {
            let mut lonely: Vec<&Space> = spaces.iter().filter(|s| isolated.contains(&s.id)).collect();
            lonely.sort_by_name();
            let names: Vec<String> = lonely
                .iter()
                .map(|s| format!("{} ({})", s.get_name(), s.id))
                .collect();
            log.warning(
                Stage::RoomGraph,
                "isolated_rooms",
                format!("rooms with no neighbours: {}", names.join(", ")),
            );
        }

        let coverage = self.check_coverage(spaces, footprints, log);

        if polygons.is_empty() {
            log.defaulted(Stage::RoomGraph, "room_polygons", 0.2, "no rooms to place");
        } else {
            let measured = polygons.iter().filter(|p| p.measured).count() as f64
                / polygons.len() as f64;
            let confidence = 0.5 + 0.4 * measured;
            let note = format!(
                "{} rooms, {:.0}% measured, {} components",
                polygons.len(),
                measured * 100.0,
                components
            );
            if measured >= 0.5 {
                log.detected(Stage::RoomGraph, "room_polygons", confidence, note);
            } else {
                log.inferred(Stage::RoomGraph, "room_polygons", confidence, note);
            }
        }
        tracing::debug!(
            rooms = nodes.len(),
            edges = edges.len(),
            components,
            isolated = isolated.len(),
            "room graph built"
        );

        RoomAdjacencyGraph {
            nodes,
            edges,
            polygons,
            coverage,
            isolated,
            components,
        }
    }

    fn room_polygons(&self, spaces: &[Space], log: &mut RunLog) -> Vec<RoomPolygon> {
        let mut out = Vec::with_capacity(spaces.len());
        for s in spaces {
            let (polygon, measured) = match &s.footprint {
                Some(fp) if fp.is_simple() => (Ok(fp.clone()), true),
                Some(fp) => {
                    log.info(
                        Stage::RoomGraph,
                        "polygon_repaired",
                        format!("{}: self-intersecting outline replaced by its convex hull", s.id),
                    );
                    (fp.convex_hull(), true)
                }
                None => (Polygon::square_around(&s.id, s.centroid, s.area_ft2), false),
            };
            match polygon {
                Ok(polygon) => out.push(RoomPolygon {
                    id: s.id.clone(),
                    floor_level: s.floor_level,
                    polygon,
                    measured,
                }),
                Err(e) => log.warning(
                    Stage::RoomGraph,
                    "room_polygon_failed",
                    format!("{}: {e}", s.id),
                ),
            }
        }
        out
    }

    fn check_overlap(&self, a: &RoomPolygon, b: &RoomPolygon, log: &mut RunLog) {
        let cfg = &self.config;
        let overlap = polygon_overlap_area(&a.polygon, &b.polygon);
        if overlap <= 0.0 {
            return;
        }
        let smaller = a.polygon.area().min(b.polygon.area());
        if smaller <= 0.0 {
            return;
        }
        let frac = overlap / smaller;
        if frac <= cfg.overlap_warning {
            return;
        }
        let msg = format!(
            "{} and {} overlap by {:.0} ft² ({:.0}% of the smaller room)",
            a.id,
            b.id,
            overlap,
            frac * 100.0
        );
        if !(a.measured && b.measured) {
            log.info(Stage::RoomGraph, "estimated_room_overlap", msg);
        } else if frac > cfg.overlap_critical {
            log.critical(Stage::RoomGraph, "room_overlap", msg);
        } else {
            log.warning(Stage::RoomGraph, "room_overlap", msg);
        }
    }

    fn check_coverage(
        &self,
        spaces: &[Space],
        footprints: &BTreeMap<i32, f64>,
        log: &mut RunLog,
    ) -> Vec<FloorCoverage> {
        let mut room_area: BTreeMap<i32, f64> = BTreeMap::new();
        for s in spaces {
            *room_area.entry(s.floor_level).or_insert(0.0) += s.area_ft2;
        }
        let mut levels: Vec<i32> = room_area.keys().chain(footprints.keys()).copied().collect();
        levels.sort_unstable();
        levels.dedup();

        let (lo, hi) = self.config.coverage_band;
        levels
            .into_iter()
            .map(|level| {
                let rooms = room_area.get(&level).copied().unwrap_or(0.0);
                let footprint = footprints.get(&level).copied().filter(|a| *a > 0.0);
                let ratio = footprint.map(|f| rooms / f);
                if rooms <= 0.0 && footprint.is_some() {
                    log.warning(
                        Stage::RoomGraph,
                        "room_coverage_unknown",
                        format!("floor {level}: no rooms to check against the footprint"),
                    );
                }
                if let Some(r) = ratio
                    && rooms > 0.0
                    && !(lo..=hi).contains(&r)
                {
                    log.warning(
                        Stage::RoomGraph,
                        "room_coverage",
                        format!(
                            "floor {level}: rooms cover {:.0}% of the footprint (expected {:.0}-{:.0}%)",
                            r * 100.0,
                            lo * 100.0,
                            hi * 100.0
                        ),
                    );
                }
                FloorCoverage {
                    floor_level: level,
                    room_area_ft2: rooms,
                    footprint_area_ft2: footprint,
                    ratio,
                }
            })
            .collect()
    }
}

/// Copies of the polygons shifted so each floor's plan starts at the origin.
///
/// Each floor usually comes from its own page, so page coordinates are only
/// comparable after aligning the floors' extents.
fn align_floors(polygons: &[RoomPolygon]) -> Vec<Polygon> {
    let mut origin: HashMap<i32, Point> = HashMap::new();
    for p in polygons {
        let bb = p.polygon.bbox();
        origin
            .entry(p.floor_level)
            .and_modify(|o| {
                o.x = o.x.min(bb.min.x);
                o.y = o.y.min(bb.min.y);
            })
            .or_insert(bb.min);
    }
    polygons
        .iter()
        .map(|p| {
            let o = origin.get(&p.floor_level).copied().unwrap_or_default();
            let pts: Vec<Point> = p
                .polygon
                .vertices()
                .iter()
                .map(|v| Point::new(v.x - o.x, v.y - o.y))
                .collect();
            Polygon::new(&p.id, pts).unwrap_or_else(|_| p.polygon.clone())
        })
        .collect()
}

fn count_components(nodes: &[String], edges: &[RoomEdge]) -> usize {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut parent: Vec<usize> = (0..nodes.len()).collect();
    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut r = i;
        while parent[r] != r {
            r = parent[r];
        }
        parent[i] = r;
        r
    }
    for e in edges {
        if let (Some(&a), Some(&b)) = (index.get(e.a.as_str()), index.get(e.b.as_str())) {
            let ra = find(&mut parent, a);
            let rb = find(&mut parent, b);
            if ra != rb {
                parent[ra] = rb;
            }
        }
    }
    (0..nodes.len())
        .filter(|&i| find(&mut parent, i) == i)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Source;
    use crate::plan::space::{CeilingType, RoomType};
    use crate::validation::{Severity, has_critical};

    fn room(id: &str, level: i32, x0: f64, y0: f64, x1: f64, y1: f64, measured: bool) -> Space {
        let fp = Polygon::rectangle(id, Point::new(x0, y0), Point::new(x1, y1)).unwrap();
        Space {
            id: id.to_string(),
            name: id.to_string(),
            room_type: RoomType::Bedroom,
            floor_level: level,
            area_ft2: fp.area(),
            ceiling: CeilingType::Flat,
            floor_over: None,
            ceiling_under: None,
            is_over_garage: false,
            confidence: 0.8,
            evidence: vec![],
            centroid: fp.centroid(),
            footprint: measured.then_some(fp),
            area_source: Source::Detected,
            page: 0,
        }
    }

    #[test]
    fn test_shared_walls_and_vertical_edges() {
        let rooms = vec![
            room("a", 1, 0., 0., 12., 10., true),
            room("b", 1, 12.5, 0., 24., 10., true),
            room("c", 2, 100., 100., 112., 110., true),
            room("d", 1, 50., 50., 60., 60., true),
        ];
        let mut log = RunLog::new();
        let g = RoomGraphValidator::default().validate(&rooms, &BTreeMap::new(), &mut log);
        let wall = g.edges.iter().find(|e| e.kind == EdgeKind::SharedWall).unwrap();
        assert_eq!((wall.a.as_str(), wall.b.as_str()), ("a", "b"));
        assert!((wall.shared_length_ft - 10.0).abs() < 1e-9);
        // Floor 2 room aligns with the corner of floor 1 after alignment
        assert!(g.vertical_neighbors("c").iter().any(|(id, _)| *id == "a"));
        assert_eq!(g.isolated, vec!["d".to_string()]);
        assert!(log.has_issue("isolated_rooms"));
        assert_eq!(g.components, 2);
        assert!(!g.is_connected());
    }

    #[test]
    fn test_overlap_severity() {
        let validator = RoomGraphValidator::default();
        // 25% overlap between measured rooms is critical
        let mut log = RunLog::new();
        validator.validate(
            &[room("a", 1, 0., 0., 10., 10., true), room("b", 1, 7.5, 0., 17.5, 10., true)],
            &BTreeMap::new(),
            &mut log,
        );
        assert!(has_critical(&log.issues));

        // 15% is a warning
        let mut log = RunLog::new();
        validator.validate(
            &[room("a", 1, 0., 0., 10., 10., true), room("b", 1, 8.5, 0., 18.5, 10., true)],
            &BTreeMap::new(),
            &mut log,
        );
        assert!(!has_critical(&log.issues));
        assert!(log.issues.iter().any(|i| i.code == "room_overlap" && i.severity == Severity::Warning));

        // Estimated squares never block
        let mut log = RunLog::new();
        validator.validate(
            &[room("a", 1, 0., 0., 10., 10., false), room("b", 1, 2., 0., 12., 10., false)],
            &BTreeMap::new(),
            &mut log,
        );
        assert!(!has_critical(&log.issues));
        assert!(log.has_issue("estimated_room_overlap"));
    }

    #[test]
    fn test_coverage() {
        let mut footprints = BTreeMap::new();
        footprints.insert(1, 1000.0);
        let mut log = RunLog::new();
        let g = RoomGraphValidator::default().validate(
            &[room("a", 1, 0., 0., 20., 20., true)],
            &footprints,
            &mut log,
        );
        assert!((g.coverage[0].ratio.unwrap() - 0.4).abs() < 1e-9);
        assert!(log.has_issue("room_coverage"));
    }

    #[test]
    fn test_coverage_unknown_without_rooms() {
        let mut footprints = BTreeMap::new();
        footprints.insert(1, 1000.0);
        footprints.insert(2, 1000.0);
        let mut log = RunLog::new();
        let g = RoomGraphValidator::default().validate(&[], &footprints, &mut log);
        assert_eq!(g.coverage.len(), 2);
        assert!(log.has_issue("room_coverage_unknown"));
        assert!(!log.has_issue("room_coverage"));
    }

    #[test]
    fn test_self_intersecting_footprint_repaired() {
        let bowtie = Polygon::new(
            "x",
            vec![
                Point::new(0., 0.),
                Point::new(10., 10.),
                Point::new(10., 0.),
                Point::new(0., 10.),
            ],
        );
        // A bow-tie has zero signed area and is rejected up front
        assert!(bowtie.is_err());

        let spiky = Polygon::new(
            "y",
            vec![
                Point::new(0., 0.),
                Point::new(10., 0.),
                Point::new(10., 10.),
                Point::new(2., -2.),
                Point::new(0., 10.),
            ],
        )
        .unwrap();
        assert!(!spiky.is_simple());
        let mut s = room("s", 1, 0., 0., 10., 10., true);
        s.footprint = Some(spiky);
        let mut log = RunLog::new();
        let g = RoomGraphValidator::default().validate(&[s], &BTreeMap::new(), &mut log);
        assert!(log.has_issue("polygon_repaired"));
        assert!(g.polygons[0].polygon.is_simple());
    }
}
