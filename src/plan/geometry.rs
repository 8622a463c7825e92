//! Geometry Extractor: exterior walls, perimeter, floor area and openings.
//!
//! Works on one floor-plan page at a time. Vector primitives are converted to
//! feet with the page scale, long axis-aligned strokes become wall candidates,
//! and the outermost ones become the exterior. When nothing qualifies a
//! rectangular default envelope is produced so later stages always have
//! something to work with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::confidence::{RunLog, Stage};
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::segment::Segment;
use crate::geom::wall::{Orientation, Wall};
use crate::io::PageExtraction;
use crate::io::extraction::OpeningSchedule;
use crate::plan::scale::ScaleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometrySource {
    /// Outermost walls found and classified.
    Detected,
    /// Longest strokes used because the outline was incomplete.
    Fallback,
    /// Nothing usable on the page; parameterized rectangle.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub min_wall_length_ft: f64,
    pub axis_tolerance_deg: f64,
    /// Walls within this distance of an extreme line belong to it.
    pub collinear_tolerance_ft: f64,
    pub fallback_wall_count: usize,
    pub loop_snap_ft: f64,
    /// Floor area = bounding box area times this when no closed loop is found.
    pub bbox_area_factor: f64,
    pub wall_height_ft: f64,
    /// Default glazing as a fraction of floor area.
    pub default_glazing_fraction: f64,
    pub glazing_split: Vec<(Orientation, f64)>,
    pub default_door_count: u32,
    pub default_door_area_ft2: f64,
    pub default_floor_area_ft2: f64,
    /// Long side over short side of the default rectangle.
    pub default_aspect_ratio: f64,
    /// Floor areas outside this band suggest a wrong scale.
    pub plausible_floor_area_ft2: (f64, f64),
}

impl GeometryConfig {
    pub fn new() -> Self {
        Self {
            min_wall_length_ft: 6.0,
            axis_tolerance_deg: 10.0,
            collinear_tolerance_ft: 1.0,
            fallback_wall_count: 4,
            loop_snap_ft: 1.5,
            bbox_area_factor: 0.9,
            wall_height_ft: 8.0,
            default_glazing_fraction: 0.15,
            glazing_split: vec![
                (Orientation::S, 0.35),
                (Orientation::E, 0.25),
                (Orientation::W, 0.25),
                (Orientation::N, 0.15),
            ],
            default_door_count: 2,
            default_door_area_ft2: 20.0,
            default_floor_area_ft2: 1500.0,
            default_aspect_ratio: 1.5,
            plausible_floor_area_ft2: (200.0, 10_000.0),
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-page inputs that do not come from the drawing itself.
#[derive(Debug, Clone, Default)]
pub struct GeometryContext<'a> {
    pub north_angle_deg: f64,
    pub wall_height_ft: Option<f64>,
    pub floor_area_hint_ft2: Option<f64>,
    pub schedule: Option<&'a OpeningSchedule>,
    /// Share of a building-wide schedule that belongs to this floor.
    pub schedule_share: f64,
    /// Entry level floors get the default exterior doors.
    pub is_entry_level: bool,
}

/// Exterior envelope of one floor, in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExteriorGeometry {
    pub walls: Vec<Wall>,
    pub perimeter_ft: f64,
    pub floor_area_ft2: f64,
    pub bbox: Option<BoundingBox>,
    pub footprint: Option<Polygon>,
    pub wall_height_ft: f64,
    pub source: GeometrySource,
    pub confidence: f64,
    pub notes: Vec<String>,
}

impl ExteriorGeometry {
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

    pub fn window_area_by_orientation(&self) -> BTreeMap<Orientation, f64> {
        let mut out = BTreeMap::new();
        for w in &self.walls {
            *out.entry(w.orientation()).or_insert(0.0) += w.window_area();
        }
        out
    }

    /// Perimeter divided by the square root of floor area.
    pub fn shape_factor(&self) -> f64 {
        if self.floor_area_ft2 > 0.0 {
            self.perimeter_ft / self.floor_area_ft2.sqrt()
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometryExtractor {
    pub config: GeometryConfig,
}

impl GeometryExtractor {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn extract(
        &self,
        page: &PageExtraction,
        scale: &ScaleResult,
        ctx: &GeometryContext,
        log: &mut RunLog,
    ) -> ExteriorGeometry {
        let cfg = &self.config;
        if scale.pixels_per_foot <= 0.0 {
            return self.default_envelope(ctx, log, "non-positive scale");
        }
        let to_ft = 1.0 / scale.pixels_per_foot;

        let mut segments: Vec<Segment> = page.lines.iter().map(|l| l.segment()).collect();
        for r in &page.rectangles {
            segments.extend(r.edges());
        }
        let candidates = dedup_segments(
            segments
                .iter()
                .map(|s| s.scale(to_ft))
                .filter(|s| s.length() >= cfg.min_wall_length_ft)
                .collect(),
        );
        if candidates.is_empty() {
            return self.default_envelope(ctx, log, "no wall-length primitives");
        }

        let (exterior, source) = match self.select_extremes(&candidates) {
            Some(ext) => (ext, GeometrySource::Detected),
            None => {
                let mut longest = candidates.clone();
                longest.sort_by(|a, b| b.length().total_cmp(&a.length()));
                longest.truncate(cfg.fallback_wall_count);
                log.warning(
                    Stage::Geometry,
                    "exterior_walls_fallback",
                    format!(
                        "page {}: outline incomplete, using the {} longest strokes as exterior walls",
                        page.index,
                        longest.len()
                    ),
                );
                (longest, GeometrySource::Fallback)
            }
        };

        let mut notes = Vec::new();
        let loop_pts = close_loop(&exterior, cfg.loop_snap_ft);
        let footprint = loop_pts.and_then(|pts| Polygon::new("footprint", pts).ok());
        let pts: Vec<Point> = exterior.iter().flat_map(|s| [s.start, s.end]).collect();
        let bbox = BoundingBox::from_points(&pts);

        let (floor_area, perimeter, footprint, closed) = match (footprint, bbox) {
            (Some(poly), _) => (poly.area(), poly.perimeter(), Some(poly), true),
            (None, Some(bb)) => {
                notes.push("floor area from bounding box".to_string());
                log.info(
                    Stage::Geometry,
                    "floor_area_from_bbox",
                    format!("page {}: exterior walls do not close, area from bounding box", page.index),
                );
                let rect = Polygon::rectangle("footprint", bb.min, bb.max).ok();
                (
                    bb.area() * cfg.bbox_area_factor,
                    2.0 * (bb.width() + bb.height()),
                    rect,
                    false,
                )
            }
            (None, None) => return self.default_envelope(ctx, log, "empty exterior"),
        };

        let confidence = match (source, closed) {
            (GeometrySource::Detected, true) => 0.85,
            (GeometrySource::Detected, false) => 0.7,
            (_, true) => 0.55,
            _ => 0.45,
        };

        let height = ctx.wall_height_ft.unwrap_or(cfg.wall_height_ft);
        let center = bbox.map(|b| b.center()).unwrap_or_default();
        let walls: Vec<Wall> = exterior
            .iter()
            .map(|s| {
                Wall::new(
                    s.start,
                    s.end,
                    height,
                    outward_orientation(s, center, ctx.north_angle_deg),
                )
            })
            .collect();
        let walls = self.attach_openings(walls, floor_area, ctx, &mut notes, log);

        let (lo, hi) = cfg.plausible_floor_area_ft2;
        if !(lo..=hi).contains(&floor_area) {
            log.warning(
                Stage::Geometry,
                "implausible_floor_area",
                format!(
                    "page {}: floor area {floor_area:.0} ft² outside {lo:.0}-{hi:.0}, scale may be wrong",
                    page.index
                ),
            );
        }

        let note = format!(
            "page {}: {} exterior walls, {floor_area:.0} ft², perimeter {perimeter:.0} ft",
            page.index,
            walls.len()
        );
        match source {
            GeometrySource::Detected => log.detected(Stage::Geometry, "exterior_walls", confidence, note),
            _ => log.inferred(Stage::Geometry, "exterior_walls", confidence, note),
        }
        if closed {
            log.detected(Stage::Geometry, "floor_area", confidence, "closed outline");
        } else {
            log.inferred(Stage::Geometry, "floor_area", confidence, "bounding box heuristic");
        }
        tracing::debug!(
            page = page.index,
            walls = walls.len(),
            floor_area,
            perimeter,
            ?source,
            "exterior geometry"
        );

        ExteriorGeometry {
            walls,
            perimeter_ft: perimeter,
            floor_area_ft2: floor_area,
            bbox,
            footprint,
            wall_height_ft: height,
            source,
            confidence,
            notes,
        }
    }

    /// Outermost walls on each side, with collinear pieces merged.
    ///
    /// Returns `None` unless two distinct horizontal and two distinct vertical
    /// extremes exist.
    fn select_extremes(&self, candidates: &[Segment]) -> Option<Vec<Segment>> {
        let cfg = &self.config;
        let tol = cfg.collinear_tolerance_ft;
        let horiz: Vec<&Segment> = candidates
            .iter()
            .filter(|s| s.is_horizontal(cfg.axis_tolerance_deg))
            .collect();
        let vert: Vec<&Segment> = candidates
            .iter()
            .filter(|s| s.is_vertical(cfg.axis_tolerance_deg))
            .collect();

        let y = |s: &Segment| s.midpoint().y;
        let x = |s: &Segment| s.midpoint().x;
        let top = horiz.iter().map(|s| y(s)).fold(f64::INFINITY, f64::min);
        let bottom = horiz.iter().map(|s| y(s)).fold(f64::NEG_INFINITY, f64::max);
        let left = vert.iter().map(|s| x(s)).fold(f64::INFINITY, f64::min);
        let right = vert.iter().map(|s| x(s)).fold(f64::NEG_INFINITY, f64::max);
        if horiz.len() < 2 || vert.len() < 2 || bottom - top <= tol || right - left <= tol {
            return None;
        }

        let mut out = Vec::new();
        for line in [top, bottom] {
            let group: Vec<Segment> = horiz
                .iter()
                .filter(|s| (y(s) - line).abs() <= tol)
                .map(|s| **s)
                .collect();
            out.extend(merge_collinear(&group, true, cfg.loop_snap_ft));
        }
        for line in [left, right] {
            let group: Vec<Segment> = vert
                .iter()
                .filter(|s| (x(s) - line).abs() <= tol)
                .map(|s| **s)
                .collect();
            out.extend(merge_collinear(&group, false, cfg.loop_snap_ft));
        }
        Some(out)
    }

    /// Distributes window and door area over the walls.
    fn attach_openings(
        &self,
        walls: Vec<Wall>,
        floor_area: f64,
        ctx: &GeometryContext,
        notes: &mut Vec<String>,
        log: &mut RunLog,
    ) -> Vec<Wall> {
        let cfg = &self.config;
        let share = if ctx.schedule_share > 0.0 {
            ctx.schedule_share
        } else {
            1.0
        };
        let schedule = ctx.schedule.filter(|s| !s.is_empty());

        let mut window_targets: BTreeMap<Orientation, f64> = BTreeMap::new();
        let mut unassigned_windows = 0.0;
        let mut door_total = 0.0;
        match schedule {
            Some(sched) if !sched.windows.is_empty() => {
                for entry in &sched.windows {
                    let area = entry.total_area() * share;
                    match entry.orientation.as_deref().and_then(parse_orientation) {
                        Some(o) => *window_targets.entry(o).or_insert(0.0) += area,
                        None => unassigned_windows += area,
                    }
                }
                log.detected(Stage::Geometry, "window_area", 0.8, "window schedule");
                notes.push("windows from schedule".to_string());
            }
            _ => {
                unassigned_windows = floor_area * cfg.default_glazing_fraction;
                log.defaulted(
                    Stage::Geometry,
                    "window_area",
                    0.5,
                    format!("{:.0}% of floor area", cfg.default_glazing_fraction * 100.0),
                );
                notes.push("default glazing split".to_string());
            }
        }
        for (o, frac) in &cfg.glazing_split {
            *window_targets.entry(*o).or_insert(0.0) += unassigned_windows * frac;
        }

        match schedule {
            Some(sched) if !sched.doors.is_empty() => {
                door_total = sched.doors.iter().map(|d| d.total_area()).sum::<f64>() * share;
                log.detected(Stage::Geometry, "door_area", 0.8, "door schedule");
            }
            _ if ctx.is_entry_level => {
                door_total = cfg.default_door_count as f64 * cfg.default_door_area_ft2;
                log.defaulted(Stage::Geometry, "door_area", 0.5, "default exterior doors");
            }
            _ => {}
        }

        let n = walls.len();
        let mut win = vec![0.0; n];
        for (orientation, area) in window_targets {
            if area <= 0.0 {
                continue;
            }
            let Some(target) = nearest_present_orientation(&walls, orientation) else {
                continue;
            };
            let idx: Vec<usize> = (0..n).filter(|&i| walls[i].orientation() == target).collect();
            let total_len: f64 = idx.iter().map(|&i| walls[i].length()).sum();
            if total_len <= 0.0 {
                continue;
            }
            for i in idx {
                win[i] += area * walls[i].length() / total_len;
            }
        }
        let total_len: f64 = walls.iter().map(|w| w.length()).sum();
        walls
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let door = if total_len > 0.0 {
                    door_total * w.length() / total_len
                } else {
                    0.0
                };
                w.with_openings(win[i], door)
            })
            .collect()
    }

    /// Rectangular envelope used when the page has no usable geometry.
    pub fn default_envelope(
        &self,
        ctx: &GeometryContext,
        log: &mut RunLog,
        reason: &str,
    ) -> ExteriorGeometry {
        let cfg = &self.config;
        let area = ctx
            .floor_area_hint_ft2
            .filter(|a| *a > 0.0)
            .unwrap_or(cfg.default_floor_area_ft2);
        let width = (area * cfg.default_aspect_ratio).sqrt();
        let depth = area / width;
        let height = ctx.wall_height_ft.unwrap_or(cfg.wall_height_ft);
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, depth),
            Point::new(0.0, depth),
        ];
        let center = Point::new(width / 2.0, depth / 2.0);
        let walls: Vec<Wall> = (0..4)
            .map(|i| {
                let s = Segment::new(corners[i], corners[(i + 1) % 4]);
                Wall::new(s.start, s.end, height, outward_orientation(&s, center, 0.0))
            })
            .collect();
        log.warning(
            Stage::Geometry,
            "no_envelope_geometry",
            format!("{reason}; using a {area:.0} ft² rectangular default envelope"),
        );
        log.defaulted(Stage::Geometry, "exterior_walls", 0.2, reason.to_string());
        log.defaulted(Stage::Geometry, "floor_area", 0.2, "default envelope");
        tracing::info!(reason, area, "default envelope");

        let mut notes = vec![format!("default envelope: {reason}")];
        let walls = self.attach_openings(walls, area, ctx, &mut notes, log);
        ExteriorGeometry {
            walls,
            perimeter_ft: 2.0 * (width + depth),
            floor_area_ft2: area,
            bbox: Some(BoundingBox::new(corners[0], corners[2])),
            footprint: Polygon::rectangle("footprint", corners[0], corners[2]).ok(),
            wall_height_ft: height,
            source: GeometrySource::Default,
            confidence: 0.2,
            notes,
        }
    }
}

/// Compass bucket of the outward normal of `s`, relative to the building center.
pub fn outward_orientation(s: &Segment, center: Point, north_angle_deg: f64) -> Orientation {
    let mut normal = s.direction().perpendicular();
    if normal.dot(s.midpoint() - center) < 0.0 {
        normal = normal * -1.0;
    }
    Orientation::from_bearing(Orientation::bearing_of_page_direction(normal, north_angle_deg))
}

fn parse_orientation(text: &str) -> Option<Orientation> {
    match text.trim().to_uppercase().as_str() {
        "N" | "NORTH" => Some(Orientation::N),
        "NE" | "NORTHEAST" => Some(Orientation::NE),
        "E" | "EAST" => Some(Orientation::E),
        "SE" | "SOUTHEAST" => Some(Orientation::SE),
        "S" | "SOUTH" => Some(Orientation::S),
        "SW" | "SOUTHWEST" => Some(Orientation::SW),
        "W" | "WEST" => Some(Orientation::W),
        "NW" | "NORTHWEST" => Some(Orientation::NW),
        _ => None,
    }
}

fn nearest_present_orientation(walls: &[Wall], wanted: Orientation) -> Option<Orientation> {
    walls
        .iter()
        .map(|w| w.orientation())
        .min_by(|a, b| {
            a.angular_distance(&wanted)
                .total_cmp(&b.angular_distance(&wanted))
                .then(a.cmp(b))
        })
}

/// Drops segments that duplicate another one (either direction).
fn dedup_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let tol = 0.1;
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for s in segments {
        let dup = out.iter().any(|o| {
            (o.start.is_within(&s.start, tol) && o.end.is_within(&s.end, tol))
                || (o.start.is_within(&s.end, tol) && o.end.is_within(&s.start, tol))
        });
        if !dup {
            out.push(s);
        }
    }
    out
}

/// Merges overlapping or nearly touching collinear segments of one extreme line.
fn merge_collinear(group: &[Segment], horizontal: bool, gap: f64) -> Vec<Segment> {
    let mut spans: Vec<(f64, f64, f64)> = group
        .iter()
        .map(|s| {
            if horizontal {
                let (a, b) = (s.start.x.min(s.end.x), s.start.x.max(s.end.x));
                (a, b, s.midpoint().y)
            } else {
                let (a, b) = (s.start.y.min(s.end.y), s.start.y.max(s.end.y));
                (a, b, s.midpoint().x)
            }
        })
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64, f64, usize)> = Vec::new();
    for (a, b, c) in spans {
        match merged.last_mut() {
            Some(last) if a <= last.1 + gap => {
                last.1 = last.1.max(b);
                last.2 += c;
                last.3 += 1;
            }
            _ => merged.push((a, b, c, 1)),
        }
    }
    merged
        .into_iter()
        .map(|(a, b, c_sum, n)| {
            let c = c_sum / n as f64;
            if horizontal {
                Segment::new(Point::new(a, c), Point::new(b, c))
            } else {
                Segment::new(Point::new(c, a), Point::new(c, b))
            }
        })
        .collect()
}

/// Chains segments end to end; returns the ring if it closes within `snap`.
pub fn close_loop(segments: &[Segment], snap: f64) -> Option<Vec<Point>> {
    if segments.len() < 3 {
        return None;
    }
    let mut used = vec![false; segments.len()];
    used[0] = true;
    let start = segments[0].start;
    let mut ring = vec![start];
    let mut current = segments[0].end;
    for _ in 1..segments.len() {
        let next = segments.iter().enumerate().find_map(|(i, s)| {
            if used[i] {
                None
            } else if s.start.is_within(&current, snap) {
                Some((i, s.start, s.end))
            } else if s.end.is_within(&current, snap) {
                Some((i, s.end, s.start))
            } else {
                None
            }
        });
        let (i, near, far) = next?;
        used[i] = true;
        ring.push(near);
        current = far;
    }
    current.is_within(&start, snap).then_some(ring)
}
