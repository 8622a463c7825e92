//! Text-label and rectangle based room detection.

use regex::Regex;
use std::sync::LazyLock;

use super::{CeilingType, Evidence, RoomType, Space, SpaceConfig};
use crate::confidence::Source;
use crate::geom::bboxes::BoundingBox;
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::io::PageExtraction;
use crate::io::extraction::TextBlock;
use crate::plan::scale::ScaleResult;
use crate::plan::scale::methods::normalize_marks;

static PLAN_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(BASEMENT|LOWER|FIRST|1ST|MAIN|GROUND|SECOND|2ND|UPPER|THIRD|3RD)\s+(?:(?:FLOOR|LEVEL|FLR)\s+)?PLAN\b",
    )
    .expect("valid plan title regex")
});

static FLOOR_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(BASEMENT|FIRST|1ST|MAIN|GROUND|SECOND|2ND|UPPER|THIRD|3RD)\s+(?:FLOOR|LEVEL|FLR)\b")
        .expect("valid floor mention regex")
});

static AREA_SQFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(?:SQ\.?\s*FT\.?|SQFT|S\.F\.|SF\b|FT²|FT2|SQUARE\s+FEET)",
    )
    .expect("valid area regex")
});

static DIMS_FEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\d+)\s*'\s*(?:-?\s*(\d+(?:\.\d+)?)\s*")?\s*[X×]\s*(\d+)\s*'\s*(?:-?\s*(\d+(?:\.\d+)?)\s*")?"#,
    )
    .expect("valid feet dimension regex")
});

static DIMS_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+(?:\.\d+)?)\s*[X×]\s*(\d+(?:\.\d+)?)\b").expect("valid dimension regex")
});

fn level_of(word: &str) -> Option<i32> {
    match word {
        "BASEMENT" | "LOWER" => Some(0),
        "FIRST" | "1ST" | "MAIN" | "GROUND" => Some(1),
        "SECOND" | "2ND" | "UPPER" => Some(2),
        "THIRD" | "3RD" => Some(3),
        _ => None,
    }
}

/// Floor level named by the page, preferring a plan title over any mention.
pub fn page_floor_level(page: &PageExtraction) -> Option<i32> {
    let texts: Vec<String> = page.text_blocks.iter().map(|t| normalize_marks(&t.text)).collect();
    texts
        .iter()
        .find_map(|t| PLAN_TITLE.captures(t).and_then(|c| level_of(&c[1])))
        .or_else(|| {
            texts
                .iter()
                .find_map(|t| FLOOR_MENTION.captures(t).and_then(|c| level_of(&c[1])))
        })
}

/// Floor level stated in a room label itself, e.g. "2ND FLOOR (BONUS)".
pub fn label_floor_level(label: &str) -> Option<i32> {
    let t = normalize_marks(label);
    if let Some(c) = FLOOR_MENTION.captures(&t) {
        return level_of(&c[1]);
    }
    t.contains("BASEMENT").then_some(0)
}

/// Upper-cased label with punctuation turned into spaces and digits split off,
/// padded so whole-word matches can use `contains(" KEY ")`.
fn tokenize(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 8);
    let mut prev: Option<char> = None;
    for ch in label.to_uppercase().chars() {
        let c = if ch.is_ascii_alphanumeric() { ch } else { ' ' };
        if let Some(p) = prev
            && c != ' '
            && p != ' '
            && p.is_ascii_digit() != c.is_ascii_digit()
        {
            out.push(' ');
        }
        out.push(c);
        prev = Some(c);
    }
    format!(" {} ", out.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Room type named by a label, if any.
pub fn classify_label(label: &str, cfg: &SpaceConfig) -> Option<RoomType> {
    let upper = normalize_marks(label);
    if upper.trim().is_empty() || upper.chars().count() > cfg.max_label_chars {
        return None;
    }
    let padded = format!(" {upper}");
    if cfg.denylist.iter().any(|d| padded.contains(d.as_str())) {
        return None;
    }
    let tokens = tokenize(&strip_over_garage(&upper));
    cfg.profiles
        .iter()
        .find(|p| {
            p.keywords
                .iter()
                .any(|k| tokens.contains(&format!(" {} ", k.trim())))
        })
        .map(|p| p.room_type)
}

fn strip_over_garage(upper: &str) -> String {
    upper.replace("OVER GARAGE", " ").replace("ABOVE GARAGE", " ")
}

fn is_over_garage(label: &str) -> bool {
    let u = normalize_marks(label);
    u.contains("OVER GARAGE") || u.contains("ABOVE GARAGE")
}

fn ceiling_from_label(label: &str) -> Option<CeilingType> {
    let u = normalize_marks(label);
    if u.contains("VAULT") || u.contains("CATHEDRAL") {
        Some(CeilingType::Vaulted)
    } else if u.contains("OPEN TO BELOW") {
        Some(CeilingType::OpenToBelow)
    } else {
        None
    }
}

/// Area stated in a text fragment, with the evidence that produced it.
pub fn parse_area(text: &str) -> Option<(f64, Evidence)> {
    let t = normalize_marks(text);
    if let Some(c) = AREA_SQFT.captures(&t) {
        let area: f64 = c[1].replace(',', "").parse().ok()?;
        if area > 0.0 {
            return Some((area, Evidence::AreaText(c[0].trim().to_string())));
        }
    }
    let feet = |whole: &str, inches: Option<regex::Match>| -> Option<f64> {
        let f: f64 = whole.parse().ok()?;
        let i: f64 = inches.map(|m| m.as_str().parse::<f64>().unwrap_or(0.0)).unwrap_or(0.0);
        Some(f + i / 12.0)
    };
    let dims = if let Some(c) = DIMS_FEET.captures(&t) {
        Some((feet(&c[1], c.get(2))?, feet(&c[3], c.get(4))?, c[0].trim().to_string()))
    } else if let Some(c) = DIMS_PLAIN.captures(&t) {
        Some((c[1].parse().ok()?, c[2].parse().ok()?, c[0].trim().to_string()))
    } else {
        None
    };
    let (w, d, raw) = dims?;
    let sane = |v: f64| (3.0..=60.0).contains(&v);
    (sane(w) && sane(d)).then(|| (w * d, Evidence::DimensionText(raw)))
}

/// Rectangles in feet inside the room size band that look like single rooms.
fn room_rectangles(page: &PageExtraction, ppf: f64, cfg: &SpaceConfig) -> Vec<BoundingBox> {
    let to_ft = 1.0 / ppf;
    let (lo, hi) = cfg.geometry_area_band_ft2;
    let outline_area = page
        .drawing_extents()
        .map(|b| b.scale(to_ft).area())
        .unwrap_or(0.0);

    let mut rects: Vec<BoundingBox> = Vec::new();
    for r in &page.rectangles {
        let bb = r.bbox().scale(to_ft);
        let area = bb.area();
        if !(lo..=hi).contains(&area) || (outline_area > 0.0 && area >= 0.9 * outline_area) {
            continue;
        }
        let dup = rects
            .iter()
            .any(|o| o.min.is_within(&bb.min, 0.5) && o.max.is_within(&bb.max, 0.5));
        if !dup {
            rects.push(bb);
        }
    }

    let label_centers: Vec<Point> = page
        .text_blocks
        .iter()
        .filter(|t| classify_label(&t.text, cfg).is_some())
        .map(|t| t.center().scale(to_ft))
        .collect();
    let centers: Vec<Point> = rects.iter().map(|r| r.center()).collect();
    rects
        .iter()
        .enumerate()
        .filter(|(i, r)| {
            let nested = centers
                .iter()
                .enumerate()
                .filter(|(j, c)| j != i && r.contains(**c))
                .count();
            let labels = label_centers.iter().filter(|c| r.contains(**c)).count();
            nested <= 1 && labels <= 1
        })
        .map(|(_, r)| *r)
        .collect()
}

/// Smallest rectangle containing `p`.
fn enclosing(rects: &[BoundingBox], p: Point) -> Option<BoundingBox> {
    rects
        .iter()
        .filter(|r| r.contains(p))
        .min_by(|a, b| a.area().total_cmp(&b.area()))
        .copied()
}

fn room_from_label(
    page: &PageExtraction,
    block: &TextBlock,
    room_type: RoomType,
    page_level: Option<i32>,
) -> Space {
    let name = block.text.trim().to_string();
    let mut evidence = vec![Evidence::Label(name.clone())];
    let floor_level = match label_floor_level(&name) {
        Some(level) => {
            evidence.push(Evidence::FloorFromLabel(level));
            level
        }
        None => {
            if let Some(level) = page_level {
                evidence.push(Evidence::FloorFromPage(level));
            }
            page_level.unwrap_or(1)
        }
    };
    let ceiling = match ceiling_from_label(&name) {
        Some(c) => {
            evidence.push(Evidence::CeilingFromLabel(name.clone()));
            c
        }
        None => CeilingType::Flat,
    };
    Space {
        id: String::new(),
        name: name.clone(),
        room_type,
        floor_level,
        area_ft2: 0.0,
        ceiling,
        floor_over: None,
        ceiling_under: None,
        is_over_garage: is_over_garage(&name),
        confidence: 0.6,
        evidence,
        centroid: Point::default(),
        footprint: None,
        area_source: Source::Defaulted,
        page: page.index,
    }
}

/// Rooms named by text labels.
pub fn detect_from_text(
    page: &PageExtraction,
    scale: &ScaleResult,
    page_level: Option<i32>,
    cfg: &SpaceConfig,
) -> Vec<Space> {
    let ppf = scale.pixels_per_foot;
    if ppf <= 0.0 {
        return Vec::new();
    }
    let rects = room_rectangles(page, ppf, cfg);
    let labels: Vec<(usize, RoomType)> = page
        .text_blocks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| classify_label(&t.text, cfg).map(|rt| (i, rt)))
        .collect();
    let radius_px = cfg.area_search_radius_ft * ppf;
    let mut claimed: Vec<usize> = labels.iter().map(|(i, _)| *i).collect();

    let mut rooms = Vec::new();
    for (i, room_type) in labels {
        let block = &page.text_blocks[i];
        let mut room = room_from_label(page, block, room_type, page_level);
        let center_ft = block.center().scale(1.0 / ppf);
        room.centroid = center_ft;

        let own = parse_area(&block.text);
        let nearby = || {
            page.text_blocks
                .iter()
                .enumerate()
                .filter(|(j, _)| !claimed.contains(j))
                .map(|(j, t)| (j, t, t.center().distance(&block.center())))
                .filter(|(_, _, d)| *d <= radius_px)
                .filter_map(|(j, t, d)| parse_area(&t.text).map(|a| (j, a, d)))
                .min_by(|a, b| a.2.total_cmp(&b.2))
        };
        let measured = match own {
            Some(a) => Some(a),
            None => match nearby() {
                Some((j, a, _)) => {
                    claimed.push(j);
                    Some(a)
                }
                None => None,
            },
        };

        let rect = enclosing(&rects, center_ft);
        match (measured, rect) {
            (Some((area, ev)), _) => {
                room.area_ft2 = area;
                room.evidence.push(ev);
                room.area_source = Source::Detected;
                room.confidence = 0.85;
                if let Some(r) = rect
                    && (r.area() - area).abs() <= cfg.duplicate_area_tolerance * area
                {
                    room.footprint = Polygon::rectangle(&room.name, r.min, r.max).ok();
                    room.centroid = r.center();
                }
            }
            (None, Some(r)) => {
                room.area_ft2 = r.area();
                room.evidence.push(Evidence::Rectangle(r.area()));
                room.area_source = Source::Detected;
                room.confidence = 0.8;
                room.footprint = Polygon::rectangle(&room.name, r.min, r.max).ok();
                room.centroid = r.center();
            }
            (None, None) => {
                let typical = cfg.typical_area(room_type);
                room.area_ft2 = typical;
                room.evidence.push(Evidence::TypicalSize(typical));
                room.area_source = Source::Defaulted;
                room.confidence = 0.5;
            }
        }
        rooms.push(room);
    }
    rooms
}

/// Rooms from closed rectangular paths in the room size band.
pub fn detect_from_geometry(
    page: &PageExtraction,
    scale: &ScaleResult,
    page_level: Option<i32>,
    cfg: &SpaceConfig,
) -> Vec<Space> {
    let ppf = scale.pixels_per_foot;
    if ppf <= 0.0 {
        return Vec::new();
    }
    let to_ft = 1.0 / ppf;
    room_rectangles(page, ppf, cfg)
        .into_iter()
        .map(|r| {
            let label = page.text_blocks.iter().find_map(|t| {
                let c = t.center().scale(to_ft);
                if !r.contains(c) {
                    return None;
                }
                classify_label(&t.text, cfg).map(|rt| (t, rt))
            });
            let mut room = match label {
                Some((block, rt)) => {
                    let mut room = room_from_label(page, block, rt, page_level);
                    room.confidence = 0.75;
                    room
                }
                None => {
                    let mut room = room_from_label(
                        page,
                        &TextBlock::new("Room", BoundingBox::new(r.min, r.max)),
                        RoomType::Other,
                        page_level,
                    );
                    room.evidence.retain(|e| !matches!(e, Evidence::Label(_)));
                    room.confidence = 0.55;
                    room
                }
            };
            room.area_ft2 = r.area();
            room.evidence.push(Evidence::Rectangle(r.area()));
            room.area_source = Source::Detected;
            room.centroid = r.center();
            room.footprint = Polygon::rectangle(&room.name, r.min, r.max).ok();
            room
        })
        .collect()
}

/// Combines text and geometry detections for one page.
///
/// Geometry replaces text when it finds materially more area or rooms;
/// otherwise it only adds rooms that are not duplicates. Returns the rooms
/// with fresh ids and whether geometry replaced text.
pub fn merge(text: Vec<Space>, geometry: Vec<Space>, cfg: &SpaceConfig) -> (Vec<Space>, bool) {
    let text_area: f64 = text.iter().map(|r| r.area_ft2).sum();
    let geo_area: f64 = geometry.iter().map(|r| r.area_ft2).sum();
    let geometry_wins = !geometry.is_empty()
        && (geo_area > text_area * cfg.geometry_area_advantage
            || geometry.len() >= text.len() + cfg.geometry_room_advantage);

    let mut rooms = if geometry_wins {
        geometry
    } else {
        let extra: Vec<Space> = geometry
            .into_iter()
            .filter(|g| {
                !text.iter().any(|t| {
                    let same_area = (t.area_ft2 - g.area_ft2).abs()
                        <= cfg.duplicate_area_tolerance * t.area_ft2.max(g.area_ft2);
                    let inside = g.footprint.as_ref().is_some_and(|f| f.contains(t.centroid));
                    t.floor_level == g.floor_level && (same_area || inside)
                })
            })
            .collect();
        let mut rooms = text;
        rooms.extend(extra);
        rooms
    };

    for (n, room) in rooms.iter_mut().enumerate() {
        room.id = format!("p{}-r{}", room.page, n + 1);
        if let Some(fp) = room.footprint.as_mut() {
            fp.name = room.id.clone();
        }
    }
    (rooms, geometry_wins)
}
