//! Boolean operations on plan polygons.
//!
//! Only intersection is needed: room overlap checks and vertical overlap between
//! floors. Clipping uses Sutherland-Hodgman, which is exact when the clip
//! polygon is convex; concave clip polygons are replaced by their hull, which
//! overestimates overlap slightly.

use anyhow::Result;

use crate::geom::point::Point;
use crate::geom::polygon::{Polygon, convex_hull, signed_area};
use crate::geom::segment::line_intersection;

/// Computes the intersection polygon of two plan polygons.
///
/// Returns `Ok(None)` if they do not overlap.
pub fn polygon_intersection(poly1: &Polygon, poly2: &Polygon) -> Result<Option<Polygon>> {
    if !poly1.bbox().overlaps(&poly2.bbox()) {
        return Ok(None);
    }

    let clip: Vec<Point> = if poly2.is_convex() {
        poly2.vertices().to_vec()
    } else {
        convex_hull(poly2.vertices())
    };

    let result = sutherland_hodgman(poly1.vertices(), &clip);
    if result.len() < 3 || signed_area(&result).abs() < 1e-9 {
        return Ok(None);
    }

    let name = format!("{}_intersect_{}", poly1.name, poly2.name);
    Ok(Some(Polygon::new(&name, result)?))
}

/// Overlap area between two plan polygons (0 when disjoint).
pub fn polygon_overlap_area(poly1: &Polygon, poly2: &Polygon) -> f64 {
    match polygon_intersection(poly1, poly2) {
        Ok(Some(p)) => p.area(),
        _ => 0.0,
    }
}

fn sutherland_hodgman(subject: &[Point], clip_poly: &[Point]) -> Vec<Point> {
    let mut output = subject.to_vec();

    for i in 0..clip_poly.len() {
        if output.is_empty() {
            break;
        }

        let edge_start = clip_poly[i];
        let edge_end = clip_poly[(i + 1) % clip_poly.len()];

        let input = output;
        output = Vec::new();

        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];

            let curr_inside = is_inside_edge(current, edge_start, edge_end);
            let prev_inside = is_inside_edge(previous, edge_start, edge_end);

            if curr_inside {
                if !prev_inside
                    && let Some(p) = line_intersection(previous, current, edge_start, edge_end)
                {
                    output.push(p);
                }
                output.push(current);
            } else if prev_inside
                && let Some(p) = line_intersection(previous, current, edge_start, edge_end)
            {
                output.push(p);
            }
        }
    }

    let mut result: Vec<Point> = Vec::with_capacity(output.len());
    for pt in output {
        if result.last().is_none_or(|last| !last.is_within(&pt, 1e-9)) {
            result.push(pt);
        }
    }
    if result.len() > 1 && result[0].is_within(&result[result.len() - 1], 1e-9) {
        result.pop();
    }
    result
}

/// Left side of a counter-clockwise clip edge is inside.
fn is_inside_edge(point: Point, edge_start: Point, edge_end: Point) -> bool {
    (edge_end - edge_start).cross(point - edge_start) >= -1e-10
}
