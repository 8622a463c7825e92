//! Spatial relations between plan polygons.

use crate::geom::polygon::Polygon;
use crate::geom::polygon::boolean::polygon_overlap_area;

/// Minimum distance between the outlines of two polygons.
///
/// Returns 0.0 if they touch or overlap.
pub fn polygon_distance(poly1: &Polygon, poly2: &Polygon) -> f64 {
    if polygon_overlap_area(poly1, poly2) > 0.0 {
        return 0.0;
    }
    if poly1.vertices().iter().any(|p| poly2.contains(*p))
        || poly2.vertices().iter().any(|p| poly1.contains(*p))
    {
        return 0.0;
    }

    let mut min_dist = f64::MAX;
    for a in poly1.edges() {
        for b in poly2.edges() {
            min_dist = min_dist.min(a.distance_to_segment(&b));
        }
    }
    min_dist
}

/// Estimated length of wall shared by two polygons.
///
/// Sums the projected overlap of every pair of parallel edges that lie within
/// `max_gap` of each other. A wall drawn with thickness shows up as two
/// parallel edges `max_gap` apart, so the threshold is the wall thickness.
pub fn shared_edge_length(poly1: &Polygon, poly2: &Polygon, max_gap: f64, tol_deg: f64) -> f64 {
    let mut total = 0.0;
    for a in poly1.edges() {
        let mut best: f64 = 0.0;
        for b in poly2.edges() {
            if !a.direction().is_parallel(&b.direction(), tol_deg) {
                continue;
            }
            let gap = a.distance_to_point(b.start).min(a.distance_to_point(b.end));
            let gap = gap.min(b.distance_to_point(a.start)).min(b.distance_to_point(a.end));
            if gap > max_gap {
                continue;
            }
            best = best.max(a.projected_overlap(&b));
        }
        total += best;
    }
    total
}
