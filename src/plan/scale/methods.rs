//! Individual scale detection methods.
//!
//! Each method looks at one kind of cue and returns zero or more estimates.
//! None of them decides; [`super::ScaleResolver`] does.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::LazyLock;

use super::{ScaleConfig, ScaleEstimate, ScaleMethod, relative_difference};
use crate::geom::segment::Segment;
use crate::io::PageExtraction;

static FRACTION_SCALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\d+\s+\d+/\d+|\d+/\d+|\d+(?:\.\d+)?)\s*(?:"|''|IN(?:CHES|CH)?\.?)?\s*=\s*(\d+(?:\.\d+)?)\s*(?:'|FT\.?|FEET|FOOT)(?:\s*-?\s*0+\s*(?:"|IN\.?)?)?"#,
    )
    .expect("valid fraction scale regex")
});

static RATIO_SCALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b1\s*:\s*(\d+(?:\.\d+)?)\b").expect("valid ratio regex"));

static FEET_INCHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d+)\s*'\s*-?\s*(\d+(?:\.\d+)?)(?:\s+(\d+)/(\d+))?\s*"?$"#)
        .expect("valid feet-inches regex")
});

static FEET_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*(?:'|FT\.?|FEET)$").expect("valid feet regex")
});

static INCHES_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d+(?:\.\d+)?)\s*(?:"|IN\.?|INCHES)$"#).expect("valid inches regex")
});

const IMPERIAL_RATIOS: [f64; 9] = [12.0, 16.0, 24.0, 32.0, 48.0, 64.0, 96.0, 128.0, 192.0];
const METRIC_RATIOS: [f64; 7] = [20.0, 25.0, 50.0, 75.0, 100.0, 200.0, 500.0];

/// Replaces typographic primes and quotes with ASCII ones and upper-cases.
pub fn normalize_marks(text: &str) -> String {
    text.to_uppercase()
        .replace(['’', '′', '‘'], "'")
        .replace(['”', '″', '“'], "\"")
}

/// Parses "1/4", "1 1/2", "3/16" or "1" as inches.
fn parse_inches(s: &str) -> Option<f64> {
    let s = s.trim();
    let (whole, frac) = match s.split_once(char::is_whitespace) {
        Some((w, f)) => (w.trim().parse::<f64>().ok()?, f.trim()),
        None if s.contains('/') => (0.0, s),
        None => return s.parse::<f64>().ok(),
    };
    let (num, den) = frac.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(whole + num / den)
}

/// Parses a dimension string such as `12'-6"`, `12'`, `6"` or `12.5 FT` into feet.
pub fn parse_length_ft(text: &str) -> Option<f64> {
    let t = normalize_marks(text);
    let t = t.trim();
    let value = if let Some(c) = FEET_INCHES.captures(t) {
        let feet: f64 = c[1].parse().ok()?;
        let mut inches: f64 = c[2].parse().ok()?;
        if let (Some(n), Some(d)) = (c.get(3), c.get(4)) {
            let d: f64 = d.as_str().parse().ok()?;
            if d > 0.0 {
                inches += n.as_str().parse::<f64>().ok()? / d;
            }
        }
        feet + inches / 12.0
    } else if let Some(c) = FEET_ONLY.captures(t) {
        c[1].parse().ok()?
    } else if let Some(c) = INCHES_ONLY.captures(t) {
        c[1].parse::<f64>().ok()? / 12.0
    } else {
        return None;
    };
    (value > 0.0).then_some(value)
}

/// Explicit scale notations found in the page text.
pub fn title_block_estimates(page: &PageExtraction, cfg: &ScaleConfig) -> Vec<ScaleEstimate> {
    let mut out = Vec::new();
    for block in &page.text_blocks {
        let text = normalize_marks(&block.text);
        if text.contains("NOT TO SCALE") || text.split_whitespace().any(|w| w == "NTS") {
            continue;
        }
        let has_keyword = text.contains("SCALE");
        for c in FRACTION_SCALE.captures_iter(&text) {
            let Some(inches) = parse_inches(&c[1]) else {
                continue;
            };
            let Ok(feet) = c[2].parse::<f64>() else {
                continue;
            };
            if inches <= 0.0 || feet <= 0.0 {
                continue;
            }
            let conf = if has_keyword { 0.98 } else { 0.95 };
            out.push(ScaleEstimate::new(
                cfg.render_dpi * inches / feet,
                ScaleMethod::TitleBlock,
                conf,
                c[0].trim(),
            ));
        }
        for c in RATIO_SCALE.captures_iter(&text) {
            let Ok(n) = c[1].parse::<f64>() else {
                continue;
            };
            let conf = if IMPERIAL_RATIOS.iter().any(|r| (r - n).abs() < 1e-9) {
                0.90
            } else if METRIC_RATIOS.iter().any(|r| (r - n).abs() < 1e-9) {
                0.85
            } else {
                continue;
            };
            out.push(ScaleEstimate::new(
                cfg.render_dpi * 12.0 / n,
                ScaleMethod::TitleBlock,
                conf,
                c[0].trim(),
            ));
        }
    }
    out
}

/// Most frequent notation on the page; ties go to the more confident one.
pub fn best_title_block(estimates: &[ScaleEstimate]) -> Option<ScaleEstimate> {
    let mut groups: Vec<(f64, usize, &ScaleEstimate)> = Vec::new();
    for e in estimates {
        match groups
            .iter_mut()
            .find(|g| relative_difference(e.pixels_per_foot, g.0) < 0.01)
        {
            Some(g) => {
                g.1 += 1;
                if e.confidence > g.2.confidence {
                    g.2 = e;
                }
            }
            None => groups.push((e.pixels_per_foot, 1, e)),
        }
    }
    groups
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.2.confidence.total_cmp(&b.2.confidence)))
        .map(|g| g.2.clone())
}

/// Pixel-per-foot ratios from dimension labels.
///
/// Each label contributes its anchor distance and, when one is close by, the
/// length of the nearest parallel line.
fn dimension_ratios(page: &PageExtraction) -> Vec<f64> {
    let mut ratios = Vec::new();
    for label in &page.dimension_labels {
        let Some(feet) = label.value_ft.or_else(|| parse_length_ft(&label.text)) else {
            continue;
        };
        if feet <= 0.0 {
            continue;
        }
        let anchor_px = label.pixel_length();
        let anchor = Segment::new(label.anchor_a, label.anchor_b);
        if anchor_px > 1.0 {
            ratios.push(anchor_px / feet);
        }

        let radius = (anchor_px * 0.5).max(48.0);
        let mid = label.midpoint();
        let nearest = page
            .lines
            .iter()
            .filter(|l| l.length() > 1.0)
            .filter(|l| anchor_px <= 1.0 || l.segment().direction().is_parallel(&anchor.direction(), 5.0))
            .map(|l| (l, l.segment().midpoint().distance(&mid)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((line, _)) = nearest {
            ratios.push(line.length() / feet);
        }
    }
    ratios
}

fn count_inliers(ratios: &[f64], candidate: f64, tol: f64) -> usize {
    ratios
        .iter()
        .filter(|r| relative_difference(**r, candidate) <= tol)
        .count()
}

/// Mean after dropping `fraction` of the sorted values from each end.
pub fn trimmed_mean(values: &[f64], fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let k = (v.len() as f64 * fraction.clamp(0.0, 0.49)).floor() as usize;
    let kept = &v[k..v.len() - k];
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// RANSAC over (labeled length, pixel length) pairs.
///
/// The minimal sample is a single pair. Small sets are evaluated exhaustively;
/// larger ones are sampled with a seeded generator so results are reproducible.
pub fn dimension_ransac(page: &PageExtraction, cfg: &ScaleConfig) -> Vec<ScaleEstimate> {
    let ratios = dimension_ratios(page);
    if ratios.len() < cfg.ransac_min_inliers {
        return Vec::new();
    }

    let tol = cfg.ransac_inlier_tolerance;
    let mut best: Option<(f64, usize)> = None;
    let mut consider = |candidate: f64| {
        let n = count_inliers(&ratios, candidate, tol);
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((candidate, n));
        }
    };
    if ratios.len() <= cfg.ransac_iterations {
        for r in &ratios {
            consider(*r);
        }
    } else {
        let mut rng = StdRng::seed_from_u64(cfg.ransac_seed);
        for _ in 0..cfg.ransac_iterations {
            consider(ratios[rng.gen_range(0..ratios.len())]);
        }
    }

    let Some((candidate, n_inliers)) = best else {
        return Vec::new();
    };
    if n_inliers < cfg.ransac_min_inliers {
        return Vec::new();
    }
    let inliers: Vec<f64> = ratios
        .iter()
        .copied()
        .filter(|r| relative_difference(*r, candidate) <= tol)
        .collect();
    let Some(refined) = trimmed_mean(&inliers, cfg.trim_fraction) else {
        return Vec::new();
    };
    let fraction = n_inliers as f64 / ratios.len() as f64;
    vec![ScaleEstimate::new(
        refined,
        ScaleMethod::DimensionRansac,
        (0.5 + 0.4 * fraction).min(0.9),
        &format!("{n_inliers}/{} dimension pairs agree", ratios.len()),
    )]
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Door swings calibrated against a standard door width, checked against
/// hallway widths.
pub fn known_objects(page: &PageExtraction, cfg: &ScaleConfig) -> Vec<ScaleEstimate> {
    let door_ft = (cfg.door_width_ft.0 + cfg.door_width_ft.1) / 2.0;
    let (min_sweep, max_sweep) = cfg.door_sweep_deg;
    let mut ratios: Vec<f64> = page
        .curves
        .iter()
        .filter(|c| c.radius > 0.0 && (min_sweep..=max_sweep).contains(&c.sweep_deg.abs()))
        .map(|c| c.radius / door_ft)
        .collect();
    let n_doors = ratios.len();
    let Some(ppf) = median(&mut ratios) else {
        return Vec::new();
    };

    let hallways = count_hallway_gaps(page, ppf, cfg);
    let confidence = (0.45 + 0.05 * (n_doors as f64 - 1.0)).min(0.65)
        + (0.05 * hallways as f64).min(0.15);
    vec![ScaleEstimate::new(
        ppf,
        ScaleMethod::KnownObject,
        confidence,
        &format!("{n_doors} door swings, {hallways} hallway widths consistent"),
    )]
}

/// Parallel long line pairs whose gap is a plausible hallway width at `ppf`.
fn count_hallway_gaps(page: &PageExtraction, ppf: f64, cfg: &ScaleConfig) -> usize {
    let min_len = 6.0 * ppf;
    let long: Vec<Segment> = page
        .lines
        .iter()
        .map(|l| l.segment())
        .filter(|s| s.length() >= min_len)
        .take(400)
        .collect();
    let (lo, hi) = cfg.hallway_width_ft;
    let mut count = 0;
    for (i, a) in long.iter().enumerate() {
        for b in long.iter().skip(i + 1) {
            let gap = if a.is_horizontal(2.0) && b.is_horizontal(2.0) {
                (a.midpoint().y - b.midpoint().y).abs()
            } else if a.is_vertical(2.0) && b.is_vertical(2.0) {
                (a.midpoint().x - b.midpoint().x).abs()
            } else {
                continue;
            };
            if a.projected_overlap(b) < min_len {
                continue;
            }
            let gap_ft = gap / ppf;
            if (lo..=hi).contains(&gap_ft) {
                count += 1;
            }
        }
    }
    count
}

/// Regular spacing of a sorted, de-duplicated coordinate list.
fn regular_spacing(mut positions: Vec<f64>, min_lines: usize, max_cv: f64) -> Option<f64> {
    positions.sort_by(|a, b| a.total_cmp(b));
    positions.dedup_by(|a, b| (*a - *b).abs() < 2.0);
    if positions.len() < min_lines {
        return None;
    }
    let gaps: Vec<f64> = positions.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    let var = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (var.sqrt() / mean <= max_cv).then_some(mean)
}

/// Structural grid lines matched against common bay sizes.
pub fn grid_spacing(page: &PageExtraction, cfg: &ScaleConfig) -> Vec<ScaleEstimate> {
    let Some(extents) = page.drawing_extents() else {
        return Vec::new();
    };
    let span = extents.width().max(extents.height());
    if span <= 0.0 {
        return Vec::new();
    }
    let long: Vec<Segment> = page
        .lines
        .iter()
        .map(|l| l.segment())
        .filter(|s| s.length() >= 0.5 * span)
        .collect();
    let ys: Vec<f64> = long
        .iter()
        .filter(|s| s.is_horizontal(1.0))
        .map(|s| s.midpoint().y)
        .collect();
    let xs: Vec<f64> = long
        .iter()
        .filter(|s| s.is_vertical(1.0))
        .map(|s| s.midpoint().x)
        .collect();

    // Several bays usually land on some standard scale; among equally good
    // fits the one closest to the default scale wins and confidence drops.
    let mut fits: Vec<(f64, f64)> = Vec::new();
    for positions in [ys, xs] {
        let Some(spacing) = regular_spacing(positions, cfg.min_grid_lines, cfg.grid_regularity)
        else {
            continue;
        };
        for bay in &cfg.bay_sizes_ft {
            let candidate = spacing / bay;
            let (_, rel) = cfg.nearest_standard(candidate);
            if rel <= cfg.agreement_tolerance {
                fits.push((candidate, *bay));
            }
        }
    }
    let mut distinct: Vec<f64> = Vec::new();
    for (ppf, _) in &fits {
        let (standard, _) = cfg.nearest_standard(*ppf);
        if !distinct.iter().any(|d| (d - standard).abs() < 1e-9) {
            distinct.push(standard);
        }
    }
    let preferred = |ppf: f64| (ppf / cfg.default_pixels_per_foot).ln().abs();
    let best = fits.iter().min_by(|a, b| {
        let ra = cfg.nearest_standard(a.0).1;
        let rb = cfg.nearest_standard(b.0).1;
        ra.total_cmp(&rb)
            .then(preferred(a.0).total_cmp(&preferred(b.0)))
    });

    match best {
        Some((ppf, bay)) => {
            let confidence = if distinct.len() > 1 { 0.35 } else { 0.45 };
            vec![ScaleEstimate::new(
                *ppf,
                ScaleMethod::GridSpacing,
                confidence,
                &format!("grid spacing matches {bay} ft bays"),
            )]
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bboxes::BoundingBox;
    use crate::geom::point::Point;
    use crate::io::extraction::{CurvePrimitive, DimensionLabel, LinePrimitive, TextBlock};

    fn text_page(texts: &[&str]) -> PageExtraction {
        PageExtraction {
            text_blocks: texts
                .iter()
                .map(|t| TextBlock::new(t, BoundingBox::new(Point::new(0., 0.), Point::new(1., 1.))))
                .collect(),
            ..PageExtraction::default()
        }
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length_ft("12'-6\""), Some(12.5));
        assert_eq!(parse_length_ft("12'"), Some(12.0));
        assert_eq!(parse_length_ft("6\""), Some(0.5));
        assert_eq!(parse_length_ft("12.5 FT"), Some(12.5));
        assert_eq!(parse_length_ft("10’-3”"), Some(10.25));
        assert_eq!(parse_length_ft("KITCHEN"), None);
        assert_eq!(parse_length_ft("0'"), None);
    }

    #[test]
    fn test_title_block_notations() {
        let cfg = ScaleConfig::new();
        let cases = [
            ("SCALE: 1/4\" = 1'-0\"", 48.0, 0.98),
            ("1/8\" = 1'", 24.0, 0.95),
            ("1/4 IN = 1 FT", 48.0, 0.95),
            ("1\" = 1'-0\"", 192.0, 0.95),
            ("SCALE 1:48", 48.0, 0.90),
            ("1:100", 23.04, 0.85),
        ];
        for (text, ppf, conf) in cases {
            let est = title_block_estimates(&text_page(&[text]), &cfg);
            assert_eq!(est.len(), 1, "{text}");
            assert!((est[0].pixels_per_foot - ppf).abs() < 1e-9, "{text}: {}", est[0].pixels_per_foot);
            assert!((est[0].confidence - conf).abs() < 1e-9, "{text}");
        }
    }

    #[test]
    fn test_title_block_ignores_times_and_nts() {
        let cfg = ScaleConfig::new();
        assert!(title_block_estimates(&text_page(&["PRINTED 1:30 PM"]), &cfg).is_empty());
        assert!(title_block_estimates(&text_page(&["DETAIL A  NTS"]), &cfg).is_empty());
    }

    #[test]
    fn test_most_frequent_notation_wins() {
        let cfg = ScaleConfig::new();
        let est = title_block_estimates(
            &text_page(&["1/8\" = 1'-0\"", "1/4\" = 1'-0\"", "1/4\" = 1'-0\""]),
            &cfg,
        );
        let best = best_title_block(&est).unwrap();
        assert!((best.pixels_per_foot - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_ransac_rejects_outlier() {
        let cfg = ScaleConfig::new();
        let label = |len_px: f64, text: &str, y: f64| DimensionLabel {
            text: text.to_string(),
            anchor_a: Point::new(0.0, y),
            anchor_b: Point::new(len_px, y),
            value_ft: None,
        };
        let page = PageExtraction {
            dimension_labels: vec![
                label(480.0, "10'", 0.0),
                label(600.0, "12'-6\"", 100.0),
                label(720.0, "15'", 200.0),
                label(300.0, "20'", 300.0),
            ],
            ..PageExtraction::default()
        };
        let est = dimension_ransac(&page, &cfg);
        assert_eq!(est.len(), 1);
        assert!((est[0].pixels_per_foot - 48.0).abs() < 1e-9);
        assert!(est[0].confidence > 0.7);
    }

    #[test]
    fn test_door_swings() {
        let cfg = ScaleConfig::new();
        let door = |x: f64| CurvePrimitive {
            center: Point::new(x, 0.0),
            radius: 132.0,
            start_angle_deg: 0.0,
            sweep_deg: 90.0,
        };
        let page = PageExtraction {
            curves: vec![door(0.0), door(500.0), door(900.0)],
            lines: vec![
                LinePrimitive::new(Point::new(0.0, 0.0), Point::new(600.0, 0.0)),
                LinePrimitive::new(Point::new(0.0, 168.0), Point::new(600.0, 168.0)),
            ],
            ..PageExtraction::default()
        };
        let est = known_objects(&page, &cfg);
        assert_eq!(est.len(), 1);
        assert!((est[0].pixels_per_foot - 48.0).abs() < 1e-9);
        // 168 px at 48 px/ft is a 3.5 ft hallway
        assert!(est[0].evidence.contains("1 hallway"));
    }

    #[test]
    fn test_grid_spacing() {
        let cfg = ScaleConfig::new();
        // Grid every 720 px = 15 ft at 48 px/ft
        let lines = (0..5)
            .map(|i| {
                let y = i as f64 * 720.0;
                LinePrimitive::new(Point::new(0.0, y), Point::new(2880.0, y))
            })
            .collect();
        let page = PageExtraction {
            lines,
            ..PageExtraction::default()
        };
        let est = grid_spacing(&page, &cfg);
        assert_eq!(est.len(), 1);
        assert!((est[0].pixels_per_foot - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_trimmed_mean() {
        let m = trimmed_mean(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0], 0.1).unwrap();
        assert!((m - 5.5).abs() < 1e-12);
    }
}
