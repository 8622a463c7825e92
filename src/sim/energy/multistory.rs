//! Stack-effect redistribution across floors.
//!
//! Building infiltration is split between floors by blending an area share
//! (wind drives every floor alike) with a stack share weighted by distance from
//! the neutral pressure plane. Floors on the inflow side of the plane (below it
//! in winter, above it in summer) carry full weight; floors on the outflow side
//! carry [`LoadConfig::outflow_weight`]. Shares always sum to one.

use serde::{Deserialize, Serialize};

use super::boundary::Season;
use super::config::LoadConfig;
use super::zone::ThermalZone;

/// Vertical extent of one floor, feet above the lowest conditioned floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorSlice {
    pub floor_level: i32,
    pub bottom_ft: f64,
    pub top_ft: f64,
    pub area_ft2: f64,
}

/// Stacks zones bottom-up in level order.
pub fn floor_slices(zones: &[ThermalZone], floor_assembly_height_ft: f64) -> Vec<FloorSlice> {
    let mut ordered: Vec<&ThermalZone> = zones.iter().collect();
    ordered.sort_by_key(|z| z.floor_level);
    let mut z = 0.0;
    let mut out = Vec::with_capacity(ordered.len());
    for (i, zone) in ordered.iter().enumerate() {
        if i > 0 {
            z += floor_assembly_height_ft;
        }
        out.push(FloorSlice {
            floor_level: zone.floor_level,
            bottom_ft: z,
            top_ft: z + zone.ceiling_height_ft,
            area_ft2: zone.conditioned_area_ft2,
        });
        z += zone.ceiling_height_ft;
    }
    out
}

pub fn neutral_plane_height(slices: &[FloorSlice], cfg: &LoadConfig) -> f64 {
    let top = slices.iter().map(|s| s.top_ft).fold(0.0, f64::max);
    cfg.neutral_plane_fraction * top
}

/// ∫|npp − z| dz over [bottom, top], split into the parts below and above the plane.
fn distance_integrals(bottom: f64, top: f64, npp: f64) -> (f64, f64) {
    let below = if bottom < npp {
        let hi = top.min(npp);
        ((npp - bottom).powi(2) - (npp - hi).powi(2)) / 2.0
    } else {
        0.0
    };
    let above = if top > npp {
        let lo = bottom.max(npp);
        ((top - npp).powi(2) - (lo - npp).powi(2)) / 2.0
    } else {
        0.0
    };
    (below, above)
}

fn area_shares(slices: &[FloorSlice]) -> Vec<f64> {
    let total: f64 = slices.iter().map(|s| s.area_ft2.max(0.0)).sum();
    if total <= 0.0 {
        let n = slices.len().max(1) as f64;
        return vec![1.0 / n; slices.len()];
    }
    slices.iter().map(|s| s.area_ft2.max(0.0) / total).collect()
}

/// Normalized stack weights per floor.
pub fn stack_shares(slices: &[FloorSlice], season: Season, cfg: &LoadConfig) -> Vec<f64> {
    let npp = neutral_plane_height(slices, cfg);
    let (w_below, w_above) = match season {
        Season::Heating => (1.0, cfg.outflow_weight),
        Season::Cooling => (cfg.outflow_weight, 1.0),
    };
    let raw: Vec<f64> = slices
        .iter()
        .map(|s| {
            let (below, above) = distance_integrals(s.bottom_ft, s.top_ft, npp);
            // Per unit height the integral grows with floor area
            (w_below * below + w_above * above) * s.area_ft2.max(0.0)
        })
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return area_shares(slices);
    }
    raw.iter().map(|w| w / total).collect()
}

/// Share of building infiltration carried by each floor.
pub fn infiltration_shares(
    slices: &[FloorSlice],
    stack_cfm: f64,
    wind_cfm: f64,
    season: Season,
    cfg: &LoadConfig,
) -> Vec<f64> {
    let area = area_shares(slices);
    let s2 = stack_cfm.max(0.0).powi(2);
    let w2 = wind_cfm.max(0.0).powi(2);
    if slices.len() < 2 || s2 + w2 <= 0.0 {
        return area;
    }
    let wind_fraction = w2 / (s2 + w2);
    let stack = stack_shares(slices, season, cfg);
    area.iter()
        .zip(stack.iter())
        .map(|(a, s)| wind_fraction * a + (1.0 - wind_fraction) * s)
        .collect()
}

/// Splits `total_cfm` between floors. The parts sum to `total_cfm`.
pub fn redistribute(
    total_cfm: f64,
    slices: &[FloorSlice],
    stack_cfm: f64,
    wind_cfm: f64,
    season: Season,
    cfg: &LoadConfig,
) -> Vec<f64> {
    infiltration_shares(slices, stack_cfm, wind_cfm, season, cfg)
        .into_iter()
        .map(|s| s * total_cfm)
        .collect()
}

/// Heat moved between neighbouring floors, BTU/h per floor.
///
/// Warm air rises: in winter the upper floor gains and the lower loses; in
/// summer the lower floor carries the extra load. Sums to zero.
pub fn inter_floor_transfer(slices: &[FloorSlice], season: Season, cfg: &LoadConfig) -> Vec<f64> {
    let mut out = vec![0.0; slices.len()];
    for i in 1..slices.len() {
        let overlap = slices[i - 1].area_ft2.min(slices[i].area_ft2).max(0.0);
        let q = cfg.inter_floor_u * overlap * cfg.inter_floor_offset_f;
        match season {
            Season::Heating => {
                out[i] += q;
                out[i - 1] -= q;
            }
            Season::Cooling => {
                out[i - 1] += q;
                out[i] -= q;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_story() -> Vec<FloorSlice> {
        vec![
            FloorSlice {
                floor_level: 1,
                bottom_ft: 0.0,
                top_ft: 8.0,
                area_ft2: 1000.0,
            },
            FloorSlice {
                floor_level: 2,
                bottom_ft: 9.0,
                top_ft: 17.0,
                area_ft2: 1000.0,
            },
        ]
    }

    #[test]
    fn test_integrals() {
        let (below, above) = distance_integrals(0.0, 10.0, 4.0);
        assert!((below - 8.0).abs() < 1e-12);
        assert!((above - 18.0).abs() < 1e-12);
        let (below, above) = distance_integrals(5.0, 10.0, 4.0);
        assert!(below.abs() < 1e-12);
        assert!((above - (36.0 - 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_heating_loads_the_lower_floor() {
        let cfg = LoadConfig::new();
        let slices = two_story();
        let heating = stack_shares(&slices, Season::Heating, &cfg);
        let cooling = stack_shares(&slices, Season::Cooling, &cfg);
        assert!(heating[0] > heating[1]);
        assert!(cooling[1] > cooling[0]);
        assert!((heating.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_redistribution_is_conserved() {
        let cfg = LoadConfig::new();
        let parts = redistribute(128.0, &two_story(), 97.0, 84.0, Season::Heating, &cfg);
        assert!((parts.iter().sum::<f64>() - 128.0).abs() < 1e-9);
        assert!(parts[0] > 64.0);
    }

    #[test]
    fn test_pure_wind_is_area_weighted() {
        let cfg = LoadConfig::new();
        let mut slices = two_story();
        slices[1].area_ft2 = 500.0;
        let shares = infiltration_shares(&slices, 0.0, 50.0, Season::Heating, &cfg);
        assert!((shares[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_inter_floor_transfer_nets_to_zero() {
        let cfg = LoadConfig::new();
        let h = inter_floor_transfer(&two_story(), Season::Heating, &cfg);
        assert!((h[1] - 0.25 * 1000.0 * 2.0).abs() < 1e-9);
        assert!((h[0] + h[1]).abs() < 1e-12);
        let c = inter_floor_transfer(&two_story(), Season::Cooling, &cfg);
        assert!(c[0] > 0.0 && c[1] < 0.0);
    }
}
