use serde::{Deserialize, Serialize};

use super::boundary::BoundaryTemperatures;
use crate::geom::wall::Orientation;

/// Assembly allowances and plausibility bands for the thermal envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub wall_framing_factor: f64,
    /// Sheathing, finishes and air films of a wall, h·ft²·°F/BTU.
    pub wall_assembly_r: f64,
    pub ceiling_framing_factor: f64,
    pub ceiling_assembly_r: f64,
    pub floor_framing_factor: f64,
    pub floor_assembly_r: f64,
    pub door_u: f64,
    pub default_duct_r: f64,
    pub default_slab_edge_r: f64,
    pub default_below_grade_depth_ft: f64,
    pub default_below_grade_wall_r: f64,
    /// Floor framing between stories, added to the ceiling height.
    pub floor_assembly_height_ft: f64,
    pub shape_factor_band: (f64, f64),
    pub window_wall_ratio_band: (f64, f64),
    pub wall_r_band: (f64, f64),
    pub ceiling_r_band: (f64, f64),
    pub ach50_band: (f64, f64),
    /// Confidence multiplier per implausible value.
    pub implausible_penalty: f64,
}

impl EnvelopeConfig {
    pub fn new() -> Self {
        Self {
            wall_framing_factor: 0.85,
            wall_assembly_r: 3.0,
            ceiling_framing_factor: 0.93,
            ceiling_assembly_r: 2.0,
            floor_framing_factor: 0.90,
            floor_assembly_r: 3.0,
            door_u: 0.35,
            default_duct_r: 6.0,
            default_slab_edge_r: 0.0,
            default_below_grade_depth_ft: 7.0,
            default_below_grade_wall_r: 5.0,
            floor_assembly_height_ft: 1.0,
            shape_factor_band: (3.8, 8.0),
            window_wall_ratio_band: (0.05, 0.40),
            wall_r_band: (3.0, 40.0),
            ceiling_r_band: (5.0, 80.0),
            ach50_band: (1.0, 25.0),
            implausible_penalty: 0.85,
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibration of the load engine.
///
/// Several of these (ELA divisors, coupling discounts, the outflow weight)
/// are empirical and should be re-validated against measured houses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub indoor_heating_f: f64,
    pub indoor_cooling_f: f64,
    pub sensible_factor: f64,
    pub latent_factor: f64,
    pub safety_factor: f64,
    pub btuh_per_ton: f64,
    pub ton_step: f64,
    pub min_tons: f64,
    pub max_single_system_tons: f64,

    /// AIM-2 stack coefficient.
    pub stack_coefficient: f64,
    /// Wind coefficients by story count (1, 2, 3+) and shielding class (1..=5).
    pub wind_coefficients: [[f64; 5]; 3],
    /// Terrain (α, γ) for classes 1..=5.
    pub terrain_parameters: [(f64, f64); 5],
    pub default_shielding_class: u8,
    pub default_terrain_class: u8,
    /// CFM50 per square inch of leakage area, by story count (1, 2, 3+).
    pub ela_divisors: [f64; 3],
    pub balanced_max_reduction: f64,
    /// Cooling design wind as a share of the heating design wind.
    pub cooling_wind_fraction: f64,
    pub met_station_height_ft: f64,

    pub neutral_plane_fraction: f64,
    /// Weight of floors on the outflow side of the neutral plane.
    pub outflow_weight: f64,
    pub inter_floor_offset_f: f64,
    pub inter_floor_u: f64,
    /// Building-wide discount for 2, 3 and 4+ floors.
    pub coupling_discounts: [f64; 3],

    pub duct_supply_area_fraction: f64,
    pub duct_return_area_fraction: f64,
    pub duct_film_r: f64,
    pub cfm_per_ton: f64,
    pub ft2_per_ton: f64,
    pub supply_leak_share: f64,

    /// Peak solar gain per ft² of glass per unit SHGC.
    pub solar_n: f64,
    pub solar_ne_nw: f64,
    pub solar_e_w: f64,
    pub solar_se_sw: f64,
    pub solar_s: f64,
    pub occupant_sensible_btuh: f64,
    pub occupant_latent_btuh: f64,
    pub lighting_w_per_ft2: f64,
    pub kitchen_btuh: f64,
    pub base_appliance_btuh: f64,

    /// Plausible design heating load, BTU/h per ft².
    pub sanity_band_btuh_per_ft2: (f64, f64),
    /// Basement slab against the ground.
    pub basement_floor_u: f64,
    pub boundary_temperatures: BoundaryTemperatures,
}

impl LoadConfig {
    pub fn new() -> Self {
        Self {
            indoor_heating_f: 70.0,
            indoor_cooling_f: 75.0,
            sensible_factor: 1.08,
            latent_factor: 0.68,
            safety_factor: 1.1,
            btuh_per_ton: 12_000.0,
            ton_step: 0.5,
            min_tons: 1.5,
            max_single_system_tons: 5.0,
            stack_coefficient: 0.0429,
            wind_coefficients: [
                [0.109, 0.096, 0.081, 0.062, 0.035],
                [0.138, 0.121, 0.102, 0.078, 0.044],
                [0.161, 0.141, 0.119, 0.091, 0.051],
            ],
            terrain_parameters: [(1.30, 0.10), (1.00, 0.15), (0.85, 0.20), (0.67, 0.25), (0.47, 0.35)],
            default_shielding_class: 3,
            default_terrain_class: 3,
            ela_divisors: [20.0, 18.0, 16.0],
            balanced_max_reduction: 0.5,
            cooling_wind_fraction: 0.5,
            met_station_height_ft: 33.0,
            neutral_plane_fraction: 0.4,
            outflow_weight: 0.3,
            inter_floor_offset_f: 2.0,
            inter_floor_u: 0.25,
            coupling_discounts: [0.05, 0.075, 0.10],
            duct_supply_area_fraction: 0.27,
            duct_return_area_fraction: 0.05,
            duct_film_r: 0.7,
            cfm_per_ton: 400.0,
            ft2_per_ton: 600.0,
            supply_leak_share: 0.6,
            solar_n: 20.0,
            solar_ne_nw: 60.0,
            solar_e_w: 90.0,
            solar_se_sw: 75.0,
            solar_s: 50.0,
            occupant_sensible_btuh: 230.0,
            occupant_latent_btuh: 200.0,
            lighting_w_per_ft2: 0.5,
            kitchen_btuh: 1200.0,
            base_appliance_btuh: 300.0,
            sanity_band_btuh_per_ft2: (15.0, 60.0),
            basement_floor_u: 0.025,
            boundary_temperatures: BoundaryTemperatures::new(),
        }
    }

    pub fn solar_factor(&self, orientation: Orientation) -> f64 {
        use Orientation::*;
        match orientation {
            N => self.solar_n,
            NE | NW => self.solar_ne_nw,
            E | W => self.solar_e_w,
            SE | SW => self.solar_se_sw,
            S => self.solar_s,
        }
    }

    /// Index into the per-story tables (1, 2, 3+ stories).
    pub fn story_index(stories: usize) -> usize {
        stories.clamp(1, 3) - 1
    }

    pub fn coupling_discount(&self, floors: usize) -> f64 {
        match floors {
            0 | 1 => 0.0,
            n => self.coupling_discounts[(n - 2).min(2)],
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_overrides() {
        let cfg: LoadConfig = serde_json::from_str(r#"{"safety_factor": 1.2}"#).unwrap();
        assert!((cfg.safety_factor - 1.2).abs() < 1e-12);
        assert!((cfg.stack_coefficient - 0.0429).abs() < 1e-12);
    }

    #[test]
    fn test_lookups() {
        let cfg = LoadConfig::new();
        assert!((cfg.solar_factor(Orientation::SW) - 75.0).abs() < 1e-12);
        assert_eq!(LoadConfig::story_index(0), 0);
        assert_eq!(LoadConfig::story_index(7), 2);
        assert!(cfg.coupling_discount(1).abs() < 1e-12);
        assert!((cfg.coupling_discount(2) - 0.05).abs() < 1e-12);
        assert!((cfg.coupling_discount(3) - 0.075).abs() < 1e-12);
        assert!((cfg.coupling_discount(6) - 0.10).abs() < 1e-12);
    }
}
