//! AIM-2 (Sherman-Grimsrud) infiltration.
//!
//! Stack and wind flows through the effective leakage area are combined in
//! quadrature; mechanical ventilation then either offsets part of the natural
//! flow (balanced) or adds to it in quadrature (exhaust or supply only).

use super::boundary::Season;
use super::config::LoadConfig;
use super::result::InfiltrationResult;
use crate::io::ancillary::Ventilation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfiltrationInputs {
    pub season: Season,
    pub ach50: f64,
    pub volume_ft3: f64,
    pub stories: usize,
    pub stack_height_ft: f64,
    pub indoor_f: f64,
    pub outdoor_f: f64,
    /// Meteorological design wind before the cooling reduction.
    pub wind_mph: f64,
    pub shielding_class: u8,
    pub terrain_class: u8,
    pub ventilation: Ventilation,
    pub grains_difference: f64,
}

/// Effective leakage area (in²) from blower-door CFM50.
pub fn effective_leakage_area(cfm50: f64, stories: usize, cfg: &LoadConfig) -> f64 {
    cfm50.max(0.0) / cfg.ela_divisors[LoadConfig::story_index(stories)]
}

/// Wind speed at eave height for the terrain class.
pub fn local_wind_speed(met_wind_mph: f64, height_ft: f64, terrain_class: u8, cfg: &LoadConfig) -> f64 {
    let idx = (terrain_class.clamp(1, 5) - 1) as usize;
    let (alpha, gamma) = cfg.terrain_parameters[idx];
    let h = height_ft.max(1.0) / cfg.met_station_height_ft;
    met_wind_mph.max(0.0) * alpha * h.powf(gamma)
}

pub fn wind_coefficient(stories: usize, shielding_class: u8, cfg: &LoadConfig) -> f64 {
    let s = (shielding_class.clamp(1, 5) - 1) as usize;
    cfg.wind_coefficients[LoadConfig::story_index(stories)][s]
}

pub fn calculate_infiltration(inp: &InfiltrationInputs, cfg: &LoadConfig) -> InfiltrationResult {
    let mut notes = Vec::new();
    let cfm50 = inp.ach50.max(0.0) * inp.volume_ft3.max(0.0) / 60.0;
    let ela = effective_leakage_area(cfm50, inp.stories, cfg);

    let stack_dt = (inp.indoor_f - inp.outdoor_f).abs();
    let stack_cfm = cfg.stack_coefficient * ela * (stack_dt * inp.stack_height_ft.max(0.0)).sqrt();

    let wind_mph = match inp.season {
        Season::Heating => inp.wind_mph,
        Season::Cooling => inp.wind_mph * cfg.cooling_wind_fraction,
    };
    let v_local = local_wind_speed(wind_mph, inp.stack_height_ft, inp.terrain_class, cfg);
    let wind_cfm = wind_coefficient(inp.stories, inp.shielding_class, cfg) * ela * v_local;
    let natural_cfm = (stack_cfm.powi(2) + wind_cfm.powi(2)).sqrt();

    let load_dt = match inp.season {
        Season::Heating => (inp.indoor_f - inp.outdoor_f).max(0.0),
        Season::Cooling => (inp.outdoor_f - inp.indoor_f).max(0.0),
    };

    let ventilation_cfm = inp.ventilation.cfm();
    let (infiltration_cfm, ventilation_load_cfm) = match inp.ventilation {
        Ventilation::None => (natural_cfm, 0.0),
        Ventilation::Balanced {
            recovery_efficiency, ..
        } => {
            let ratio = if natural_cfm > 0.0 {
                (ventilation_cfm / natural_cfm).min(1.0)
            } else {
                1.0
            };
            let reduction = cfg.balanced_max_reduction * ratio;
            notes.push(format!(
                "balanced ventilation offsets {:.0}% of natural infiltration",
                reduction * 100.0
            ));
            let recovery = recovery_efficiency.clamp(0.0, 1.0);
            (natural_cfm * (1.0 - reduction), ventilation_cfm * (1.0 - recovery))
        }
        Ventilation::Exhaust { .. } | Ventilation::Supply { .. } => {
            notes.push("unbalanced ventilation combined with infiltration in quadrature".to_string());
            ((natural_cfm.powi(2) + ventilation_cfm.powi(2)).sqrt(), 0.0)
        }
    };

    let sensible_btuh = cfg.sensible_factor * infiltration_cfm * load_dt;
    let ventilation_sensible_btuh = cfg.sensible_factor * ventilation_load_cfm * load_dt;
    let latent_btuh = match inp.season {
        Season::Heating => 0.0,
        Season::Cooling => {
            cfg.latent_factor * (infiltration_cfm + ventilation_load_cfm) * inp.grains_difference.max(0.0)
        }
    };
    let natural_ach = if inp.volume_ft3 > 0.0 {
        natural_cfm * 60.0 / inp.volume_ft3
    } else {
        0.0
    };

    InfiltrationResult {
        season: inp.season,
        cfm50,
        ela_in2: ela,
        stack_cfm,
        wind_cfm,
        natural_cfm,
        ventilation_cfm,
        infiltration_cfm,
        natural_ach,
        sensible_btuh,
        ventilation_sensible_btuh,
        latent_btuh,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> InfiltrationInputs {
        InfiltrationInputs {
            season: Season::Heating,
            ach50: 5.0,
            volume_ft3: 16_000.0,
            stories: 2,
            stack_height_ft: 17.0,
            indoor_f: 70.0,
            outdoor_f: 15.0,
            wind_mph: 15.0,
            shielding_class: 3,
            terrain_class: 3,
            ventilation: Ventilation::None,
            grains_difference: 0.0,
        }
    }

    #[test]
    fn test_reference_house() {
        let cfg = LoadConfig::new();
        let r = calculate_infiltration(&base(), &cfg);
        assert!((r.cfm50 - 1333.333).abs() < 1e-2);
        assert!((r.ela_in2 - 1333.333 / 18.0).abs() < 1e-2);
        let stack = 0.0429 * r.ela_in2 * (55.0f64 * 17.0).sqrt();
        assert!((r.stack_cfm - stack).abs() < 1e-9);
        assert!((r.natural_cfm - (r.stack_cfm.powi(2) + r.wind_cfm.powi(2)).sqrt()).abs() < 1e-9);
        assert!(r.natural_cfm > 100.0 && r.natural_cfm < 160.0, "natural={}", r.natural_cfm);
        assert!((r.sensible_btuh - 1.08 * r.natural_cfm * 55.0).abs() < 1e-9);
        assert!(r.latent_btuh.abs() < 1e-12);
    }

    #[test]
    fn test_cooling_halves_wind_and_adds_latent() {
        let cfg = LoadConfig::new();
        let heating = calculate_infiltration(&base(), &cfg);
        let cooling = calculate_infiltration(
            &InfiltrationInputs {
                season: Season::Cooling,
                outdoor_f: 89.0,
                indoor_f: 75.0,
                grains_difference: 37.0,
                ..base()
            },
            &cfg,
        );
        assert!(cooling.wind_cfm < heating.wind_cfm);
        assert!(cooling.latent_btuh > 0.0);
        assert!((cooling.sensible_btuh - 1.08 * cooling.infiltration_cfm * 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_ventilation_modes() {
        let cfg = LoadConfig::new();
        let natural = calculate_infiltration(&base(), &cfg).natural_cfm;
        let balanced = calculate_infiltration(
            &InfiltrationInputs {
                ventilation: Ventilation::Balanced {
                    cfm: 10_000.0,
                    recovery_efficiency: 0.7,
                },
                ..base()
            },
            &cfg,
        );
        // Reduction caps at half the natural flow
        assert!((balanced.infiltration_cfm - natural * 0.5).abs() < 1e-9);
        assert!((balanced.ventilation_sensible_btuh - 1.08 * 10_000.0 * 0.3 * 55.0).abs() < 1e-6);

        let exhaust = calculate_infiltration(
            &InfiltrationInputs {
                ventilation: Ventilation::Exhaust { cfm: 50.0 },
                ..base()
            },
            &cfg,
        );
        assert!((exhaust.infiltration_cfm - (natural.powi(2) + 2500.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_shielding_and_terrain() {
        let cfg = LoadConfig::new();
        assert!(wind_coefficient(1, 1, &cfg) > wind_coefficient(1, 5, &cfg));
        assert!(wind_coefficient(3, 3, &cfg) > wind_coefficient(1, 3, &cfg));
        assert!(local_wind_speed(15.0, 17.0, 1, &cfg) > local_wind_speed(15.0, 17.0, 5, &cfg));
        // Out-of-range classes clamp instead of panicking
        assert!((wind_coefficient(2, 9, &cfg) - 0.044).abs() < 1e-12);
    }
}
