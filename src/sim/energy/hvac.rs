use serde::{Deserialize, Serialize};

use super::config::LoadConfig;

/// Nominal equipment size picked for a design cooling load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonnageSelection {
    /// Design cooling load over 12 000 BTU/h, unrounded.
    pub raw_tons: f64,
    /// Rounded to the nearest half ton, never below the minimum.
    pub nominal_tons: f64,
    /// More than one system once a single unit would exceed the largest
    /// residential size.
    pub systems: u32,
    pub tons_per_system: f64,
}

impl TonnageSelection {
    pub fn is_multi_system(&self) -> bool {
        self.systems > 1
    }
}

/// Design load with the safety factor applied.
///
/// - `load_btuh`: calculated load before the factor
pub fn apply_safety_factor(load_btuh: f64, cfg: &LoadConfig) -> f64 {
    load_btuh.max(0.0) * cfg.safety_factor
}

fn round_to_step(tons: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return tons;
    }
    (tons / step).round() * step
}

/// Nominal tonnage for a design cooling load (BTU/h, sensible plus latent).
///
/// Nearest half ton with a floor of 1.5 tons. Loads above the largest single
/// system are split over `ceil(tons / max)` equal systems.
pub fn select_tonnage(design_cooling_btuh: f64, cfg: &LoadConfig) -> TonnageSelection {
    let raw_tons = design_cooling_btuh.max(0.0) / cfg.btuh_per_ton;
    let nominal_tons = round_to_step(raw_tons, cfg.ton_step).max(cfg.min_tons);
    if nominal_tons <= cfg.max_single_system_tons {
        return TonnageSelection {
            raw_tons,
            nominal_tons,
            systems: 1,
            tons_per_system: nominal_tons,
        };
    }
    let systems = (nominal_tons / cfg.max_single_system_tons).ceil() as u32;
    let per = round_to_step(nominal_tons / systems as f64, cfg.ton_step).max(cfg.min_tons);
    TonnageSelection {
        raw_tons,
        nominal_tons,
        systems,
        tons_per_system: per,
    }
}
