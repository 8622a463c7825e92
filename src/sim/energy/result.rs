use serde::{Deserialize, Serialize};

use super::boundary::Season;
use super::hvac::TonnageSelection;
use super::loads::LoadState;
use crate::io::ancillary::DuctLocation;

/// AIM-2 infiltration for one design condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiltrationResult {
    pub season: Season,
    pub cfm50: f64,
    /// Effective leakage area, in².
    pub ela_in2: f64,
    pub stack_cfm: f64,
    pub wind_cfm: f64,
    /// Stack and wind combined in quadrature.
    pub natural_cfm: f64,
    pub ventilation_cfm: f64,
    /// Air exchange carried as infiltration load after mechanical ventilation
    /// is accounted for.
    pub infiltration_cfm: f64,
    pub natural_ach: f64,
    pub sensible_btuh: f64,
    /// Balanced ventilation load net of heat recovery.
    pub ventilation_sensible_btuh: f64,
    pub latent_btuh: f64,
    pub notes: Vec<String>,
}

/// Duct conduction and leakage losses for one design condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuctLossResult {
    pub season: Season,
    pub location: DuctLocation,
    pub system_cfm: f64,
    pub supply_area_ft2: f64,
    pub return_area_ft2: f64,
    pub duct_u: f64,
    pub delta_t_f: f64,
    pub conduction_btuh: f64,
    pub leakage_cfm: f64,
    pub supply_leakage_cfm: f64,
    pub return_leakage_cfm: f64,
    pub leakage_btuh: f64,
    pub latent_btuh: f64,
    pub notes: Vec<String>,
}

impl DuctLossResult {
    pub fn sensible_btuh(&self) -> f64 {
        self.conduction_btuh + self.leakage_btuh
    }
}

/// Sensible load breakdown, BTU/h.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentLoads {
    pub walls: f64,
    pub windows: f64,
    pub solar: f64,
    pub doors: f64,
    pub ceilings: f64,
    pub floors: f64,
    pub infiltration: f64,
    pub ventilation: f64,
    pub ducts: f64,
    pub internal: f64,
    /// Heat moved to or from the adjacent floors; sums to zero over the building.
    pub inter_floor: f64,
}

impl ComponentLoads {
    pub fn total(&self) -> f64 {
        self.walls
            + self.windows
            + self.solar
            + self.doors
            + self.ceilings
            + self.floors
            + self.infiltration
            + self.ventilation
            + self.ducts
            + self.internal
            + self.inter_floor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorLoad {
    pub floor_level: i32,
    pub zone_id: String,
    pub conditioned_area_ft2: f64,
    pub heating: ComponentLoads,
    pub cooling: ComponentLoads,
    pub cooling_latent_btuh: f64,
    pub infiltration_cfm_heating: f64,
    pub infiltration_cfm_cooling: f64,
    /// Inter-floor coupling discount applied to the sensible totals below.
    /// The component breakdowns are undiscounted.
    pub coupling_discount: f64,
    pub notes: Vec<String>,
}

impl FloorLoad {
    pub fn heating_btuh(&self) -> f64 {
        self.heating.total().max(0.0) * (1.0 - self.coupling_discount)
    }

    pub fn cooling_sensible_btuh(&self) -> f64 {
        self.cooling.total().max(0.0) * (1.0 - self.coupling_discount)
    }
}

/// Building totals and the path that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingLoad {
    pub conditioned_area_ft2: f64,
    pub floors: Vec<FloorLoad>,
    pub infiltration_heating: InfiltrationResult,
    pub infiltration_cooling: InfiltrationResult,
    pub ducts_heating: DuctLossResult,
    pub ducts_cooling: DuctLossResult,
    /// Sum of floor loads after the coupling discount, before the safety factor.
    pub heating_btuh: f64,
    pub cooling_sensible_btuh: f64,
    pub cooling_latent_btuh: f64,
    pub coupling_discount: f64,
    pub safety_factor: f64,
    pub design_heating_btuh: f64,
    pub design_cooling_btuh: f64,
    pub heating_btuh_per_ft2: f64,
    pub tonnage: TonnageSelection,
    pub states: Vec<LoadState>,
    pub notes: Vec<String>,
}
