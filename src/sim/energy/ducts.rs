//! Duct losses outside the conditioned envelope.

use super::boundary::Season;
use super::climate::ClimateData;
use super::config::LoadConfig;
use super::result::DuctLossResult;
use crate::io::ancillary::{DuctLocation, MechanicalRecord};
use crate::plan::space::BoundaryCondition;

/// Boundary whose design temperature the duct runs see.
pub fn location_boundary(location: DuctLocation) -> BoundaryCondition {
    match location {
        DuctLocation::Conditioned => BoundaryCondition::Conditioned,
        DuctLocation::Attic => BoundaryCondition::Attic,
        DuctLocation::Crawlspace => BoundaryCondition::Crawlspace,
        DuctLocation::Basement => BoundaryCondition::Unconditioned,
        DuctLocation::Garage => BoundaryCondition::Garage,
        DuctLocation::Exterior => BoundaryCondition::Exterior,
    }
}

/// Conduction and leakage for a ducted system.
///
/// Ductless systems and ducts inside the envelope lose nothing to the
/// outside; the result is all zeros with a note saying why.
pub fn calculate_duct_losses(
    mechanical: &MechanicalRecord,
    conditioned_area_ft2: f64,
    season: Season,
    climate: &ClimateData,
    cfg: &LoadConfig,
) -> DuctLossResult {
    let location = mechanical.duct_location;
    let mut result = DuctLossResult {
        season,
        location,
        system_cfm: 0.0,
        supply_area_ft2: 0.0,
        return_area_ft2: 0.0,
        duct_u: 0.0,
        delta_t_f: 0.0,
        conduction_btuh: 0.0,
        leakage_cfm: 0.0,
        supply_leakage_cfm: 0.0,
        return_leakage_cfm: 0.0,
        leakage_btuh: 0.0,
        latent_btuh: 0.0,
        notes: Vec::new(),
    };
    if !mechanical.system.is_ducted() {
        result
            .notes
            .push(format!("{:?} has no ducts", mechanical.system));
        return result;
    }
    if location == DuctLocation::Conditioned {
        result.notes.push("ducts inside conditioned space".to_string());
        return result;
    }

    let area = conditioned_area_ft2.max(0.0);
    let indoor = match season {
        Season::Heating => cfg.indoor_heating_f,
        Season::Cooling => cfg.indoor_cooling_f,
    };
    let delta_t = cfg
        .boundary_temperatures
        .design_delta_t(location_boundary(location), season, climate, indoor);
    let duct_r = mechanical.duct_r.unwrap_or(0.0).max(0.0);

    result.supply_area_ft2 = cfg.duct_supply_area_fraction * area;
    result.return_area_ft2 = cfg.duct_return_area_fraction * area;
    result.duct_u = 1.0 / (duct_r + cfg.duct_film_r);
    result.delta_t_f = delta_t;
    result.conduction_btuh = result.duct_u * (result.supply_area_ft2 + result.return_area_ft2) * delta_t;

    result.system_cfm = cfg.cfm_per_ton * area / cfg.ft2_per_ton;
    result.leakage_cfm = mechanical.duct_sealing.leakage_rate() * result.system_cfm;
    result.supply_leakage_cfm = result.leakage_cfm * cfg.supply_leak_share;
    result.return_leakage_cfm = result.leakage_cfm - result.supply_leakage_cfm;
    result.leakage_btuh = cfg.sensible_factor * result.leakage_cfm * delta_t;

    if season == Season::Cooling {
        result.latent_btuh =
            cfg.latent_factor * result.return_leakage_cfm * climate.summer_grains_difference.max(0.0);
    }
    result.notes.push(format!(
        "{:?} ducts at R-{duct_r}, {:?} sealing",
        location, mechanical.duct_sealing
    ));
    result
}
