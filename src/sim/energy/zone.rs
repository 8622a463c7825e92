//! Thermal zones: one per conditioned floor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::LoadConfig;
use super::envelope::BuildingEnvelope;
use crate::geom::wall::{Orientation, Wall};
use crate::name::HasName;
use crate::plan::space::BoundaryCondition;

/// Watts to BTU/h.
const W_TO_BTUH: f64 = 3.412;

/// Rooms grouped for load purposes.
///
/// Walls stay owned by the [`BuildingEnvelope`]; a zone refers to its
/// exterior walls by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalZone {
    pub id: String,
    pub name: String,
    pub floor_level: i32,
    pub space_ids: Vec<String>,
    pub conditioned_area_ft2: f64,
    pub ceiling_height_ft: f64,
    pub wall_indices: Vec<usize>,
    /// Exposed slab edge for on-grade floors.
    pub exposed_perimeter_ft: f64,
    /// Floor area by what lies below it.
    pub floor_boundaries: BTreeMap<BoundaryCondition, f64>,
    /// Ceiling area by what lies above it.
    pub ceiling_boundaries: BTreeMap<BoundaryCondition, f64>,
    pub bedrooms: usize,
    pub has_kitchen: bool,
    pub occupants: f64,
}

impl ThermalZone {
    pub fn volume_ft3(&self) -> f64 {
        self.conditioned_area_ft2 * self.ceiling_height_ft
    }

    pub fn walls<'a>(&'a self, envelope: &'a BuildingEnvelope) -> impl Iterator<Item = &'a Wall> + 'a {
        self.wall_indices
            .iter()
            .filter_map(|&i| envelope.walls().get(i))
    }

    pub fn gross_wall_area(&self, envelope: &BuildingEnvelope) -> f64 {
        self.walls(envelope).map(|w| w.gross_area()).sum()
    }

    pub fn net_wall_area(&self, envelope: &BuildingEnvelope) -> f64 {
        self.walls(envelope).map(|w| w.net_area()).sum()
    }

    pub fn window_area(&self, envelope: &BuildingEnvelope) -> f64 {
        self.walls(envelope).map(|w| w.window_area()).sum()
    }

    pub fn door_area(&self, envelope: &BuildingEnvelope) -> f64 {
        self.walls(envelope).map(|w| w.door_area()).sum()
    }

    pub fn window_area_by_orientation(&self, envelope: &BuildingEnvelope) -> BTreeMap<Orientation, f64> {
        let mut out = BTreeMap::new();
        for w in self.walls(envelope) {
            *out.entry(w.orientation()).or_insert(0.0) += w.window_area();
        }
        out
    }

    /// People, lighting and appliances, BTU/h.
    pub fn sensible_internal_gain_btuh(&self, cfg: &LoadConfig) -> f64 {
        let people = self.occupants * cfg.occupant_sensible_btuh;
        let lighting = self.conditioned_area_ft2 * cfg.lighting_w_per_ft2 * W_TO_BTUH;
        let kitchen = if self.has_kitchen { cfg.kitchen_btuh } else { 0.0 };
        people + lighting + kitchen + cfg.base_appliance_btuh
    }

    pub fn latent_internal_gain_btuh(&self, cfg: &LoadConfig) -> f64 {
        self.occupants * cfg.occupant_latent_btuh
    }
}

impl HasName for ThermalZone {
    fn get_name(&self) -> &str {
        &self.name
    }
}

/// Splits `total_area` into per-boundary areas in proportion to `by_boundary`,
/// or assigns it all to `fallback` when there is nothing to go on.
pub fn scale_boundaries(
    by_boundary: &BTreeMap<BoundaryCondition, f64>,
    total_area: f64,
    fallback: BoundaryCondition,
) -> BTreeMap<BoundaryCondition, f64> {
    let sum: f64 = by_boundary.values().sum();
    if sum <= 0.0 {
        return BTreeMap::from([(fallback, total_area)]);
    }
    by_boundary
        .iter()
        .map(|(b, a)| (*b, a / sum * total_area))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_gains() {
        let zone = ThermalZone {
            id: "zone-L1".to_string(),
            name: "Floor 1".to_string(),
            floor_level: 1,
            space_ids: vec![],
            conditioned_area_ft2: 1000.0,
            ceiling_height_ft: 8.0,
            wall_indices: vec![],
            exposed_perimeter_ft: 130.0,
            floor_boundaries: BTreeMap::new(),
            ceiling_boundaries: BTreeMap::new(),
            bedrooms: 1,
            has_kitchen: true,
            occupants: 2.0,
        };
        let cfg = LoadConfig::new();
        let expected = 2.0 * 230.0 + 1000.0 * 0.5 * 3.412 + 1200.0 + 300.0;
        assert!((zone.sensible_internal_gain_btuh(&cfg) - expected).abs() < 1e-9);
        assert!((zone.latent_internal_gain_btuh(&cfg) - 400.0).abs() < 1e-12);
        assert!((zone.volume_ft3() - 8000.0).abs() < 1e-12);
        assert_eq!(zone.get_name(), "Floor 1");
    }

    #[test]
    fn test_scale_boundaries() {
        let rooms = BTreeMap::from([
            (BoundaryCondition::Garage, 200.0),
            (BoundaryCondition::Conditioned, 600.0),
        ]);
        let scaled = scale_boundaries(&rooms, 1000.0, BoundaryCondition::Conditioned);
        assert!((scaled[&BoundaryCondition::Garage] - 250.0).abs() < 1e-9);
        assert!((scaled.values().sum::<f64>() - 1000.0).abs() < 1e-9);
        let empty = scale_boundaries(&BTreeMap::new(), 500.0, BoundaryCondition::Attic);
        assert_eq!(empty, BTreeMap::from([(BoundaryCondition::Attic, 500.0)]));
    }
}
