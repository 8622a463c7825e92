//! Records produced by the foundation, mechanical and energy-spec extractors.
//!
//! Each record carries its own `confidence`; the envelope builder multiplies it
//! into the envelope confidence when the record is consumed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FoundationType {
    #[default]
    Slab,
    Crawlspace,
    ConditionedBasement,
    UnconditionedBasement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationRecord {
    pub foundation_type: FoundationType,
    /// Slab edge insulation, h·ft²·°F/BTU.
    #[serde(default)]
    pub slab_edge_r: Option<f64>,
    /// Basement or crawlspace wall insulation.
    #[serde(default)]
    pub below_grade_wall_r: Option<f64>,
    #[serde(default)]
    pub below_grade_depth_ft: Option<f64>,
    pub confidence: f64,
}

impl FoundationRecord {
    pub fn new(foundation_type: FoundationType, confidence: f64) -> Self {
        Self {
            foundation_type,
            slab_edge_r: None,
            below_grade_wall_r: None,
            below_grade_depth_ft: None,
            confidence,
        }
    }
}

/// Where the duct runs are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DuctLocation {
    Conditioned,
    #[default]
    Attic,
    Crawlspace,
    Basement,
    Garage,
    Exterior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DuctSealing {
    Sealed,
    #[default]
    Average,
    Leaky,
    VeryLeaky,
}

impl DuctSealing {
    /// Fraction of system airflow lost through duct leaks.
    pub fn leakage_rate(&self) -> f64 {
        match self {
            DuctSealing::Sealed => 0.04,
            DuctSealing::Average => 0.10,
            DuctSealing::Leaky => 0.20,
            DuctSealing::VeryLeaky => 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HeatingSystem {
    #[default]
    Furnace,
    HeatPump,
    Boiler,
    Ductless,
}

impl HeatingSystem {
    pub fn is_ducted(&self) -> bool {
        matches!(self, HeatingSystem::Furnace | HeatingSystem::HeatPump)
    }
}

/// Mechanical ventilation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Ventilation {
    #[default]
    None,
    /// ERV/HRV with sensible recovery efficiency in [0, 1].
    Balanced { cfm: f64, recovery_efficiency: f64 },
    Exhaust { cfm: f64 },
    Supply { cfm: f64 },
}

impl Ventilation {
    pub fn cfm(&self) -> f64 {
        match *self {
            Ventilation::None => 0.0,
            Ventilation::Balanced { cfm, .. }
            | Ventilation::Exhaust { cfm }
            | Ventilation::Supply { cfm } => cfm.max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicalRecord {
    #[serde(default)]
    pub system: HeatingSystem,
    #[serde(default)]
    pub duct_location: DuctLocation,
    #[serde(default)]
    pub duct_r: Option<f64>,
    #[serde(default)]
    pub duct_sealing: DuctSealing,
    #[serde(default)]
    pub ventilation: Ventilation,
    pub confidence: f64,
}

impl MechanicalRecord {
    pub fn new(confidence: f64) -> Self {
        Self {
            system: HeatingSystem::default(),
            duct_location: DuctLocation::default(),
            duct_r: None,
            duct_sealing: DuctSealing::default(),
            ventilation: Ventilation::default(),
            confidence,
        }
    }
}

/// Values read from an energy-compliance sheet (REScheck style).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySpecRecord {
    #[serde(default)]
    pub wall_r: Option<f64>,
    #[serde(default)]
    pub ceiling_r: Option<f64>,
    #[serde(default)]
    pub floor_r: Option<f64>,
    #[serde(default)]
    pub window_u: Option<f64>,
    #[serde(default)]
    pub window_shgc: Option<f64>,
    #[serde(default)]
    pub ach50: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AncillaryRecords {
    #[serde(default)]
    pub foundation: Option<FoundationRecord>,
    #[serde(default)]
    pub mechanical: Option<MechanicalRecord>,
    #[serde(default)]
    pub energy_spec: Option<EnergySpecRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leakage_rates_ordered() {
        let rates: Vec<f64> = [
            DuctSealing::Sealed,
            DuctSealing::Average,
            DuctSealing::Leaky,
            DuctSealing::VeryLeaky,
        ]
        .iter()
        .map(|s| s.leakage_rate())
        .collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_partial_json() {
        let rec: MechanicalRecord =
            serde_json::from_str(r#"{"duct_location": "Crawlspace", "confidence": 0.7}"#).unwrap();
        assert_eq!(rec.duct_location, DuctLocation::Crawlspace);
        assert_eq!(rec.duct_sealing, DuctSealing::Average);
        assert_eq!(rec.ventilation.cfm(), 0.0);
    }
}
