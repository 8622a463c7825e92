//! Residential heating and cooling loads.
//!
//! The pipeline here runs after the plan stages: boundary conditions per room,
//! construction selection, the thermal envelope with its zones, and the load
//! engine (AIM-2 infiltration, duct losses, multi-story redistribution).

pub mod boundary;
pub mod climate;
pub mod config;
pub mod construction;
pub mod ducts;
pub mod envelope;
pub mod hvac;
pub mod infiltration;
pub mod loads;
pub mod multistory;
pub mod result;
pub mod zone;

pub use boundary::{BoundaryReasoner, BoundaryTemperatures, Season};
pub use climate::{BuiltinClimateTable, ClimateData, ClimateLookup};
pub use config::{EnvelopeConfig, LoadConfig};
pub use construction::{ConstructionEra, ConstructionQuality, ConstructionSelector};
pub use envelope::{BuildingEnvelope, ThermalEnvelopeBuilder};
pub use loads::{LoadCalculationEngine, LoadState};
pub use result::{BuildingLoad, DuctLossResult, FloorLoad, InfiltrationResult};
pub use zone::ThermalZone;
