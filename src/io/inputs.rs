//! What the caller knows about the house.
//!
//! Everything is optional. Provided values always win over detection and
//! defaults, and are recorded as user-provided in the provenance log.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::ancillary::{AncillaryRecords, DuctLocation, FoundationType, Ventilation};
use crate::error::InputError;
use crate::plan::space::BoundaryCondition;
use crate::sim::energy::construction::ConstructionQuality;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInputs {
    /// Known drawing scale, px/ft. Short-circuits detection.
    pub scale_override_px_per_ft: Option<f64>,
    /// Clockwise angle from page-up to north, degrees.
    pub north_angle_deg: Option<f64>,
    pub year_built: Option<u32>,
    pub floor_count: Option<u32>,
    pub conditioned_area_ft2: Option<f64>,
    pub ceiling_height_ft: Option<f64>,
    /// Blower-door result.
    pub ach50: Option<f64>,
    pub construction_quality: Option<ConstructionQuality>,
    pub foundation_type: Option<FoundationType>,
    pub duct_location: Option<DuctLocation>,
    pub ventilation: Option<Ventilation>,
    pub wall_r: Option<f64>,
    pub ceiling_r: Option<f64>,
    pub window_u: Option<f64>,
    pub window_shgc: Option<f64>,
    /// AIM-2 shielding class, 1 (none) to 5 (heavy).
    pub shielding_class: Option<u8>,
    /// AIM-2 terrain class, 1 (open) to 5 (urban).
    pub terrain_class: Option<u8>,
    /// Explicit floor boundaries per room id.
    pub floor_boundaries: HashMap<String, BoundaryCondition>,
    /// Explicit ceiling boundaries per room id.
    pub ceiling_boundaries: HashMap<String, BoundaryCondition>,
    /// Room ids that sit over the garage.
    pub over_garage_rooms: Vec<String>,
    /// Records from the ancillary extractors.
    pub ancillary: AncillaryRecords,
}

impl UserInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InputError::FileMissing(path.to_path_buf()).into());
        }
        let file = File::open(path)?;
        let inputs: UserInputs =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| InputError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        inputs.validate()?;
        Ok(inputs)
    }

    /// Rejects values that cannot describe a real house.
    pub fn validate(&self) -> Result<(), InputError> {
        let positive = [
            ("scale_override_px_per_ft", self.scale_override_px_per_ft),
            ("conditioned_area_ft2", self.conditioned_area_ft2),
            ("ceiling_height_ft", self.ceiling_height_ft),
            ("ach50", self.ach50),
            ("wall_r", self.wall_r),
            ("ceiling_r", self.ceiling_r),
            ("window_u", self.window_u),
        ];
        for (name, value) in positive {
            if let Some(v) = value
                && (!v.is_finite() || v <= 0.0)
            {
                return Err(InputError::InvalidUserInput(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        if let Some(shgc) = self.window_shgc
            && !(0.0..=1.0).contains(&shgc)
        {
            return Err(InputError::InvalidUserInput(format!(
                "window_shgc must be within [0, 1], got {shgc}"
            )));
        }
        if let Some(n) = self.floor_count
            && !(1..=6).contains(&n)
        {
            return Err(InputError::InvalidUserInput(format!(
                "floor_count must be 1..=6, got {n}"
            )));
        }
        for (name, class) in [
            ("shielding_class", self.shielding_class),
            ("terrain_class", self.terrain_class),
        ] {
            if let Some(c) = class
                && !(1..=5).contains(&c)
            {
                return Err(InputError::InvalidUserInput(format!(
                    "{name} must be 1..=5, got {c}"
                )));
            }
        }
        Ok(())
    }
}

/// Five-digit US zip code check.
pub fn validate_zip(zip: &str) -> Result<(), InputError> {
    let trimmed = zip.trim();
    let digits = trimmed.split('-').next().unwrap_or("");
    if digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(InputError::InvalidUserInput(format!(
            "zip code must have five digits, got {zip:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut inputs = UserInputs::new();
        assert!(inputs.validate().is_ok());
        inputs.ach50 = Some(-1.0);
        assert!(matches!(
            inputs.validate(),
            Err(InputError::InvalidUserInput(_))
        ));
        inputs.ach50 = Some(5.0);
        inputs.shielding_class = Some(7);
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_zip() {
        assert!(validate_zip("10001").is_ok());
        assert!(validate_zip("10001-1234").is_ok());
        assert!(validate_zip("1001").is_err());
        assert!(validate_zip("abcde").is_err());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.json");
        std::fs::write(&path, r#"{"ach50": 5.0, "floor_count": 2}"#).unwrap();
        let inputs = UserInputs::from_json_file(&path).unwrap();
        assert_eq!(inputs.ach50, Some(5.0));
        assert_eq!(inputs.floor_count, Some(2));
        assert!(inputs.ancillary.foundation.is_none());
    }
}
