//! Calibration for every stage in one place.
//!
//! A JSON file only needs the fields it changes:
//!
//! ```json
//! { "loads": { "safety_factor": 1.15 }, "extraction": { "workers": 3 } }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::confidence::ConfidenceConfig;
use crate::error::InputError;
use crate::plan::extract::ExtractionConfig;
use crate::plan::geometry::GeometryConfig;
use crate::plan::graph::GraphConfig;
use crate::plan::scale::ScaleConfig;
use crate::plan::space::SpaceConfig;
use crate::sim::energy::{EnvelopeConfig, LoadConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scale: ScaleConfig,
    pub geometry: GeometryConfig,
    pub spaces: SpaceConfig,
    pub graph: GraphConfig,
    pub envelope: EnvelopeConfig,
    pub loads: LoadConfig,
    pub confidence: ConfidenceConfig,
    pub extraction: ExtractionConfig,
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InputError::FileMissing(path.to_path_buf()).into());
        }
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let config: AnalysisConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| InputError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_override_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"loads": {{"safety_factor": 1.15}}, "extraction": {{"workers": 3}}}}"#
        )
        .unwrap();
        let cfg = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert!((cfg.loads.safety_factor - 1.15).abs() < 1e-12);
        assert_eq!(cfg.extraction.workers, 3);
        assert!((cfg.loads.sensible_factor - 1.08).abs() < 1e-12);
        assert_eq!(cfg.scale, ScaleConfig::new());
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let err = AnalysisConfig::from_json_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::FileMissing(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::Corrupt { .. })));
    }
}
