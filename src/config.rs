//! Pipeline configuration

use crate::error::{AutoRegError, Result};
use crate::training::TrainerConfig;
use crate::transformation::TransformationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the transformation and training stages.
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```json
/// { "transformation": { "test_size": 0.25 }, "trainer": { "cv_folds": 5 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRegressionConfig {
    pub transformation: TransformationConfig,
    pub trainer: TrainerConfig,
}

impl AutoRegressionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transformation(mut self, transformation: TransformationConfig) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.transformation.validate()?;
        self.trainer.validate()
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AutoRegError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| AutoRegError::ConfigError(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelType;
    use crate::transformation::ScalerType;

    #[test]
    fn test_partial_json() {
        let config: AutoRegressionConfig =
            serde_json::from_str(r#"{"transformation": {"test_size": 0.25}}"#).unwrap();
        assert_eq!(config.transformation.test_size, 0.25);
        assert_eq!(config.transformation.random_state, 42);
        assert_eq!(config.trainer, TrainerConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AutoRegressionConfig::new()
            .with_transformation(TransformationConfig::default().with_scaler(ScalerType::MinMax))
            .with_trainer(TrainerConfig::default().with_candidates(vec![ModelType::Lasso]));
        config.save(&path).unwrap();

        assert_eq!(AutoRegressionConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"trainer": {"cv_folds": 1}}"#).unwrap();
        assert!(matches!(
            AutoRegressionConfig::from_json_file(&path),
            Err(AutoRegError::InvalidParameter { .. })
        ));

        assert!(matches!(
            AutoRegressionConfig::from_json_file(dir.path().join("missing.json")),
            Err(AutoRegError::ConfigError(_))
        ));
    }
}
