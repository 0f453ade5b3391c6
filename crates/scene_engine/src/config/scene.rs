//! Scene runtime configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::foundation::math::Vec2;

/// Settings that shape a scene's simulation and scripting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// World gravity in metres per second squared
    pub gravity: [f32; 2],

    /// Velocity solver iterations per physics step
    pub velocity_iterations: u32,

    /// Position solver iterations per physics step
    pub position_iterations: u32,

    /// Directory holding the script module, if any
    pub script_module: Option<PathBuf>,

    /// Watch the script module and reload it when it changes
    pub hot_reload: bool,

    /// Fallback log filter for binaries
    pub log_level: String,
}

impl SceneConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self {
            gravity: [0.0, -9.8],
            velocity_iterations: 6,
            position_iterations: 2,
            script_module: None,
            hot_reload: true,
            log_level: "info".to_string(),
        }
    }

    /// Builder pattern: Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32) -> Self {
        self.gravity = [x, y];
        self
    }

    /// Builder pattern: Set solver iteration counts
    pub fn with_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    /// Builder pattern: Set the script module directory
    pub fn with_script_module(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_module = Some(path.into());
        self
    }

    /// Builder pattern: Enable or disable hot reload
    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.hot_reload = enabled;
        self
    }

    /// Gravity as a vector
    pub fn gravity_vector(&self) -> Vec2 {
        Vec2::new(self.gravity[0], self.gravity[1])
    }

    /// Check the configuration for values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::Invalid(format!("gravity must be finite, got {:?}", self.gravity)));
        }
        if self.velocity_iterations == 0 {
            return Err(ConfigError::Invalid("velocity_iterations must be at least 1".to_string()));
        }
        if let Some(dir) = &self.script_module {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("script_module path is empty".to_string()));
            }
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for SceneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_iteration_counts() {
        let config = SceneConfig::default();
        assert_eq!(config.velocity_iterations, 6);
        assert_eq!(config.position_iterations, 2);
        assert_eq!(config.gravity, [0.0, -9.8]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan_gravity() {
        let config = SceneConfig::new().with_gravity(f32::NAN, 0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.toml");
        let config = SceneConfig::new()
            .with_gravity(0.0, -3.0)
            .with_script_module("scripts")
            .with_hot_reload(false);

        config.save_to_file(&path).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.ron");
        std::fs::write(&path, "(velocity_iterations: 10)").unwrap();

        let loaded = SceneConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.velocity_iterations, 10);
        assert_eq!(loaded.position_iterations, 2);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = SceneConfig::load_from_file("scene.yaml");
        assert!(result.is_err());
    }
}
