//! Engine configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window section of the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Robot Arena".to_string(),
        }
    }
}

/// SPIR-V shader file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file.
    pub vertex_path: String,
    /// Path to the fragment shader SPIR-V file.
    pub fragment_path: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex_path: "target/shaders/object.vert.spv".to_string(),
            fragment_path: "target/shaders/object.frag.spv".to_string(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window settings.
    #[serde(default)]
    pub window: WindowConfig,
    /// Shader locations.
    #[serde(default)]
    pub shaders: ShaderConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    /// A present-but-broken file is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("loading config from {}", path.display());
            Self::load(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(config.shaders.vertex_path.ends_with(".spv"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [window]
            width = 1280
            height = 720
            title = "test"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.shaders.vertex_path, ShaderConfig::default().vertex_path);
    }

    #[test]
    fn full_toml_round_trips() {
        let config = EngineConfig {
            window: WindowConfig {
                width: 640,
                height: 480,
                title: "round trip".to_string(),
            },
            shaders: ShaderConfig {
                vertex_path: "a.spv".to_string(),
                fragment_path: "b.spv".to_string(),
            },
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.window.title, "round trip");
        assert_eq!(parsed.shaders.fragment_path, "b.spv");
    }
}
