use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::{color::Color, logging::LoggingConfig};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Renderer tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Quads reserved up front in the draw queue; the queue still grows past this
    pub quad_capacity: usize,
    /// Upper bound on textures bound per draw call, clamped to what the backend supports
    pub max_texture_slots: usize,
    pub clear_color: Color,
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            quad_capacity: 1000,
            max_texture_slots: 16,
            clear_color: Color::CLEAR,
            vsync: true,
        }
    }
}

/// Light system tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Shadow quads buffered before an intermediate submit
    pub max_shadow_quads: usize,
    /// How far shadow volumes are extruded, as a multiple of the light radius
    pub shadow_projection: f32,
    pub shadow_color: Color,
    pub ambient_color: Color,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            max_shadow_quads: 1000,
            shadow_projection: 100.0,
            shadow_color: Color::BLACK,
            ambient_color: Color::BLACK,
        }
    }
}

/// Top-level configuration, usually loaded from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub renderer: RendererConfig,
    pub lighting: LightingConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
