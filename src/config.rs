//! TOML configuration file

use crate::audio::AudioConfig;
use crate::quality::QualityMode;
use crate::viz::{Color, Palette};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "retrowave.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub overlay_grid: bool,
    #[serde(default)]
    pub accent1: Option<String>,
    #[serde(default)]
    pub accent2: Option<String>,
    #[serde(default)]
    pub accent3: Option<String>,
    #[serde(default)]
    pub grid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub mode: QualityMode,
    #[serde(default = "default_pixel_ratio")]
    pub native_pixel_ratio: f32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

/// A named live-stream URL
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Station {
    pub name: String,
    pub url: String,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            sensitivity: default_sensitivity(),
            intensity: default_intensity(),
            overlay_grid: false,
            accent1: None,
            accent2: None,
            accent3: None,
            grid: None,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            mode: QualityMode::default(),
            native_pixel_ratio: default_pixel_ratio(),
            fps: default_fps(),
        }
    }
}

impl VisualConfig {
    /// Default palette with any configured colours applied. Unparseable
    /// colours keep the default and log a warning.
    pub fn palette(&self) -> Palette {
        let mut palette = Palette::default();
        let slots = [
            ("accent1", &self.accent1, &mut palette.accent1),
            ("accent2", &self.accent2, &mut palette.accent2),
            ("accent3", &self.accent3, &mut palette.accent3),
            ("grid", &self.grid, &mut palette.grid),
        ];
        for (name, hex, slot) in slots {
            let Some(hex) = hex else { continue };
            match Color::from_hex(hex) {
                Some(color) => *slot = color,
                None => log::warn!("Ignoring {name} colour {hex:?}: expected #rrggbb or #rrggbbaa"),
            }
        }
        palette
    }
}

fn default_mode() -> String { "neonTunnel".into() }
fn default_sensitivity() -> f32 { 1.0 }
fn default_intensity() -> f32 { 1.0 }
fn default_pixel_ratio() -> f32 { 1.0 }
fn default_fps() -> u32 { 60 }

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `retrowave.toml` in the working directory, then the user config directory
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("retrowave").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("retrowave").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
