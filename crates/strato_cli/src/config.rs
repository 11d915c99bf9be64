//! Strato configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strato_oit::{OitConfig, OitMode};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "strato.toml";

/// Top-level Strato configuration (strato.toml)
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct StratoConfig {
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub histogram: HistogramConfig,
}

/// Transparency renderer settings
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct RendererConfig {
    /// `dummy` or `linked-list`
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_entries_per_pixel")]
    pub entries_per_pixel: u32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_near_capacity_ratio")]
    pub near_capacity_ratio: f32,
}

fn default_mode() -> String {
    OitMode::default().name().to_string()
}

fn default_entries_per_pixel() -> u32 {
    8
}

fn default_opacity() -> f32 {
    0.2
}

fn default_near_capacity_ratio() -> f32 {
    0.9
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            entries_per_pixel: default_entries_per_pixel(),
            opacity: default_opacity(),
            near_capacity_ratio: default_near_capacity_ratio(),
        }
    }
}

/// Headless render output
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(default = "default_image")]
    pub image: PathBuf,
    /// Opaque scene clear color, linear RGBA
    #[serde(default = "default_background")]
    pub background: [f32; 4],
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

fn default_frames() -> u32 {
    1
}

fn default_image() -> PathBuf {
    PathBuf::from("strato.png")
}

fn default_background() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frames: default_frames(),
            image: default_image(),
            background: default_background(),
        }
    }
}

/// Orbit camera around the data bounds
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_azimuth")]
    pub azimuth_deg: f32,
    #[serde(default = "default_elevation")]
    pub elevation_deg: f32,
    /// Eye distance in multiples of the bounding radius
    #[serde(default = "default_distance")]
    pub distance: f32,
    #[serde(default = "default_fov")]
    pub fov_y_deg: f32,
    /// Azimuth advanced per frame when rendering several frames
    #[serde(default)]
    pub orbit_deg_per_frame: f32,
}

fn default_azimuth() -> f32 {
    35.0
}

fn default_elevation() -> f32 {
    30.0
}

fn default_distance() -> f32 {
    2.2
}

fn default_fov() -> f32 {
    45.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            azimuth_deg: default_azimuth(),
            elevation_deg: default_elevation(),
            distance: default_distance(),
            fov_y_deg: default_fov(),
            orbit_deg_per_frame: 0.0,
        }
    }
}

/// Terminal histogram output
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct HistogramConfig {
    #[serde(default = "default_buckets")]
    pub buckets: usize,
    /// Characters used by a full bar
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

fn default_buckets() -> usize {
    strato_traj::DEFAULT_BUCKETS
}

fn default_bar_width() -> usize {
    50
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            bar_width: default_bar_width(),
        }
    }
}

impl StratoConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: StratoConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise `strato.toml` in the working directory
    /// when present, otherwise defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Renderer configuration from the file values alone, clamped
    pub fn file_oit_config(&self) -> Result<OitConfig> {
        let mode: OitMode = self
            .renderer
            .mode
            .parse()
            .with_context(|| format!("Invalid renderer mode '{}'", self.renderer.mode))?;

        Ok(OitConfig {
            mode,
            entries_per_pixel: self.renderer.entries_per_pixel,
            near_capacity_ratio: self.renderer.near_capacity_ratio,
            opacity: self.renderer.opacity,
            ..OitConfig::default()
        }
        .sanitized())
    }

    /// Renderer configuration with `STRATO_OIT_*` environment overrides
    /// applied on top of the file values
    pub fn oit_config(&self) -> Result<OitConfig> {
        Ok(self.file_oit_config()?.with_env_overrides().sanitized())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: StratoConfig = toml::from_str("").unwrap();
        assert_eq!(config, StratoConfig::default());
        assert_eq!(config.renderer.mode, "linked-list");
        assert_eq!(config.histogram.buckets, 50);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: StratoConfig = toml::from_str(
            r#"
            [renderer]
            mode = "dummy"

            [output]
            width = 640
            "#,
        )
        .unwrap();
        assert_eq!(config.renderer.mode, "dummy");
        assert_eq!(config.renderer.entries_per_pixel, 8);
        assert_eq!(config.output.width, 640);
        assert_eq!(config.output.height, 768);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn oit_config_parses_and_clamps() {
        let mut config = StratoConfig::default();
        config.renderer.mode = "blend".to_string();
        config.renderer.entries_per_pixel = 500;
        config.renderer.opacity = 3.0;

        let oit = config.file_oit_config().unwrap();
        assert_eq!(oit.mode, OitMode::Dummy);
        assert_eq!(oit.entries_per_pixel, strato_oit::config::MAX_ENTRIES_PER_PIXEL);
        assert_eq!(oit.opacity, 1.0);
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let mut config = StratoConfig::default();
        config.renderer.mode = "weighted".to_string();
        let err = config.file_oit_config().unwrap_err();
        assert!(err.to_string().contains("weighted"));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut config = StratoConfig::default();
        config.output.frames = 12;
        config.camera.orbit_deg_per_frame = 30.0;
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(StratoConfig::load(&path).unwrap(), config);
        assert_eq!(StratoConfig::resolve(Some(&path)).unwrap(), config);
    }

    #[test]
    fn missing_file_names_path() {
        let err = StratoConfig::load(Path::new("/nonexistent/strato.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/strato.toml"));
    }
}
