//! Viewer configuration (output size, camera, light, material, relief parameters).
//! Loaded from a RON file at startup.

use anyhow::{Context, Result};
use pom_core::PomParams;
use pom_render::Lighting;
use procgen::{BrickConfig, CobbleConfig, MaterialKind, RockConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Orbit camera placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Rotation around the vertical axis, in degrees.
    #[serde(default = "default_yaw")]
    pub yaw_degrees: f32,
    /// Elevation above the plane, in degrees.
    #[serde(default = "default_pitch")]
    pub pitch_degrees: f32,
    #[serde(default = "default_distance")]
    pub distance: f32,
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
}

/// Where the relief comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialConfig {
    #[serde(default)]
    pub kind: MaterialKind,
    #[serde(default)]
    pub seed: u64,
    /// Texels per side of generated materials.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Grayscale image used as the height map instead of a generated one.
    #[serde(default)]
    pub height_map: Option<PathBuf>,
    /// Pattern settings; only the one matching `kind` is used.
    #[serde(default)]
    pub bricks: BrickConfig,
    #[serde(default)]
    pub cobbles: CobbleConfig,
    #[serde(default)]
    pub rock: RockConfig,
}

/// The tessellated plane the material is applied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneConfig {
    #[serde(default = "default_plane_size")]
    pub size: f32,
    #[serde(default = "default_subdivisions")]
    pub subdivisions: u32,
    /// Rotation around +X, in degrees.
    #[serde(default)]
    pub tilt_degrees: f32,
}

/// Persistent viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Output width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Output height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lighting: Lighting,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub plane: PlaneConfig,
    #[serde(default)]
    pub params: PomParams,
    /// Image written when no `-o` is given.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_yaw() -> f32 {
    30.0
}
fn default_pitch() -> f32 {
    35.0
}
fn default_distance() -> f32 {
    2.2
}
fn default_fov() -> f32 {
    45.0
}
fn default_resolution() -> u32 {
    256
}
fn default_plane_size() -> f32 {
    2.0
}
fn default_subdivisions() -> u32 {
    32
}
fn default_width() -> u32 {
    960
}
fn default_height() -> u32 {
    540
}
fn default_output() -> PathBuf {
    PathBuf::from("pom.png")
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            yaw_degrees: default_yaw(),
            pitch_degrees: default_pitch(),
            distance: default_distance(),
            fov_degrees: default_fov(),
        }
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            kind: MaterialKind::default(),
            seed: 0,
            resolution: default_resolution(),
            height_map: None,
            bricks: BrickConfig::default(),
            cobbles: CobbleConfig::default(),
            rock: RockConfig::default(),
        }
    }
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            size: default_plane_size(),
            subdivisions: default_subdivisions(),
            tilt_degrees: 0.0,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            camera: CameraConfig::default(),
            lighting: Lighting::default(),
            material: MaterialConfig::default(),
            plane: PlaneConfig::default(),
            params: PomParams::default(),
            output: default_output(),
        }
    }
}

impl ViewerConfig {
    /// Load config from `path`, or from `config.ron` in the current directory.
    ///
    /// An explicit path must exist and parse. The implicit `config.ron` falls
    /// back to defaults when missing or invalid. Relief parameters are
    /// validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("Could not read config {}", path.display()))?;
                Self::parse(&data).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::load_default(),
        };
        config.params.validate().context("Invalid relief parameters")?;
        if config.width == 0 || config.height == 0 {
            anyhow::bail!("Output size {}x{} is empty", config.width, config.height);
        }
        Ok(config)
    }

    fn load_default() -> Self {
        let path = config_path();
        if let Ok(data) = std::fs::read_to_string(&path) {
            match Self::parse(&data) {
                Ok(c) => return c,
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    pub fn parse(data: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(data)
    }

    /// Write this config as pretty RON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, s).with_context(|| format!("Could not write config to {}", path.display()))?;
        Ok(())
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("config.ron")
}
