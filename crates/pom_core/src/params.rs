//! Per-draw-call parameter block.
//!
//! Every component of the relief pipeline receives `&PomParams` explicitly.
//! Nothing here is read from global state.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on coarse-search layers; bounds the worst-case cost of one fragment.
pub const MAX_LAYERS: f32 = 256.0;
/// Hard ceiling on self-shadow samples.
pub const MAX_SHADOW_SAMPLES: u32 = 128;
/// Below this magnitude the displacement scale is treated as zero.
pub const DISPLACEMENT_EPSILON: f32 = 1e-6;

/// Step-size law of the relief ray marcher. Selected once per draw call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum StepPolicy {
    /// Fixed step derived from the view direction and the layer count.
    #[default]
    Standard,
    /// Fixed step modulated each iteration by `1 + slope_gain * slope`,
    /// where slope is the height drop towards the tentative next sample.
    TerrainAdaptive { slope_gain: f32 },
    /// Standard step with a layer count derived from the view angle alone
    /// (ignores the quality controller) and a longer bisection.
    Legacy { min_layers: f32, max_layers: f32 },
}

impl StepPolicy {
    /// Terrain-adaptive with the usual `1 + 2·slope` modulation.
    pub const TERRAIN: Self = StepPolicy::TerrainAdaptive { slope_gain: 2.0 };
    /// Legacy marcher with its historical 8..32 layer range.
    pub const LEGACY: Self = StepPolicy::Legacy {
        min_layers: 8.0,
        max_layers: 32.0,
    };

    /// Bisection steps run after the coarse search.
    pub fn refinement_steps(&self) -> u32 {
        match self {
            StepPolicy::Standard | StepPolicy::TerrainAdaptive { .. } => 6,
            StepPolicy::Legacy { .. } => 8,
        }
    }

    /// Stable index used by the GPU uniform.
    pub fn index(&self) -> u32 {
        match self {
            StepPolicy::Standard => 0,
            StepPolicy::TerrainAdaptive { .. } => 1,
            StepPolicy::Legacy { .. } => 2,
        }
    }
}

/// Alternate output replacing the lit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DebugView {
    #[default]
    Off,
    Tangent,
    Bitangent,
    Normal,
    /// Tangent-space view direction.
    ViewDirection,
    /// Magnitude of `final_uv - uv`.
    UvOffset,
    /// Height at the final UV.
    Height,
    /// Quality controller activity mask.
    ActivityMask,
}

impl DebugView {
    /// Map the integer mode used by tweak panels (0 = off, 1..=7 = views).
    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => DebugView::Off,
            1 => DebugView::Tangent,
            2 => DebugView::Bitangent,
            3 => DebugView::Normal,
            4 => DebugView::ViewDirection,
            5 => DebugView::UvOffset,
            6 => DebugView::Height,
            7 => DebugView::ActivityMask,
            _ => return None,
        })
    }

    pub fn index(&self) -> u32 {
        match self {
            DebugView::Off => 0,
            DebugView::Tangent => 1,
            DebugView::Bitangent => 2,
            DebugView::Normal => 3,
            DebugView::ViewDirection => 4,
            DebugView::UvOffset => 5,
            DebugView::Height => 6,
            DebugView::ActivityMask => 7,
        }
    }
}

/// Adaptive quality controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Fewest coarse-search layers (head-on, far away).
    #[serde(default = "default_min_layers")]
    pub min_layers: f32,
    /// Most coarse-search layers (grazing, close up). Also the fixed count.
    #[serde(default = "default_max_layers")]
    pub max_layers: f32,
    /// Scale layers by the activity mask instead of always using `max_layers`.
    #[serde(default = "default_true")]
    pub dynamic_layers: bool,
    /// Distance-mask value under which the relief march is skipped entirely.
    #[serde(default)]
    pub active_radius: f32,
    /// Camera distance at which the distance mask reaches zero.
    #[serde(default = "default_lod_distance")]
    pub lod_distance: f32,
}

/// Self-shadow march settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// March steps from the surface point to the top of the relief.
    #[serde(default = "default_shadow_samples")]
    pub samples: u32,
    /// Occluded samples needed for full shadow. Larger is softer.
    #[serde(default = "default_shadow_hardness")]
    pub hardness: f32,
}

/// Everything the per-fragment and per-vertex stages read besides their own inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PomParams {
    /// Depth of the relief volume, read in two units. The vertex stage
    /// displaces by `h * displacement_scale` world units; the ray marchers
    /// take it as depth in surface-UV units. The two agree only where one UV
    /// unit spans one world unit. On a mesh whose tangent length (world units
    /// per UV) is `L`, the march sees relief `L` times deeper than the
    /// displaced geometry. `texture_repeat` changes neither.
    #[serde(default = "default_displacement_scale")]
    pub displacement_scale: f32,
    /// Where the view ray enters the relief: 0 = the fragment's own height,
    /// 1 = the top of the relief volume.
    #[serde(default)]
    pub parallax_offset: f32,
    /// UV tiling applied to every texture lookup.
    #[serde(default = "default_texture_repeat")]
    pub texture_repeat: f32,
    /// Per-vertex smooth frames instead of per-fragment exact frames.
    #[serde(default = "default_true")]
    pub smooth_tangents: bool,
    #[serde(default)]
    pub step_policy: StepPolicy,
    #[serde(default)]
    pub debug_view: DebugView,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub shadow: ShadowConfig,
}

fn default_true() -> bool {
    true
}
fn default_min_layers() -> f32 {
    8.0
}
fn default_max_layers() -> f32 {
    32.0
}
fn default_lod_distance() -> f32 {
    10.0
}
fn default_shadow_samples() -> u32 {
    16
}
fn default_shadow_hardness() -> f32 {
    4.0
}
fn default_displacement_scale() -> f32 {
    0.05
}
fn default_texture_repeat() -> f32 {
    1.0
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_layers: default_min_layers(),
            max_layers: default_max_layers(),
            dynamic_layers: true,
            active_radius: 0.0,
            lod_distance: default_lod_distance(),
        }
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: default_shadow_samples(),
            hardness: default_shadow_hardness(),
        }
    }
}

impl Default for PomParams {
    fn default() -> Self {
        Self {
            displacement_scale: default_displacement_scale(),
            parallax_offset: 0.0,
            texture_repeat: default_texture_repeat(),
            smooth_tangents: true,
            step_policy: StepPolicy::default(),
            debug_view: DebugView::default(),
            quality: QualityConfig::default(),
            shadow: ShadowConfig::default(),
        }
    }
}

/// A parameter block that cannot be rendered.
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f32 },
    #[error("{name} must lie in [0, 1], got {value}")]
    NotUnit { name: &'static str, value: f32 },
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f32 },
    #[error("layer range [{min}, {max}] must satisfy 1 <= min <= max <= 256")]
    LayerRange { min: f32, max: f32 },
    #[error("shadow samples must be in 1..=128, got {0}")]
    ShadowSamples(u32),
}

fn check_layer_range(min: f32, max: f32) -> Result<(), ParamError> {
    if min.is_finite() && max.is_finite() && min >= 1.0 && min <= max && max <= MAX_LAYERS {
        Ok(())
    } else {
        Err(ParamError::LayerRange { min, max })
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ParamError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::NotPositive { name, value })
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ParamError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::NotUnit { name, value })
    }
}

impl PomParams {
    /// Check ranges once per draw call so the per-fragment code can stay total.
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.displacement_scale.is_finite() && self.displacement_scale >= 0.0) {
            return Err(ParamError::Negative {
                name: "displacement_scale",
                value: self.displacement_scale,
            });
        }
        check_unit("parallax_offset", self.parallax_offset)?;
        check_positive("texture_repeat", self.texture_repeat)?;
        check_layer_range(self.quality.min_layers, self.quality.max_layers)?;
        check_unit("active_radius", self.quality.active_radius)?;
        check_positive("lod_distance", self.quality.lod_distance)?;
        check_positive("shadow.hardness", self.shadow.hardness)?;
        if self.shadow.samples == 0 || self.shadow.samples > MAX_SHADOW_SAMPLES {
            return Err(ParamError::ShadowSamples(self.shadow.samples));
        }
        match self.step_policy {
            StepPolicy::Standard => {}
            StepPolicy::TerrainAdaptive { slope_gain } => {
                if !slope_gain.is_finite() || slope_gain < 0.0 {
                    return Err(ParamError::Negative {
                        name: "slope_gain",
                        value: slope_gain,
                    });
                }
            }
            StepPolicy::Legacy {
                min_layers,
                max_layers,
            } => check_layer_range(min_layers, max_layers)?,
        }

        if self.shadow.enabled && self.displacement_scale <= DISPLACEMENT_EPSILON {
            log::warn!("Self-shadowing requested with zero displacement; shadows will be skipped");
        }
        Ok(())
    }

    /// True when the relief has no depth and every displacement-aware path is skipped.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.displacement_scale.abs() <= DISPLACEMENT_EPSILON
    }
}

/// `PomParams` packed for a uniform buffer (four 16-byte rows).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PomUniform {
    /// x = displacement_scale, y = parallax_offset, z = texture_repeat, w = active_radius
    pub relief: [f32; 4],
    /// x = min_layers, y = max_layers, z = lod_distance, w = shadow hardness
    pub layers: [f32; 4],
    /// x = shadow samples, y = step policy index, zw = policy payload
    pub policy: [f32; 4],
    /// x = dynamic_layers, y = smooth_tangents, z = shadows enabled, w = debug view index
    pub flags: [f32; 4],
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl From<&PomParams> for PomUniform {
    fn from(params: &PomParams) -> Self {
        let (a, b) = match params.step_policy {
            StepPolicy::Standard => (0.0, 0.0),
            StepPolicy::TerrainAdaptive { slope_gain } => (slope_gain, 0.0),
            StepPolicy::Legacy {
                min_layers,
                max_layers,
            } => (min_layers, max_layers),
        };
        Self {
            relief: [
                params.displacement_scale,
                params.parallax_offset,
                params.texture_repeat,
                params.quality.active_radius,
            ],
            layers: [
                params.quality.min_layers,
                params.quality.max_layers,
                params.quality.lod_distance,
                params.shadow.hardness,
            ],
            policy: [
                params.shadow.samples as f32,
                params.step_policy.index() as f32,
                a,
                b,
            ],
            flags: [
                flag(params.quality.dynamic_layers),
                flag(params.smooth_tangents),
                flag(params.shadow.enabled),
                params.debug_view.index() as f32,
            ],
        }
    }
}
