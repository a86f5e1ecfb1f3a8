//! Final color: Lambert lighting over the marched material, or a debug view.

use glam::{Vec3, Vec4};
use pom_core::{saturate, DebugView, TangentFrame, DISPLACEMENT_EPSILON};
use serde::{Deserialize, Serialize};

/// The single directional light plus ambient term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    /// World-space direction towards the light.
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.5, 1.0, 0.3).normalize(),
            color: Vec3::ONE,
            ambient: 0.15,
        }
    }
}

/// Material values fetched at the marched UV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub diffuse: Vec3,
    /// Tangent-space normal, already decoded to `[-1, 1]`.
    pub normal_ts: Vec3,
    /// Lit fraction from the self-shadow march.
    pub shadow: f32,
}

/// Decode an RGB normal-map texel: `rgb * 2 - 1`, renormalized.
pub fn decode_normal(rgb: Vec3) -> Vec3 {
    (rgb * 2.0 - Vec3::ONE).try_normalize().unwrap_or(Vec3::Z)
}

/// Remap a signed unit vector to a displayable color.
#[inline]
fn signed_to_color(v: Vec3) -> Vec3 {
    v * 0.5 + Vec3::splat(0.5)
}

/// Lambert diffuse with one ambient term. Alpha is always 1.
pub fn compose(frame: &TangentFrame, surface: &SurfaceSample, lighting: &Lighting) -> Vec4 {
    let normal = frame.to_world(surface.normal_ts).try_normalize().unwrap_or(frame.normal);
    let light = lighting.direction.normalize_or_zero();
    let lambert = normal.dot(light).max(0.0);
    let lit = lighting.color * (lambert * saturate(surface.shadow)) + Vec3::splat(lighting.ambient);
    let color = (surface.diffuse * lit).clamp(Vec3::ZERO, Vec3::ONE);
    color.extend(1.0)
}

/// Inputs available to the debug views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugInputs {
    pub frame: TangentFrame,
    pub view_ts: Vec3,
    /// `|final_uv - uv|`.
    pub uv_offset: f32,
    pub height: f32,
    pub activity: f32,
}

/// Color for `view`, or `None` when debug output is off.
pub fn debug_color(view: DebugView, inputs: &DebugInputs, displacement_scale: f32) -> Option<Vec4> {
    let rgb = match view {
        DebugView::Off => return None,
        DebugView::Tangent => signed_to_color(inputs.frame.tangent),
        DebugView::Bitangent => signed_to_color(inputs.frame.bitangent),
        DebugView::Normal => signed_to_color(inputs.frame.normal),
        DebugView::ViewDirection => signed_to_color(inputs.view_ts.normalize_or_zero()),
        DebugView::UvOffset => {
            Vec3::splat(saturate(inputs.uv_offset / displacement_scale.max(DISPLACEMENT_EPSILON)))
        }
        DebugView::Height => Vec3::splat(saturate(inputs.height)),
        DebugView::ActivityMask => Vec3::splat(saturate(inputs.activity)),
    };
    Some(rgb.extend(1.0))
}
