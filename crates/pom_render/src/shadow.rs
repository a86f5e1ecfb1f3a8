//! Self-shadowing by marching from the found surface point towards the light.

use glam::{Vec2, Vec3, Vec3Swizzles};
use pom_core::{ShadowConfig, DISPLACEMENT_EPSILON, MAX_SHADOW_SAMPLES};

use crate::height_field::{HeightField, HeightSampler, UvDerivatives};

/// UV range the shadow ray may travel before it is considered gone.
///
/// Wider than the tile so relief near an edge can still shadow across it.
pub const SHADOW_UV_MIN: f32 = -0.5;
pub const SHADOW_UV_MAX: f32 = 1.5;

#[inline]
fn within_margin(uv: Vec2) -> bool {
    uv.x >= SHADOW_UV_MIN && uv.x <= SHADOW_UV_MAX && uv.y >= SHADOW_UV_MIN && uv.y <= SHADOW_UV_MAX
}

/// Lit fraction of a surface point: 1 = fully lit, 0 = fully occluded.
///
/// `point` is `(uv, height)` in tangent space and `light_ts` points towards the
/// light. Every sample where the ray runs under the height field adds one unit
/// of occlusion; the sum is divided by `config.hardness`.
pub fn soft_shadow<H: HeightField + ?Sized>(
    point: Vec3,
    light_ts: Vec3,
    sampler: &HeightSampler<'_, H>,
    derivatives: &UvDerivatives,
    displacement_scale: f32,
    config: &ShadowConfig,
) -> f32 {
    let light = light_ts.normalize_or_zero();
    if light.z <= 0.0 {
        return 0.0;
    }
    if displacement_scale.abs() <= DISPLACEMENT_EPSILON {
        return 1.0;
    }

    let samples = config.samples.clamp(1, MAX_SHADOW_SAMPLES);
    let height_step = 1.0 / samples as f32;
    let uv_step = light.xy() / light.z * (displacement_scale * height_step);

    let mut uv = point.xy();
    let mut height = point.z;
    let mut occlusion = 0u32;
    for _ in 0..samples {
        uv += uv_step;
        height += height_step;
        if !(0.0..=1.0).contains(&height) || !within_margin(uv) {
            break;
        }
        if height < sampler.sample_with(uv, derivatives) {
            occlusion += 1;
        }
    }

    if occlusion == 0 {
        return 1.0;
    }
    1.0 - (occlusion as f32 / config.hardness.max(f32::EPSILON)).min(1.0)
}
