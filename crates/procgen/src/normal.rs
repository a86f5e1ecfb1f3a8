//! Tangent-space normal maps derived from height maps.
//!
//! Central differences with wrapped neighbours, so tileable height maps give
//! tileable normal maps. Output is encoded as `n * 0.5 + 0.5` per channel:
//! R along +u (tangent), G along +v (bitangent), B out of the surface.

use glam::Vec3;
use pom_render::{ColorMap, HeightMap, TextureError};

/// Build the normal map of `height` displaced by `strength` UV units per unit height.
///
/// Use the material's displacement scale as `strength` to match the relief
/// the marcher produces.
pub fn height_to_normal(height: &HeightMap, strength: f32) -> Result<ColorMap, TextureError> {
    let (w, h) = (height.width(), height.height());
    let mut texels = Vec::with_capacity(w as usize * h as usize);

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let left = height.texel(x - 1, y);
            let right = height.texel(x + 1, y);
            let down = height.texel(x, y - 1);
            let up = height.texel(x, y + 1);

            // Slopes per UV unit: neighbours sit 2/size apart.
            let du = (right - left) * w as f32 * 0.5;
            let dv = (up - down) * h as f32 * 0.5;

            let n = Vec3::new(-du * strength, -dv * strength, 1.0).normalize();
            texels.push(encode(n));
        }
    }

    log::debug!("Derived {}x{} normal map (strength {})", w, h, strength);
    ColorMap::from_texels(w, h, texels)
}

#[inline]
fn encode(n: Vec3) -> Vec3 {
    (n * 0.5 + Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE)
}
