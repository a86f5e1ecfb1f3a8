//! Height field access for the relief and shadow marchers.

use glam::Vec2;
use pom_core::saturate;

use crate::texture::HeightMap;

/// Fallback texel spacing for analytic fields that have no resolution.
pub const ANALYTIC_TEXEL_SIZE: f32 = 1.0 / 256.0;

/// A scalar relief function over UV, sampled with explicit derivatives.
///
/// Callers deliberately evaluate it away from the fragment's own UV (marching,
/// neighbour taps for gradients) while passing the fragment's original
/// derivatives, so filtering stays consistent across all taps.
pub trait HeightField {
    fn height_grad(&self, uv: Vec2, ddx: Vec2, ddy: Vec2) -> f32;

    /// UV distance between neighbouring texels; used for gradient taps.
    fn texel_size(&self) -> Vec2 {
        Vec2::splat(ANALYTIC_TEXEL_SIZE)
    }
}

impl HeightField for HeightMap {
    fn height_grad(&self, uv: Vec2, ddx: Vec2, ddy: Vec2) -> f32 {
        self.sample_grad(uv, ddx, ddy)
    }

    fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width() as f32, 1.0 / self.height() as f32)
    }
}

/// The same height everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantHeight(pub f32);

impl HeightField for ConstantHeight {
    fn height_grad(&self, _uv: Vec2, _ddx: Vec2, _ddy: Vec2) -> f32 {
        self.0
    }
}

/// An analytic field evaluated exactly at any UV; derivatives are ignored.
#[derive(Debug, Clone, Copy)]
pub struct FnHeightField<F>(pub F);

impl<F> HeightField for FnHeightField<F>
where
    F: Fn(Vec2) -> f32,
{
    fn height_grad(&self, uv: Vec2, _ddx: Vec2, _ddy: Vec2) -> f32 {
        (self.0)(uv)
    }
}

/// Screen-space derivatives of the surface UV for one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvDerivatives {
    pub ddx: Vec2,
    pub ddy: Vec2,
}

/// Height lookups in surface UV with the tiling transform applied.
///
/// `uv' = uv * repeat` and both derivatives scale by the same factor. Results
/// are clamped to `[0, 1]`.
pub struct HeightSampler<'a, H: HeightField + ?Sized> {
    field: &'a H,
    repeat: f32,
}

impl<H: HeightField + ?Sized> Clone for HeightSampler<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: HeightField + ?Sized> Copy for HeightSampler<'_, H> {}

impl<'a, H: HeightField + ?Sized> HeightSampler<'a, H> {
    pub fn new(field: &'a H, repeat: f32) -> Self {
        Self { field, repeat }
    }

    /// Untiled sampler.
    pub fn untiled(field: &'a H) -> Self {
        Self::new(field, 1.0)
    }

    #[inline]
    pub fn sample(&self, uv: Vec2, ddx: Vec2, ddy: Vec2) -> f32 {
        let r = self.repeat;
        saturate(self.field.height_grad(uv * r, ddx * r, ddy * r))
    }

    #[inline]
    pub fn sample_with(&self, uv: Vec2, derivatives: &UvDerivatives) -> f32 {
        self.sample(uv, derivatives.ddx, derivatives.ddy)
    }

    /// Surface-UV offset that moves one texel in the tiled field.
    pub fn texel_step(&self) -> Vec2 {
        self.field.texel_size() / self.repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_clamps_to_unit_range() {
        let high = ConstantHeight(1.7);
        let low = ConstantHeight(-0.2);
        assert_eq!(HeightSampler::untiled(&high).sample(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO), 1.0);
        assert_eq!(HeightSampler::untiled(&low).sample(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO), 0.0);
    }

    #[test]
    fn repeat_scales_coordinates_and_derivatives() {
        struct Recorder;
        impl HeightField for Recorder {
            fn height_grad(&self, uv: Vec2, ddx: Vec2, ddy: Vec2) -> f32 {
                assert_eq!(uv, Vec2::new(0.75, 1.5));
                assert_eq!(ddx, Vec2::new(0.375, 0.0));
                assert_eq!(ddy, Vec2::new(0.0, 0.75));
                0.5
            }
        }
        let sampler = HeightSampler::new(&Recorder, 3.0);
        let h = sampler.sample(Vec2::new(0.25, 0.5), Vec2::new(0.125, 0.0), Vec2::new(0.0, 0.25));
        assert_eq!(h, 0.5);
    }

    #[test]
    fn texel_step_shrinks_with_tiling() {
        let map = HeightMap::from_texels(64, 32, vec![0.0; 64 * 32]).expect("valid");
        let sampler = HeightSampler::new(&map, 4.0);
        let step = sampler.texel_step();
        assert!((step.x - 1.0 / 256.0).abs() < 1e-9);
        assert!((step.y - 1.0 / 128.0).abs() < 1e-9);
    }

    #[test]
    fn analytic_field_ignores_derivatives() {
        let field = FnHeightField(|uv: Vec2| uv.x);
        let sampler = HeightSampler::untiled(&field);
        let a = sampler.sample(Vec2::new(0.4, 0.0), Vec2::ZERO, Vec2::ZERO);
        let b = sampler.sample(Vec2::new(0.4, 0.0), Vec2::splat(10.0), Vec2::splat(10.0));
        assert_eq!(a, b);
    }
}
