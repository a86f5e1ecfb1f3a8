//! CPU textures with a mip chain and explicit-gradient sampling.
//!
//! Addressing is REPEAT on both axes: any UV outside `[0, 1]` wraps. The relief
//! marcher relies on this when a ray leaves the tile, and the compositor
//! discards such fragments anyway.

use glam::{Vec2, Vec3};
use std::ops::{Add, Mul};
use thiserror::Error;

/// A value that can be stored in a [`Texture2D`] and filtered linearly.
pub trait Texel: Copy + Default + Add<Output = Self> + Mul<f32, Output = Self> {}

impl Texel for f32 {}
impl Texel for Vec3 {}

/// Single-channel texture used for height fields.
pub type HeightMap = Texture2D<f32>;
/// RGB texture used for diffuse and encoded normal maps.
pub type ColorMap = Texture2D<Vec3>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("expected {expected} texels for the given size, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
struct MipLevel<T> {
    width: u32,
    height: u32,
    texels: Vec<T>,
}

impl<T: Texel> MipLevel<T> {
    #[inline]
    fn fetch(&self, x: i64, y: i64) -> T {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear tap with texel centers at half-integer coordinates.
    fn bilinear(&self, uv: Vec2) -> T {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.fetch(x0, y0) * (1.0 - fx) + self.fetch(x0 + 1, y0) * fx;
        let bottom = self.fetch(x0, y0 + 1) * (1.0 - fx) + self.fetch(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// 2x2 box filter into the next level (edge texels repeat for odd sizes).
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let (sx, sy) = (x * 2, y * 2);
                let sum = self.fetch(sx, sy)
                    + self.fetch((sx + 1).min(max_x), sy)
                    + self.fetch(sx, (sy + 1).min(max_y))
                    + self.fetch((sx + 1).min(max_x), (sy + 1).min(max_y));
                texels.push(sum * 0.25);
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }
}

/// Mip-mapped 2D texture sampled with caller-supplied screen-space derivatives.
#[derive(Debug, Clone)]
pub struct Texture2D<T> {
    levels: Vec<MipLevel<T>>,
}

impl<T: Texel> Texture2D<T> {
    /// Build a texture and its full mip chain from row-major texels.
    pub fn from_texels(width: u32, height: u32, texels: Vec<T>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::Empty { width, height });
        }
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: texels.len(),
            });
        }

        let mut levels = vec![MipLevel {
            width,
            height,
            texels,
        }];
        while let Some(last) = levels.last() {
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        log::debug!("Built {}x{} texture with {} mip levels", width, height, levels.len());
        Ok(Self { levels })
    }

    /// Build a texture by evaluating `f` at every texel center.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(Vec2) -> T) -> Result<Self, TextureError> {
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / width.max(1) as f32,
                    (y as f32 + 0.5) / height.max(1) as f32,
                );
                texels.push(f(uv));
            }
        }
        Self::from_texels(width, height, texels)
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Texel at integer coordinates of the finest level (wrapped).
    pub fn texel(&self, x: i64, y: i64) -> T {
        self.levels[0].fetch(x, y)
    }

    /// Trilinear sample at a fractional level of detail.
    pub fn sample_level(&self, uv: Vec2, lod: f32) -> T {
        let max_level = (self.levels.len() - 1) as f32;
        let lod = if lod.is_nan() { 0.0 } else { lod.clamp(0.0, max_level) };
        let base = lod.floor();
        let frac = lod - base;
        let base = base as usize;
        let fine = self.levels[base].bilinear(uv);
        if frac <= 0.0 || base + 1 >= self.levels.len() {
            return fine;
        }
        let coarse = self.levels[base + 1].bilinear(uv);
        fine * (1.0 - frac) + coarse * frac
    }

    /// Sample with explicit UV derivatives.
    ///
    /// The level of detail follows the longer of the two footprints measured in
    /// texels, so a displaced lookup filters exactly like the fragment it
    /// belongs to.
    pub fn sample_grad(&self, uv: Vec2, ddx: Vec2, ddy: Vec2) -> T {
        let size = Vec2::new(self.width() as f32, self.height() as f32);
        let footprint = (ddx * size).length().max((ddy * size).length());
        let lod = if footprint > 1.0 { footprint.log2() } else { 0.0 };
        self.sample_level(uv, lod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> HeightMap {
        HeightMap::from_fn(size, size, |uv| {
            let cell = (uv * size as f32).floor();
            if (cell.x + cell.y) as i32 % 2 == 0 {
                1.0
            } else {
                0.0
            }
        })
        .expect("valid size")
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(
            HeightMap::from_texels(0, 4, vec![]).unwrap_err(),
            TextureError::Empty { width: 0, height: 4 }
        );
        assert_eq!(
            HeightMap::from_texels(2, 2, vec![0.0; 3]).unwrap_err(),
            TextureError::SizeMismatch { expected: 4, actual: 3 }
        );
    }

    #[test]
    fn mip_chain_reaches_one_texel() {
        let tex = checker(16);
        assert_eq!(tex.level_count(), 5);
        let top = tex.sample_level(Vec2::splat(0.3), 4.0);
        assert!((top - 0.5).abs() < 1e-6);
    }

    #[test]
    fn non_square_chain() {
        let tex = HeightMap::from_texels(4, 1, vec![0.0, 1.0, 0.0, 1.0]).expect("valid");
        assert_eq!(tex.level_count(), 3);
    }

    #[test]
    fn texel_centers_are_exact() {
        let tex = checker(8);
        let center = Vec2::new(0.5 / 8.0, 0.5 / 8.0);
        assert_eq!(tex.sample_grad(center, Vec2::ZERO, Vec2::ZERO), 1.0);
    }

    #[test]
    fn wraps_outside_unit_square() {
        let tex = checker(8);
        let uv = Vec2::new(0.3, 0.7);
        let inside = tex.sample_grad(uv, Vec2::ZERO, Vec2::ZERO);
        let outside = tex.sample_grad(uv + Vec2::new(2.0, -1.0), Vec2::ZERO, Vec2::ZERO);
        assert!((inside - outside).abs() < 1e-5);
        assert_eq!(tex.texel(-1, 0), tex.texel(7, 0));
    }

    #[test]
    fn large_footprint_blurs_towards_average() {
        let tex = checker(64);
        let uv = Vec2::new(0.5 / 64.0, 0.5 / 64.0);
        let sharp = tex.sample_grad(uv, Vec2::ZERO, Vec2::ZERO);
        let blurred = tex.sample_grad(uv, Vec2::new(0.5, 0.0), Vec2::ZERO);
        assert_eq!(sharp, 1.0);
        assert!((blurred - 0.5).abs() < 0.05);
    }
}
