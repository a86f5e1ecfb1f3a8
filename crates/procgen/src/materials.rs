//! Procedural relief materials: height, diffuse and normal maps.
//!
//! Every pattern tiles over the unit square so the textures can be sampled
//! with REPEAT addressing. All randomness comes from the generator seed; the
//! same seed always produces the same texels.

use glam::{Vec2, Vec3};
use noise::{NoiseFn, Perlin};
use pom_core::smoothstep;
use pom_render::{ColorMap, HeightMap, TextureError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::normal::height_to_normal;

/// Which pattern to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Running-bond bricks with recessed mortar.
    #[default]
    Bricks,
    /// Rounded stones in a Voronoi layout.
    Cobbles,
    /// Fractal Perlin rock.
    Rock,
}

/// Height, diffuse and normal maps of one material.
#[derive(Debug, Clone)]
pub struct MaterialTextures {
    pub height: HeightMap,
    pub diffuse: ColorMap,
    pub normal: ColorMap,
}

/// Configuration for brick generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickConfig {
    pub rows: u32,
    pub columns: u32,
    /// Mortar half-width in brick-local units.
    pub mortar: f64,
    pub brick_color: Vec3,
    pub mortar_color: Vec3,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 4,
            mortar: 0.06,
            brick_color: Vec3::new(0.62, 0.27, 0.18),
            mortar_color: Vec3::new(0.55, 0.53, 0.5),
        }
    }
}

/// Configuration for cobble generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CobbleConfig {
    /// Voronoi cells per side; must be whole for the pattern to tile.
    pub cells: u32,
    pub stone_color: Vec3,
    pub gap_color: Vec3,
}

impl Default for CobbleConfig {
    fn default() -> Self {
        Self {
            cells: 6,
            stone_color: Vec3::new(0.52, 0.5, 0.46),
            gap_color: Vec3::new(0.18, 0.16, 0.14),
        }
    }
}

/// Configuration for rock generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RockConfig {
    pub frequency: f64,
    pub octaves: u32,
    pub dark_color: Vec3,
    pub light_color: Vec3,
}

impl Default for RockConfig {
    fn default() -> Self {
        Self {
            frequency: 4.0,
            octaves: 5,
            dark_color: Vec3::new(0.25, 0.23, 0.21),
            light_color: Vec3::new(0.66, 0.62, 0.56),
        }
    }
}

/// Seeded generator for relief materials.
pub struct MaterialGenerator {
    perlin: Perlin,
    /// Offset into hash space so different seeds pick different cells.
    hash_offset: (f64, f64),
    bricks: BrickConfig,
    cobbles: CobbleConfig,
    rock: RockConfig,
}

impl MaterialGenerator {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            perlin: Perlin::new(rng.gen()),
            hash_offset: (rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0)),
            bricks: BrickConfig::default(),
            cobbles: CobbleConfig::default(),
            rock: RockConfig::default(),
        }
    }

    pub fn with_bricks(mut self, config: BrickConfig) -> Self {
        self.bricks = config;
        self
    }

    pub fn with_cobbles(mut self, config: CobbleConfig) -> Self {
        self.cobbles = config;
        self
    }

    pub fn with_rock(mut self, config: RockConfig) -> Self {
        self.rock = config;
        self
    }

    /// Generate a square material of `resolution` texels per side.
    ///
    /// `normal_strength` is the displacement scale the normal map is derived for.
    pub fn generate(
        &self,
        kind: MaterialKind,
        resolution: u32,
        normal_strength: f32,
    ) -> Result<MaterialTextures, TextureError> {
        let mut diffuse = Vec::with_capacity(resolution as usize * resolution as usize);
        let height = HeightMap::from_fn(resolution, resolution, |uv| {
            let (h, color) = self.texel(kind, uv);
            diffuse.push(color);
            h
        })?;
        let diffuse = ColorMap::from_texels(resolution, resolution, diffuse)?;
        let normal = height_to_normal(&height, normal_strength)?;
        log::info!("Generated {:?} material at {}x{}", kind, resolution, resolution);
        Ok(MaterialTextures {
            height,
            diffuse,
            normal,
        })
    }

    /// Height in `[0, 1]` and diffuse color at `uv`.
    pub fn texel(&self, kind: MaterialKind, uv: Vec2) -> (f32, Vec3) {
        let (u, v) = (uv.x as f64, uv.y as f64);
        let (h, color) = match kind {
            MaterialKind::Bricks => self.brick(u, v),
            MaterialKind::Cobbles => self.cobble(u, v),
            MaterialKind::Rock => self.rock_texel(u, v),
        };
        (h.clamp(0.0, 1.0) as f32, color.clamp(Vec3::ZERO, Vec3::ONE))
    }

    fn brick(&self, u: f64, v: f64) -> (f64, Vec3) {
        let cfg = &self.bricks;
        let rows = cfg.rows.max(1) as f64;
        let cols = cfg.columns.max(1) as f64;

        let y = v * rows;
        let row = y.floor();
        // Running bond: odd rows shift by half a brick.
        let shift = if row.rem_euclid(2.0) == 1.0 { 0.5 } else { 0.0 };
        let x = u * cols + shift;
        let col = x.floor();

        // Distance to the nearest joint, with bricks twice as wide as tall.
        let fx = x - col;
        let fy = y - row;
        let edge = (fx.min(1.0 - fx) * 2.0 * rows / cols).min(fy.min(1.0 - fy));
        let bevel = smoothstep(0.0, (cfg.mortar * 2.0) as f32, (edge - cfg.mortar) as f32) as f64;

        let id = self.hash2d(col.rem_euclid(cols), row);
        let grain = self.tiled_fbm(u * 32.0, v * 32.0, 32.0, 3);
        let h = 0.2 + bevel * (0.7 + id * 0.1 + grain * 0.2);

        let brick = cfg.brick_color * (0.8 + id * 0.35) as f32 * (0.9 + grain * 0.2) as f32;
        let mortar = cfg.mortar_color * (0.9 + grain * 0.15) as f32;
        (h, mortar.lerp(brick, bevel as f32))
    }

    fn cobble(&self, u: f64, v: f64) -> (f64, Vec3) {
        let cfg = &self.cobbles;
        let period = cfg.cells.max(1) as f64;
        let (first, second, id) = self.voronoi(u * period, v * period, period);

        // Stones dome towards their centers and fall into the gaps.
        let gap = smoothstep(0.02, 0.25, (second - first) as f32) as f64;
        let dome = 1.0 - (first * first).min(1.0);
        let grain = self.tiled_fbm(u * 16.0, v * 16.0, 16.0, 3);
        let h = gap * (0.55 + dome * 0.35 + id * 0.1) + grain * 0.05;

        let stone = cfg.stone_color * (0.8 + id * 0.35) as f32 * (0.85 + grain * 0.3) as f32;
        (h, cfg.gap_color.lerp(stone, gap as f32))
    }

    fn rock_texel(&self, u: f64, v: f64) -> (f64, Vec3) {
        let cfg = &self.rock;
        let period = cfg.frequency.max(1.0).round();
        let h = self.tiled_fbm(u * period, v * period, period, cfg.octaves.max(1));
        let speckle = self.hash2d((u * 512.0).floor(), (v * 512.0).floor());
        let color = cfg.dark_color.lerp(cfg.light_color, h as f32) * (0.92 + speckle * 0.16) as f32;
        (h, color)
    }

    // Noise helpers

    fn fbm(&self, x: f64, y: f64, octaves: u32) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 0.5;
        let mut frequency = 1.0;
        let mut total = 0.0;

        for _ in 0..octaves {
            value += amplitude * (self.perlin.get([x * frequency, y * frequency]) * 0.5 + 0.5);
            total += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        value / total.max(f64::EPSILON)
    }

    /// fBm that repeats every `period` units, blended from four shifted copies.
    fn tiled_fbm(&self, x: f64, y: f64, period: f64, octaves: u32) -> f64 {
        let tx = x.rem_euclid(period) / period;
        let ty = y.rem_euclid(period) / period;
        let (x, y) = (tx * period, ty * period);
        let a = self.fbm(x, y, octaves);
        let b = self.fbm(x - period, y, octaves);
        let c = self.fbm(x, y - period, octaves);
        let d = self.fbm(x - period, y - period, octaves);
        let top = a * (1.0 - tx) + b * tx;
        let bottom = c * (1.0 - tx) + d * tx;
        top * (1.0 - ty) + bottom * ty
    }

    /// Distances to the nearest and second-nearest feature points, and a
    /// per-cell id in `[0, 1)`. Cell indices wrap every `period` cells.
    fn voronoi(&self, x: f64, y: f64, period: f64) -> (f64, f64, f64) {
        let n = (x.floor(), y.floor());
        let f = (x - n.0, y - n.1);

        let mut min_dist = 8.0;
        let mut second_dist = 8.0;
        let mut id = 0.0;

        for j in -1..=1 {
            for i in -1..=1 {
                let g = (i as f64, j as f64);
                let cell = ((n.0 + g.0).rem_euclid(period), (n.1 + g.1).rem_euclid(period));
                let o = (
                    self.hash2d(cell.0, cell.1),
                    self.hash2d(cell.0 + 17.0, cell.1 + 31.0),
                );
                let r = (g.0 + o.0 - f.0, g.1 + o.1 - f.1);
                let d = r.0 * r.0 + r.1 * r.1;

                if d < min_dist {
                    second_dist = min_dist;
                    min_dist = d;
                    id = self.hash2d(cell.0 + 59.0, cell.1 + 83.0);
                } else if d < second_dist {
                    second_dist = d;
                }
            }
        }

        (min_dist.sqrt(), second_dist.sqrt(), id)
    }

    fn hash2d(&self, x: f64, y: f64) -> f64 {
        let p = Vec2::new((x + self.hash_offset.0) as f32, (y + self.hash_offset.1) as f32);
        let p3 = (Vec3::new(p.x, p.y, p.x) * 0.1031).fract();
        let p3 = p3 + Vec3::splat(p3.dot(Vec3::new(p3.y + 33.33, p3.z + 33.33, p3.x + 33.33)));
        ((p3.x + p3.y) * p3.z).fract() as f64
    }

}
