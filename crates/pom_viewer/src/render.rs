//! CPU rasterization of one relief-mapped plane.
//!
//! Each pixel casts a primary ray at the undisplaced plane, interpolates the
//! vertex-stage outputs of the covering triangle and runs the fragment stage.
//! Screen derivatives come from the rays through the right and lower
//! neighbours, like a GPU's 2x2 quad differences.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use pom_core::{PomParams, Transform};
use pom_render::{
    shade_fragment, vertex_stage, DisplacedVertex, FragmentInput, FragmentOutput, Lighting, Material, OrbitCamera,
    PlaneMesh, Ray, ScreenDerivatives,
};
use procgen::MaterialTextures;
use std::time::Instant;

use crate::config::{PlaneConfig, ViewerConfig};

const BACKGROUND: Vec3 = Vec3::new(0.08, 0.09, 0.11);

/// Fragment counts of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Pixels covered by the plane.
    pub fragments: u64,
    /// Covered pixels the fragment stage discarded.
    pub discarded: u64,
}

impl RenderStats {
    pub fn discard_fraction(&self) -> f64 {
        if self.fragments == 0 {
            0.0
        } else {
            self.discarded as f64 / self.fragments as f64
        }
    }
}

/// The plane after the vertex stage, plus what is needed to locate fragments on it.
struct Surface {
    plane: PlaneMesh,
    displaced: Vec<DisplacedVertex>,
    origin: Vec3,
    normal: Vec3,
    world_to_local: Mat4,
}

impl Surface {
    fn build(config: &PlaneConfig, material: &MaterialTextures, params: &PomParams) -> Self {
        let plane = PlaneMesh::new(config.size, config.subdivisions);
        let transform =
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_x(config.tilt_degrees.to_radians()));
        let placed = plane.mesh.transformed(&transform);
        let displaced = placed
            .vertices
            .iter()
            .map(|v| vertex_stage(v, &material.height, params))
            .collect();

        Self {
            displaced,
            origin: transform.position,
            normal: transform.transform_normal(Vec3::Y),
            world_to_local: transform.to_matrix().inverse(),
            plane,
        }
    }

    /// Plane UV where `ray` meets the undisplaced surface; unbounded.
    fn uv_along(&self, ray: &Ray) -> Option<(Vec2, Vec3)> {
        let t = ray.intersect_plane(self.origin, self.normal)?;
        let world = ray.at(t);
        let local = self.world_to_local.transform_point3(world);
        let size = self.plane.size;
        Some((Vec2::new(local.x / size + 0.5, 0.5 - local.z / size), world))
    }
}

/// Render `config` with `material`, returning the image and fragment counts.
pub fn render(config: &ViewerConfig, material: &MaterialTextures) -> (image::RgbImage, RenderStats) {
    let start = Instant::now();
    let (width, height) = (config.width, config.height);
    let params = &config.params;

    let mut camera = OrbitCamera {
        yaw: config.camera.yaw_degrees.to_radians(),
        pitch: config.camera.pitch_degrees.to_radians(),
        distance: config.camera.distance,
        fov_degrees: config.camera.fov_degrees,
        ..Default::default()
    };
    camera.set_aspect(width, height);
    let eye = camera.position();

    let surface = Surface::build(&config.plane, material, params);
    let lighting = Lighting {
        direction: config.lighting.direction.normalize_or_zero(),
        ..config.lighting
    };
    let bound = Material {
        height: &material.height,
        diffuse: &material.diffuse,
        normal: &material.normal,
    };
    log::debug!(
        "Vertex stage: {} vertices in {:.1?}",
        surface.displaced.len(),
        start.elapsed()
    );

    let mut stats = RenderStats::default();
    let mut image = image::RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let hit = surface
                .uv_along(&camera.ray(px, py, width, height))
                .and_then(|(uv, world)| Some((uv, world, surface.plane.triangle_at(uv)?)));
            let color = match hit {
                Some((uv, world, triangle)) => {
                    stats.fragments += 1;
                    let derivatives = screen_derivatives(&surface, &camera, (px, py), (width, height), uv, world);
                    match shade(&surface, triangle, derivatives, eye, &bound, params, &lighting) {
                        FragmentOutput::Color(c) => c,
                        FragmentOutput::Discard => {
                            stats.discarded += 1;
                            BACKGROUND.extend(1.0)
                        }
                    }
                }
                None => BACKGROUND.extend(1.0),
            };
            image.put_pixel(x, y, to_rgb(color));
        }
    }

    log::info!(
        "Rendered {}x{} in {:.2?}: {} fragments, {:.1}% discarded",
        width,
        height,
        start.elapsed(),
        stats.fragments,
        stats.discard_fraction() * 100.0
    );
    (image, stats)
}

fn screen_derivatives(
    surface: &Surface,
    camera: &OrbitCamera,
    (px, py): (f32, f32),
    (width, height): (u32, u32),
    uv: Vec2,
    world: Vec3,
) -> ScreenDerivatives {
    let right = surface.uv_along(&camera.ray(px + 1.0, py, width, height));
    let below = surface.uv_along(&camera.ray(px, py + 1.0, width, height));
    let (uv_dx, position_dx) = right.map_or((Vec2::ZERO, Vec3::ZERO), |(u, p)| (u - uv, p - world));
    let (uv_dy, position_dy) = below.map_or((Vec2::ZERO, Vec3::ZERO), |(u, p)| (u - uv, p - world));
    ScreenDerivatives {
        uv_dx,
        uv_dy,
        position_dx,
        position_dy,
    }
}

fn shade(
    surface: &Surface,
    (tri, bary): ([u32; 3], Vec3),
    derivatives: ScreenDerivatives,
    eye: Vec3,
    material: &Material<'_, pom_render::HeightMap>,
    params: &PomParams,
    lighting: &Lighting,
) -> FragmentOutput {
    let corners = tri.map(|i| &surface.displaced[i as usize]);
    let input = FragmentInput::interpolate(corners, bary, derivatives, eye);
    shade_fragment(&input, material, params, lighting)
}

fn to_rgb(color: Vec4) -> image::Rgb<u8> {
    let c = (color.truncate().clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    image::Rgb([c.x as u8, c.y as u8, c.z as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen::{MaterialGenerator, MaterialKind};

    fn small_config() -> ViewerConfig {
        let mut config = ViewerConfig {
            width: 24,
            height: 16,
            ..Default::default()
        };
        config.plane.subdivisions = 4;
        config
    }

    fn flat_material() -> MaterialTextures {
        let height = pom_render::HeightMap::from_fn(8, 8, |_| 0.5).expect("valid size");
        let normal = procgen::height_to_normal(&height, 0.05).expect("valid size");
        let diffuse = pom_render::ColorMap::from_fn(8, 8, |_| Vec3::splat(0.7)).expect("valid size");
        MaterialTextures {
            height,
            diffuse,
            normal,
        }
    }

    #[test]
    fn flat_material_covers_center_without_discards() {
        let config = small_config();
        let (image, stats) = render(&config, &flat_material());
        assert_eq!(image.dimensions(), (24, 16));
        assert!(stats.fragments > 0);
        assert_eq!(stats.discarded, 0);
        assert_ne!(*image.get_pixel(12, 8), to_rgb(BACKGROUND.extend(1.0)));
    }

    #[test]
    fn distant_tiny_plane_is_background() {
        let mut config = small_config();
        config.plane.size = 0.001;
        config.camera.distance = 50.0;
        let (image, stats) = render(&config, &flat_material());
        assert_eq!(stats.fragments, 0);
        assert_eq!(*image.get_pixel(0, 0), to_rgb(BACKGROUND.extend(1.0)));
    }

    #[test]
    fn generated_material_renders() {
        let config = small_config();
        let material = MaterialGenerator::new(2)
            .generate(MaterialKind::Bricks, 32, config.params.displacement_scale)
            .expect("valid size");
        let (_, stats) = render(&config, &material);
        assert!(stats.fragments > 0);
        assert!(stats.discard_fraction() <= 1.0);
    }

    #[test]
    fn discard_fraction_of_empty_frame_is_zero() {
        assert_eq!(RenderStats::default().discard_fraction(), 0.0);
        let stats = RenderStats {
            fragments: 4,
            discarded: 1,
        };
        assert_eq!(stats.discard_fraction(), 0.25);
    }
}
