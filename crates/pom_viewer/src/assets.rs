//! Material loading: generated or from a grayscale image.

use anyhow::{Context, Result};
use glam::Vec3;
use pom_render::{ColorMap, HeightMap};
use procgen::{height_to_normal, MaterialGenerator, MaterialTextures};
use std::path::Path;

use crate::config::MaterialConfig;

/// Build the material described by `config`; normals match `displacement_scale`.
pub fn load_material(config: &MaterialConfig, displacement_scale: f32) -> Result<MaterialTextures> {
    match &config.height_map {
        Some(path) => load_height_image(path, displacement_scale),
        None => {
            let generator = MaterialGenerator::new(config.seed)
                .with_bricks(config.bricks.clone())
                .with_cobbles(config.cobbles.clone())
                .with_rock(config.rock.clone());
            Ok(generator.generate(config.kind, config.resolution.max(1), displacement_scale)?)
        }
    }
}

/// Height from image luminance; the diffuse map is a gray ramp of the height.
fn load_height_image(path: &Path, displacement_scale: f32) -> Result<MaterialTextures> {
    let luma = image::open(path)
        .with_context(|| format!("Could not open height map {}", path.display()))?
        .to_luma32f();
    let (w, h) = luma.dimensions();
    let heights = luma.into_raw();
    let diffuse = heights.iter().map(|&v| Vec3::splat(0.3 + 0.5 * v)).collect();

    let height = HeightMap::from_texels(w, h, heights)?;
    let diffuse = ColorMap::from_texels(w, h, diffuse)?;
    let normal = height_to_normal(&height, displacement_scale)?;
    log::info!("Loaded {}x{} height map from {}", w, h, path.display());
    Ok(MaterialTextures {
        height,
        diffuse,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen::MaterialKind;

    #[test]
    fn generated_material_has_requested_size() {
        let config = MaterialConfig {
            kind: MaterialKind::Cobbles,
            seed: 5,
            resolution: 16,
            ..Default::default()
        };
        let material = load_material(&config, 0.05).expect("generates");
        assert_eq!(material.height.width(), 16);
        assert_eq!(material.normal.height(), 16);
    }

    #[test]
    fn pattern_settings_reach_the_generator() {
        let defaults = MaterialConfig {
            kind: MaterialKind::Bricks,
            resolution: 16,
            ..Default::default()
        };
        let wide = MaterialConfig {
            bricks: procgen::BrickConfig {
                rows: 2,
                columns: 1,
                ..Default::default()
            },
            ..defaults.clone()
        };
        let a = load_material(&defaults, 0.05).expect("generates");
        let b = load_material(&wide, 0.05).expect("generates");
        assert_ne!(a.height.texel(5, 9), b.height.texel(5, 9));
    }

    #[test]
    fn height_image_is_read_as_luminance() {
        let path = std::env::temp_dir().join(format!("pom_viewer_height_{}.png", std::process::id()));
        let img = image::GrayImage::from_fn(4, 2, |x, _| image::Luma([if x < 2 { 0 } else { 255 }]));
        img.save(&path).expect("writes png");

        let config = MaterialConfig {
            height_map: Some(path.clone()),
            ..Default::default()
        };
        let material = load_material(&config, 0.05);
        let _ = std::fs::remove_file(&path);
        let material = material.expect("loads");
        assert_eq!(material.height.width(), 4);
        assert_eq!(material.height.height(), 2);
        assert_eq!(material.height.texel(0, 0), 0.0);
        assert_eq!(material.height.texel(3, 1), 1.0);
    }

    #[test]
    fn missing_height_image_is_an_error() {
        let config = MaterialConfig {
            height_map: Some(std::env::temp_dir().join("pom_viewer_no_such_height.png")),
            ..Default::default()
        };
        assert!(load_material(&config, 0.05).is_err());
    }
}
