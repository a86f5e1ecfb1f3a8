//! Offline viewer: renders one relief-mapped plane to an image.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pom_core::DebugView;
use std::path::PathBuf;

mod assets;
mod config;
mod render;

use config::ViewerConfig;

#[derive(Debug, Parser)]
#[command(about = "Render a parallax occlusion mapped plane to an image", long_about = None)]
struct Cli {
    /// Path to RON configuration file (defaults to ./config.ron when present)
    config: Option<PathBuf>,
    /// Where to write the rendered image
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
    /// Overwrite an existing file given to --write-config
    #[arg(short, long)]
    force_overwrite: bool,
    /// Replace the lit color with a debug view (0 = off, 1..=7)
    #[arg(long, value_parser = parse_debug_view)]
    debug_view: Option<DebugView>,
}

fn parse_debug_view(s: &str) -> Result<DebugView, String> {
    let index: u32 = s.parse().map_err(|e| format!("{}", e))?;
    DebugView::from_index(index).ok_or_else(|| format!("no debug view {}, expected 0..=7", index))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = ViewerConfig::load(cli.config.as_deref())?;
    if let Some(view) = cli.debug_view {
        config.params.debug_view = view;
    }

    if let Some(path) = cli.write_config {
        if !cli.force_overwrite && path.exists() {
            bail!("File {} already exists", path.display());
        }
        config.save(&path)?;
        log::info!("Wrote config to {}", path.display());
        return Ok(());
    }

    log::info!(
        "Material {:?} (seed {}), displacement {}, policy {:?}",
        config.material.kind,
        config.material.seed,
        config.params.displacement_scale,
        config.params.step_policy
    );
    let material = assets::load_material(&config.material, config.params.displacement_scale)?;
    let (image, _) = render::render(&config, &material);

    let output = cli.output.unwrap_or_else(|| config.output.clone());
    image
        .save(&output)
        .with_context(|| format!("Could not write image {}", output.display()))?;
    log::info!("Saved {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_view_flag_takes_an_index() {
        let cli = Cli::try_parse_from(["pom_viewer", "--debug-view", "6"]).expect("parses");
        assert_eq!(cli.debug_view, Some(DebugView::Height));
        assert!(Cli::try_parse_from(["pom_viewer", "--debug-view", "8"]).is_err());
        assert!(Cli::try_parse_from(["pom_viewer", "--debug-view", "height"]).is_err());
    }

    #[test]
    fn debug_view_defaults_to_config() {
        let cli = Cli::try_parse_from(["pom_viewer", "scene.ron", "-o", "out.png"]).expect("parses");
        assert_eq!(cli.debug_view, None);
        assert_eq!(cli.config, Some(PathBuf::from("scene.ron")));
    }
}
