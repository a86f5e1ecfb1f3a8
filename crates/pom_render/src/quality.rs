//! Adaptive quality controller: layer count and on/off per fragment.
//!
//! Relief detail matters most at grazing angles and close range. The activity
//! mask is the product of an angle mask and a distance mask, both in `[0, 1]`,
//! and both monotonic (more grazing or nearer never lowers activity).

use pom_core::{mix, saturate, smoothstep, QualityConfig};

/// Per-fragment marching budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityParams {
    /// Coarse-search layers, within `[min_layers, max_layers]`.
    pub layer_count: f32,
    /// False when the fragment is far enough that the march is skipped.
    pub active: bool,
    /// Combined activity mask in `[0, 1]`.
    pub activity: f32,
}

impl QualityParams {
    /// Self-shadow steps for this fragment: `samples` scaled by the share of
    /// `max_layers` the coarse search was given, never below one.
    pub fn shadow_samples(&self, samples: u32, config: &QualityConfig) -> u32 {
        let max = config.max_layers.max(config.min_layers).max(1.0);
        let share = (self.layer_count / max).clamp(0.0, 1.0);
        ((samples as f32 * share).ceil() as u32).max(1)
    }
}

/// `(1 - smoothstep(0, 1, n·v))²`: 1 at grazing, 0 head-on.
pub fn angle_mask(n_dot_v: f32) -> f32 {
    let t = 1.0 - smoothstep(0.0, 1.0, n_dot_v);
    saturate(t * t)
}

/// `1 - smoothstep(0, 1, d / lod_distance)^(1/8)`: slow falloff favouring near fragments.
pub fn distance_mask(camera_distance: f32, lod_distance: f32) -> f32 {
    let d = camera_distance / lod_distance.max(f32::EPSILON);
    saturate(1.0 - smoothstep(0.0, 1.0, d).powf(1.0 / 8.0))
}

/// Derive the marching budget for one fragment.
pub fn evaluate(n_dot_v: f32, camera_distance: f32, config: &QualityConfig) -> QualityParams {
    let min = config.min_layers.max(1.0);
    let max = config.max_layers.max(min);

    let distance = distance_mask(camera_distance, config.lod_distance);
    let activity = saturate(angle_mask(n_dot_v) * distance);
    let layer_count = if config.dynamic_layers {
        mix(min, max, activity).clamp(min, max)
    } else {
        max
    };

    QualityParams {
        layer_count,
        active: distance >= config.active_radius,
        activity,
    }
}
