//! Relief ray marcher: finds where the view ray meets the height field.
//!
//! Every step policy shares one skeleton:
//!
//! 1. Coarse search. Enter at `mix(h(uv), 1, parallax_offset)` and walk away
//!    from the eye, one layer at a time, until the sampled height reaches the
//!    layer height or the layer budget runs out.
//! 2. Bisection between the last two brackets.
//! 3. Linear interpolation of the signed depths of the tightened brackets.
//! 4. Visibility: the final UV must lie in `[0, 1]²`.
//!
//! Heights are normalized to `[0, 1]`; `displacement_scale` converts a unit of
//! height into UV distance along the projected view ray.

use glam::{Vec2, Vec3, Vec3Swizzles};
use pom_core::{mix, PomParams, StepPolicy, MAX_LAYERS};

use crate::height_field::{HeightField, HeightSampler, UvDerivatives};

/// Smallest tangent-space `view.z` used when projecting the view ray.
pub const VIEW_Z_EPSILON: f32 = 0.02;
/// Bounds on the terrain-adaptive step multiplier.
pub const MIN_STEP_FACTOR: f32 = 0.25;
pub const MAX_STEP_FACTOR: f32 = 3.0;

/// Outcome of one march.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PomResult {
    pub uv: Vec2,
    /// False when `uv` left the unit square; the fragment must be discarded.
    pub visible: bool,
}

impl PomResult {
    pub fn at(uv: Vec2) -> Self {
        Self {
            uv,
            visible: in_unit_square(uv),
        }
    }

    /// The unmarched result used when relief is switched off for a fragment.
    pub fn passthrough(uv: Vec2) -> Self {
        Self { uv, visible: true }
    }
}

#[inline]
fn in_unit_square(uv: Vec2) -> bool {
    uv.x >= 0.0 && uv.x <= 1.0 && uv.y >= 0.0 && uv.y <= 1.0
}

/// One end of a bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MarchPoint {
    uv: Vec2,
    layer: f32,
    /// Sampled height at `uv`.
    height: f32,
}

impl MarchPoint {
    /// Positive once the ray is at or under the surface.
    #[inline]
    fn depth(&self) -> f32 {
        self.height - self.layer
    }

    #[inline]
    fn crossed(&self) -> bool {
        self.height >= self.layer
    }
}

/// Bracket around the intersection, owned by a single march.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RayMarchState {
    current: MarchPoint,
    previous: MarchPoint,
}

impl RayMarchState {
    fn enter(point: MarchPoint) -> Self {
        Self {
            current: point,
            previous: point,
        }
    }

    /// Move one step further from the eye. The layer height strictly decreases.
    fn advance<H: HeightField + ?Sized>(
        &mut self,
        uv_step: Vec2,
        layer_step: f32,
        sampler: &HeightSampler<'_, H>,
        derivatives: &UvDerivatives,
    ) {
        debug_assert!(layer_step > 0.0);
        let uv = self.current.uv - uv_step;
        self.previous = self.current;
        self.current = MarchPoint {
            uv,
            layer: self.current.layer - layer_step,
            height: sampler.sample_with(uv, derivatives),
        };
    }

    /// Halve the bracket, keeping the half that still contains the crossing.
    fn bisect<H: HeightField + ?Sized>(&mut self, sampler: &HeightSampler<'_, H>, derivatives: &UvDerivatives) {
        let uv = (self.previous.uv + self.current.uv) * 0.5;
        let mid = MarchPoint {
            uv,
            layer: (self.previous.layer + self.current.layer) * 0.5,
            height: sampler.sample_with(uv, derivatives),
        };
        if mid.crossed() {
            self.current = mid;
        } else {
            self.previous = mid;
        }
    }

    /// Zero crossing of the signed depth between the two brackets.
    ///
    /// Identical depths (flat regions) make the denominator vanish; the current
    /// bracket is used then.
    fn interpolate(&self) -> Vec2 {
        let after = self.current.depth();
        let before = self.previous.depth();
        let denominator = after - before;
        let weight = if denominator.abs() < f32::MIN_POSITIVE {
            0.0
        } else {
            (after / denominator).clamp(0.0, 1.0)
        };
        self.previous.uv * weight + self.current.uv * (1.0 - weight)
    }
}

/// Layer count actually used by `policy`.
///
/// The legacy policy ignores `requested` and derives its own count from the
/// view angle.
pub fn effective_layers(policy: &StepPolicy, view_ts: Vec3, requested: f32) -> f32 {
    let layers = match *policy {
        StepPolicy::Legacy {
            min_layers,
            max_layers,
        } => mix(min_layers, max_layers, 1.0 - view_ts.z.abs().min(1.0)),
        StepPolicy::Standard | StepPolicy::TerrainAdaptive { .. } => requested,
    };
    if layers.is_nan() {
        1.0
    } else {
        layers.clamp(1.0, MAX_LAYERS)
    }
}

/// Terrain-adaptive multiplier `1 + gain * slope`, where `slope` is the height
/// drop from the current sample to the tentative next one.
#[inline]
fn slope_factor(current_height: f32, next_height: f32, gain: f32) -> f32 {
    let slope = current_height - next_height;
    (1.0 + gain * slope).clamp(MIN_STEP_FACTOR, MAX_STEP_FACTOR)
}

/// March the view ray through the height field.
///
/// `view_ts` points from the surface towards the eye in tangent space.
/// `layer_count` comes from the quality controller.
pub fn march<H: HeightField + ?Sized>(
    uv: Vec2,
    view_ts: Vec3,
    sampler: &HeightSampler<'_, H>,
    derivatives: &UvDerivatives,
    layer_count: f32,
    params: &PomParams,
) -> PomResult {
    if params.is_flat() {
        return PomResult::at(uv);
    }
    let view = view_ts.try_normalize().unwrap_or(Vec3::Z);
    let policy = params.step_policy;

    let layers = effective_layers(&policy, view, layer_count);
    let budget = layers.ceil() as u32;
    let layer_step = 1.0 / layers;
    let uv_step = view.xy() / view.z.max(VIEW_Z_EPSILON) * (params.displacement_scale * layer_step);

    let surface = sampler.sample_with(uv, derivatives);
    let mut state = RayMarchState::enter(MarchPoint {
        uv,
        layer: mix(surface, 1.0, params.parallax_offset),
        height: surface,
    });

    // The entry point is never tested: with zero offset it lies on the surface.
    for _ in 0..budget {
        let factor = match policy {
            StepPolicy::TerrainAdaptive { slope_gain } => {
                let tentative = sampler.sample_with(state.current.uv - uv_step, derivatives);
                slope_factor(state.current.height, tentative, slope_gain)
            }
            StepPolicy::Standard | StepPolicy::Legacy { .. } => 1.0,
        };
        state.advance(uv_step * factor, layer_step * factor, sampler, derivatives);
        if state.current.crossed() {
            break;
        }
    }

    for _ in 0..policy.refinement_steps() {
        state.bisect(sampler, derivatives);
    }

    PomResult::at(state.interpolate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_field::{ConstantHeight, FnHeightField};

    fn params(offset: f32, scale: f32, policy: StepPolicy) -> PomParams {
        PomParams {
            displacement_scale: scale,
            parallax_offset: offset,
            step_policy: policy,
            ..Default::default()
        }
    }

    fn no_derivatives() -> UvDerivatives {
        UvDerivatives::default()
    }

    #[test]
    fn flat_field_is_identity_for_any_view() {
        let field = ConstantHeight(0.5);
        let sampler = HeightSampler::untiled(&field);
        let uv = Vec2::new(0.3, 0.6);
        let views = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.7, 0.1, 0.3),
            Vec3::new(-0.9, 0.4, 0.05),
            Vec3::new(0.2, -0.8, 0.6),
        ];
        for policy in [StepPolicy::Standard, StepPolicy::TERRAIN, StepPolicy::LEGACY] {
            for view in views {
                let result = march(uv, view, &sampler, &no_derivatives(), 16.0, &params(0.0, 0.1, policy));
                assert_eq!(result.uv, uv, "policy {:?} view {:?}", policy, view);
                assert!(result.visible);
            }
        }
    }

    #[test]
    fn zero_scale_skips_marching() {
        let field = FnHeightField(|uv: Vec2| uv.x);
        let sampler = HeightSampler::untiled(&field);
        let uv = Vec2::new(0.4, 0.4);
        let result = march(uv, Vec3::new(0.8, 0.0, 0.2), &sampler, &no_derivatives(), 32.0, &params(1.0, 0.0, StepPolicy::Standard));
        assert_eq!(result, PomResult::at(uv));
    }

    #[test]
    fn converges_to_analytic_plane_intersection() {
        // h(u) = a + m u, ray enters at the top of the relief volume.
        let (a, m) = (0.2, 0.4);
        let field = FnHeightField(move |uv: Vec2| a + m * uv.x);
        let sampler = HeightSampler::untiled(&field);
        let scale = 0.1;
        let view = Vec3::new(0.6, 0.0, 0.8);
        let uv = Vec2::new(0.5, 0.5);

        // uv(t) = uv - k t, layer(t) = 1 - t.
        let k = view.x / view.z * scale;
        let t = (1.0 - a - m * uv.x) / (1.0 - m * k);
        let expected = uv.x - k * t;

        for layers in [4.0_f32, 8.0, 16.0, 32.0] {
            for policy in [StepPolicy::Standard, StepPolicy::TERRAIN] {
                let result = march(uv, view, &sampler, &no_derivatives(), layers, &params(1.0, scale, policy));
                let error = (result.uv.x - expected).abs();
                assert!(error <= 0.05 / (layers * layers), "layers {} policy {:?} error {}", layers, policy, error);
                assert!((result.uv.y - uv.y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn coarse_bracket_narrows_monotonically() {
        let field = FnHeightField(|uv: Vec2| 0.3 + 0.2 * uv.y);
        let sampler = HeightSampler::untiled(&field);
        let d = no_derivatives();
        let mut state = RayMarchState::enter(MarchPoint {
            uv: Vec2::splat(0.5),
            layer: 1.0,
            height: sampler.sample_with(Vec2::splat(0.5), &d),
        });
        let mut last_layer = state.current.layer;
        for _ in 0..8 {
            state.advance(Vec2::new(0.0, 0.01), 0.125, &sampler, &d);
            assert!(state.current.layer < last_layer);
            assert_eq!(state.previous.layer, last_layer);
            last_layer = state.current.layer;
        }
    }

    #[test]
    fn intersection_past_the_tile_edge_is_not_visible() {
        // Constant 0.5, entry at the top: crossing half a unit down, at u = 1.2.
        let field = ConstantHeight(0.5);
        let sampler = HeightSampler::untiled(&field);
        let view = Vec3::new(-1.25, 0.0, 1.0).normalize();
        let uv = Vec2::new(0.95, 0.5);
        let result = march(uv, view, &sampler, &no_derivatives(), 32.0, &params(1.0, 0.4, StepPolicy::Standard));
        assert!((result.uv.x - 1.2).abs() < 1e-3, "got {}", result.uv.x);
        assert!(!result.visible);
    }

    #[test]
    fn equal_depth_brackets_prefer_current() {
        let state = RayMarchState {
            previous: MarchPoint {
                uv: Vec2::new(0.1, 0.1),
                layer: 0.5,
                height: 0.75,
            },
            current: MarchPoint {
                uv: Vec2::new(0.2, 0.2),
                layer: 0.25,
                height: 0.5,
            },
        };
        assert_eq!(state.interpolate(), Vec2::new(0.2, 0.2));
    }

    #[test]
    fn grazing_view_stays_finite() {
        let field = FnHeightField(|uv: Vec2| (uv.x * 40.0).sin() * 0.5 + 0.5);
        let sampler = HeightSampler::untiled(&field);
        let result = march(Vec2::splat(0.5), Vec3::new(1.0, 0.0, 0.0), &sampler, &no_derivatives(), 64.0, &params(1.0, 0.05, StepPolicy::Standard));
        assert!(result.uv.is_finite());
        let below = march(Vec2::splat(0.5), Vec3::new(0.3, 0.2, -0.5), &sampler, &no_derivatives(), 64.0, &params(1.0, 0.05, StepPolicy::TERRAIN));
        assert!(below.uv.is_finite());
    }

    #[test]
    fn legacy_layers_follow_view_angle() {
        let policy = StepPolicy::LEGACY;
        assert_eq!(effective_layers(&policy, Vec3::Z, 100.0), 8.0);
        assert_eq!(effective_layers(&policy, Vec3::X, 100.0), 32.0);
        assert_eq!(effective_layers(&StepPolicy::Standard, Vec3::X, 500.0), MAX_LAYERS);
        assert_eq!(effective_layers(&StepPolicy::Standard, Vec3::X, 0.0), 1.0);
    }

    #[test]
    fn slope_factor_is_clamped() {
        assert_eq!(slope_factor(0.5, 0.5, 2.0), 1.0);
        assert!((slope_factor(0.6, 0.5, 2.0) - 1.2).abs() < 1e-6);
        assert_eq!(slope_factor(0.0, 1.0, 2.0), MIN_STEP_FACTOR);
        assert_eq!(slope_factor(1.0, 0.0, 2.0), MAX_STEP_FACTOR);
    }

    #[test]
    fn occluding_ridge_is_found() {
        // A tall ridge behind a low valley: the ray from the valley floor
        // entering at the top must stop on the ridge face.
        let field = FnHeightField(|uv: Vec2| if uv.x < 0.45 { 1.0 } else { 0.0 });
        let sampler = HeightSampler::untiled(&field);
        let view = Vec3::new(1.0, 0.0, 1.0).normalize();
        let result = march(Vec2::new(0.5, 0.5), view, &sampler, &no_derivatives(), 32.0, &params(1.0, 0.2, StepPolicy::Standard));
        assert!(result.uv.x < 0.5);
        assert!(result.uv.x > 0.44, "got {}", result.uv.x);
    }
}
