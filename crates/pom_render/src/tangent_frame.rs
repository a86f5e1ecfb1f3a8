//! Tangent frames under vertex displacement.
//!
//! Two interchangeable builders, selected by `PomParams::smooth_tangents`:
//!
//! - **Smooth** runs per vertex. Central differences of the height field
//!   displace the center and four neighbours along the base normal; the
//!   resulting edge vectors become the new tangent and bitangent. The frames
//!   are then interpolated across each triangle.
//! - **Exact** runs per fragment. The screen-to-UV Jacobian is inverted to get
//!   `∂P/∂u` and `∂P/∂v`, which are perturbed by the one-sided height gradient.
//!
//! Both finish with Gram-Schmidt and both return the base frame untouched when
//! the displacement scale is zero.

use glam::{Mat2, Vec2, Vec3};
use pom_core::{TangentFrame, DISPLACEMENT_EPSILON};

use crate::height_field::{HeightField, HeightSampler, UvDerivatives};

/// Smallest `|det(∂uv/∂screen)|` for which the Jacobian is inverted.
pub const JACOBIAN_EPSILON: f32 = 1e-12;

/// Screen-space derivatives available to a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenDerivatives {
    pub uv_dx: Vec2,
    pub uv_dy: Vec2,
    /// World position derivatives of the undisplaced surface.
    pub position_dx: Vec3,
    pub position_dy: Vec3,
}

impl ScreenDerivatives {
    pub fn uv(&self) -> UvDerivatives {
        UvDerivatives {
            ddx: self.uv_dx,
            ddy: self.uv_dy,
        }
    }
}

/// Output of the smooth builder for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothVertex {
    pub position: Vec3,
    pub frame: TangentFrame,
}

/// Displace a vertex along its normal and build its smooth frame.
///
/// `uv_length` is the world length of one UV unit along the tangent (the
/// length of `∂P/∂u`); the mapping is assumed isotropic so the bitangent uses
/// the same length. Vertex stages have no screen derivatives, so every tap is
/// taken at the finest level.
pub fn smooth_vertex<H: HeightField + ?Sized>(
    position: Vec3,
    base: &TangentFrame,
    uv_length: f32,
    uv: Vec2,
    sampler: &HeightSampler<'_, H>,
    displacement_scale: f32,
) -> SmoothVertex {
    if displacement_scale.abs() <= DISPLACEMENT_EPSILON {
        return SmoothVertex {
            position,
            frame: *base,
        };
    }

    let e = sampler.texel_step();
    let tap = |offset: Vec2| sampler.sample(uv + offset, Vec2::ZERO, Vec2::ZERO);
    let center = tap(Vec2::ZERO);
    let right = tap(Vec2::new(e.x, 0.0));
    let left = tap(Vec2::new(-e.x, 0.0));
    let up = tap(Vec2::new(0.0, e.y));
    let down = tap(Vec2::new(0.0, -e.y));

    // Edges between the displaced neighbour pairs.
    let edge_t = base.tangent * (2.0 * e.x * uv_length) + base.normal * (displacement_scale * (right - left));
    let edge_b = base.bitangent * (2.0 * e.y * uv_length) + base.normal * (displacement_scale * (up - down));

    let mut normal = edge_t.cross(edge_b).try_normalize().unwrap_or(base.normal);
    if normal.dot(base.normal) < 0.0 {
        normal = -normal;
    }

    SmoothVertex {
        position: position + base.normal * (center * displacement_scale),
        frame: TangentFrame::orthonormalize(edge_t, normal, base.handedness),
    }
}

/// Per-fragment frame from the inverse screen-to-UV Jacobian.
///
/// Falls back to `base` when the displacement is zero or the Jacobian is
/// singular (silhouettes, zero-area pixels).
pub fn exact_frame<H: HeightField + ?Sized>(
    base: &TangentFrame,
    uv: Vec2,
    derivatives: &ScreenDerivatives,
    sampler: &HeightSampler<'_, H>,
    displacement_scale: f32,
) -> TangentFrame {
    if displacement_scale.abs() <= DISPLACEMENT_EPSILON {
        return *base;
    }

    let jacobian = Mat2::from_cols(derivatives.uv_dx, derivatives.uv_dy);
    let det = jacobian.determinant();
    if !det.is_finite() || det.abs() < JACOBIAN_EPSILON {
        return *base;
    }
    let screen_per_uv = jacobian.inverse();
    let dp_du = derivatives.position_dx * screen_per_uv.x_axis.x + derivatives.position_dy * screen_per_uv.x_axis.y;
    let dp_dv = derivatives.position_dx * screen_per_uv.y_axis.x + derivatives.position_dy * screen_per_uv.y_axis.y;

    // One-sided texel differences, filtered with the fragment's own footprint.
    let e = sampler.texel_step();
    let d = derivatives.uv();
    let center = sampler.sample_with(uv, &d);
    let grad_u = (sampler.sample_with(uv + Vec2::new(e.x, 0.0), &d) - center) / e.x;
    let grad_v = (sampler.sample_with(uv + Vec2::new(0.0, e.y), &d) - center) / e.y;

    let dp_du = dp_du + base.normal * (displacement_scale * grad_u);
    let dp_dv = dp_dv + base.normal * (displacement_scale * grad_v);

    let Some(mut normal) = dp_du.cross(dp_dv).try_normalize() else {
        return *base;
    };
    if normal.dot(base.normal) < 0.0 {
        normal = -normal;
    }
    TangentFrame::orthonormalize(dp_du, normal, base.handedness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_field::{ConstantHeight, FnHeightField};
    use glam::Vec4;

    fn ramp() -> FnHeightField<impl Fn(Vec2) -> f32> {
        FnHeightField(|uv: Vec2| 0.5 + 0.25 * uv.x)
    }

    fn plane_derivatives() -> ScreenDerivatives {
        ScreenDerivatives {
            uv_dx: Vec2::new(0.01, 0.0),
            uv_dy: Vec2::new(0.0, 0.01),
            position_dx: Vec3::new(0.01, 0.0, 0.0),
            position_dy: Vec3::new(0.0, 0.01, 0.0),
        }
    }

    fn expected_ramp_normal(scale: f32) -> Vec3 {
        Vec3::new(-0.25 * scale, 0.0, 1.0).normalize()
    }

    #[test]
    fn zero_displacement_returns_base_frame_exactly() {
        let base = TangentFrame::from_vertex(Vec3::new(0.1, 0.2, 1.0), Vec4::new(1.0, 0.3, 0.0, -1.0));
        let field = ramp();
        let sampler = HeightSampler::untiled(&field);
        let position = Vec3::new(1.0, 2.0, 3.0);

        let smooth = smooth_vertex(position, &base, 1.0, Vec2::splat(0.5), &sampler, 0.0);
        assert_eq!(smooth.frame, base);
        assert_eq!(smooth.position, position);

        let exact = exact_frame(&base, Vec2::splat(0.5), &plane_derivatives(), &sampler, 0.0);
        assert_eq!(exact, base);
    }

    #[test]
    fn smooth_frame_tilts_against_slope() {
        let base = TangentFrame::default();
        let field = ramp();
        let sampler = HeightSampler::untiled(&field);
        let v = smooth_vertex(Vec3::ZERO, &base, 1.0, Vec2::splat(0.5), &sampler, 0.2);
        assert!((v.frame.normal - expected_ramp_normal(0.2)).length() < 1e-3);
        assert!(v.frame.orthonormal_error() < 1e-3);
        // Center height 0.625 displaced along +Z.
        assert!((v.position.z - 0.625 * 0.2).abs() < 1e-5);
    }

    #[test]
    fn exact_frame_matches_smooth_on_a_ramp() {
        let base = TangentFrame::default();
        let field = ramp();
        let sampler = HeightSampler::untiled(&field);
        let frame = exact_frame(&base, Vec2::splat(0.5), &plane_derivatives(), &sampler, 0.2);
        assert!((frame.normal - expected_ramp_normal(0.2)).length() < 1e-3);
        assert!(frame.orthonormal_error() < 1e-3);
        assert!(frame.tangent.z > 0.0, "tangent climbs the ramp");
    }

    #[test]
    fn degenerate_jacobian_falls_back() {
        let base = TangentFrame::default();
        let field = ramp();
        let sampler = HeightSampler::untiled(&field);
        let mut derivatives = plane_derivatives();
        derivatives.uv_dy = derivatives.uv_dx;
        assert_eq!(exact_frame(&base, Vec2::splat(0.5), &derivatives, &sampler, 0.2), base);
        let zero = ScreenDerivatives::default();
        assert_eq!(exact_frame(&base, Vec2::splat(0.5), &zero, &sampler, 0.2), base);
    }

    #[test]
    fn flat_field_keeps_base_orientation() {
        let base = TangentFrame::from_vertex(Vec3::Z, Vec4::new(1.0, 0.0, 0.0, -1.0));
        let field = ConstantHeight(0.3);
        let sampler = HeightSampler::untiled(&field);
        let v = smooth_vertex(Vec3::ZERO, &base, 2.0, Vec2::splat(0.25), &sampler, 0.5);
        assert!((v.frame.normal - Vec3::Z).length() < 1e-5);
        assert!((v.frame.bitangent - base.bitangent).length() < 1e-5);
    }

    #[test]
    fn swapped_uv_axes_still_orthonormal() {
        let base = TangentFrame::default();
        let field = ramp();
        let sampler = HeightSampler::new(&field, 2.0);
        let derivatives = ScreenDerivatives {
            uv_dx: Vec2::new(0.0, 0.02),
            uv_dy: Vec2::new(0.015, 0.003),
            position_dx: Vec3::new(0.0, 0.02, 0.0),
            position_dy: Vec3::new(0.015, 0.003, 0.0),
        };
        let frame = exact_frame(&base, Vec2::splat(0.3), &derivatives, &sampler, 0.1);
        assert!(frame.orthonormal_error() < 1e-3);
        assert!(frame.normal.z > 0.9);
    }
}
