//! Vertex and fragment stages of the relief material.
//!
//! Data flow per fragment: tangent frame → quality controller → relief march
//! → self-shadow march → compositor (or a debug view). Each invocation is a
//! pure function of its inputs and the per-draw `PomParams`.

use glam::{Vec2, Vec3, Vec4};
use pom_core::{DebugView, PomParams, ShadowConfig, TangentFrame};

use crate::compositor::{compose, debug_color, decode_normal, DebugInputs, Lighting, SurfaceSample};
use crate::height_field::{HeightField, HeightSampler, UvDerivatives};
use crate::quality;
use crate::ray_march::{march, PomResult};
use crate::shadow::soft_shadow;
use crate::tangent_frame::{exact_frame, smooth_vertex, ScreenDerivatives};
use crate::texture::ColorMap;
use crate::vertex::PomVertex;

/// Textures bound for one draw call.
pub struct Material<'a, H: HeightField + ?Sized> {
    pub height: &'a H,
    pub diffuse: &'a ColorMap,
    /// Tangent-space normal map, RGB encoded in `[0, 1]`.
    pub normal: &'a ColorMap,
}

/// Vertex stage output, interpolated across triangles before the fragment stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacedVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub base_frame: TangentFrame,
    /// Smooth-mode frame; equals `base_frame` in exact mode.
    pub frame: TangentFrame,
}

/// Displace a vertex along its normal and, in smooth mode, build its frame.
///
/// The offset is `h * displacement_scale` in world units, whatever the
/// vertex's tangent length.
pub fn vertex_stage<H: HeightField + ?Sized>(vertex: &PomVertex, height: &H, params: &PomParams) -> DisplacedVertex {
    let sampler = HeightSampler::new(height, params.texture_repeat);
    let base = vertex.base_frame();
    let uv = vertex.uv();

    if params.smooth_tangents {
        let smooth = smooth_vertex(
            vertex.position(),
            &base,
            vertex.uv_length(),
            uv,
            &sampler,
            params.displacement_scale,
        );
        return DisplacedVertex {
            position: smooth.position,
            uv,
            base_frame: base,
            frame: smooth.frame,
        };
    }

    let position = if params.is_flat() {
        vertex.position()
    } else {
        let h = sampler.sample(uv, Vec2::ZERO, Vec2::ZERO);
        vertex.position() + base.normal * (h * params.displacement_scale)
    };
    DisplacedVertex {
        position,
        uv,
        base_frame: base,
        frame: base,
    }
}

/// Interpolated inputs of one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentInput {
    pub world_position: Vec3,
    pub uv: Vec2,
    pub derivatives: ScreenDerivatives,
    pub base_frame: TangentFrame,
    pub smooth_frame: TangentFrame,
    pub camera_position: Vec3,
}

impl FragmentInput {
    /// Barycentric blend of three vertex-stage outputs.
    pub fn interpolate(
        corners: [&DisplacedVertex; 3],
        barycentric: Vec3,
        derivatives: ScreenDerivatives,
        camera_position: Vec3,
    ) -> Self {
        let blend3 = |f: fn(&DisplacedVertex) -> Vec3| {
            f(corners[0]) * barycentric.x + f(corners[1]) * barycentric.y + f(corners[2]) * barycentric.z
        };
        let uv = corners[0].uv * barycentric.x + corners[1].uv * barycentric.y + corners[2].uv * barycentric.z;
        Self {
            world_position: blend3(|v| v.position),
            uv,
            derivatives,
            base_frame: TangentFrame::interpolate(corners.map(|v| &v.base_frame), barycentric),
            smooth_frame: TangentFrame::interpolate(corners.map(|v| &v.frame), barycentric),
            camera_position,
        }
    }
}

/// Result of the fragment stage. `Discard` contributes no color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FragmentOutput {
    Discard,
    Color(Vec4),
}

impl FragmentOutput {
    pub fn color(&self) -> Option<Vec4> {
        match self {
            FragmentOutput::Discard => None,
            FragmentOutput::Color(c) => Some(*c),
        }
    }
}

/// Everything the fragment stage computed, before compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentTrace {
    pub frame: TangentFrame,
    pub view_ts: Vec3,
    pub quality: quality::QualityParams,
    pub result: PomResult,
    /// Height at the marched UV.
    pub height: f32,
    pub shadow: f32,
}

/// Run the relief stages for one fragment without producing a color.
pub fn trace_fragment<H: HeightField + ?Sized>(
    input: &FragmentInput,
    height: &H,
    params: &PomParams,
    lighting: &Lighting,
) -> FragmentTrace {
    let sampler = HeightSampler::new(height, params.texture_repeat);
    let derivatives: UvDerivatives = input.derivatives.uv();

    let frame = if params.smooth_tangents {
        input.smooth_frame
    } else {
        exact_frame(
            &input.base_frame,
            input.uv,
            &input.derivatives,
            &sampler,
            params.displacement_scale,
        )
    };

    let to_camera = input.camera_position - input.world_position;
    let view = to_camera.try_normalize().unwrap_or(frame.normal);
    let view_ts = frame.to_tangent_space(view);
    let quality = quality::evaluate(frame.normal.dot(view), to_camera.length(), &params.quality);

    let result = if quality.active {
        march(input.uv, view_ts, &sampler, &derivatives, quality.layer_count, params)
    } else {
        PomResult::passthrough(input.uv)
    };

    let height = sampler.sample_with(result.uv, &derivatives);
    // Inactive fragments render flat, so they get no relief shadowing either.
    let shadow = if params.shadow.enabled && result.visible && quality.active {
        let light_ts = frame.to_tangent_space(lighting.direction);
        let config = ShadowConfig {
            samples: quality.shadow_samples(params.shadow.samples, &params.quality),
            ..params.shadow
        };
        soft_shadow(
            result.uv.extend(height),
            light_ts,
            &sampler,
            &derivatives,
            params.displacement_scale,
            &config,
        )
    } else {
        1.0
    };

    FragmentTrace {
        frame,
        view_ts,
        quality,
        result,
        height,
        shadow,
    }
}

/// The full fragment stage.
pub fn shade_fragment<H: HeightField + ?Sized>(
    input: &FragmentInput,
    material: &Material<'_, H>,
    params: &PomParams,
    lighting: &Lighting,
) -> FragmentOutput {
    let trace = trace_fragment(input, material.height, params, lighting);
    if !trace.result.visible {
        return FragmentOutput::Discard;
    }

    if params.debug_view != DebugView::Off {
        let inputs = DebugInputs {
            frame: trace.frame,
            view_ts: trace.view_ts,
            uv_offset: (trace.result.uv - input.uv).length(),
            height: trace.height,
            activity: trace.quality.activity,
        };
        if let Some(color) = debug_color(params.debug_view, &inputs, params.displacement_scale) {
            return FragmentOutput::Color(color);
        }
    }

    let r = params.texture_repeat;
    let uv = trace.result.uv * r;
    let (ddx, ddy) = (input.derivatives.uv_dx * r, input.derivatives.uv_dy * r);
    let surface = SurfaceSample {
        diffuse: material.diffuse.sample_grad(uv, ddx, ddy),
        normal_ts: decode_normal(material.normal.sample_grad(uv, ddx, ddy)),
        shadow: trace.shadow,
    };
    FragmentOutput::Color(compose(&trace.frame, &surface, lighting))
}
