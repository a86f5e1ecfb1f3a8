//! Vertex type for relief surfaces.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use pom_core::TangentFrame;

/// Vertex with position, normal, UV coordinates, and tangent.
///
/// `tangent.xyz` is `∂P/∂u` (its length is the world size of one UV unit) and
/// `tangent.w` is the handedness sign.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PomVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 4],
}

impl PomVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2], tangent: [f32; 4]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            tangent,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::from(self.tex_coords)
    }

    /// World length of one UV unit along the tangent.
    pub fn uv_length(&self) -> f32 {
        Vec4::from(self.tangent).truncate().length()
    }

    /// Undisplaced frame from the normal and tangent attributes.
    pub fn base_frame(&self) -> TangentFrame {
        TangentFrame::from_vertex(Vec3::from(self.normal), Vec4::from(self.tangent))
    }
}
