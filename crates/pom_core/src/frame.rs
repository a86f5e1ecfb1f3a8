//! Orthonormal tangent frames (TBN bases).

use glam::{Mat3, Vec3, Vec4};

/// Orthonormal `{T, B, N}` basis with the handedness sign that orients `B`.
///
/// `B = cross(N, T) * handedness`. All three axes are unit length and mutually
/// orthogonal within finite-difference tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
    /// +1 or -1.
    pub handedness: f32,
}

impl Default for TangentFrame {
    fn default() -> Self {
        Self {
            tangent: Vec3::X,
            bitangent: Vec3::Y,
            normal: Vec3::Z,
            handedness: 1.0,
        }
    }
}

impl TangentFrame {
    /// Build the undisplaced frame from per-vertex attributes.
    ///
    /// `tangent.w` carries the handedness, as in glTF / MikkTSpace tangents.
    pub fn from_vertex(normal: Vec3, tangent: Vec4) -> Self {
        Self::orthonormalize(tangent.truncate(), normal, tangent.w)
    }

    /// Gram-Schmidt: remove the tangent's projection onto the normal, then
    /// derive the bitangent from the cleaned pair.
    ///
    /// Degenerate inputs still produce a valid frame: a zero normal becomes +Z
    /// and a tangent parallel to the normal is replaced by an arbitrary
    /// perpendicular axis.
    pub fn orthonormalize(tangent: Vec3, normal: Vec3, handedness: f32) -> Self {
        let normal = normal.try_normalize().unwrap_or(Vec3::Z);
        let tangent = (tangent - normal * normal.dot(tangent))
            .try_normalize()
            .unwrap_or_else(|| normal.any_orthonormal_vector());
        let handedness = if handedness < 0.0 { -1.0 } else { 1.0 };
        Self {
            tangent,
            bitangent: normal.cross(tangent) * handedness,
            normal,
            handedness,
        }
    }

    /// Barycentric blend of three vertex frames, re-orthonormalized.
    ///
    /// This is what the rasterizer's attribute interpolation does to the
    /// smooth-mode frames between the vertex and fragment stages.
    pub fn interpolate(frames: [&TangentFrame; 3], barycentric: Vec3) -> Self {
        let tangent = frames[0].tangent * barycentric.x
            + frames[1].tangent * barycentric.y
            + frames[2].tangent * barycentric.z;
        let normal = frames[0].normal * barycentric.x
            + frames[1].normal * barycentric.y
            + frames[2].normal * barycentric.z;
        Self::orthonormalize(tangent, normal, frames[0].handedness)
    }

    /// Express a world-space vector in this frame.
    #[inline]
    pub fn to_tangent_space(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    /// Bring a tangent-space vector back to world space.
    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }

    /// Column matrix `[T B N]` (tangent space to world space).
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_cols(self.tangent, self.bitangent, self.normal)
    }

    /// Largest deviation from orthonormality: unit lengths and pairwise dot products.
    pub fn orthonormal_error(&self) -> f32 {
        let lengths = [
            (self.tangent.length() - 1.0).abs(),
            (self.bitangent.length() - 1.0).abs(),
            (self.normal.length() - 1.0).abs(),
        ];
        let dots = [
            self.tangent.dot(self.bitangent).abs(),
            self.tangent.dot(self.normal).abs(),
            self.bitangent.dot(self.normal).abs(),
        ];
        lengths.into_iter().chain(dots).fold(0.0, f32::max)
    }
}
