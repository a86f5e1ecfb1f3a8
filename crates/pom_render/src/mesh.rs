//! Tessellated plane meshes with tangents.

use crate::vertex::PomVertex;
use glam::{Vec2, Vec3};
use pom_core::Transform;

/// CPU-side indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<PomVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Apply a placement transform to positions, normals and tangents.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                let tangent = transform.transform_vector(Vec3::new(v.tangent[0], v.tangent[1], v.tangent[2]));
                PomVertex::new(
                    transform.transform_point(v.position()).to_array(),
                    transform.transform_normal(Vec3::from(v.normal)).to_array(),
                    v.tex_coords,
                    tangent.extend(v.tangent[3]).to_array(),
                )
            })
            .collect();
        Self {
            vertices,
            indices: self.indices.clone(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Square grid in the XZ plane facing +Y, UV `[0, 1]²`.
///
/// `u` grows along +X and `v` along -Z, so the tangent is +X and the
/// bitangent `cross(N, T)` is -Z with positive handedness.
#[derive(Debug, Clone)]
pub struct PlaneMesh {
    pub mesh: MeshData,
    pub subdivisions: u32,
    pub size: f32,
}

impl PlaneMesh {
    pub fn new(size: f32, subdivisions: u32) -> Self {
        let n = subdivisions.max(1);
        let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
        for j in 0..=n {
            for i in 0..=n {
                let u = i as f32 / n as f32;
                let v = j as f32 / n as f32;
                vertices.push(PomVertex::new(
                    [(u - 0.5) * size, 0.0, (0.5 - v) * size],
                    [0.0, 1.0, 0.0],
                    [u, v],
                    [size, 0.0, 0.0, 1.0],
                ));
            }
        }

        let mut indices = Vec::with_capacity((n * n * 6) as usize);
        for j in 0..n {
            for i in 0..n {
                let a = j * (n + 1) + i;
                let b = a + 1;
                let d = a + n + 1;
                let c = d + 1;
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }

        Self {
            mesh: MeshData { vertices, indices },
            subdivisions: n,
            size,
        }
    }

    /// Triangle containing `uv` and the barycentric weights of its corners.
    ///
    /// Returns `None` outside the unit square.
    pub fn triangle_at(&self, uv: Vec2) -> Option<([u32; 3], Vec3)> {
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return None;
        }
        let n = self.subdivisions;
        let cell = (uv * n as f32).floor().min(Vec2::splat((n - 1) as f32));
        let local = uv * n as f32 - cell;
        let (i, j) = (cell.x as u32, cell.y as u32);
        let a = j * (n + 1) + i;
        let b = a + 1;
        let d = a + n + 1;
        let c = d + 1;

        let (fu, fv) = (local.x, local.y);
        if fu >= fv {
            Some(([a, b, c], Vec3::new(1.0 - fu, fu - fv, fv)))
        } else {
            Some(([a, c, d], Vec3::new(1.0 - fv, fu, fv - fu)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn plane_counts() {
        let plane = PlaneMesh::new(2.0, 4);
        assert_eq!(plane.mesh.vertices.len(), 25);
        assert_eq!(plane.mesh.triangle_count(), 32);
    }

    #[test]
    fn plane_bitangent_follows_v() {
        let plane = PlaneMesh::new(2.0, 2);
        let v0 = &plane.mesh.vertices[0];
        let v_up = &plane.mesh.vertices[3];
        let dv = v_up.uv().y - v0.uv().y;
        let dp = (v_up.position() - v0.position()) / dv;
        let frame = v0.base_frame();
        assert!((dp.normalize() - frame.bitangent).length() < 1e-6);
    }

    #[test]
    fn barycentric_reconstructs_uv() {
        let plane = PlaneMesh::new(1.0, 3);
        for uv in [Vec2::new(0.1, 0.05), Vec2::new(0.4, 0.9), Vec2::new(1.0, 1.0), Vec2::ZERO] {
            let (tri, w) = plane.triangle_at(uv).expect("inside");
            let corners = tri.map(|i| plane.mesh.vertices[i as usize].uv());
            let back = corners[0] * w.x + corners[1] * w.y + corners[2] * w.z;
            assert!((back - uv).length() < 1e-5, "{:?} -> {:?}", uv, back);
            assert!(w.min_element() >= -1e-6);
        }
        assert!(plane.triangle_at(Vec2::new(1.1, 0.5)).is_none());
    }

    #[test]
    fn transformed_keeps_frame_orthonormal() {
        let plane = PlaneMesh::new(2.0, 1);
        let t = Transform::from_position_rotation(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_x(0.6));
        let moved = plane.mesh.transformed(&t);
        let frame = moved.vertices[0].base_frame();
        assert!(frame.orthonormal_error() < 1e-5);
        assert!((moved.vertices[0].uv_length() - 2.0).abs() < 1e-5);
    }
}
