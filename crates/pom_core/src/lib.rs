//! Core types shared by the parallax occlusion mapping crates.
//!
//! This crate provides the foundational types every other member builds on:
//! - Tangent frames (the per-fragment TBN basis)
//! - The per-draw-call parameter block and its GPU mirror
//! - Placement transforms
//! - GLSL-style scalar helpers

pub mod frame;
pub mod math;
pub mod params;
pub mod transform;

pub use frame::*;
pub use math::*;
pub use params::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat3, Quat, Vec2, Vec3, Vec4};
