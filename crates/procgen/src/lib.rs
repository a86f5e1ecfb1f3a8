//! Procedural generation of relief materials.

pub mod materials;
pub mod normal;

pub use materials::*;
pub use normal::*;
