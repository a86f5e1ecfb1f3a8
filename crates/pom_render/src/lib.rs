//! Software relief renderer: parallax occlusion mapping on the CPU.
//!
//! Every stage is written as a pure per-vertex or per-fragment function so it
//! mirrors a shader one-to-one and can be tested without a GPU.

pub mod camera;
pub mod compositor;
pub mod height_field;
pub mod mesh;
pub mod pipeline;
pub mod quality;
pub mod ray_march;
pub mod shadow;
pub mod tangent_frame;
pub mod texture;
pub mod vertex;

pub use camera::*;
pub use compositor::*;
pub use height_field::*;
pub use mesh::*;
pub use pipeline::*;
pub use quality::QualityParams;
pub use ray_march::*;
pub use shadow::*;
pub use tangent_frame::*;
pub use texture::*;
pub use vertex::*;
