//! Scene graph nodes and the native resources they own
//!
//! Materials and geometries cross the boundary as handles; an [`Object3D`]
//! loads them asynchronously and owns them until superseded or disposed.

mod geometry;
mod material;
mod node;
mod object3d;
mod registries;

pub use geometry::Geometry;
pub use material::Material;
pub use node::Node;
pub use object3d::{LoadStatus, NodeError, Object3D, Object3DSettings};
pub use registries::NativeRegistries;
