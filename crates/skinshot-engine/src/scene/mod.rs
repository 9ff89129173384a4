//! Avatar scene graph.
//!
//! Responsibilities:
//! - describe the avatar as a tree of transform groups and textured leaves
//! - map every leaf to its region of the skin texture
//! - bake the tree into one world-space triangle mesh per body model
//!
//! The graph is built once per renderer and never mutated afterwards. Model
//! space is y-down (head above feet means smaller y); the camera flips it.

mod avatar;
mod mesh;
mod node;
mod texture;

pub use avatar::avatar_scene;
pub use mesh::{DrawBatch, SceneMesh, TextureBinding, Vertex};
pub use node::{AlphaMode, Cube, Node, Plane, Stage, Transform};
pub use texture::{shadow_texture, BoxUv, TextureType, SHADOW_TEXTURE_SIZE};
