//! skinshot engine crate.
//!
//! Owns the headless GPU runtime, the avatar scene graph and the skin texture
//! pipeline used by render workers.

pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod scene;
pub mod skin;

pub use error::RenderError;
