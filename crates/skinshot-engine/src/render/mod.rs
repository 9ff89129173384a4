//! Off-screen rendering.
//!
//! - [`Renderer`] draws the avatar scene of one 3D mode into supersampled
//!   targets and reads the result back at the requested size
//! - [`flat`] covers the modes that crop the skin directly
//!
//! Convention:
//! - targets are RGBA8 with straight alpha, cleared to transparent
//! - skins are sampled nearest-neighbour

pub mod flat;
mod pipeline;
mod readback;
mod renderer;

pub use flat::{render_face, render_skin};
pub use readback::{downsample, padded_bytes_per_row, unpad_rows};
pub use renderer::{Frame, Renderer, RendererLimits};
