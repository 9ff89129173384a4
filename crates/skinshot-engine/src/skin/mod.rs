//! Skin texture handling.
//!
//! - [`normalize`]: PNG decode and canonicalization into the 64×64 layout
//! - [`model`]: standard vs slim body model classification from the profile

pub mod model;
pub mod normalize;

pub use model::{classify, default_model, BodyModel};
pub use normalize::{decode_skin, normalize, strip_solid_helm, upgrade_legacy, SKIN_SIZE};
