//! Wire format for **skinshot** render jobs.
//!
//! A dispatcher compresses one [`RenderJob`] per queue message; a worker
//! answers with one [`ResponseFrame`]. This crate owns both directions of both
//! frames so the dispatcher and the worker can never drift apart.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`error`] | `ProtoError` |
//! | [`mode`] | `RenderMode` and its wire ordinals |
//! | [`profile`] | `Profile`, `Property` |
//! | [`job`] | `RenderJob` request frame |
//! | [`response`] | `ResponseFrame`, `Outcome`, `ErrorDescription` |
//!
//! # Quick start
//!
//! ```rust
//! use skinshot_proto::{RenderJob, RenderMode};
//!
//! let job = RenderJob::new(RenderMode::Face, 64, 64, 1, Vec::new());
//! let frame = job.encode().unwrap();
//! assert_eq!(RenderJob::decode(&frame).unwrap(), job);
//! ```

pub mod error;
pub mod job;
pub mod mode;
pub mod profile;
pub mod response;

mod wire;

pub use error::ProtoError;
pub use job::{RenderJob, MAX_FRAME_LEN};
pub use mode::RenderMode;
pub use profile::{Profile, Property};
pub use response::{ErrorDescription, ErrorKind, Outcome, ResponseFrame};
