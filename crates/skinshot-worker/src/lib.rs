//! skinshot render worker.
//!
//! A worker is one thread that owns a GPU context and one renderer per 3D view
//! mode. Jobs arrive as [`Delivery`] values, are rendered strictly in order,
//! and every job (successful or not) is answered through the [`Transport`].
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `WorkerConfig` |
//! | [`transport`] | `Delivery`, `Transport`, `SkinResolver`, `LocalTransport` |
//! | [`fallback`] | `DefaultSkinResolver` stock skins for skinless jobs |
//! | [`draw`] | per-job pipeline: decode, classify, normalize, render, encode |
//! | [`worker`] | `RenderWorker` thread |
//! | [`pool`] | `WorkerPool` round-robin dispatch |
//! | [`stream`] | length-delimited request/response records over pipes |

pub mod config;
pub mod draw;
pub mod fallback;
pub mod pool;
pub mod stream;
pub mod transport;
pub mod worker;

pub use config::WorkerConfig;
pub use fallback::DefaultSkinResolver;
pub use pool::WorkerPool;
pub use stream::StreamTransport;
pub use transport::{Delivery, LocalTransport, NoSkinResolver, Published, SkinResolver, Transport};
pub use worker::RenderWorker;
