//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without any surface
//! - blocking on submitted work for readback
//!
//! A [`Gpu`] is neither `Send` nor `Sync`: it is created on a worker thread and
//! dies there, together with every resource allocated from it.

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
