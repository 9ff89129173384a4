//! Logging utilities.
//!
//! One `env_logger` setup for every skinshot binary. Everything else in the
//! workspace only talks to the `log` facade.

mod init;

pub use init::{init_logging, LoggingConfig};
