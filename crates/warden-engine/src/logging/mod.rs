//! Logging utilities.
//!
//! Centralizes logger initialization. Everything else in the crate logs
//! through the `log` facade; categories follow module paths, so
//! `RUST_LOG=warden_engine::gsg=debug` narrows output to the guardian.

mod init;

pub use init::{init_logging, LoggingConfig};
