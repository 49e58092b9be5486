//! Structured logging initialization for Warden
//!
//! Every Warden crate logs through `tracing`. This crate installs the global
//! subscriber from a [`LoggingConfig`], honoring `RUST_LOG` when no explicit
//! filter is configured.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use warden_config::{LogFormat, LogLevel, LoggingConfig};
pub use warden_interfaces::AUDIT_TARGET;
