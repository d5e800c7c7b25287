//! lbmirror-server - process wiring for the lbmirror binary
//!
//! - [`config`] - Layered configuration (defaults, file, environment, CLI)
//! - [`startup`] - Logging and signal handling
//! - [`watch`] - Kubernetes service watch source
//! - [`runner`] - The consumption loop feeding the reconciler

pub mod config;
pub mod runner;
pub mod startup;
pub mod watch;
