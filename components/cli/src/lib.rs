//! Entry point plumbing of the `llmo` command-line client.
//!
//! Startup reads [`helpers::load_config::Settings`], builds an explicit
//! [`instrumentation::tracing::LoggingContext`] from them and hands both to
//! [`bootstrap::bootstrap::Bootstrap`], which runs an
//! [`Execute`](bootstrap::bootstrap::Execute) implementation with logging in
//! effect and maps the outcome to exit code 0 or 1.

/// Startup routine and exit status mapping
pub mod bootstrap;
/// Command tree of the `llmo` binary
pub mod cli;
/// Settings loading
pub mod helpers;
/// Logging context and line format
pub mod instrumentation;
