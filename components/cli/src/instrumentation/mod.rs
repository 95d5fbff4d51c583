pub mod format;
pub mod tracing;
