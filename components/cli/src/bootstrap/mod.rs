pub mod bootstrap;
pub mod exit_status;
