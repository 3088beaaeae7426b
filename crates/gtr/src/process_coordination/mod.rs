//! Everything that touches toolchain processes or process-wide state.
pub mod exec_subprocess;
pub mod log_handler;

pub use exec_subprocess::{exec_subprocess, invoke, Capture};
