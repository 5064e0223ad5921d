//! Shared pieces for the AppRole crates

pub mod logging;

pub use logging::init_logging;
