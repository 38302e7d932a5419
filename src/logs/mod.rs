//! Structured logging setup over the `log` facade.

pub mod logger;

pub use logger::init_logger;
