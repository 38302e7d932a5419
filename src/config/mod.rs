//! Settings loading and validation for the router's channel/route topology.

pub mod settings;
pub mod validation;

pub use settings::{load_settings, RouterSettings};
pub use validation::{validate_settings, ValidationResult};
