//! Request option building (C2), the orchestration recorder (C6), and the
//! concurrent dispatch engine (C7) that ties every per-route component
//! together.

pub mod engine;
pub mod options;
pub mod recorder;

pub use engine::{dispatch, DispatchOutcome};
