//! Data model for the transaction routing engine.
//!
//! Mirrors the reference gateway's `models` module organization: one file per
//! domain concept, each owning its own validation logic.
//!
//! - [`channel`] — the routing policy bound to an inbound request
//! - [`route`] — one downstream destination under a channel
//! - [`context`] — the per-transaction mutable bundle threaded through dispatch
//! - [`response`] — the downstream/outbound response shape
//! - [`orchestration`] — primary orchestration records and secondary-route records

pub mod channel;
pub mod context;
pub mod orchestration;
pub mod response;
pub mod route;

pub use channel::Channel;
pub use context::{RequestContext, RequestSnapshot};
pub use orchestration::{OrchestrationRecord, RequestTrace, SecondaryRouteRecord};
pub use response::Response;
pub use route::{Credentials, HttpLocator, Route, RouteStatus, RouteType};
