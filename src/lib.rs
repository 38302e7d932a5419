//! Transaction routing engine for a health-information exchange interoperability layer.
//!
//! This crate implements the middleware stage that sits inside an authenticated,
//! channel-bound request pipeline: it fans a request out to one or more downstream
//! routes, designates exactly one as primary, collects secondary outcomes for
//! auditing, and produces orchestration records describing what happened.
//!
//! # Module organization
//!
//! - [`models`] — the channel/route/context/response data model
//! - [`transform`] — the sed-like path transformation expression language
//! - [`dispatch`] — request option building and the concurrent dispatch engine
//! - [`transport`] — HTTP and message-bus transport adapters
//! - [`response_adapter`] — downstream-response-to-context adaptation
//! - [`collaborators`] — trait boundaries for external systems (keystore,
//!   producer pool, persistence, events)
//! - [`middleware`] — the outer shim adapting the engine to an `actix-web` pipeline
//! - [`config`] — settings loading and validation
//! - [`logs`] — structured logging setup
//! - [`error`] — the router's error taxonomy

pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod response_adapter;
pub mod transform;
pub mod transport;

pub use error::{ErrorDetail, RouterError};
