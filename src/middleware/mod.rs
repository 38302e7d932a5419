//! Outer Middleware Shim (C8): adapts the dispatch engine to an `actix-web`
//! request pipeline.
//!
//! Authentication and channel resolution happen upstream of this crate; by
//! the time a request reaches [`RouterMiddleware`] a [`ChannelBinding`] is
//! already present in the request's extensions (mirroring how the reference
//! gateway's `JwtAuth` middleware inserts `Claims` for downstream stages to
//! read).

pub mod shim;

pub use shim::{ChannelBinding, RouterMiddleware, RouterServices};
