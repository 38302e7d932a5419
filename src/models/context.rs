//! The per-transaction mutable bundle threaded through dispatch.

use super::orchestration::{OrchestrationRecord, SecondaryRouteRecord};
use super::response::{HeaderBag, Response};
use crate::error::ErrorDetail;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Single-writer request context: created upstream, mutated only by the
/// dispatch engine's own task, read by the persistence collaborator after
/// dispatch completes. Transports return values; they never mutate this
/// structure from within a callback.
#[derive(Debug)]
pub struct RequestContext {
    // Identity
    pub transaction_id: String,
    pub request_timestamp: DateTime<Utc>,
    pub current_attempt: u32,

    // Inbound
    pub method: String,
    pub path: String,
    pub querystring: Option<String>,
    pub headers: HeaderBag,
    pub body: Vec<u8>,
    pub authorised_channel: String,

    // Outbound result
    pub response: Option<Response>,
    pub mediator_response: Option<serde_json::Value>,
    pub error: Option<ErrorDetail>,
    pub auto_retry: bool,
    pub primary_route: Option<String>,

    // Collected
    pub orchestrations: Vec<OrchestrationRecord>,
    pub routes: Vec<SecondaryRouteRecord>,

    // Timing
    pub timer: Instant,
}

impl RequestContext {
    pub fn new(
        transaction_id: impl Into<String>,
        authorised_channel: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            request_timestamp: Utc::now(),
            current_attempt: 1,
            method: method.into(),
            path: path.into(),
            querystring: None,
            headers: HeaderBag::new(),
            body: Vec::new(),
            authorised_channel: authorised_channel.into(),
            response: None,
            mediator_response: None,
            error: None,
            auto_retry: false,
            primary_route: None,
            orchestrations: Vec::new(),
            routes: Vec::new(),
            timer: Instant::now(),
        }
    }

    /// `host/path[?querystring]`-style path used for bus envelopes and
    /// request traces.
    pub fn full_path(&self, path: &str) -> String {
        match &self.querystring {
            Some(qs) if !qs.is_empty() => format!("{path}?{qs}"),
            _ => path.to_string(),
        }
    }

    /// Freezes the inbound fields into an owned [`RequestSnapshot`]. The
    /// dispatch engine takes one snapshot per dispatch and hands it to every
    /// concurrent transport attempt, so those attempts never hold a borrow of
    /// `self` — the primary's outcome can be applied to `self` the moment it
    /// settles without waiting for still-running siblings to drop their
    /// futures first.
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            transaction_id: self.transaction_id.clone(),
            method: self.method.clone(),
            path: self.path.clone(),
            querystring: self.querystring.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// An owned, read-only copy of a [`RequestContext`]'s inbound fields. Inbound
/// fields never change once `build_context` fills them in, so cloning them
/// once per dispatch is cheap and lets transport attempts run without
/// borrowing the mutable context.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub transaction_id: String,
    pub method: String,
    pub path: String,
    pub querystring: Option<String>,
    pub headers: HeaderBag,
    pub body: Vec<u8>,
}

impl RequestSnapshot {
    /// `host/path[?querystring]`-style path used for bus envelopes and
    /// request traces.
    pub fn full_path(&self, path: &str) -> String {
        match &self.querystring {
            Some(qs) if !qs.is_empty() => format!("{path}?{qs}"),
            _ => path.to_string(),
        }
    }
}
