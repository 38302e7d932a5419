//! Orchestration and secondary-route records, appended to the request context
//! for later persistence and audit.

use super::response::Response;
use crate::error::ErrorDetail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A captured snapshot of the outbound request sent to a route, used for
/// orchestration traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrace {
    pub host: String,
    pub port: u16,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// A trace entry for one primary-route attempt. Appended to
/// `ctx.orchestrations` only when `route.primary` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRecord {
    pub name: String,
    pub request: RequestTrace,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response: Option<ResponseSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorDetail>,
}

/// A serializable snapshot of a `Response`, used inside orchestration and
/// secondary-route records (the live `Response` isn't itself `Serialize`
/// because its header bag favors lookup ergonomics over wire shape). Also
/// deserialized when lifting an embedded mediator response out of a
/// secondary route's body (see `dispatch::recorder::lift_mediator_fields`),
/// which is why every field short of `status` defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl From<&Response> for ResponseSnapshot {
    fn from(resp: &Response) -> Self {
        let headers = resp
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.as_values().join(", ")))
            .collect();
        ResponseSnapshot {
            status: resp.status,
            headers,
            body: resp.body_as_string(),
            timestamp: resp.timestamp,
        }
    }
}

/// A per-attempt record for a non-primary route, persisted for audit
/// regardless of whether the attempt succeeded.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SecondaryRouteRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediator_urn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrations: Option<Vec<OrchestrationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}
