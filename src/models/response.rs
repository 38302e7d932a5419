//! Response model shared by transport adapters and the response adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A header's value: either a single string or multiple values under the
/// same name (e.g. repeated `Set-Cookie`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    pub fn as_values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(s) => vec![s.as_str()],
            HeaderValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Case-insensitive lookup, case-preserving pass-through header bag.
///
/// Known/reserved header names are looked up case-insensitively by the
/// response adapter; unrecognized headers keep whatever casing the
/// downstream service sent, matching the spec's "case-preserving pass-through
/// for the rest" requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderBag(pub Vec<(String, HeaderValue)>);

impl HeaderBag {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), HeaderValue::Single(value.into())));
    }

    pub fn get_ci(&self, name: &str) -> Option<&HeaderValue> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn remove_ci(&mut self, name: &str) {
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, HeaderValue)> {
        self.0.iter()
    }
}

/// `{status, headers, body, timestamp}` — the shape every transport adapter
/// produces and the response adapter consumes.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderBag,
    pub body: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl Response {
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
