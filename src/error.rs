//! Router error taxonomy.
//!
//! Mirrors the reference gateway's `GatewayError` shape (one `thiserror` enum,
//! one variant family per failure mode) but follows the taxonomy named in the
//! specification: config, keystore, transport/timeout, persistence/event, and
//! mediator errors. Every error carries a `message` and an optional `stack`,
//! matching the `{message, stack?}` wire shape secondary-route records embed.

use serde::{Deserialize, Serialize};

/// `{message, stack?}` — the error shape embedded in orchestration and
/// secondary-route records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Some(stack.into()),
        }
    }
}

impl From<&RouterError> for ErrorDetail {
    fn from(err: &RouterError) -> Self {
        ErrorDetail::with_stack(err.to_string(), format!("{err:?}"))
    }
}

/// The router's error taxonomy.
///
/// - `MultiplePrimaryRoutes` / `MalformedPathExpression` are `ConfigError`s:
///   fatal to the dispatch, surfaced before any I/O.
/// - `Keystore` is returned via `done`; no routes are attempted.
/// - `Transport` and `Timeout` are attempt-scoped: fatal only for the primary
///   route, otherwise attached to a secondary record and dispatch continues.
/// - `Persistence` / `Event` are logged, never surfaced to the client.
/// - `Mediator` wraps an `error` field found inside a mediator-framed
///   primary response.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("multiple primary routes configured for channel")]
    MultiplePrimaryRoutes,

    #[error("malformed path transform expression: {0}")]
    MalformedPathExpression(String),

    #[error("failed to acquire keystore: {0}")]
    Keystore(String),

    #[error("transport error contacting {route}: {message}")]
    Transport { route: String, message: String },

    #[error("Request took longer than {0}ms")]
    Timeout(u64),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("event error: {0}")]
    Event(String),

    #[error("mediator reported error: {0}")]
    Mediator(String),
}

impl RouterError {
    /// Whether this error, if surfaced on the primary route, should set
    /// `ctx.auto_retry`. Only timeouts and transport failures are retryable
    /// signals in their own right; mediator errors set `auto_retry` via the
    /// embedded `error` field, handled separately in the response adapter.
    pub fn is_auto_retryable(&self) -> bool {
        matches!(self, RouterError::Transport { .. } | RouterError::Timeout(_))
    }
}
