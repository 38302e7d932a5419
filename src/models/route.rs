//! Route configuration: one downstream destination under a channel.

use serde::{Deserialize, Serialize};

/// Whether a route is contacted at all. Absent in configuration is treated
/// as `Enabled` (see `Route::is_enabled`); `Disabled` routes are never
/// contacted, never recorded, never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Enabled,
    Disabled,
}

/// The transport a route uses. Absent in configuration defaults to `Http`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Http,
    Bus,
}

/// HTTP transport locator fields, relevant only when `route_type == Http`.
#[derive(Debug, Clone, Default)]
pub struct HttpLocator {
    pub host: String,
    pub port: u16,
    pub secured: bool,
    pub path: Option<String>,
    pub path_transform: Option<String>,
}

/// Basic-auth style credentials attached to a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One downstream destination under a channel.
///
/// Field layout is flat rather than a tagged union over `route_type`,
/// matching how these configs are authored in practice: only the fields
/// relevant to the route's `route_type` are populated, the rest stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Unique within the channel; required for orchestration/secondary records.
    pub name: String,

    #[serde(default)]
    pub status: RouteStatus,

    #[serde(default)]
    pub primary: bool,

    #[serde(default, rename = "type")]
    pub route_type: RouteType,

    // HTTP locator fields.
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub secured: bool,
    pub path: Option<String>,
    pub path_transform: Option<String>,

    // Bus locator fields.
    pub topic: Option<String>,
    pub client_id: Option<String>,

    /// Per-route timeout in milliseconds. Inherited write-through from the
    /// channel's timeout during dispatch preflight if absent.
    pub timeout: Option<u64>,

    /// CA entry id in the keystore, for HTTPS routes needing custom trust.
    pub cert: Option<String>,

    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default)]
    pub forward_auth_header: bool,

    /// Meaningful only for non-primary routes; a primary route ignores it.
    #[serde(default)]
    pub wait_primary_response: bool,

    /// Comma-separated status codes / `N*` wildcards gating wave-B dispatch.
    pub status_codes_check: Option<String>,
}

impl Route {
    pub fn is_enabled(&self) -> bool {
        self.status == RouteStatus::Enabled
    }

    pub fn is_http(&self) -> bool {
        self.route_type == RouteType::Http
    }

    pub fn http_locator(&self) -> HttpLocator {
        HttpLocator {
            host: self.host.clone().unwrap_or_default(),
            port: self.port.unwrap_or(80),
            secured: self.secured,
            path: self.path.clone(),
            path_transform: self.path_transform.clone(),
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Write-through timeout inheritance from the channel, applied during
    /// dispatch preflight (spec: "Inherit channel.timeout onto every route
    /// lacking its own timeout").
    pub fn inherit_timeout(&mut self, channel_timeout: Option<u64>) {
        if self.timeout.is_none() {
            self.timeout = channel_timeout;
        }
    }

    /// Evaluates the wave-B gating predicate against a primary response
    /// status code. Absent `status_codes_check` always passes.
    ///
    /// A token matches if it equals the status exactly, or if it contains
    /// `*` and its first character equals the status's first digit.
    pub fn gate_passes(&self, status: u16) -> bool {
        let Some(check) = &self.status_codes_check else {
            return true;
        };
        let status_str = status.to_string();
        let first_digit = status_str.as_bytes()[0];
        check.split(',').map(str::trim).any(|token| {
            if token.is_empty() {
                return false;
            }
            if token.contains('*') {
                token.as_bytes()[0] == first_digit
            } else {
                token == status_str
            }
        })
    }
}
