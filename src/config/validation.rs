//! Structured configuration validation, grounded on the reference gateway's
//! `ConfigValidator`/`ValidationResult` (errors/warnings/recommendations)
//! pattern, generalized from per-route to per-channel/per-route checks of
//! the invariants named in spec.md §3.

use super::settings::RouterSettings;
use log::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

/// Runs every structural and advisory check over `settings`, logging a
/// summary, and returns the accumulated result. Does not mutate `settings` —
/// callers decide whether to refuse startup on `!is_valid`.
pub fn validate_settings(settings: &RouterSettings) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_structure(settings, &mut result);
    validate_primary_routes(settings, &mut result);
    validate_security(settings, &mut result);
    validate_route_names(settings, &mut result);

    log_results(&result);
    result
}

fn validate_structure(settings: &RouterSettings, result: &mut ValidationResult) {
    if settings.channels.is_empty() {
        result.add_error("No channels configured — the router will not handle any requests".to_string());
    }
    if settings.default_timeout_ms == 0 {
        result.add_warning("default_timeout_ms is 0 — every route without its own timeout will never time out".to_string());
    }
    for channel in &settings.channels {
        if channel.routes.is_empty() {
            result.add_warning(format!("Channel '{}' has no routes configured", channel.name));
        }
    }
}

/// Spec.md §3's "at most one primary" invariant, checked ahead of time so a
/// misconfiguration surfaces at startup rather than on the first request.
fn validate_primary_routes(settings: &RouterSettings, result: &mut ValidationResult) {
    for channel in &settings.channels {
        let primaries = channel.routes.iter().filter(|r| r.is_enabled() && r.primary).count();
        if primaries > 1 {
            result.add_error(format!(
                "Channel '{}' has {primaries} enabled primary routes; at most one is allowed",
                channel.name
            ));
        }
        if primaries == 0 && channel.routes.iter().any(|r| r.is_enabled()) {
            result.add_warning(format!(
                "Channel '{}' has enabled routes but no primary — responses will be 204",
                channel.name
            ));
        }
    }
}

fn validate_security(settings: &RouterSettings, result: &mut ValidationResult) {
    for channel in &settings.channels {
        for route in &channel.routes {
            if route.is_http() && !route.secured {
                result.add_warning(format!(
                    "Route '{}' on channel '{}' uses plain HTTP — consider enabling `secured`",
                    route.name, channel.name
                ));
            }
            if let Some(expr) = &route.path_transform {
                if crate::transform::transform_path("/", expr).is_err() {
                    result.add_error(format!(
                        "Route '{}' on channel '{}' has a malformed path_transform expression: {expr}",
                        route.name, channel.name
                    ));
                }
            }
        }
    }
}

/// Route names must be unique within a channel — orchestration and
/// secondary-route records are keyed by name.
fn validate_route_names(settings: &RouterSettings, result: &mut ValidationResult) {
    for channel in &settings.channels {
        let mut seen = std::collections::HashSet::new();
        for route in &channel.routes {
            if !seen.insert(&route.name) {
                result.add_error(format!("Channel '{}' has a duplicate route name: '{}'", channel.name, route.name));
            }
        }
    }
}

fn log_results(result: &ValidationResult) {
    for error in &result.errors {
        warn!("config error: {error}");
    }
    for warning in &result.warnings {
        warn!("config warning: {warning}");
    }
    if result.is_valid {
        info!("router configuration validated with {} warning(s)", result.warnings.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::{RouteStatus, RouteType};
    use crate::models::{Channel, Route};

    fn route(name: &str, primary: bool, status: RouteStatus) -> Route {
        Route {
            name: name.into(),
            status,
            primary,
            route_type: RouteType::Http,
            host: Some("h".into()),
            port: Some(80),
            secured: true,
            path: None,
            path_transform: None,
            topic: None,
            client_id: None,
            timeout: None,
            cert: None,
            username: None,
            password: None,
            forward_auth_header: false,
            wait_primary_response: false,
            status_codes_check: None,
        }
    }

    fn settings(channels: Vec<Channel>) -> RouterSettings {
        RouterSettings {
            version: 1,
            default_timeout_ms: 5000,
            kafka_brokers: vec![],
            channels,
            persistence_config: serde_json::Value::Null,
        }
    }

    fn channel(name: &str, routes: Vec<Route>) -> Channel {
        Channel {
            id: name.into(),
            name: name.into(),
            routes,
            methods: None,
            timeout: None,
            url_pattern: "/x".into(),
        }
    }

    #[test]
    fn empty_channel_list_is_an_error() {
        let result = validate_settings(&settings(vec![]));
        assert!(!result.is_valid);
    }

    #[test]
    fn multiple_enabled_primaries_is_an_error() {
        let c = channel("c1", vec![route("a", true, RouteStatus::Enabled), route("b", true, RouteStatus::Enabled)]);
        let result = validate_settings(&settings(vec![c]));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("at most one")));
    }

    #[test]
    fn disabled_primary_does_not_conflict() {
        let c = channel("c1", vec![route("a", true, RouteStatus::Enabled), route("b", true, RouteStatus::Disabled)]);
        let result = validate_settings(&settings(vec![c]));
        assert!(result.is_valid);
    }

    #[test]
    fn duplicate_route_names_are_an_error() {
        let c = channel("c1", vec![route("a", true, RouteStatus::Enabled), route("a", false, RouteStatus::Enabled)]);
        let result = validate_settings(&settings(vec![c]));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("duplicate route name")));
    }

    #[test]
    fn malformed_path_transform_is_an_error() {
        let mut r = route("a", true, RouteStatus::Enabled);
        r.path_transform = Some("s/onlyone".into());
        let c = channel("c1", vec![r]);
        let result = validate_settings(&settings(vec![c]));
        assert!(!result.is_valid);
    }
}
