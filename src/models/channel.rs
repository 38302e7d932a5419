//! Channel: the routing policy bound to an inbound request.

use super::route::Route;
use crate::error::RouterError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub routes: Vec<Route>,

    /// Optional method allow-list; absent or empty means permissive (all
    /// methods allowed).
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// Channel-wide timeout in milliseconds, inherited by routes lacking
    /// their own.
    pub timeout: Option<u64>,

    /// Opaque string consumed only by the bus transport adapter.
    pub url_pattern: String,
}

impl Channel {
    pub fn enabled_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.is_enabled())
    }

    /// Rejects dispatch before any I/O if more than one enabled route is
    /// flagged primary.
    pub fn validate_primary_count(&self) -> Result<(), RouterError> {
        let primaries = self.enabled_routes().filter(|r| r.primary).count();
        if primaries > 1 {
            return Err(RouterError::MultiplePrimaryRoutes);
        }
        Ok(())
    }

    pub fn primary_route(&self) -> Option<&Route> {
        self.enabled_routes().find(|r| r.primary)
    }

    /// True iff `method` is empty, the allow-list is empty/absent, or
    /// `method` (case-insensitively) is a member of the allow-list — a
    /// permissive default in every ambiguous case.
    pub fn is_method_allowed(&self, method: &str) -> bool {
        if method.trim().is_empty() {
            return true;
        }
        match &self.methods {
            None => true,
            Some(methods) if methods.is_empty() => true,
            Some(methods) => methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::{RouteStatus, RouteType};

    fn make_route(name: &str, primary: bool, status: RouteStatus) -> Route {
        Route {
            name: name.into(),
            status,
            primary,
            route_type: RouteType::Http,
            host: Some("h".into()),
            port: Some(80),
            secured: false,
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

    fn channel(routes: Vec<Route>, methods: Option<Vec<String>>) -> Channel {
        Channel {
            id: "c1".into(),
            name: "chan".into(),
            routes,
            methods,
            timeout: None,
            url_pattern: "/x".into(),
        }
    }

    #[test]
    fn two_enabled_primaries_rejected() {
        let c = channel(
            vec![
                make_route("a", true, RouteStatus::Enabled),
                make_route("b", true, RouteStatus::Enabled),
            ],
            None,
        );
        assert!(matches!(
            c.validate_primary_count(),
            Err(RouterError::MultiplePrimaryRoutes)
        ));
    }

    #[test]
    fn disabled_primary_does_not_count() {
        let c = channel(
            vec![
                make_route("a", true, RouteStatus::Enabled),
                make_route("b", true, RouteStatus::Disabled),
            ],
            None,
        );
        assert!(c.validate_primary_count().is_ok());
    }

    #[test]
    fn method_allow_list_is_case_insensitive() {
        let c = channel(vec![], Some(vec!["GET".into(), "POST".into()]));
        assert!(c.is_method_allowed("get"));
        assert!(!c.is_method_allowed("DELETE"));
    }

    #[test]
    fn permissive_defaults() {
        let c = channel(vec![], None);
        assert!(c.is_method_allowed("DELETE"));
        let c2 = channel(vec![], Some(vec![]));
        assert!(c2.is_method_allowed("DELETE"));
        let c3 = channel(vec![], Some(vec!["GET".into()]));
        assert!(c3.is_method_allowed(""));
    }
}
