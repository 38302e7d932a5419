//! Request Option Builder (C2): composes the per-route outbound request
//! descriptor from channel, route, keystore, and inbound context.

use crate::collaborators::Keystore;
use crate::error::RouterError;
use crate::models::response::HeaderBag;
use crate::models::{Channel, RequestSnapshot, Route, RouteType};
use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug, Clone)]
pub struct HttpRequestOptions {
    pub hostname: String,
    pub port: u16,
    pub secured: bool,
    pub method: String,
    pub headers: HeaderBag,
    pub path: String,
    pub reject_unauthorized: bool,
    pub key: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub ca: Option<Vec<u8>>,
    pub auth: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BusRequestOptions {
    pub brokers: Vec<String>,
    pub topic: String,
    pub client_id: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub enum RequestOptions {
    Http(HttpRequestOptions),
    Bus(BusRequestOptions),
}

/// Strips headers that must never be forwarded verbatim: `host` always,
/// `authorization` unless the route explicitly opts in via
/// `forward_auth_header`.
fn build_outbound_headers(ctx: &RequestSnapshot, route: &Route) -> HeaderBag {
    let mut headers = ctx.headers.clone();
    headers.remove_ci("host");
    if !route.forward_auth_header {
        headers.remove_ci("authorization");
    }
    headers
}

/// Encodes `Authorization: Basic <base64(username:password)>` when both
/// credentials are present on the route.
fn basic_auth(route: &Route) -> Option<String> {
    route.credentials().map(|creds| {
        let raw = format!("{}:{}", creds.username, creds.password);
        format!("Basic {}", STANDARD.encode(raw))
    })
}

pub fn build_request_options(
    ctx: &RequestSnapshot,
    route: &Route,
    channel: &Channel,
    keystore: &Keystore,
    effective_path: &str,
    default_timeout_ms: u64,
    kafka_brokers: &[String],
) -> Result<RequestOptions, RouterError> {
    let mut path = effective_path.to_string();
    if let Some(qs) = &ctx.querystring {
        if !qs.is_empty() {
            path = format!("{path}?{qs}");
        }
    }
    let timeout_ms = route.timeout.unwrap_or(default_timeout_ms);

    match route.route_type {
        RouteType::Http => {
            let locator = route.http_locator();
            let headers = build_outbound_headers(ctx, route);
            let ca = route
                .cert
                .as_ref()
                .and_then(|id| keystore.ca.get(id))
                .map(|cert| cert.data.clone());

            Ok(RequestOptions::Http(HttpRequestOptions {
                hostname: locator.host,
                port: locator.port,
                secured: locator.secured,
                method: ctx.method.clone(),
                headers,
                path,
                reject_unauthorized: true,
                key: Some(keystore.key.clone()),
                cert: Some(keystore.cert.data.clone()),
                ca,
                auth: basic_auth(route),
                timeout_ms,
            }))
        }
        RouteType::Bus => {
            let topic = route.topic.clone().unwrap_or_default();
            let client_id = route.client_id.clone().unwrap_or_default();
            let _ = channel;
            Ok(RequestOptions::Bus(BusRequestOptions {
                brokers: kafka_brokers.to_vec(),
                topic,
                client_id,
                timeout_ms,
            }))
        }
    }
}
