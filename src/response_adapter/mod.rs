//! Response Adapter (C5): translates a downstream response into the outer
//! context's response — status, headers, cookies, redirects, content type.
//!
//! Applied only to the primary route's response (ground: the reference
//! gateway has no analogous "rewrite the response" stage, so this module's
//! header-dispatch shape is built fresh from the specification's reserved
//! header list, following the data-oriented style of `models::route`'s own
//! `gate_passes`).

use crate::error::ErrorDetail;
use crate::models::context::RequestContext;
use crate::models::response::{HeaderBag, HeaderValue, Response};
use chrono::{DateTime, Utc};

/// One `Set-Cookie` entry, decomposed into name/value plus the reserved
/// option set named in the specification. Unknown attributes inside a
/// `Set-Cookie` string are not preserved — the option set is closed, not an
/// open map, per the "small enumerated record" guidance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdaptedCookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<i64>,
    pub expires: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub signed: bool,
    pub overwrite: bool,
    pub http_only: Option<String>,
}

/// Everything the outer pipeline needs to finish building the client-visible
/// response: the status/body/timestamp that land on `ctx.response` plus the
/// wire-level pieces (cookies, redirect, content type) an HTTP framework
/// applies through its own response-builder API rather than as plain headers.
#[derive(Debug, Clone)]
pub struct AdaptedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub content_type: Option<String>,
    pub cookies: Vec<AdaptedCookie>,
    pub redirect: Option<(u16, String)>,
    pub headers: HeaderBag,
}

/// Copies an inbound `X-OpenHIM-TransactionID` header onto the response
/// before any other header processing, so it round-trips even when the
/// downstream service never echoed it back itself.
fn preserve_transaction_id(ctx: &RequestContext, response: &mut Response) {
    if let Some(value) = ctx.headers.get_ci("x-openhim-transactionid").cloned() {
        response.headers.remove_ci("x-openhim-transactionid");
        response
            .headers
            .0
            .push(("X-OpenHIM-TransactionID".to_string(), value));
    }
}

/// Parses one `Set-Cookie` string into name/value plus the reserved option
/// set. Returns `None` only when the leading `name=value` pair is missing.
fn parse_set_cookie(raw: &str) -> Option<AdaptedCookie> {
    let mut parts = raw.split(';').map(str::trim).filter(|s| !s.is_empty());
    let (name, value) = parts.next()?.split_once('=')?;

    let mut cookie = AdaptedCookie {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
        ..Default::default()
    };

    for part in parts {
        let (key, val) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (part.trim(), None),
        };
        match key.to_ascii_lowercase().as_str() {
            "max-age" => cookie.max_age = val.and_then(|v| v.parse().ok()),
            "expires" => cookie.expires = val.map(str::to_string),
            "path" => cookie.path = val.map(str::to_string),
            "domain" => cookie.domain = val.map(str::to_string),
            "secure" => cookie.secure = true,
            "signed" => cookie.signed = true,
            "overwrite" => cookie.overwrite = val == Some("true"),
            "httponly" => cookie.http_only = Some(val.unwrap_or_default().to_string()),
            _ => {}
        }
    }
    Some(cookie)
}

/// Dispatches every response header per the reserved set: `set-cookie`
/// entries are parsed off into `cookies`, `location` under a 3xx status
/// becomes `redirect`, `content-type` is lifted out, the three
/// framework-re-derived headers are dropped, everything else is kept
/// case-preserved for verbatim pass-through.
fn adapt_headers(
    headers: &HeaderBag,
    status: u16,
) -> (HeaderBag, Vec<AdaptedCookie>, Option<(u16, String)>, Option<String>) {
    let mut kept = HeaderBag::new();
    let mut cookies = Vec::new();
    let mut redirect = None;
    let mut content_type = None;

    for (name, value) in headers.iter() {
        match name.to_ascii_lowercase().as_str() {
            "set-cookie" => cookies.extend(value.as_values().iter().filter_map(|raw| parse_set_cookie(raw))),
            "location" => {
                let location = value.as_values().join(", ");
                if (300..400).contains(&status) {
                    redirect = Some((status, location));
                } else {
                    kept.0.push((name.clone(), value.clone()));
                }
            }
            "content-type" => content_type = Some(value.as_values().join(", ")),
            "content-length" | "content-encoding" | "transfer-encoding" => {}
            _ => kept.0.push((name.clone(), value.clone())),
        }
    }

    (kept, cookies, redirect, content_type)
}

/// Converts a mediator-framed embedded `headers` object (a JSON object of
/// `string -> string | [string]`) into a [`HeaderBag`] so it can go through
/// the same [`adapt_headers`] dispatch as a transport-produced response.
fn headers_from_json(value: &serde_json::Value) -> HeaderBag {
    let mut bag = HeaderBag::new();
    if let serde_json::Value::Object(map) = value {
        for (name, v) in map {
            match v {
                serde_json::Value::String(s) => bag.0.push((name.clone(), HeaderValue::Single(s.clone()))),
                serde_json::Value::Array(items) => {
                    let values: Vec<String> = items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect();
                    if !values.is_empty() {
                        bag.0.push((name.clone(), HeaderValue::Multi(values)));
                    }
                }
                other => bag.0.push((name.clone(), HeaderValue::Single(other.to_string()))),
            }
        }
    }
    bag
}

/// Resolves a mediator-embedded `status` field to an integer.
///
/// The field may arrive as either a JSON number or a numeric string. This
/// deliberately diverges from the quirk noted in the design notes (testing
/// `isNaN` on the pre-parse field rather than the parse outcome itself): we
/// test whether the parse succeeded directly, which is the same outcome for
/// every well-formed input and a more defensible one for malformed input.
/// See `DESIGN.md` for the recorded Open Question resolution.
fn parse_mediator_status(raw: &serde_json::Value) -> Option<u16> {
    match raw {
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as u16),
        serde_json::Value::String(s) => match s.trim().parse::<u16>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("mediator response status '{s}' is not numeric; passing through unchanged");
                None
            }
        },
        _ => None,
    }
}

/// Adapts a primary route's raw transport [`Response`] onto `ctx.response`,
/// unwrapping a mediator-framed body first when `content-type` names
/// `application/json+openhim`. Returns the pieces the outer pipeline needs
/// to actually build the client-visible response (cookies, redirect,
/// content type are not headers on `ctx.response`'s bag — the framework has
/// its own API surface for them).
pub fn adapt_primary_response(ctx: &mut RequestContext, mut response: Response) -> AdaptedResponse {
    preserve_transaction_id(ctx, &mut response);

    let is_mediator = response
        .headers
        .get_ci("content-type")
        .map(|v| v.as_values().join(", "))
        .is_some_and(|ct| ct.contains("application/json+openhim"));

    if is_mediator {
        match serde_json::from_slice::<serde_json::Value>(&response.body) {
            Ok(wrapper) => return adapt_mediator_wrapper(ctx, wrapper, response.timestamp),
            Err(e) => log::warn!("mediator response body is not valid JSON, passing through raw: {e}"),
        }
    }

    let (kept, cookies, redirect, content_type) = adapt_headers(&response.headers, response.status);
    let adapted = AdaptedResponse {
        status: response.status,
        body: response.body.clone(),
        timestamp: response.timestamp,
        content_type,
        cookies,
        redirect,
        headers: kept.clone(),
    };
    ctx.response = Some(Response {
        status: adapted.status,
        headers: kept,
        body: response.body,
        timestamp: response.timestamp,
    });
    adapted
}

/// Unwraps `{response, error?, "x-mediator-urn"?, orchestrations?,
/// properties?, metrics?}`, sets `ctx.error`/`ctx.auto_retry` from `error`,
/// stashes the whole wrapper on `ctx.mediator_response`, then runs the same
/// header dispatch over the embedded `response` object.
fn adapt_mediator_wrapper(
    ctx: &mut RequestContext,
    wrapper: serde_json::Value,
    timestamp: DateTime<Utc>,
) -> AdaptedResponse {
    ctx.mediator_response = Some(wrapper.clone());

    if let Some(error) = wrapper.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("mediator reported an error")
            .to_string();
        ctx.error = Some(match error.get("stack").and_then(|s| s.as_str()) {
            Some(stack) => ErrorDetail::with_stack(message, stack),
            None => ErrorDetail::new(message),
        });
        ctx.auto_retry = true;
    }

    let inner = wrapper.get("response").cloned().unwrap_or(serde_json::Value::Null);
    let status = inner
        .get("status")
        .and_then(parse_mediator_status)
        .unwrap_or(200);
    let body = match inner.get("body") {
        Some(serde_json::Value::String(s)) => s.clone().into_bytes(),
        Some(other) => other.to_string().into_bytes(),
        None => Vec::new(),
    };
    let headers = inner.get("headers").map(headers_from_json).unwrap_or_default();

    let (kept, cookies, redirect, content_type) = adapt_headers(&headers, status);
    let adapted = AdaptedResponse {
        status,
        body: body.clone(),
        timestamp,
        content_type,
        cookies,
        redirect,
        headers: kept.clone(),
    };
    ctx.response = Some(Response {
        status,
        headers: kept,
        body,
        timestamp,
    });
    adapted
}
