//! Orchestration Recorder (C6): builds orchestration records for the primary
//! route and per-route secondary records, appended to the request context.

use crate::dispatch::options::RequestOptions;
use crate::error::{ErrorDetail, RouterError};
use crate::models::orchestration::{OrchestrationRecord, RequestTrace, ResponseSnapshot, SecondaryRouteRecord};
use crate::models::{RequestContext, RequestSnapshot, Response, Route};
use chrono::Utc;
use std::collections::HashMap;

fn options_headers(options: &RequestOptions) -> HashMap<String, String> {
    match options {
        RequestOptions::Http(h) => h
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.as_values().join(", ")))
            .collect(),
        RequestOptions::Bus(_) => HashMap::new(),
    }
}

/// Captures the outbound request actually sent for one attempt, regardless
/// of transport.
pub fn build_request_trace(ctx: &RequestSnapshot, options: &RequestOptions) -> RequestTrace {
    let body = if ctx.body.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&ctx.body).into_owned())
    };

    match options {
        RequestOptions::Http(h) => RequestTrace {
            host: h.hostname.clone(),
            port: h.port,
            path: h.path.clone(),
            headers: options_headers(options),
            method: h.method.clone(),
            body,
            timestamp: Utc::now(),
        },
        RequestOptions::Bus(b) => RequestTrace {
            host: b.brokers.join(","),
            port: 0,
            path: b.topic.clone(),
            headers: HashMap::new(),
            method: ctx.method.clone(),
            body,
            timestamp: Utc::now(),
        },
    }
}

/// True iff `response`'s `content-type` names the mediator wire format.
fn is_mediator_response(response: &Response) -> bool {
    response
        .headers
        .get_ci("content-type")
        .map(|v| v.as_values().join(", "))
        .is_some_and(|ct| ct.contains("application/json+openhim"))
}

/// Lifts `mediatorURN`, `orchestrations`, `properties`, `metrics`, and the
/// embedded `response` out of a secondary route's mediator-framed body, per
/// the specification's "for mediator responses on secondary routes" clause.
/// Malformed mediator bodies are left as a plain response snapshot — this is
/// an enrichment, not a requirement for the record to exist.
fn lift_mediator_fields(record: &mut SecondaryRouteRecord, response: &Response) {
    if !is_mediator_response(response) {
        return;
    }
    let Ok(wrapper) = serde_json::from_slice::<serde_json::Value>(&response.body) else {
        return;
    };

    record.mediator_urn = wrapper.get("x-mediator-urn").and_then(|v| v.as_str()).map(str::to_string);
    record.properties = wrapper.get("properties").cloned();
    record.metrics = wrapper.get("metrics").cloned();

    if let Some(raw) = wrapper.get("orchestrations") {
        if let Ok(items) = serde_json::from_value::<Vec<OrchestrationRecord>>(raw.clone()) {
            record.orchestrations = Some(items);
        }
    }
    if let Some(raw) = wrapper.get("response") {
        if let Ok(snapshot) = serde_json::from_value::<ResponseSnapshot>(raw.clone()) {
            record.response = Some(snapshot);
        }
    }
}

/// A best-effort trace for an attempt that failed before request options
/// could even be built (e.g. a malformed path-transform expression) — there
/// is no outbound request to describe, so only the fields known from
/// configuration are filled in.
pub fn fallback_request_trace(ctx: &RequestSnapshot, route: &Route) -> RequestTrace {
    RequestTrace {
        host: route.host.clone().unwrap_or_default(),
        port: route.port.unwrap_or_default(),
        path: ctx.path.clone(),
        headers: HashMap::new(),
        method: ctx.method.clone(),
        body: None,
        timestamp: Utc::now(),
    }
}

/// Appends an orchestration record for the primary route's attempt. Called
/// for every outcome, success or failure.
pub fn record_primary(
    ctx: &mut RequestContext,
    route: &Route,
    request: RequestTrace,
    outcome: &Result<Response, RouterError>,
) {
    let (response, error) = match outcome {
        Ok(resp) => (Some(ResponseSnapshot::from(resp)), None),
        Err(e) => (None, Some(ErrorDetail::from(e))),
    };
    ctx.orchestrations.push(OrchestrationRecord {
        name: route.name.clone(),
        request,
        response,
        error,
    });
}

/// Builds and appends a secondary-route record for one non-primary route's
/// attempt. Produced for every enabled non-primary route whether the attempt
/// succeeded or failed.
pub fn record_secondary(
    ctx: &mut RequestContext,
    route: &Route,
    request: RequestTrace,
    outcome: &Result<Response, RouterError>,
) -> SecondaryRouteRecord {
    let mut record = SecondaryRouteRecord {
        name: route.name.clone(),
        request: Some(request),
        ..Default::default()
    };

    match outcome {
        Ok(resp) => {
            record.response = Some(ResponseSnapshot::from(resp));
            lift_mediator_fields(&mut record, resp);
        }
        Err(e) => {
            record.error = Some(ErrorDetail::from(e));
        }
    }

    ctx.routes.push(record.clone());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::options::HttpRequestOptions;
    use crate::models::response::HeaderBag;
    use crate::models::route::{RouteStatus, RouteType};

    fn route(name: &str, primary: bool) -> Route {
        Route {
            name: name.into(),
            status: RouteStatus::Enabled,
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

    fn http_options() -> RequestOptions {
        RequestOptions::Http(HttpRequestOptions {
            hostname: "h".into(),
            port: 80,
            secured: false,
            method: "GET".into(),
            headers: HeaderBag::new(),
            path: "/x".into(),
            reject_unauthorized: true,
            key: None,
            cert: None,
            ca: None,
            auth: None,
            timeout_ms: 1000,
        })
    }

    fn ok_response() -> Response {
        Response {
            status: 200,
            headers: HeaderBag::new(),
            body: b"ok".to_vec(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn primary_success_appends_one_orchestration() {
        let mut ctx = RequestContext::new("tx1", "chan", "GET", "/x");
        let trace = build_request_trace(&ctx.snapshot(), &http_options());
        record_primary(&mut ctx, &route("p", true), trace, &Ok(ok_response()));
        assert_eq!(ctx.orchestrations.len(), 1);
        assert!(ctx.orchestrations[0].error.is_none());
    }

    #[test]
    fn primary_failure_records_error_not_response() {
        let mut ctx = RequestContext::new("tx1", "chan", "GET", "/x");
        let trace = build_request_trace(&ctx.snapshot(), &http_options());
        let err = RouterError::Timeout(500);
        record_primary(&mut ctx, &route("p", true), trace, &Err(err));
        assert!(ctx.orchestrations[0].response.is_none());
        assert!(ctx.orchestrations[0].error.is_some());
    }

    #[test]
    fn secondary_success_and_failure_both_append_to_routes() {
        let mut ctx = RequestContext::new("tx1", "chan", "GET", "/x");
        let trace = build_request_trace(&ctx.snapshot(), &http_options());
        record_secondary(&mut ctx, &route("s1", false), trace.clone(), &Ok(ok_response()));
        record_secondary(
            &mut ctx,
            &route("s2", false),
            trace,
            &Err(RouterError::Transport {
                route: "s2".into(),
                message: "boom".into(),
            }),
        );
        assert_eq!(ctx.routes.len(), 2);
        assert!(ctx.routes[0].response.is_some());
        assert!(ctx.routes[1].error.is_some());
    }

    #[test]
    fn mediator_fields_lifted_from_secondary_response() {
        let mut ctx = RequestContext::new("tx1", "chan", "GET", "/x");
        let trace = build_request_trace(&ctx.snapshot(), &http_options());
        let mut headers = HeaderBag::new();
        headers.insert("content-type", "application/json+openhim");
        let body = serde_json::json!({
            "response": {"status": 201, "body": "created", "headers": {}},
            "x-mediator-urn": "urn:mediator:test",
            "properties": {"a": 1},
        })
        .to_string();
        let resp = Response {
            status: 200,
            headers,
            body: body.into_bytes(),
            timestamp: Utc::now(),
        };
        let record = record_secondary(&mut ctx, &route("s1", false), trace, &Ok(resp));
        assert_eq!(record.mediator_urn.as_deref(), Some("urn:mediator:test"));
        assert_eq!(record.response.unwrap().status, 201);
        assert!(record.properties.is_some());
    }
}
