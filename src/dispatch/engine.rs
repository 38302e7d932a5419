//! Dispatch Engine (C7): validates the route set, partitions enabled routes
//! into waves, drives concurrent dispatch, enforces ordering, finalizes.

use crate::collaborators::{Events, EventBuffer, Keystore, KeystoreProvider, Persistence, ProducerPool};
use crate::dispatch::options::build_request_options;
use crate::dispatch::recorder;
use crate::error::{ErrorDetail, RouterError};
use crate::models::orchestration::RequestTrace;
use crate::models::response::HeaderBag;
use crate::models::{Channel, RequestContext, RequestSnapshot, Response, Route};
use crate::response_adapter::{self, AdaptedResponse};
use crate::transform::effective_path;
use crate::transport;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

/// What the engine leaves behind for the caller: `primary_route` names which
/// route (if any) produced the client-visible response, `adapted` carries
/// the wire-level pieces of that response (cookies, redirect, content type)
/// that don't live on `ctx.response`'s header bag.
pub struct DispatchOutcome {
    pub primary_route: Option<String>,
    pub adapted: Option<AdaptedResponse>,
}

struct Attempt {
    route: Route,
    request: RequestTrace,
    outcome: Result<Response, RouterError>,
}

/// Runs one route's full per-attempt pipeline: path transform → option
/// building → transport send. Failures at any stage before the transport
/// call still produce an `Attempt` (with a best-effort request trace) so the
/// caller can record and, for the primary, synthesize the 500 response.
async fn run_attempt<'a>(
    ctx: &'a RequestSnapshot,
    route: &'a Route,
    channel: &'a Channel,
    keystore: &'a Keystore,
    http_client: &'a reqwest::Client,
    producer_pool: &'a dyn ProducerPool,
    default_timeout_ms: u64,
    kafka_brokers: &'a [String],
) -> Attempt {
    let path = match effective_path(route, &ctx.path) {
        Ok(p) => p,
        Err(e) => {
            return Attempt {
                request: recorder::fallback_request_trace(ctx, route),
                route: route.clone(),
                outcome: Err(e),
            }
        }
    };

    let options = match build_request_options(ctx, route, channel, keystore, &path, default_timeout_ms, kafka_brokers) {
        Ok(opts) => opts,
        Err(e) => {
            return Attempt {
                request: recorder::fallback_request_trace(ctx, route),
                route: route.clone(),
                outcome: Err(e),
            }
        }
    };

    let request = recorder::build_request_trace(ctx, &options);
    let outcome = transport::send(ctx, route, channel, &options, http_client, producer_pool).await;
    Attempt {
        route: route.clone(),
        request,
        outcome,
    }
}

/// Drives a set of routes concurrently and collects their attempts in
/// resolution order — per spec, `ctx.routes` records attempts in the order
/// their transport calls settle, not the order they were started.
async fn run_wave<'a>(
    ctx: &'a RequestSnapshot,
    routes: impl IntoIterator<Item = &'a Route>,
    channel: &'a Channel,
    keystore: &'a Keystore,
    http_client: &'a reqwest::Client,
    producer_pool: &'a dyn ProducerPool,
    default_timeout_ms: u64,
    kafka_brokers: &'a [String],
) -> Vec<Attempt> {
    let mut pending: FuturesUnordered<BoxFuture<'a, Attempt>> = FuturesUnordered::new();
    for route in routes {
        pending.push(Box::pin(run_attempt(
            ctx,
            route,
            channel,
            keystore,
            http_client,
            producer_pool,
            default_timeout_ms,
            kafka_brokers,
        )));
    }
    let mut resolved = Vec::new();
    while let Some(attempt) = pending.next().await {
        resolved.push(attempt);
    }
    resolved
}

/// Applies the primary route's outcome to the context: success runs the
/// response adapter, failure synthesizes the `500` documented in spec.md
/// §4.7/§7 and marks `ctx.error`/`ctx.auto_retry`.
fn apply_primary_outcome(ctx: &mut RequestContext, outcome: Result<Response, RouterError>) -> AdaptedResponse {
    match outcome {
        Ok(resp) => response_adapter::adapt_primary_response(ctx, resp),
        Err(e) => {
            ctx.error = Some(ErrorDetail::from(&e));
            ctx.auto_retry = e.is_auto_retryable();
            let body = b"An internal server error occurred".to_vec();
            let timestamp = Utc::now();
            ctx.response = Some(Response {
                status: 500,
                headers: HeaderBag::new(),
                body: body.clone(),
                timestamp,
            });
            AdaptedResponse {
                status: 500,
                body,
                timestamp,
                content_type: None,
                cookies: Vec::new(),
                redirect: None,
                headers: HeaderBag::new(),
            }
        }
    }
}

/// Records a batch of settled secondary attempts and, for each, triggers the
/// persistence collaborator's non-primary write. Persistence errors are
/// logged, never surfaced — spec.md §7's `PersistenceError` handling.
async fn record_and_persist_secondaries(ctx: &mut RequestContext, attempts: Vec<Attempt>, persistence: &dyn Persistence) {
    for attempt in attempts {
        let record = recorder::record_secondary(ctx, &attempt.route, attempt.request, &attempt.outcome);
        if let Err(e) = persistence.store_non_primary_response(ctx, &record).await {
            log::warn!("persistence error storing secondary route '{}': {e}", record.name);
        }
    }
}

/// Runs the full per-channel dispatch: preflight validation, wave-A
/// concurrent fan-out, primary response adaptation, wave-B conditional
/// fan-out, and finalization against the persistence/events collaborators.
///
/// Wave-A starts the primary and every `wait_primary_response` secondary
/// concurrently (spec.md §4.7). The primary's outcome is recorded and
/// adapted onto `ctx` as soon as its own attempt settles — it races against,
/// and never waits on, its wave-A siblings. Those siblings keep running in
/// the background and are drained, recorded, and persisted immediately
/// afterward, before wave-B's status-code gate is evaluated.
///
/// This function as a whole still returns only once wave-B and finalization
/// have completed. A production binding of this engine into an async HTTP
/// framework would hand wave-B-and-finalization to a detached task once the
/// primary settles so the client response is not held up by secondary
/// bookkeeping — see `DESIGN.md` for why this crate does not do that itself.
pub async fn dispatch(
    ctx: &mut RequestContext,
    channel: &Channel,
    keystore_provider: &dyn KeystoreProvider,
    http_client: &reqwest::Client,
    producer_pool: &dyn ProducerPool,
    persistence: &dyn Persistence,
    events: &dyn Events,
    default_timeout_ms: u64,
    kafka_brokers: &[String],
) -> Result<DispatchOutcome, RouterError> {
    channel.validate_primary_count()?;

    let mut routes: Vec<Route> = channel.enabled_routes().cloned().collect();
    for route in &mut routes {
        route.inherit_timeout(channel.timeout);
    }

    let keystore = keystore_provider.get_keystore().await?;

    let primary = routes.iter().find(|r| r.primary).cloned();
    let (wave_b, wave_a_secondaries): (Vec<Route>, Vec<Route>) =
        routes.into_iter().filter(|r| !r.primary).partition(|r| r.wait_primary_response);

    ctx.primary_route = primary.as_ref().map(|r| r.name.clone());

    // Snapshotting the inbound fields up front means none of the concurrent
    // attempts below borrow `ctx` itself, so the primary's outcome can be
    // applied to `ctx` the instant it settles without waiting for `&ctx`
    // borrows held by still-running secondary futures to be released.
    let snapshot = ctx.snapshot();

    let mut secondary_pending: FuturesUnordered<BoxFuture<'_, Attempt>> = wave_a_secondaries
        .iter()
        .map(|route| {
            Box::pin(run_attempt(
                &snapshot,
                route,
                channel,
                &keystore,
                http_client,
                producer_pool,
                default_timeout_ms,
                kafka_brokers,
            )) as BoxFuture<'_, Attempt>
        })
        .collect();

    let mut secondary_attempts = Vec::new();
    let mut adapted = None;
    let mut primary_status = None;

    if let Some(route) = &primary {
        let mut primary_fut = Box::pin(run_attempt(
            &snapshot,
            route,
            channel,
            &keystore,
            http_client,
            producer_pool,
            default_timeout_ms,
            kafka_brokers,
        ));
        let attempt = loop {
            tokio::select! {
                attempt = &mut primary_fut => break attempt,
                attempt = secondary_pending.next(), if !secondary_pending.is_empty() => {
                    if let Some(attempt) = attempt {
                        secondary_attempts.push(attempt);
                    }
                }
            }
        };
        recorder::record_primary(ctx, &attempt.route, attempt.request, &attempt.outcome);
        let result = apply_primary_outcome(ctx, attempt.outcome);
        primary_status = Some(result.status);
        adapted = Some(result);
    }

    // Wave A isn't settled for wave-B's gating purposes until every sibling
    // has resolved too, primary response notwithstanding.
    while let Some(attempt) = secondary_pending.next().await {
        secondary_attempts.push(attempt);
    }
    record_and_persist_secondaries(ctx, secondary_attempts, persistence).await;

    let gate_status = primary_status.unwrap_or(0);
    let wave_b_active: Vec<Route> = wave_b.into_iter().filter(|r| r.gate_passes(gate_status)).collect();

    if !wave_b_active.is_empty() {
        let wave_b_attempts = run_wave(
            &snapshot,
            wave_b_active.iter(),
            channel,
            &keystore,
            http_client,
            producer_pool,
            default_timeout_ms,
            kafka_brokers,
        )
        .await;
        record_and_persist_secondaries(ctx, wave_b_attempts, persistence).await;
    }

    if let Err(e) = persistence.set_final_status(ctx).await {
        log::warn!("persistence error setting final status for transaction '{}': {e}", ctx.transaction_id);
    }

    let mut buf = EventBuffer::default();
    events.create_secondary_route_events(
        &mut buf,
        &ctx.transaction_id,
        ctx.request_timestamp,
        channel,
        &ctx.routes,
        ctx.current_attempt,
    );
    if let Err(e) = events.save_events(buf).await {
        log::warn!("event save error for transaction '{}': {e}", ctx.transaction_id);
    }

    Ok(DispatchOutcome {
        primary_route: ctx.primary_route.clone(),
        adapted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fakes::{InMemoryKeystore, InMemoryProducerPool, RecordingEvents, RecordingPersistence};
    use crate::models::route::{RouteStatus, RouteType};

    fn bus_route(name: &str, primary: bool, wait_primary: bool, status_check: Option<&str>) -> Route {
        Route {
            name: name.into(),
            status: RouteStatus::Enabled,
            primary,
            route_type: RouteType::Bus,
            host: None,
            port: None,
            secured: false,
            path: None,
            path_transform: None,
            topic: Some(format!("{name}-topic")),
            client_id: Some("client".into()),
            timeout: None,
            cert: None,
            username: None,
            password: None,
            forward_auth_header: false,
            wait_primary_response: wait_primary,
            status_codes_check: status_check.map(str::to_string),
        }
    }

    fn channel(routes: Vec<Route>) -> Channel {
        Channel {
            id: "c1".into(),
            name: "chan".into(),
            routes,
            methods: None,
            timeout: Some(5000),
            url_pattern: "/inbound/*".into(),
        }
    }

    struct Harness {
        keystore: InMemoryKeystore,
        producer_pool: InMemoryProducerPool,
        persistence: RecordingPersistence,
        events: RecordingEvents,
        http_client: reqwest::Client,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                keystore: InMemoryKeystore::default(),
                producer_pool: InMemoryProducerPool,
                persistence: RecordingPersistence::default(),
                events: RecordingEvents::default(),
                http_client: reqwest::Client::new(),
            }
        }
    }

    #[tokio::test]
    async fn single_primary_dispatch_populates_response_and_one_orchestration() {
        let h = Harness::new();
        let mut ctx = RequestContext::new("tx1", "chan", "POST", "/inbound/a");
        let channel = channel(vec![bus_route("primary", true, false, None)]);

        let outcome = dispatch(
            &mut ctx,
            &channel,
            &h.keystore,
            &h.http_client,
            &h.producer_pool,
            &h.persistence,
            &h.events,
            5000,
            &[],
        )
        .await
        .unwrap();

        assert_eq!(outcome.primary_route.as_deref(), Some("primary"));
        assert_eq!(ctx.response.unwrap().status, 200);
        assert_eq!(ctx.orchestrations.len(), 1);
        assert!(ctx.routes.is_empty());
        assert_eq!(*h.persistence.final_status_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn multiple_primaries_rejected_before_any_transport() {
        let h = Harness::new();
        let mut ctx = RequestContext::new("tx1", "chan", "POST", "/inbound/a");
        let channel = channel(vec![
            bus_route("a", true, false, None),
            bus_route("b", true, false, None),
        ]);

        let result = dispatch(
            &mut ctx,
            &channel,
            &h.keystore,
            &h.http_client,
            &h.producer_pool,
            &h.persistence,
            &h.events,
            5000,
            &[],
        )
        .await;

        assert!(matches!(result, Err(RouterError::MultiplePrimaryRoutes)));
        assert!(ctx.orchestrations.is_empty());
        assert!(ctx.routes.is_empty());
    }

    #[tokio::test]
    async fn every_enabled_non_primary_route_gets_exactly_one_record() {
        let h = Harness::new();
        let mut ctx = RequestContext::new("tx1", "chan", "POST", "/inbound/a");
        let channel = channel(vec![
            bus_route("primary", true, false, None),
            bus_route("fire-and-forget", false, false, None),
            bus_route("disabled", false, false, None),
        ]);
        let mut channel = channel;
        channel.routes[2].status = RouteStatus::Disabled;

        dispatch(
            &mut ctx,
            &channel,
            &h.keystore,
            &h.http_client,
            &h.producer_pool,
            &h.persistence,
            &h.events,
            5000,
            &[],
        )
        .await
        .unwrap();

        assert_eq!(ctx.routes.len(), 1);
        assert_eq!(ctx.routes[0].name, "fire-and-forget");
        assert_eq!(h.persistence.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wait_primary_secondary_gated_on_status_code() {
        let h = Harness::new();
        let mut ctx = RequestContext::new("tx1", "chan", "POST", "/inbound/a");
        // Bus publish succeeds with status 200, so a "2*" gate passes and a
        // "500" gate does not.
        let channel = channel(vec![
            bus_route("primary", true, false, None),
            bus_route("fires", false, true, Some("2*")),
            bus_route("skipped", false, true, Some("500")),
        ]);

        dispatch(
            &mut ctx,
            &channel,
            &h.keystore,
            &h.http_client,
            &h.producer_pool,
            &h.persistence,
            &h.events,
            5000,
            &[],
        )
        .await
        .unwrap();

        assert_eq!(ctx.routes.len(), 1);
        assert_eq!(ctx.routes[0].name, "fires");
    }

    #[tokio::test]
    async fn keystore_failure_propagates_before_any_route_runs() {
        let mut ctx = RequestContext::new("tx1", "chan", "POST", "/inbound/a");
        let channel = channel(vec![bus_route("primary", true, false, None)]);
        let producer_pool = InMemoryProducerPool;
        let persistence = RecordingPersistence::default();
        let events = RecordingEvents::default();
        let http_client = reqwest::Client::new();

        let result = dispatch(
            &mut ctx,
            &channel,
            &crate::collaborators::fakes::FailingKeystore,
            &http_client,
            &producer_pool,
            &persistence,
            &events,
            5000,
            &[],
        )
        .await;

        assert!(matches!(result, Err(RouterError::Keystore(_))));
        assert!(ctx.orchestrations.is_empty());
    }
}
