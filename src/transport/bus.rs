//! Bus Transport Adapter (C4): publishes a serialized envelope to a topic
//! via a producer obtained from the external producer-pool collaborator.
//! There is no response correlation — a bus call is fire-and-acknowledge.

use crate::collaborators::ProducerPool;
use crate::dispatch::options::BusRequestOptions;
use crate::error::RouterError;
use crate::models::response::HeaderBag;
use crate::models::{Channel, RequestSnapshot, Response, Route};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
struct BusEnvelope<'a> {
    method: &'a str,
    path: String,
    pattern: &'a str,
    headers: HashMap<String, String>,
    body: String,
}

fn envelope_headers(ctx: &RequestSnapshot) -> HashMap<String, String> {
    ctx.headers
        .iter()
        .map(|(k, v)| (k.clone(), v.as_values().join(", ")))
        .collect()
}

pub async fn send_bus(
    ctx: &RequestSnapshot,
    route: &Route,
    channel: &Channel,
    opts: &BusRequestOptions,
    producer_pool: &dyn ProducerPool,
) -> Result<Response, RouterError> {
    let producer = producer_pool
        .get_producer(&channel.name, &opts.client_id, opts.timeout_ms)
        .await?;

    let envelope = BusEnvelope {
        method: &ctx.method,
        path: ctx.full_path(&ctx.path),
        pattern: &channel.url_pattern,
        headers: envelope_headers(ctx),
        body: if ctx.body.is_empty() {
            String::new()
        } else {
            String::from_utf8_lossy(&ctx.body).into_owned()
        },
    };

    let value = serde_json::to_vec(&envelope).map_err(|e| RouterError::Transport {
        route: route.name.clone(),
        message: format!("failed to serialize bus envelope: {e}"),
    })?;

    // Publish success yields a 200 unconditionally — the pool's ack does not
    // expose per-partition failure detail at this boundary (see DESIGN.md).
    let ack = producer.send(&opts.topic, value).await?;
    let ack_body = serde_json::to_vec(&serde_json::json!({
        "topic": ack.topic,
        "partition": ack.partition,
        "offset": ack.offset,
    }))
    .unwrap_or_default();

    Ok(Response {
        status: 200,
        headers: HeaderBag::new(),
        body: ack_body,
        timestamp: Utc::now(),
    })
}
