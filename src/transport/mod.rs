//! Transport adapters: a closed sum over `{http, bus}`. The dispatcher never
//! branches on `route.type` outside this layer and the option builder —
//! callers match on [`crate::dispatch::options::RequestOptions`] once, here.

pub mod bus;
pub mod http;

use crate::collaborators::ProducerPool;
use crate::dispatch::options::RequestOptions;
use crate::error::RouterError;
use crate::models::{Channel, RequestSnapshot, Response, Route};

/// Dispatches one outbound attempt through the transport matching `options`.
pub async fn send(
    ctx: &RequestSnapshot,
    route: &Route,
    channel: &Channel,
    options: &RequestOptions,
    http_client: &reqwest::Client,
    producer_pool: &dyn ProducerPool,
) -> Result<Response, RouterError> {
    match options {
        RequestOptions::Http(opts) => http::send_http(ctx, route, opts, http_client).await,
        RequestOptions::Bus(opts) => bus::send_bus(ctx, route, channel, opts, producer_pool).await,
    }
}
