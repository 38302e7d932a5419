//! Trait boundaries for the external collaborators named in the
//! specification: the keystore, the bus producer-pool manager, the
//! transaction/event persistence store. Each is a `dyn`-safe trait returning
//! boxed futures (grounded on the reference gateway's `dyn LoadBalancer`
//! trait-object pattern in `services/load_balancer.rs`) rather than depending
//! on an external async-trait macro crate the reference gateway doesn't use.

use crate::error::RouterError;
use crate::models::{Channel, RequestContext, SecondaryRouteRecord};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;

/// CA/client certificate material as returned by the keystore.
#[derive(Debug, Clone, Default)]
pub struct CertData {
    pub data: Vec<u8>,
}

/// `{key, cert:{data}, ca:{id(name):{data}}}` — the keystore collaborator's
/// payload.
#[derive(Debug, Clone, Default)]
pub struct Keystore {
    pub key: Vec<u8>,
    pub cert: CertData,
    pub ca: HashMap<String, CertData>,
}

/// The keystore collaborator: read-only, acquired once per dispatch.
pub trait KeystoreProvider: Send + Sync {
    fn get_keystore(&self) -> BoxFuture<'_, Result<Keystore, RouterError>>;
}

/// Acknowledgement of a successful bus publish.
#[derive(Debug, Clone)]
pub struct PublishAck {
    pub topic: String,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
}

/// A cached producer for one `(channel, client_id, timeout)` key.
pub trait Producer: Send + Sync {
    fn send(&self, topic: &str, value: Vec<u8>) -> BoxFuture<'_, Result<PublishAck, RouterError>>;
}

/// The producer-pool collaborator. Concurrent dispatches may share a
/// producer for the same `(channel_name, client_id, timeout_ms)` key — the
/// pool, not this crate, owns that caching.
pub trait ProducerPool: Send + Sync {
    fn get_producer(
        &self,
        channel_name: &str,
        client_id: &str,
        timeout_ms: u64,
    ) -> BoxFuture<'_, Result<std::sync::Arc<dyn Producer>, RouterError>>;
}

/// The persistence collaborator. Both methods are best-effort: failures are
/// logged by the caller, never surfaced to the client.
pub trait Persistence: Send + Sync {
    fn store_non_primary_response(
        &self,
        ctx: &RequestContext,
        record: &SecondaryRouteRecord,
    ) -> BoxFuture<'_, Result<(), RouterError>>;

    fn set_final_status(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<(), RouterError>>;
}

/// An accumulating buffer of secondary-route events, populated by
/// [`Events::create_secondary_route_events`] and flushed by
/// [`Events::save_events`].
#[derive(Debug, Clone, Default)]
pub struct EventBuffer(pub Vec<serde_json::Value>);

/// The events collaborator.
pub trait Events: Send + Sync {
    fn create_secondary_route_events(
        &self,
        buf: &mut EventBuffer,
        transaction_id: &str,
        request_timestamp: DateTime<Utc>,
        channel: &Channel,
        routes: &[SecondaryRouteRecord],
        attempt: u32,
    );

    fn save_events(&self, buf: EventBuffer) -> BoxFuture<'_, Result<(), RouterError>>;
}

pub mod fakes;
