//! In-memory test doubles for the collaborator traits, one per concern,
//! mirroring the reference gateway's one-file-per-concern `tests/` layout.

use super::*;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryKeystore {
    pub keystore: Keystore,
}

impl KeystoreProvider for InMemoryKeystore {
    fn get_keystore(&self) -> BoxFuture<'_, Result<Keystore, RouterError>> {
        let keystore = self.keystore.clone();
        Box::pin(async move { Ok(keystore) })
    }
}

pub struct FailingKeystore;

impl KeystoreProvider for FailingKeystore {
    fn get_keystore(&self) -> BoxFuture<'_, Result<Keystore, RouterError>> {
        Box::pin(async move { Err(RouterError::Keystore("unreachable".into())) })
    }
}

pub struct FakeProducer;

impl Producer for FakeProducer {
    fn send(&self, topic: &str, _value: Vec<u8>) -> BoxFuture<'_, Result<PublishAck, RouterError>> {
        let topic = topic.to_string();
        Box::pin(async move {
            Ok(PublishAck {
                topic,
                partition: Some(0),
                offset: Some(0),
            })
        })
    }
}

#[derive(Default)]
pub struct InMemoryProducerPool;

impl ProducerPool for InMemoryProducerPool {
    fn get_producer(
        &self,
        _channel_name: &str,
        _client_id: &str,
        _timeout_ms: u64,
    ) -> BoxFuture<'_, Result<std::sync::Arc<dyn Producer>, RouterError>> {
        Box::pin(async move { Ok(std::sync::Arc::new(FakeProducer) as std::sync::Arc<dyn Producer>) })
    }
}

/// Records every call it receives, so tests can assert invariants like
/// "exactly one store call per enabled non-primary route".
#[derive(Default)]
pub struct RecordingPersistence {
    pub stored: Mutex<Vec<SecondaryRouteRecord>>,
    pub final_status_calls: Mutex<u32>,
}

impl Persistence for RecordingPersistence {
    fn store_non_primary_response(
        &self,
        _ctx: &RequestContext,
        record: &SecondaryRouteRecord,
    ) -> BoxFuture<'_, Result<(), RouterError>> {
        self.stored.lock().unwrap().push(record.clone());
        Box::pin(async move { Ok(()) })
    }

    fn set_final_status(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<(), RouterError>> {
        *self.final_status_calls.lock().unwrap() += 1;
        Box::pin(async move { Ok(()) })
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub saved: Mutex<Vec<EventBuffer>>,
}

impl Events for RecordingEvents {
    fn create_secondary_route_events(
        &self,
        buf: &mut EventBuffer,
        transaction_id: &str,
        _request_timestamp: DateTime<Utc>,
        _channel: &Channel,
        routes: &[SecondaryRouteRecord],
        attempt: u32,
    ) {
        for route in routes {
            buf.0.push(serde_json::json!({
                "transactionId": transaction_id,
                "route": route.name,
                "attempt": attempt,
            }));
        }
    }

    fn save_events(&self, buf: EventBuffer) -> BoxFuture<'_, Result<(), RouterError>> {
        self.saved.lock().unwrap().push(buf);
        Box::pin(async move { Ok(()) })
    }
}
