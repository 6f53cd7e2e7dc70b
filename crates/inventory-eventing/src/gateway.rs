//! Producer selection and bounded, best-effort emission.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use inventory_core::Identity;
use inventory_core::config::{EventerKind, EventingConfig};
use inventory_state::{Resource, ResourceId};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::{
    ChannelProducer, Event, EventError, EventKind, NoopProducer, Producer, StdoutProducer,
};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Published for every emission that did not reach its producer.
#[derive(Debug, Clone)]
pub struct EmitFailure {
    pub event_id: String,
    pub kind: EventKind,
    pub resource_id: ResourceId,
    pub producer: &'static str,
    pub error: EventError,
}

pub struct EventGateway {
    producers: Vec<Arc<dyn Producer>>,
    timeout: Duration,
    emitted: AtomicU64,
    failed: AtomicU64,
    failures: broadcast::Sender<EmitFailure>,
}

impl EventGateway {
    pub fn new(producers: Vec<Arc<dyn Producer>>, timeout: Duration) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            producers,
            timeout,
            emitted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failures,
        }
    }

    /// Build the configured producer. The receiver is returned only for
    /// the `channel` eventer.
    pub fn from_config(config: &EventingConfig) -> (Self, Option<mpsc::Receiver<Event>>) {
        let (producer, rx): (Arc<dyn Producer>, _) = match config.eventer {
            EventerKind::Stdout => (Arc::new(StdoutProducer::new()), None),
            EventerKind::Channel => {
                let (producer, rx) = ChannelProducer::channel(config.channel_capacity);
                (Arc::new(producer), Some(rx))
            }
            EventerKind::None => (Arc::new(NoopProducer), None),
        };
        info!(producer = producer.name(), timeout_ms = config.timeout_ms, "event gateway ready");
        (
            Self::new(vec![producer], Duration::from_millis(config.timeout_ms)),
            rx,
        )
    }

    /// The producer responsible for this caller and resource.
    pub fn select(&self, identity: &Identity, resource: &Resource) -> Option<&Arc<dyn Producer>> {
        if self.producers.is_empty() {
            return None;
        }
        let index = producer_index(
            &identity.principal,
            &resource.resource_type,
            resource.id,
            self.producers.len(),
        );
        self.producers.get(index)
    }

    /// Emit one event for a committed mutation.
    ///
    /// Failures are logged, counted and broadcast before being returned;
    /// callers are free to ignore the result.
    pub async fn emit(
        &self,
        identity: &Identity,
        kind: EventKind,
        resource: &Resource,
    ) -> Result<(), EventError> {
        let Some(producer) = self.select(identity, resource) else {
            return Ok(());
        };
        let event = Event::new(identity, kind, resource.clone());

        let result = match tokio::time::timeout(self.timeout, producer.produce(&event)).await {
            Ok(result) => result,
            Err(_) => Err(EventError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                self.emitted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event_id = event.id(),
                    %kind,
                    resource_id = resource.id,
                    producer = producer.name(),
                    "event emitted"
                );
                Ok(())
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    event_id = event.id(),
                    %kind,
                    resource_id = resource.id,
                    producer = producer.name(),
                    error = %e,
                    "event emission failed"
                );
                // No subscribers is fine.
                let _ = self.failures.send(EmitFailure {
                    event_id: event.id().to_string(),
                    kind,
                    resource_id: resource.id,
                    producer: producer.name(),
                    error: e.clone(),
                });
                Err(e)
            }
        }
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<EmitFailure> {
        self.failures.subscribe()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }
}

/// FNV-1a over the routing fields, reduced to a producer slot.
fn producer_index(principal: &str, resource_type: &str, id: ResourceId, count: usize) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut feed = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
    };
    feed(principal.as_bytes());
    feed(&[0xff]);
    feed(resource_type.as_bytes());
    feed(&[0xff]);
    feed(&id.to_be_bytes());
    (hash % count as u64) as usize
}
