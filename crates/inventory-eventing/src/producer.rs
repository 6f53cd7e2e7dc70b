//! Event sinks.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};

use crate::{Event, EventError};

#[async_trait]
pub trait Producer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn produce(&self, event: &Event) -> Result<(), EventError>;
}

type Output = Pin<Box<dyn AsyncWrite + Send>>;

/// Writes each event as one JSON line.
///
/// Writes are asynchronous, so a stalled reader surfaces as an emit
/// timeout instead of a blocked worker thread.
pub struct StdoutProducer {
    out: Mutex<Output>,
}

impl StdoutProducer {
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    pub fn with_writer(out: impl AsyncWrite + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::pin(out)),
        }
    }
}

impl Default for StdoutProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Producer for StdoutProducer {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn produce(&self, event: &Event) -> Result<(), EventError> {
        let mut line =
            serde_json::to_vec(event).map_err(|e| EventError::Serialize(e.to_string()))?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| EventError::Io(e.to_string()))?;
        out.flush().await.map_err(|e| EventError::Io(e.to_string()))
    }
}

/// Forwards events to an in-process receiver. A full channel applies
/// backpressure up to the gateway's emit timeout.
#[derive(Clone)]
pub struct ChannelProducer {
    tx: mpsc::Sender<Event>,
}

impl ChannelProducer {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Producer for ChannelProducer {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn produce(&self, event: &Event) -> Result<(), EventError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| EventError::Closed)
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProducer;

#[async_trait]
impl Producer for NoopProducer {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn produce(&self, _event: &Event) -> Result<(), EventError> {
        Ok(())
    }
}
