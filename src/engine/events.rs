use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::models::event::DriverEvent;
use crate::observability::metrics::Metrics;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event queue is full")]
    QueueFull,

    #[error("event queue is closed")]
    Closed,
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DriverEvent) -> Result<(), PublishError>;
}

/// Outbox in front of the dispatcher: publishing never waits on delivery.
#[derive(Clone)]
pub struct QueuedEventSink {
    tx: mpsc::Sender<DriverEvent>,
}

impl QueuedEventSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<DriverEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for QueuedEventSink {
    async fn publish(&self, event: DriverEvent) -> Result<(), PublishError> {
        self.tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Publishes after the primary write has committed. Failures are logged and
/// counted only.
pub async fn notify(sink: &dyn EventSink, metrics: &Metrics, event: DriverEvent) {
    let event_type = event.event_type.clone();
    let driver_id = event.driver_id;

    if let Err(err) = sink.publish(event).await {
        metrics.events_dropped_total.inc();
        warn!(
            error = %err,
            event_type = %event_type,
            driver_id = %driver_id,
            "failed to publish driver event"
        );
    }
}

pub async fn run_event_dispatcher(
    mut rx: mpsc::Receiver<DriverEvent>,
    events_tx: broadcast::Sender<DriverEvent>,
    metrics: Arc<Metrics>,
) {
    info!("event dispatcher started");

    while let Some(event) = rx.recv().await {
        metrics
            .events_published_total
            .with_label_values(&[event.event_type.as_str()])
            .inc();

        // No subscribers is not an error.
        if events_tx.send(event).is_err() {
            debug!("driver event dropped: no subscribers");
        }
    }

    warn!("event dispatcher stopped: queue channel closed");
}
