use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::context::Deadline;
use crate::engine::events::QueuedEventSink;
use crate::engine::lifecycle::{LifecycleConfig, StatusLifecycleManager};
use crate::engine::tracker::{LocationTracker, TrackerConfig};
use crate::models::event::DriverEvent;
use crate::observability::metrics::Metrics;
use crate::store::memory::{MemoryDocumentStore, MemoryDriverStore, MemoryLocationStore};

pub struct AppState {
    pub drivers: Arc<MemoryDriverStore>,
    pub locations: Arc<MemoryLocationStore>,
    pub lifecycle: StatusLifecycleManager,
    pub tracker: Arc<LocationTracker>,
    pub driver_events_tx: broadcast::Sender<DriverEvent>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        tracker_config: TrackerConfig,
        lifecycle_config: LifecycleConfig,
        event_buffer_size: usize,
        request_timeout: Duration,
    ) -> (Self, mpsc::Receiver<DriverEvent>) {
        let (sink, event_rx) = QueuedEventSink::new(event_buffer_size);
        let (driver_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let sink = Arc::new(sink);
        let metrics = Arc::new(Metrics::new());

        let drivers = Arc::new(MemoryDriverStore::new());
        let locations = Arc::new(MemoryLocationStore::new());

        let lifecycle = StatusLifecycleManager::new(
            drivers.clone(),
            Arc::new(MemoryDocumentStore::new()),
            sink.clone(),
            metrics.clone(),
            lifecycle_config,
        );
        let tracker = Arc::new(LocationTracker::new(
            locations.clone(),
            drivers.clone(),
            sink,
            metrics.clone(),
            tracker_config,
        ));

        (
            Self {
                drivers,
                locations,
                lifecycle,
                tracker,
                driver_events_tx,
                metrics,
                request_timeout,
            },
            event_rx,
        )
    }

    /// Deadline for one inbound request.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
