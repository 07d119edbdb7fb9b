use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::future::{join_all, try_join_all};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::Deadline;
use crate::engine::events::{notify, EventSink};
use crate::engine::statistics::compute_statistics;
use crate::error::AppError;
use crate::geo::{haversine_km, is_valid_coordinate};
use crate::models::driver::Driver;
use crate::models::event::{DriverEvent, DRIVER_LOCATION_UPDATED};
use crate::models::location::{GeoPoint, LocationUpdate, NearbyDriver, PositionReport, TrackStatistics};
use crate::observability::metrics::Metrics;
use crate::store::{DriverStore, LocationStore};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub staleness_threshold: Duration,
    pub retention: Duration,
    pub cleanup_chunk_size: usize,
    pub nearby_default_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::minutes(10),
            retention: Duration::days(30),
            cleanup_chunk_size: 1000,
            nearby_default_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub struct LocationTracker {
    locations: Arc<dyn LocationStore>,
    drivers: Arc<dyn DriverStore>,
    events: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
    config: TrackerConfig,
}

impl LocationTracker {
    pub fn new(
        locations: Arc<dyn LocationStore>,
        drivers: Arc<dyn DriverStore>,
        events: Arc<dyn EventSink>,
        metrics: Arc<Metrics>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            locations,
            drivers,
            events,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub async fn ingest(
        &self,
        update: LocationUpdate,
        deadline: Deadline,
    ) -> Result<PositionReport, AppError> {
        if let Err(err) = validate_coordinates(&update) {
            self.record_reports("rejected", 1);
            warn!(driver_id = %update.driver_id, error = %err, "location validation failed");
            return Err(err);
        }
        if let Err(err) = self.ensure_driver(update.driver_id, deadline).await {
            self.record_reports("rejected", 1);
            warn!(driver_id = %update.driver_id, error = %err, "location for unknown driver");
            return Err(err);
        }

        let report = update.into_report(Utc::now());
        deadline
            .run("create_location", self.locations.create(report.clone()))
            .await?;
        self.record_reports("accepted", 1);

        notify(
            self.events.as_ref(),
            &self.metrics,
            DriverEvent::new(
                DRIVER_LOCATION_UPDATED,
                report.driver_id,
                json!({
                    "location": {
                        "latitude": report.latitude,
                        "longitude": report.longitude,
                        "address": report.address,
                    },
                    "speed": report.speed.unwrap_or(0.0),
                    "bearing": report.bearing.unwrap_or(0.0),
                    "accuracy": report.accuracy.unwrap_or(0.0),
                }),
            ),
        )
        .await;

        debug!(
            driver_id = %report.driver_id,
            latitude = report.latitude,
            longitude = report.longitude,
            "location ingested"
        );
        Ok(report)
    }

    /// Validates every update before anything is written.
    pub async fn ingest_batch(
        &self,
        updates: Vec<LocationUpdate>,
        deadline: Deadline,
    ) -> Result<usize, AppError> {
        if updates.is_empty() {
            return Ok(0);
        }

        for (index, update) in updates.iter().enumerate() {
            if let Err(err) = validate_coordinates(update) {
                self.record_reports("rejected", updates.len());
                warn!(index, driver_id = %update.driver_id, error = %err, "batch rejected");
                return Err(AppError::Validation(format!("report {index}: {err}")));
            }
        }

        let driver_ids: HashSet<Uuid> = updates.iter().map(|update| update.driver_id).collect();
        if let Err(err) =
            try_join_all(driver_ids.into_iter().map(|id| self.ensure_driver(id, deadline))).await
        {
            self.record_reports("rejected", updates.len());
            return Err(err);
        }

        let now = Utc::now();
        let reports: Vec<PositionReport> = updates
            .into_iter()
            .map(|update| update.into_report(now))
            .collect();
        let count = reports.len();

        deadline
            .run("create_location_batch", self.locations.create_batch(reports))
            .await?;
        self.record_reports("accepted", count);

        info!(count, "location batch ingested");
        Ok(count)
    }

    pub async fn current_position(
        &self,
        driver_id: Uuid,
        deadline: Deadline,
    ) -> Result<PositionReport, AppError> {
        let report = deadline
            .run("latest_location", self.locations.latest(driver_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("location for driver {driver_id}")))?;

        let age = Utc::now() - report.recorded_at;
        if age > self.config.staleness_threshold {
            warn!(driver_id = %driver_id, recorded_at = %report.recorded_at, "location data is too old");
            return Err(AppError::StaleData(format!(
                "last report for driver {driver_id} recorded at {}",
                report.recorded_at
            )));
        }

        Ok(report)
    }

    pub async fn history(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<Vec<PositionReport>, AppError> {
        if to < from {
            return Err(AppError::Validation(
                "invalid time range: 'to' is before 'from'".to_string(),
            ));
        }

        deadline
            .run(
                "location_history",
                self.locations.in_range(driver_id, from, to),
            )
            .await
    }

    pub async fn statistics(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<TrackStatistics, AppError> {
        let reports = self.history(driver_id, from, to, deadline).await?;
        Ok(compute_statistics(&reports))
    }

    pub async fn nearby(
        &self,
        query: NearbyQuery,
        deadline: Deadline,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        let start = Instant::now();
        let result = self.find_nearby(&query, deadline).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .nearby_query_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn find_nearby(
        &self,
        query: &NearbyQuery,
        deadline: Deadline,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        if !is_valid_coordinate(query.lat, query.lon) {
            return Err(AppError::Validation(format!(
                "invalid centre coordinates ({}, {})",
                query.lat, query.lon
            )));
        }
        if query.radius_km.is_nan() || query.radius_km <= 0.0 {
            return Err(AppError::Validation("radius must be positive".to_string()));
        }
        let limit = match query.limit {
            Some(limit) if limit > 0 => limit,
            _ => self.config.nearby_default_limit,
        };

        let center = GeoPoint {
            lat: query.lat,
            lng: query.lon,
        };
        let candidates: Vec<NearbyDriver> = deadline
            .run(
                "nearby_locations",
                self.locations.latest_within(center, query.radius_km),
            )
            .await?
            .into_iter()
            .map(|position| NearbyDriver {
                driver_id: position.driver_id,
                distance_km: haversine_km(&center, &position.point()),
                position,
            })
            .filter(|candidate| candidate.distance_km <= query.radius_km)
            .collect();

        let lookups = join_all(
            candidates
                .iter()
                .map(|candidate| deadline.run("get_driver", self.drivers.get(candidate.driver_id))),
        )
        .await;

        let mut results = Vec::with_capacity(candidates.len());
        for (candidate, lookup) in candidates.into_iter().zip(lookups) {
            match lookup {
                Ok(driver) if driver.is_working() => results.push(candidate),
                Ok(_) => {}
                // Reports can outlive a purged driver record.
                Err(AppError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        results.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        results.truncate(limit);
        Ok(results)
    }

    /// Deletes in chunks so an expired deadline stops between chunks, never
    /// inside one.
    pub async fn cleanup(
        &self,
        cutoff: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<usize, AppError> {
        let chunk = self.config.cleanup_chunk_size.max(1);
        let mut total = 0;

        info!(cutoff = %cutoff, "starting location cleanup");

        loop {
            if let Err(err) = deadline.check("cleanup") {
                warn!(deleted = total, "location cleanup interrupted by deadline");
                return Err(err);
            }

            let deleted = deadline
                .run(
                    "delete_old_locations",
                    self.locations.delete_older_than(cutoff, chunk),
                )
                .await?;
            total += deleted;
            self.metrics.locations_deleted_total.inc_by(deleted as u64);

            if deleted < chunk {
                break;
            }
        }

        info!(deleted = total, "location cleanup completed");
        Ok(total)
    }

    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.retention
    }

    async fn ensure_driver(&self, driver_id: Uuid, deadline: Deadline) -> Result<Driver, AppError> {
        let driver = deadline.run("get_driver", self.drivers.get(driver_id)).await?;
        if driver.is_deleted() {
            return Err(AppError::NotFound(format!("driver {driver_id}")));
        }
        Ok(driver)
    }

    fn record_reports(&self, outcome: &str, count: usize) {
        self.metrics
            .location_reports_total
            .with_label_values(&[outcome])
            .inc_by(count as u64);
    }
}

fn validate_coordinates(update: &LocationUpdate) -> Result<(), AppError> {
    if !is_valid_coordinate(update.latitude, update.longitude) {
        return Err(AppError::Validation(format!(
            "invalid location coordinates ({}, {})",
            update.latitude, update.longitude
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::QueuedEventSink;
    use crate::models::driver::{DriverStatus, NewDriver};
    use crate::store::memory::{MemoryDriverStore, MemoryLocationStore};

    struct Harness {
        tracker: LocationTracker,
        drivers: Arc<MemoryDriverStore>,
        locations: Arc<MemoryLocationStore>,
        metrics: Arc<Metrics>,
    }

    fn harness(config: TrackerConfig) -> Harness {
        let drivers = Arc::new(MemoryDriverStore::new());
        let locations = Arc::new(MemoryLocationStore::new());
        let (sink, _rx) = QueuedEventSink::new(1024);
        let metrics = Arc::new(Metrics::new());
        let tracker = LocationTracker::new(
            locations.clone(),
            drivers.clone(),
            Arc::new(sink),
            metrics.clone(),
            config,
        );
        Harness {
            tracker,
            drivers,
            locations,
            metrics,
        }
    }

    async fn driver(h: &Harness, status: DriverStatus) -> Uuid {
        let now = Utc::now();
        let seed = h.drivers.len();
        let mut driver = NewDriver {
            phone: format!("+7911{seed:07}"),
            email: format!("d{seed}@example.com"),
            first_name: "Anna".to_string(),
            last_name: "Smirnova".to_string(),
            middle_name: None,
            license_number: format!("LIC{seed:07}"),
            license_expiry: now + Duration::days(365),
        }
        .into_driver(now);
        driver.status = status;
        let id = driver.id;
        h.drivers.insert(driver).await.unwrap();
        id
    }

    fn at(driver_id: Uuid, lat: f64, lng: f64, minutes_ago: i64) -> LocationUpdate {
        LocationUpdate::new(driver_id, lat, lng).recorded_at(Utc::now() - Duration::minutes(minutes_ago))
    }

    #[tokio::test]
    async fn ingest_assigns_identity_and_receipt_time() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        let before = Utc::now();
        let report = h
            .tracker
            .ingest(LocationUpdate::new(id, 55.75, 37.61), Deadline::none())
            .await
            .unwrap();

        assert!(report.ingested_at >= before);
        assert_eq!(report.recorded_at, report.ingested_at);
        assert_eq!(h.locations.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ingest_rejects_bad_coordinates_and_unknown_drivers() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        for (lat, lng) in [(91.0, 0.0), (0.0, 181.0), (f64::NAN, 0.0)] {
            let err = h
                .tracker
                .ingest(LocationUpdate::new(id, lat, lng), Deadline::none())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let err = h
            .tracker
            .ingest(LocationUpdate::new(Uuid::new_v4(), 55.0, 37.0), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        h.drivers.soft_delete(id, Utc::now()).await.unwrap();
        let err = h
            .tracker
            .ingest(LocationUpdate::new(id, 55.0, 37.0), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(h.locations.count().await.unwrap(), 0);
        let rejected = h
            .metrics
            .location_reports_total
            .with_label_values(&["rejected"])
            .get();
        assert_eq!(rejected, 5);
    }

    #[tokio::test]
    async fn batch_with_one_bad_report_writes_nothing() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        let mut batch: Vec<_> = (0..5).map(|i| at(id, 55.75, 37.61, i)).collect();
        batch[3].latitude = 123.0;

        let err = h.tracker.ingest_batch(batch, Deadline::none()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.locations.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_with_unknown_driver_writes_nothing() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        let batch = vec![at(id, 55.75, 37.61, 2), at(Uuid::new_v4(), 55.75, 37.61, 1)];
        let err = h.tracker.ingest_batch(batch, Deadline::none()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.locations.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn valid_batch_is_fully_written() {
        let h = harness(TrackerConfig::default());
        let a = driver(&h, DriverStatus::Available).await;
        let b = driver(&h, DriverStatus::OnShift).await;

        let batch = vec![at(a, 55.75, 37.61, 3), at(b, 55.76, 37.62, 2), at(a, 55.77, 37.63, 1)];
        assert_eq!(h.tracker.ingest_batch(batch, Deadline::none()).await.unwrap(), 3);
        assert_eq!(h.locations.count().await.unwrap(), 3);
        assert_eq!(h.tracker.ingest_batch(Vec::new(), Deadline::none()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn current_position_goes_stale_after_ten_minutes() {
        let h = harness(TrackerConfig::default());
        let fresh = driver(&h, DriverStatus::Available).await;
        let stale = driver(&h, DriverStatus::Available).await;

        h.tracker.ingest(at(fresh, 55.75, 37.61, 9), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(stale, 55.75, 37.61, 11), Deadline::none()).await.unwrap();

        assert!(h.tracker.current_position(fresh, Deadline::none()).await.is_ok());
        let err = h
            .tracker
            .current_position(stale, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StaleData(_)));
    }

    #[tokio::test]
    async fn current_position_without_reports_is_not_found() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        let err = h.tracker.current_position(id, Deadline::none()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn late_upload_does_not_replace_current_position() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        h.tracker.ingest(at(id, 55.70, 37.60, 1), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(id, 55.80, 37.70, 5), Deadline::none()).await.unwrap();

        let current = h.tracker.current_position(id, Deadline::none()).await.unwrap();
        assert_eq!(current.latitude, 55.70);
    }

    #[tokio::test]
    async fn staleness_threshold_is_configurable() {
        let h = harness(TrackerConfig {
            staleness_threshold: Duration::minutes(1),
            ..TrackerConfig::default()
        });
        let id = driver(&h, DriverStatus::Available).await;
        h.tracker.ingest(at(id, 55.75, 37.61, 2), Deadline::none()).await.unwrap();

        let err = h.tracker.current_position(id, Deadline::none()).await.unwrap_err();
        assert_eq!(err.kind(), "stale_data");
    }

    #[tokio::test]
    async fn history_is_ascending_and_inclusive() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;
        let t0 = Utc::now() - Duration::hours(1);

        for minutes in [30, 0, 10, 20, 50] {
            let update = LocationUpdate::new(id, 55.75, 37.61).recorded_at(t0 + Duration::minutes(minutes));
            h.tracker.ingest(update, Deadline::none()).await.unwrap();
        }

        let history = h
            .tracker
            .history(id, t0 + Duration::minutes(10), t0 + Duration::minutes(30), Deadline::none())
            .await
            .unwrap();
        let offsets: Vec<i64> = history
            .iter()
            .map(|report| (report.recorded_at - t0).num_minutes())
            .collect();
        assert_eq!(offsets, vec![10, 20, 30]);

        let err = h
            .tracker
            .history(id, t0, t0 - Duration::minutes(1), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn statistics_over_history_window() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Busy).await;
        let t0 = Utc::now() - Duration::hours(2);

        let points = [
            (55.7558, 37.6173, 0, 0.0),
            (55.7650, 37.6250, 20, 45.0),
            (55.7558, 37.6173, 40, 0.0),
        ];
        for (lat, lng, minutes, speed) in points {
            let update = LocationUpdate::new(id, lat, lng)
                .recorded_at(t0 + Duration::minutes(minutes))
                .speed(speed);
            h.tracker.ingest(update, Deadline::none()).await.unwrap();
        }

        let stats = h
            .tracker
            .statistics(id, t0, t0 + Duration::minutes(40), Deadline::none())
            .await
            .unwrap();
        assert_eq!(stats.total_points, 3);
        assert_eq!(stats.max_speed_kmh, 45.0);
        assert_eq!(stats.time_span_minutes, 40);
        assert!(stats.distance_traveled_km > 1.6 && stats.distance_traveled_km < 2.4);
    }

    #[tokio::test]
    async fn nearby_filters_by_radius_status_and_limit() {
        let h = harness(TrackerConfig::default());
        let center = (55.7558, 37.6173);

        let close = driver(&h, DriverStatus::Available).await;
        let closer = driver(&h, DriverStatus::Busy).await;
        let middle = driver(&h, DriverStatus::OnShift).await;
        let offline = driver(&h, DriverStatus::Inactive).await;
        let far = driver(&h, DriverStatus::Available).await;

        h.tracker.ingest(at(close, 55.7600, 37.6173, 1), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(closer, 55.7570, 37.6173, 1), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(middle, 55.7800, 37.6173, 1), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(offline, 55.7560, 37.6173, 1), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(far, 56.5000, 37.6173, 1), Deadline::none()).await.unwrap();

        let query = |limit| NearbyQuery {
            lat: center.0,
            lon: center.1,
            radius_km: 5.0,
            limit: Some(limit),
        };

        let found = h.tracker.nearby(query(10), Deadline::none()).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|n| n.driver_id).collect();
        assert_eq!(ids, vec![closer, close, middle]);
        assert!(found.iter().all(|n| n.distance_km <= 5.0));
        assert!(found.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

        let limited = h.tracker.nearby(query(2), Deadline::none()).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].driver_id, closer);
    }

    #[tokio::test]
    async fn nearby_uses_only_the_latest_report_per_driver() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;

        h.tracker.ingest(at(id, 55.7558, 37.6173, 5), Deadline::none()).await.unwrap();
        h.tracker.ingest(at(id, 59.9343, 30.3351, 1), Deadline::none()).await.unwrap();

        let found = h
            .tracker
            .nearby(
                NearbyQuery {
                    lat: 55.7558,
                    lon: 37.6173,
                    radius_km: 10.0,
                    limit: None,
                },
                Deadline::none(),
            )
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn nearby_rejects_non_positive_radius() {
        let h = harness(TrackerConfig::default());
        for radius_km in [0.0, -1.0, f64::NAN] {
            let err = h
                .tracker
                .nearby(
                    NearbyQuery {
                        lat: 55.0,
                        lon: 37.0,
                        radius_km,
                        limit: None,
                    },
                    Deadline::none(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn nearby_skips_soft_deleted_drivers() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;
        h.tracker.ingest(at(id, 55.7558, 37.6173, 1), Deadline::none()).await.unwrap();
        h.drivers.soft_delete(id, Utc::now()).await.unwrap();

        let found = h
            .tracker
            .nearby(
                NearbyQuery {
                    lat: 55.7558,
                    lon: 37.6173,
                    radius_km: 1.0,
                    limit: None,
                },
                Deadline::none(),
            )
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_only_reports_before_cutoff() {
        let h = harness(TrackerConfig {
            cleanup_chunk_size: 2,
            ..TrackerConfig::default()
        });
        let id = driver(&h, DriverStatus::Available).await;
        let now = Utc::now();

        for days in [45, 40, 35, 31, 29, 1] {
            let update = LocationUpdate::new(id, 55.75, 37.61).recorded_at(now - Duration::days(days));
            h.tracker.ingest(update, Deadline::none()).await.unwrap();
        }
        let cutoff = h.tracker.retention_cutoff(now);
        let boundary = LocationUpdate::new(id, 55.75, 37.61).recorded_at(cutoff);
        h.tracker.ingest(boundary, Deadline::none()).await.unwrap();

        let deleted = h.tracker.cleanup(cutoff, Deadline::none()).await.unwrap();
        assert_eq!(deleted, 4);

        let remaining = h
            .tracker
            .history(id, now - Duration::days(365), now, Deadline::none())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|report| report.recorded_at >= cutoff));

        assert_eq!(h.tracker.cleanup(cutoff, Deadline::none()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_honours_an_expired_deadline() {
        let h = harness(TrackerConfig::default());
        let id = driver(&h, DriverStatus::Available).await;
        let update = LocationUpdate::new(id, 55.75, 37.61).recorded_at(Utc::now() - Duration::days(60));
        h.tracker.ingest(update, Deadline::none()).await.unwrap();

        let expired = Deadline::at(tokio::time::Instant::now() - std::time::Duration::from_millis(1));
        let err = h.tracker.cleanup(Utc::now(), expired).await.unwrap_err();

        assert_eq!(err.kind(), "timeout");
        assert_eq!(h.locations.count().await.unwrap(), 1);
    }
}
