use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::geo::{haversine_km, BoundingBox};
use crate::models::document::{DocumentType, DriverDocument, VerificationStatus};
use crate::models::driver::{Driver, DriverFilter, DriverStatus, DriverUpdate};
use crate::models::location::{GeoPoint, PositionReport};
use crate::store::{DocumentStore, DriverStore, LocationStore};

/// Each entry is locked for the duration of a single mutation, which is what
/// serializes concurrent updates to one driver. Phone and license numbers of
/// live drivers are claimed in their own maps so registration cannot race.
#[derive(Default)]
pub struct MemoryDriverStore {
    drivers: DashMap<Uuid, Driver>,
    phones: DashMap<String, Uuid>,
    licenses: DashMap<String, Uuid>,
}

impl MemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    fn matching(&self, filter: &DriverFilter) -> Vec<Driver> {
        self.drivers
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

fn driver_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("driver {id}"))
}

#[async_trait]
impl DriverStore for MemoryDriverStore {
    async fn insert(&self, driver: Driver) -> Result<(), StoreError> {
        match self.phones.entry(driver.phone.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!("phone {}", driver.phone)));
            }
            Entry::Vacant(slot) => {
                slot.insert(driver.id);
            }
        }

        let license_taken = match self.licenses.entry(driver.license_number.clone()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(driver.id);
                false
            }
        };
        if license_taken {
            self.phones.remove(&driver.phone);
            return Err(StoreError::Duplicate(format!(
                "license number {}",
                driver.license_number
            )));
        }

        self.drivers.insert(driver.id, driver);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Driver, StoreError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| driver_not_found(id))
    }

    async fn list(&self, filter: &DriverFilter) -> Result<Vec<Driver>, StoreError> {
        let mut drivers = self.matching(filter);
        drivers.sort_by(|a, b| filter.compare(a, b));

        let page = drivers
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }

    async fn count(&self, filter: &DriverFilter) -> Result<usize, StoreError> {
        Ok(self
            .drivers
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count())
    }

    async fn active(&self) -> Result<Vec<Driver>, StoreError> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| entry.is_working())
            .map(|entry| entry.value().clone())
            .collect();

        drivers.sort_by(|a, b| {
            b.current_rating
                .total_cmp(&a.current_rating)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(drivers)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        expected_version: u64,
        update: &DriverUpdate,
    ) -> Result<Driver, StoreError> {
        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

        if driver.version != expected_version {
            return Err(StoreError::VersionConflict(format!("driver {id}")));
        }

        update.apply_to(&mut driver);
        driver.version += 1;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_version: u64,
        status: DriverStatus,
    ) -> Result<Driver, StoreError> {
        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

        if driver.version != expected_version {
            return Err(StoreError::VersionConflict(format!("driver {id}")));
        }

        driver.status = status;
        driver.version += 1;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    async fn update_rating(&self, id: Uuid, rating: f64) -> Result<f64, StoreError> {
        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

        let previous = driver.current_rating;
        driver.current_rating = rating;
        driver.version += 1;
        driver.updated_at = Utc::now();
        Ok(previous)
    }

    async fn increment_trip_count(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

        driver.total_trips = driver.total_trips.saturating_add(1);
        driver.version += 1;
        driver.updated_at = Utc::now();
        Ok(driver.total_trips)
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let (phone, license_number) = {
            let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

            driver.deleted_at = Some(at);
            driver.version += 1;
            driver.updated_at = at;
            (driver.phone.clone(), driver.license_number.clone())
        };

        // Release the identity so the phone and license can register again.
        self.phones.remove_if(&phone, |_, owner| *owner == id);
        self.licenses.remove_if(&license_number, |_, owner| *owner == id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<Uuid, Vec<DriverDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: DriverDocument) -> Result<(), StoreError> {
        self.documents
            .entry(document.driver_id)
            .or_default()
            .push(document);
        Ok(())
    }

    async fn set_status(
        &self,
        driver_id: Uuid,
        document_id: Uuid,
        status: VerificationStatus,
        at: DateTime<Utc>,
    ) -> Result<DriverDocument, StoreError> {
        let mut documents = self
            .documents
            .get_mut(&driver_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))?;

        let document = documents
            .iter_mut()
            .find(|doc| doc.id == document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))?;

        document.status = status;
        document.verified_at = (status == VerificationStatus::Verified).then_some(at);
        Ok(document.clone())
    }

    async fn has_verified_license(
        &self,
        driver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.documents.get(&driver_id).is_some_and(|documents| {
            documents
                .iter()
                .any(|doc| doc.document_type == DocumentType::DriverLicense && doc.is_verified(now))
        }))
    }
}

/// Reports are kept per driver in ascending `recorded_at` order regardless of
/// arrival order.
#[derive(Default)]
pub struct MemoryLocationStore {
    reports: DashMap<Uuid, Vec<PositionReport>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.iter().map(|track| track.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, report: PositionReport) {
        let mut track = self.reports.entry(report.driver_id).or_default();
        let idx = track.partition_point(|existing| existing.recorded_at <= report.recorded_at);
        track.insert(idx, report);
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn create(&self, report: PositionReport) -> Result<(), StoreError> {
        self.append(report);
        Ok(())
    }

    async fn create_batch(&self, reports: Vec<PositionReport>) -> Result<(), StoreError> {
        for report in reports {
            self.append(report);
        }
        Ok(())
    }

    async fn latest(&self, driver_id: Uuid) -> Result<Option<PositionReport>, StoreError> {
        Ok(self
            .reports
            .get(&driver_id)
            .and_then(|track| track.last().cloned()))
    }

    async fn in_range(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionReport>, StoreError> {
        let Some(track) = self.reports.get(&driver_id) else {
            return Ok(Vec::new());
        };

        let start = track.partition_point(|report| report.recorded_at < from);
        let end = track.partition_point(|report| report.recorded_at <= to);
        Ok(track[start..end.max(start)].to_vec())
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StoreError> {
        let mut deleted = 0;

        for mut track in self.reports.iter_mut() {
            if deleted >= limit {
                break;
            }
            let expired = track.partition_point(|report| report.recorded_at < cutoff);
            let take = expired.min(limit - deleted);
            track.drain(..take);
            deleted += take;
        }

        self.reports.retain(|_, track| !track.is_empty());
        Ok(deleted)
    }

    async fn latest_within(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<PositionReport>, StoreError> {
        let bbox = BoundingBox::around(&center, radius_km);

        Ok(self
            .reports
            .iter()
            .filter_map(|track| track.last().cloned())
            .filter(|report| bbox.contains(&report.point()))
            .filter(|report| haversine_km(&center, &report.point()) <= radius_km)
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::location::LocationUpdate;

    fn report(driver_id: Uuid, minutes_ago: i64) -> PositionReport {
        let now = Utc::now();
        LocationUpdate::new(driver_id, 55.75, 37.61)
            .recorded_at(now - Duration::minutes(minutes_ago))
            .into_report(now)
    }

    #[tokio::test]
    async fn latest_is_resolved_by_recorded_at_not_arrival() {
        let store = MemoryLocationStore::new();
        let driver_id = Uuid::new_v4();

        let newest = report(driver_id, 1);
        let newest_id = newest.id;
        store.create(newest).await.unwrap();
        store.create(report(driver_id, 30)).await.unwrap();
        store.create(report(driver_id, 5)).await.unwrap();

        let latest = store.latest(driver_id).await.unwrap().unwrap();
        assert_eq!(latest.id, newest_id);
    }

    #[tokio::test]
    async fn chunked_delete_respects_limit() {
        let store = MemoryLocationStore::new();
        let driver_id = Uuid::new_v4();
        for minutes in [100, 90, 80, 10] {
            store.create(report(driver_id, minutes)).await.unwrap();
        }

        let cutoff = Utc::now() - Duration::minutes(60);
        assert_eq!(store.delete_older_than(cutoff, 2).await.unwrap(), 2);
        assert_eq!(store.delete_older_than(cutoff, 2).await.unwrap(), 1);
        assert_eq!(store.delete_older_than(cutoff, 2).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    fn driver(phone: &str, license_number: &str) -> Driver {
        let now = Utc::now();
        crate::models::driver::NewDriver {
            phone: phone.into(),
            email: "x@y.z".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            middle_name: None,
            license_number: license_number.into(),
            license_expiry: now + Duration::days(30),
        }
        .into_driver(now)
    }

    #[tokio::test]
    async fn phone_and_license_are_unique_among_live_drivers() {
        let store = MemoryDriverStore::new();
        let first = driver("+7001", "L1");
        let first_id = first.id;
        store.insert(first).await.unwrap();

        let err = store.insert(driver("+7001", "L2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        let err = store.insert(driver("+7002", "L1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // The failed license claim must not keep the phone reserved.
        store.insert(driver("+7002", "L3")).await.unwrap();

        store.soft_delete(first_id, Utc::now()).await.unwrap();
        store.insert(driver("+7001", "L1")).await.unwrap();
        assert_eq!(store.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn racing_inserts_claim_a_phone_once() {
        let store = std::sync::Arc::new(MemoryDriverStore::new());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(driver("+7555", &format!("L{i}"))).await })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => inserted += 1,
                Err(err) => assert!(matches!(err, StoreError::Duplicate(_))),
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn list_pages_after_sorting_and_count_ignores_paging() {
        let store = MemoryDriverStore::new();
        for (i, rating) in [3.0, 5.0, 4.0, 1.0].into_iter().enumerate() {
            let mut d = driver(&format!("+71{i}"), &format!("L{i}"));
            d.current_rating = rating;
            store.insert(d).await.unwrap();
        }

        let filter = DriverFilter {
            sort_by: crate::models::driver::DriverSortField::CurrentRating,
            limit: Some(2),
            offset: 1,
            ..DriverFilter::default()
        };
        let page: Vec<f64> = store
            .list(&filter)
            .await
            .unwrap()
            .iter()
            .map(|d| d.current_rating)
            .collect();

        assert_eq!(page, vec![4.0, 3.0]);
        assert_eq!(store.count(&filter).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn profile_update_is_version_checked() {
        let store = MemoryDriverStore::new();
        let d = driver("+7001", "L1");
        let id = d.id;
        store.insert(d).await.unwrap();

        let update = DriverUpdate {
            email: Some("new@example.com".into()),
            ..DriverUpdate::default()
        };
        let updated = store.update_profile(id, 0, &update).await.unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.version, 1);

        let err = store.update_profile(id, 0, &update).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryDriverStore::new();
        let now = Utc::now();
        let driver = crate::models::driver::NewDriver {
            phone: "+7000".into(),
            email: "x@y.z".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            middle_name: None,
            license_number: "L1".into(),
            license_expiry: now + Duration::days(30),
        }
        .into_driver(now);
        let id = driver.id;
        store.insert(driver).await.unwrap();

        store
            .update_status(id, 0, DriverStatus::PendingVerification)
            .await
            .unwrap();
        let err = store
            .update_status(id, 0, DriverStatus::Blocked)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::VersionConflict(_)));
        assert_eq!(
            store.get(id).await.unwrap().status,
            DriverStatus::PendingVerification
        );
    }
}
