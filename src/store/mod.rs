//! Persistence collaborators consumed by the engines.
//!
//! The traits describe what the lifecycle manager and the location tracker
//! need from storage; `memory` provides the in-process implementations the
//! service runs with.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::document::{DriverDocument, VerificationStatus};
use crate::models::driver::{Driver, DriverFilter, DriverStatus, DriverUpdate};
use crate::models::location::{GeoPoint, PositionReport};

#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when a live driver already holds the
    /// phone or license number. The check and the write are one atomic step.
    async fn insert(&self, driver: Driver) -> Result<(), StoreError>;

    /// Returns soft-deleted drivers too; callers decide how to treat them.
    async fn get(&self, id: Uuid) -> Result<Driver, StoreError>;

    /// Matching drivers, sorted and paged as the filter asks.
    async fn list(&self, filter: &DriverFilter) -> Result<Vec<Driver>, StoreError>;

    /// Number of matching drivers, ignoring `limit` and `offset`.
    async fn count(&self, filter: &DriverFilter) -> Result<usize, StoreError>;

    /// Live drivers in a working status, best rated first.
    async fn active(&self) -> Result<Vec<Driver>, StoreError>;

    /// Applies `update` only if the stored version still equals
    /// `expected_version`.
    async fn update_profile(
        &self,
        id: Uuid,
        expected_version: u64,
        update: &DriverUpdate,
    ) -> Result<Driver, StoreError>;

    /// Writes `status` only if the stored version still equals
    /// `expected_version`.
    async fn update_status(
        &self,
        id: Uuid,
        expected_version: u64,
        status: DriverStatus,
    ) -> Result<Driver, StoreError>;

    /// Returns the previous rating.
    async fn update_rating(&self, id: Uuid, rating: f64) -> Result<f64, StoreError>;

    /// Returns the new trip count.
    async fn increment_trip_count(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: DriverDocument) -> Result<(), StoreError>;

    async fn set_status(
        &self,
        driver_id: Uuid,
        document_id: Uuid,
        status: VerificationStatus,
        at: DateTime<Utc>,
    ) -> Result<DriverDocument, StoreError>;

    async fn has_verified_license(&self, driver_id: Uuid, now: DateTime<Utc>)
        -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn create(&self, report: PositionReport) -> Result<(), StoreError>;

    /// All reports are written or none are.
    async fn create_batch(&self, reports: Vec<PositionReport>) -> Result<(), StoreError>;

    /// Greatest `recorded_at` for the driver.
    async fn latest(&self, driver_id: Uuid) -> Result<Option<PositionReport>, StoreError>;

    /// Inclusive range, ascending by `recorded_at`.
    async fn in_range(
        &self,
        driver_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionReport>, StoreError>;

    /// Deletes at most `limit` reports recorded before `cutoff`; returns the
    /// number deleted.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StoreError>;

    /// Latest report per driver whose position lies within `radius_km`.
    async fn latest_within(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<PositionReport>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
