use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::tracker::NearbyQuery;
use crate::error::AppError;
use crate::models::location::{LocationUpdate, NearbyDriver, PositionReport, TrackStatistics};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/:id/locations", post(report_location))
        .route("/drivers/:id/locations/batch", post(report_batch))
        .route("/drivers/:id/locations/current", get(current_location))
        .route("/drivers/:id/locations/history", get(location_history))
        .route("/drivers/:id/locations/stats", get(location_stats))
        .route("/locations/nearby", get(nearby_drivers))
        .route("/locations/cleanup", post(cleanup_locations))
}

#[derive(Deserialize)]
pub struct LocationReportRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LocationReportRequest {
    fn into_update(self, driver_id: Uuid) -> LocationUpdate {
        LocationUpdate {
            id: self.id,
            driver_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            accuracy: self.accuracy,
            speed: self.speed,
            bearing: self.bearing,
            address: self.address,
            recorded_at: self.recorded_at,
        }
    }
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub locations: Vec<LocationReportRequest>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub accepted: usize,
}

#[derive(Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub cutoff: DateTime<Utc>,
    pub deleted: usize,
}

async fn report_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationReportRequest>,
) -> Result<Json<PositionReport>, AppError> {
    let report = state
        .tracker
        .ingest(payload.into_update(id), state.deadline())
        .await?;
    Ok(Json(report))
}

async fn report_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let updates = payload
        .locations
        .into_iter()
        .map(|location| location.into_update(id))
        .collect();

    let accepted = state
        .tracker
        .ingest_batch(updates, state.deadline())
        .await?;
    Ok(Json(BatchResponse { accepted }))
}

async fn current_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PositionReport>, AppError> {
    let report = state
        .tracker
        .current_position(id, state.deadline())
        .await?;
    Ok(Json(report))
}

async fn location_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(range): Query<TimeRange>,
) -> Result<Json<Vec<PositionReport>>, AppError> {
    let reports = state
        .tracker
        .history(id, range.from, range.to, state.deadline())
        .await?;
    Ok(Json(reports))
}

async fn location_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(range): Query<TimeRange>,
) -> Result<Json<TrackStatistics>, AppError> {
    let stats = state
        .tracker
        .statistics(id, range.from, range.to, state.deadline())
        .await?;
    Ok(Json(stats))
}

async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyDriver>>, AppError> {
    let drivers = state.tracker.nearby(query, state.deadline()).await?;
    Ok(Json(drivers))
}

async fn cleanup_locations(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, AppError> {
    let cutoff = payload
        .before
        .unwrap_or_else(|| state.tracker.retention_cutoff(Utc::now()));
    let deleted = state.tracker.cleanup(cutoff, state.deadline()).await?;
    Ok(Json(CleanupResponse { cutoff, deleted }))
}
