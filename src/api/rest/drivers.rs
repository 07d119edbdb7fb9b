use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::retry_on_conflict;
use crate::error::AppError;
use crate::models::document::{DriverDocument, NewDocument, VerificationStatus};
use crate::models::driver::{
    Driver, DriverFilter, DriverSortField, DriverStatus, DriverUpdate, NewDriver, SortDirection,
};
use crate::state::AppState;

const CONFLICT_ATTEMPTS: usize = 3;
const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/active", get(active_drivers))
        .route(
            "/drivers/:id",
            get(get_driver).put(update_driver).delete(delete_driver),
        )
        .route("/drivers/:id/status", patch(change_status))
        .route("/drivers/:id/availability", get(availability))
        .route("/drivers/:id/assignment-check", post(assignment_check))
        .route("/drivers/:id/rating", patch(update_rating))
        .route("/drivers/:id/trips", post(increment_trips))
        .route("/drivers/:id/documents", post(add_document))
        .route(
            "/drivers/:id/documents/:document_id",
            patch(update_document_status),
        )
}

/// `status` takes a comma-separated list, e.g. `available,on_shift`.
#[derive(Deserialize)]
pub struct ListDriversQuery {
    pub status: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<DriverSortField>,
    pub sort_direction: Option<SortDirection>,
}

impl ListDriversQuery {
    fn into_filter(self) -> Result<DriverFilter, AppError> {
        let statuses = match self.status.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::parse::<DriverStatus>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(AppError::Validation)?,
            None => Vec::new(),
        };

        // Newest first unless a sort field is named, which then defaults to
        // ascending.
        let (sort_by, sort_direction) = match self.sort_by {
            Some(field) => (field, self.sort_direction.unwrap_or(SortDirection::Asc)),
            None => (
                DriverSortField::CreatedAt,
                self.sort_direction.unwrap_or(SortDirection::Desc),
            ),
        };

        Ok(DriverFilter {
            statuses,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            created_after: self.created_after,
            created_before: self.created_before,
            limit: Some(
                self.limit
                    .filter(|limit| *limit > 0)
                    .unwrap_or(DEFAULT_PAGE_SIZE)
                    .min(MAX_PAGE_SIZE),
            ),
            offset: self.offset.unwrap_or(0),
            sort_by,
            sort_direction,
        })
    }
}

#[derive(Serialize)]
pub struct DriverPage {
    pub drivers: Vec<Driver>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Serialize)]
pub struct ActiveDriversResponse {
    pub drivers: Vec<Driver>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: DriverStatus,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub driver_id: Uuid,
    pub status: DriverStatus,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub driver_id: Uuid,
    pub can_receive_work: bool,
}

#[derive(Deserialize)]
pub struct UpdateRatingRequest {
    pub rating: f64,
}

#[derive(Serialize)]
pub struct TripsResponse {
    pub driver_id: Uuid,
    pub total_trips: u64,
}

#[derive(Deserialize)]
pub struct DocumentStatusRequest {
    pub status: VerificationStatus,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDriver>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.lifecycle.register(payload, state.deadline()).await?;
    Ok(Json(driver))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDriversQuery>,
) -> Result<Json<DriverPage>, AppError> {
    let filter = query.into_filter()?;
    let deadline = state.deadline();

    let drivers = state.lifecycle.list(&filter, deadline).await?;
    let total = state.lifecycle.count(&filter, deadline).await?;

    Ok(Json(DriverPage {
        has_more: filter.offset + drivers.len() < total,
        limit: filter.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        offset: filter.offset,
        total,
        drivers,
    }))
}

async fn active_drivers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActiveDriversResponse>, AppError> {
    let drivers = state.lifecycle.active_drivers(state.deadline()).await?;
    Ok(Json(ActiveDriversResponse {
        count: drivers.len(),
        drivers,
    }))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.lifecycle.get(id, state.deadline()).await?;
    Ok(Json(driver))
}

async fn update_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverUpdate>,
) -> Result<Json<Driver>, AppError> {
    let deadline = state.deadline();
    let driver = retry_on_conflict(CONFLICT_ATTEMPTS, || {
        state
            .lifecycle
            .update_profile(id, payload.clone(), deadline)
    })
    .await?;
    Ok(Json(driver))
}

async fn delete_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.soft_delete(id, state.deadline()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let deadline = state.deadline();
    let status = retry_on_conflict(CONFLICT_ATTEMPTS, || {
        state.lifecycle.change_status(id, payload.status, deadline)
    })
    .await?;

    Ok(Json(StatusResponse {
        driver_id: id,
        status,
    }))
}

async fn availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let can_receive_work = state.lifecycle.can_receive_work(id, state.deadline()).await?;
    Ok(Json(AvailabilityResponse {
        driver_id: id,
        can_receive_work,
    }))
}

async fn assignment_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .lifecycle
        .validate_for_assignment(id, state.deadline())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRatingRequest>,
) -> Result<StatusCode, AppError> {
    let deadline = state.deadline();
    retry_on_conflict(CONFLICT_ATTEMPTS, || {
        state.lifecycle.update_rating(id, payload.rating, deadline)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn increment_trips(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripsResponse>, AppError> {
    let total_trips = state
        .lifecycle
        .increment_trip_count(id, state.deadline())
        .await?;
    Ok(Json(TripsResponse {
        driver_id: id,
        total_trips,
    }))
}

async fn add_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewDocument>,
) -> Result<Json<DriverDocument>, AppError> {
    let document = state
        .lifecycle
        .add_document(id, payload, state.deadline())
        .await?;
    Ok(Json(document))
}

async fn update_document_status(
    State(state): State<Arc<AppState>>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DocumentStatusRequest>,
) -> Result<Json<DriverDocument>, AppError> {
    let document = state
        .lifecycle
        .set_document_status(id, document_id, payload.status, state.deadline())
        .await?;
    Ok(Json(document))
}
