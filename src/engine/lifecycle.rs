use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::Deadline;
use crate::engine::events::{notify, EventSink};
use crate::error::AppError;
use crate::models::document::{DriverDocument, NewDocument, VerificationStatus};
use crate::models::driver::{Driver, DriverFilter, DriverStatus, DriverUpdate, NewDriver};
use crate::models::event::{
    DriverEvent, DRIVER_BLOCKED, DRIVER_RATING_UPDATED, DRIVER_REGISTERED, DRIVER_STATUS_CHANGED,
};
use crate::observability::metrics::Metrics;
use crate::store::{DocumentStore, DriverStore};

pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Default)]
pub struct LifecycleConfig {
    /// Gate `PendingVerification -> Verified` on a verified license document.
    pub require_license_for_verification: bool,
}

pub struct StatusLifecycleManager {
    drivers: Arc<dyn DriverStore>,
    documents: Arc<dyn DocumentStore>,
    events: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
    config: LifecycleConfig,
}

impl StatusLifecycleManager {
    pub fn new(
        drivers: Arc<dyn DriverStore>,
        documents: Arc<dyn DocumentStore>,
        events: Arc<dyn EventSink>,
        metrics: Arc<Metrics>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            drivers,
            documents,
            events,
            metrics,
            config,
        }
    }

    pub async fn register(&self, new: NewDriver, deadline: Deadline) -> Result<Driver, AppError> {
        validate_new_driver(&new)?;

        let driver = new.into_driver(Utc::now());
        if let Err(err) = deadline
            .run("insert_driver", self.drivers.insert(driver.clone()))
            .await
        {
            if matches!(err, AppError::AlreadyExists(_)) {
                warn!(phone = %driver.phone, error = %err, "driver already exists");
            }
            return Err(err);
        }

        notify(
            self.events.as_ref(),
            &self.metrics,
            DriverEvent::new(
                DRIVER_REGISTERED,
                driver.id,
                json!({
                    "phone": driver.phone,
                    "email": driver.email,
                    "name": driver.full_name(),
                    "license_number": driver.license_number,
                }),
            ),
        )
        .await;

        info!(driver_id = %driver.id, "driver registered");
        Ok(driver)
    }

    /// Absent and soft-deleted drivers are both reported as not found.
    pub async fn get(&self, driver_id: Uuid, deadline: Deadline) -> Result<Driver, AppError> {
        let driver = deadline.run("get_driver", self.drivers.get(driver_id)).await?;
        if driver.is_deleted() {
            return Err(AppError::NotFound(format!("driver {driver_id}")));
        }
        Ok(driver)
    }

    pub async fn list(
        &self,
        filter: &DriverFilter,
        deadline: Deadline,
    ) -> Result<Vec<Driver>, AppError> {
        filter.validate().map_err(AppError::Validation)?;
        deadline.run("list_drivers", self.drivers.list(filter)).await
    }

    pub async fn count(&self, filter: &DriverFilter, deadline: Deadline) -> Result<usize, AppError> {
        filter.validate().map_err(AppError::Validation)?;
        deadline.run("count_drivers", self.drivers.count(filter)).await
    }

    pub async fn active_drivers(&self, deadline: Deadline) -> Result<Vec<Driver>, AppError> {
        deadline.run("active_drivers", self.drivers.active()).await
    }

    /// Edits profile fields; the result must still pass registration
    /// validation. An empty update returns the driver unchanged.
    pub async fn update_profile(
        &self,
        driver_id: Uuid,
        update: DriverUpdate,
        deadline: Deadline,
    ) -> Result<Driver, AppError> {
        let current = self.get(driver_id, deadline).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let mut edited = current.clone();
        update.apply_to(&mut edited);
        validate_profile(&edited)?;

        let updated = deadline
            .run(
                "update_profile",
                self.drivers
                    .update_profile(driver_id, current.version, &update),
            )
            .await?;

        info!(driver_id = %driver_id, "driver profile updated");
        Ok(updated)
    }

    pub async fn soft_delete(&self, driver_id: Uuid, deadline: Deadline) -> Result<(), AppError> {
        self.get(driver_id, deadline).await?;
        deadline
            .run("soft_delete", self.drivers.soft_delete(driver_id, Utc::now()))
            .await?;

        notify(
            self.events.as_ref(),
            &self.metrics,
            DriverEvent::new(DRIVER_BLOCKED, driver_id, json!({ "reason": "account_deleted" })),
        )
        .await;

        info!(driver_id = %driver_id, "driver soft-deleted");
        Ok(())
    }

    pub async fn change_status(
        &self,
        driver_id: Uuid,
        target: DriverStatus,
        deadline: Deadline,
    ) -> Result<DriverStatus, AppError> {
        let driver = self.get(driver_id, deadline).await?;
        let from = driver.status;

        if !from.can_transition_to(target) {
            self.record_transition("rejected");
            warn!(driver_id = %driver_id, from = %from, to = %target, "invalid status transition");
            return Err(AppError::InvalidTransition { from, to: target });
        }

        if self.config.require_license_for_verification && target == DriverStatus::Verified {
            let verified = deadline
                .run(
                    "has_verified_license",
                    self.documents.has_verified_license(driver_id, Utc::now()),
                )
                .await?;
            if !verified {
                self.record_transition("rejected");
                return Err(AppError::PreconditionFailed(
                    "license document not verified".to_string(),
                ));
            }
        }

        let updated = match deadline
            .run(
                "update_status",
                self.drivers.update_status(driver_id, driver.version, target),
            )
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.record_transition("error");
                return Err(err);
            }
        };
        self.record_transition("success");

        notify(
            self.events.as_ref(),
            &self.metrics,
            DriverEvent::new(
                DRIVER_STATUS_CHANGED,
                driver_id,
                json!({
                    "old_status": from,
                    "new_status": updated.status,
                    "changed_by": "system",
                }),
            ),
        )
        .await;

        info!(driver_id = %driver_id, old_status = %from, new_status = %updated.status, "driver status changed");
        Ok(updated.status)
    }

    pub async fn can_receive_work(
        &self,
        driver_id: Uuid,
        deadline: Deadline,
    ) -> Result<bool, AppError> {
        let driver = deadline.run("get_driver", self.drivers.get(driver_id)).await?;
        Ok(driver.can_receive_work())
    }

    pub async fn validate_for_assignment(
        &self,
        driver_id: Uuid,
        deadline: Deadline,
    ) -> Result<(), AppError> {
        let driver = deadline.run("get_driver", self.drivers.get(driver_id)).await?;
        let now = Utc::now();

        if !driver.can_receive_work() {
            return Err(AppError::PreconditionFailed(
                "driver is not available".to_string(),
            ));
        }

        if driver.is_license_expired(now) {
            return Err(AppError::PreconditionFailed(
                "driver license expired".to_string(),
            ));
        }

        let verified = deadline
            .run(
                "has_verified_license",
                self.documents.has_verified_license(driver_id, now),
            )
            .await?;
        if !verified {
            return Err(AppError::PreconditionFailed(
                "license document not verified".to_string(),
            ));
        }

        Ok(())
    }

    pub async fn update_rating(
        &self,
        driver_id: Uuid,
        rating: f64,
        deadline: Deadline,
    ) -> Result<(), AppError> {
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(AppError::Validation(format!(
                "invalid rating {rating}: must be between 0 and {MAX_RATING}"
            )));
        }

        self.get(driver_id, deadline).await?;
        let previous = deadline
            .run("update_rating", self.drivers.update_rating(driver_id, rating))
            .await?;

        notify(
            self.events.as_ref(),
            &self.metrics,
            DriverEvent::new(
                DRIVER_RATING_UPDATED,
                driver_id,
                json!({ "new_rating": rating, "previous_rating": previous }),
            ),
        )
        .await;

        Ok(())
    }

    pub async fn increment_trip_count(
        &self,
        driver_id: Uuid,
        deadline: Deadline,
    ) -> Result<u64, AppError> {
        self.get(driver_id, deadline).await?;
        deadline
            .run(
                "increment_trip_count",
                self.drivers.increment_trip_count(driver_id),
            )
            .await
    }

    pub async fn add_document(
        &self,
        driver_id: Uuid,
        new: NewDocument,
        deadline: Deadline,
    ) -> Result<DriverDocument, AppError> {
        if new.document_number.trim().is_empty() {
            return Err(AppError::Validation(
                "document number cannot be empty".to_string(),
            ));
        }

        self.get(driver_id, deadline).await?;
        let document = new.into_document(driver_id, Utc::now());
        deadline
            .run("insert_document", self.documents.insert(document.clone()))
            .await?;
        Ok(document)
    }

    pub async fn set_document_status(
        &self,
        driver_id: Uuid,
        document_id: Uuid,
        status: VerificationStatus,
        deadline: Deadline,
    ) -> Result<DriverDocument, AppError> {
        if status == VerificationStatus::Pending {
            return Err(AppError::Validation(
                "document can only be verified, rejected or expired".to_string(),
            ));
        }

        deadline
            .run(
                "set_document_status",
                self.documents
                    .set_status(driver_id, document_id, status, Utc::now()),
            )
            .await
    }

    fn record_transition(&self, outcome: &str) {
        self.metrics
            .status_transitions_total
            .with_label_values(&[outcome])
            .inc();
    }
}

fn validate_new_driver(new: &NewDriver) -> Result<(), AppError> {
    require_non_blank(&[
        ("phone", &new.phone),
        ("email", &new.email),
        ("first_name", &new.first_name),
        ("last_name", &new.last_name),
        ("license_number", &new.license_number),
    ])
}

fn validate_profile(driver: &Driver) -> Result<(), AppError> {
    require_non_blank(&[
        ("email", &driver.email),
        ("first_name", &driver.first_name),
        ("last_name", &driver.last_name),
    ])
}

fn require_non_blank(fields: &[(&str, &String)]) -> Result<(), AppError> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }
    Ok(())
}

/// Re-runs `op` while it fails with a retriable conflict, up to `attempts`
/// times in total.
pub async fn retry_on_conflict<T, F, Fut>(attempts: usize, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut remaining = attempts.max(1);
    loop {
        remaining -= 1;
        match op().await {
            Err(err) if err.is_retriable() && remaining > 0 => {
                warn!(error = %err, remaining, "retrying after conflict");
            }
            other => return other,
        }
    }
}
