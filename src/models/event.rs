use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DRIVER_REGISTERED: &str = "driver.registered";
pub const DRIVER_STATUS_CHANGED: &str = "driver.status.changed";
pub const DRIVER_RATING_UPDATED: &str = "driver.rating.updated";
pub const DRIVER_LOCATION_UPDATED: &str = "driver.location.updated";
pub const DRIVER_BLOCKED: &str = "driver.blocked";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverEvent {
    pub event_type: String,
    pub driver_id: Uuid,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl DriverEvent {
    pub fn new(event_type: &str, driver_id: Uuid, payload: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            driver_id,
            payload,
            occurred_at: Utc::now(),
        }
    }
}
