use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A stored position report. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionReport {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Meters.
    pub accuracy: Option<f64>,
    /// km/h as reported by the device.
    pub speed: Option<f64>,
    /// Degrees.
    pub bearing: Option<f64>,
    pub address: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

impl PositionReport {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Inbound form of a position report.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdate {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub driver_id: Uuid,
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

impl LocationUpdate {
    pub fn new(driver_id: Uuid, latitude: f64, longitude: f64) -> Self {
        Self {
            id: None,
            driver_id,
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            bearing: None,
            address: None,
            recorded_at: None,
        }
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    pub fn speed(mut self, kmh: f64) -> Self {
        self.speed = Some(kmh);
        self
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    pub fn into_report(self, ingested_at: DateTime<Utc>) -> PositionReport {
        PositionReport {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            driver_id: self.driver_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            accuracy: self.accuracy,
            speed: self.speed,
            bearing: self.bearing,
            address: self.address,
            recorded_at: self.recorded_at.unwrap_or(ingested_at),
            ingested_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackStatistics {
    pub total_points: usize,
    pub distance_traveled_km: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub time_span_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyDriver {
    pub driver_id: Uuid,
    pub position: PositionReport,
    pub distance_km: f64,
}
