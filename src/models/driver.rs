use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Registered,
    PendingVerification,
    Verified,
    Rejected,
    Available,
    OnShift,
    Busy,
    Inactive,
    Suspended,
    Blocked,
}

impl DriverStatus {
    pub const ALL: [DriverStatus; 10] = [
        DriverStatus::Registered,
        DriverStatus::PendingVerification,
        DriverStatus::Verified,
        DriverStatus::Rejected,
        DriverStatus::Available,
        DriverStatus::OnShift,
        DriverStatus::Busy,
        DriverStatus::Inactive,
        DriverStatus::Suspended,
        DriverStatus::Blocked,
    ];

    /// Targets reachable from this status in one transition.
    pub fn allowed_transitions(self) -> &'static [DriverStatus] {
        use DriverStatus::*;

        match self {
            Registered => &[PendingVerification, Blocked],
            PendingVerification => &[Verified, Rejected, Registered, Blocked],
            Verified => &[Available, Suspended, Blocked],
            Rejected => &[PendingVerification, Blocked],
            Available => &[OnShift, Inactive, Suspended, Blocked],
            OnShift => &[Busy, Available, Inactive, Suspended],
            Busy => &[OnShift, Available, Inactive],
            Inactive => &[Available, Suspended, Blocked],
            Suspended => &[Available, Blocked],
            Blocked => &[],
        }
    }

    pub fn can_transition_to(self, target: DriverStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Statuses eligible for proximity search.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            DriverStatus::Available | DriverStatus::OnShift | DriverStatus::Busy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriverStatus::Registered => "registered",
            DriverStatus::PendingVerification => "pending_verification",
            DriverStatus::Verified => "verified",
            DriverStatus::Rejected => "rejected",
            DriverStatus::Available => "available",
            DriverStatus::OnShift => "on_shift",
            DriverStatus::Busy => "busy",
            DriverStatus::Inactive => "inactive",
            DriverStatus::Suspended => "suspended",
            DriverStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for DriverStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        DriverStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown driver status '{raw}'"))
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub license_number: String,
    pub license_expiry: DateTime<Utc>,
    pub status: DriverStatus,
    pub current_rating: f64,
    pub total_trips: u64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Driver {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Soft-deleted drivers are never in effect working.
    pub fn is_working(&self) -> bool {
        !self.is_deleted() && self.status.is_working()
    }

    pub fn can_receive_work(&self) -> bool {
        !self.is_deleted() && self.status == DriverStatus::Available
    }

    pub fn is_license_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.license_expiry
    }

    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref() {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.last_name, self.first_name, middle)
            }
            _ => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriver {
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub license_number: String,
    pub license_expiry: DateTime<Utc>,
}

impl NewDriver {
    pub fn into_driver(self, now: DateTime<Utc>) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            phone: self.phone,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            middle_name: self.middle_name,
            license_number: self.license_number,
            license_expiry: self.license_expiry,
            status: DriverStatus::Registered,
            current_rating: 0.0,
            total_trips: 0,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Partial profile edit. Status, rating, trips and identity fields (phone,
/// license number) have their own operations and are not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub license_expiry: Option<DateTime<Utc>>,
}

impl DriverUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.middle_name.is_none()
            && self.license_expiry.is_none()
    }

    pub fn apply_to(&self, driver: &mut Driver) {
        if let Some(email) = &self.email {
            driver.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            driver.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            driver.last_name = last_name.clone();
        }
        if let Some(middle_name) = &self.middle_name {
            driver.middle_name = Some(middle_name.clone());
        }
        if let Some(license_expiry) = self.license_expiry {
            driver.license_expiry = license_expiry;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverSortField {
    #[default]
    CreatedAt,
    #[serde(alias = "rating")]
    CurrentRating,
    TotalTrips,
    LastName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Listing criteria. Soft-deleted drivers never match. `limit` and `offset`
/// apply after sorting; counting ignores them.
#[derive(Debug, Clone, Default)]
pub struct DriverFilter {
    /// Empty means any status.
    pub statuses: Vec<DriverStatus>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort_by: DriverSortField,
    pub sort_direction: SortDirection,
}

impl DriverFilter {
    pub fn with_status(status: DriverStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    pub fn matches(&self, driver: &Driver) -> bool {
        !driver.is_deleted()
            && (self.statuses.is_empty() || self.statuses.contains(&driver.status))
            && self.min_rating.is_none_or(|min| driver.current_rating >= min)
            && self.max_rating.is_none_or(|max| driver.current_rating <= max)
            && self.created_after.is_none_or(|after| driver.created_at >= after)
            && self.created_before.is_none_or(|before| driver.created_at <= before)
    }

    /// Ties fall back to creation time, then id, so pages are stable.
    pub fn compare(&self, a: &Driver, b: &Driver) -> Ordering {
        let primary = match self.sort_by {
            DriverSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            DriverSortField::CurrentRating => a.current_rating.total_cmp(&b.current_rating),
            DriverSortField::TotalTrips => a.total_trips.cmp(&b.total_trips),
            DriverSortField::LastName => a.last_name.cmp(&b.last_name),
        };
        let ordering = primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id));

        match self.sort_direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating) {
            if min > max {
                return Err(format!("min_rating {min} is greater than max_rating {max}"));
            }
        }
        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err("created_after is later than created_before".to_string());
            }
        }
        if self.limit == Some(0) {
            return Err("limit must be positive".to_string());
        }
        Ok(())
    }
}
