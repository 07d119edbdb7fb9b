use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DriverLicense,
    MedicalCertificate,
    VehicleRegistration,
    Insurance,
    Passport,
    TaxiPermit,
    WorkPermit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDocument {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub document_type: DocumentType,
    pub document_number: String,
    pub expiry_date: DateTime<Utc>,
    pub status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DriverDocument {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }

    pub fn is_verified(&self, now: DateTime<Utc>) -> bool {
        self.status == VerificationStatus::Verified && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub document_type: DocumentType,
    pub document_number: String,
    pub expiry_date: DateTime<Utc>,
}

impl NewDocument {
    pub fn into_document(self, driver_id: Uuid, now: DateTime<Utc>) -> DriverDocument {
        DriverDocument {
            id: Uuid::new_v4(),
            driver_id,
            document_type: self.document_type,
            document_number: self.document_number,
            expiry_date: self.expiry_date,
            status: VerificationStatus::Pending,
            verified_at: None,
            created_at: now,
        }
    }
}
