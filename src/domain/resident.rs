// Resident profiles: the one-to-one extension of a resident identity

use super::user::AccountStatus;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub plate_number: Option<String>,
}

impl VehicleInfo {
    /// Trim every field and upper-case the plate.
    pub fn normalized(self) -> Self {
        let trim = |v: Option<String>| super::optional(v);
        Self {
            make: trim(self.make),
            model: trim(self.model),
            color: trim(self.color),
            plate_number: trim(self.plate_number).map(|p| p.to_uppercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

impl EmergencyContact {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Emergency contact name is required".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Emergency contact phone is required".to_string(),
            ));
        }
        super::user::validate_phone(&self.phone)?;
        if self.relationship.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Relationship is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: Uuid,
    pub user_id: Uuid,
    pub unit_number: String,
    pub block: String,
    pub vehicle_info: Option<VehicleInfo>,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub profile_photo: Option<String>,
    pub status: AccountStatus,
    pub move_in_date: DateTime<Utc>,
    pub move_out_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resident {
    /// New active profile for `user_id`, moved in at `now`.
    pub fn new(user_id: Uuid, unit_number: &str, block: &str, now: DateTime<Utc>) -> Result<Self> {
        let unit_number = normalize_unit(unit_number)?;
        let block = block.trim().to_string();
        if block.is_empty() {
            return Err(AppError::ValidationError("Block is required".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            unit_number,
            block,
            vehicle_info: None,
            emergency_contacts: Vec::new(),
            profile_photo: None,
            status: AccountStatus::Active,
            move_in_date: now,
            move_out_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Unit numbers are stored trimmed and upper-cased.
pub fn normalize_unit(unit_number: &str) -> Result<String> {
    let unit = unit_number.trim().to_uppercase();
    if unit.is_empty() {
        return Err(AppError::ValidationError(
            "Unit number is required".to_string(),
        ));
    }
    Ok(unit)
}

/// Resident with the owning identity's name and email, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentWithOwner {
    #[serde(flatten)]
    pub resident: Resident,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResidentFilter {
    pub block: Option<String>,
    pub status: Option<AccountStatus>,
}

impl ResidentFilter {
    pub fn matches(&self, resident: &Resident) -> bool {
        self.block.as_ref().map_or(true, |b| &resident.block == b)
            && self.status.map_or(true, |s| resident.status == s)
    }
}
