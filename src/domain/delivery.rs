// Resident-authorized delivery windows

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Authorized,
    Delivered,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryItem {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

impl DeliveryItem {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Item description is required".to_string(),
            ));
        }
        if self.quantity < 1 {
            return Err(AppError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPerson {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub delivery_company: String,
    pub tracking_number: Option<String>,
    pub authorized_by: Uuid,
    pub expected_date: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: DeliveryStatus,
    pub items: Vec<DeliveryItem>,
    pub delivery_person: Option<DeliveryPerson>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Any status may follow any other; entering `delivered` stamps the time.
    pub fn set_status(&mut self, status: DeliveryStatus, now: DateTime<Utc>) {
        self.status = status;
        if status == DeliveryStatus::Delivered {
            self.delivered_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Authorized and due: the expected date has passed without a terminal status.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Authorized && self.expected_date <= now
    }
}

/// Projection shown alongside access logs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub company: String,
    pub tracking_number: Option<String>,
}

impl From<&Delivery> for DeliverySummary {
    fn from(delivery: &Delivery) -> Self {
        Self {
            company: delivery.delivery_company.clone(),
            tracking_number: delivery.tracking_number.clone(),
        }
    }
}
