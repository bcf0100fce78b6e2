// Row shapes for tables whose nested fields are stored as JSONB

use crate::domain::{
    delivery::{Delivery, DeliveryItem, DeliveryPerson, DeliveryStatus},
    resident::{EmergencyContact, Resident, VehicleInfo},
    user::AccountStatus,
    visit::{GuestVisit, VisitStatus},
};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

// ============================================================================
// Resident
// ============================================================================

#[derive(Debug, FromRow)]
pub struct ResidentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub unit_number: String,
    pub block: String,
    pub vehicle_info: Option<Json<VehicleInfo>>,
    pub emergency_contacts: Json<Vec<EmergencyContact>>,
    pub profile_photo: Option<String>,
    pub status: AccountStatus,
    pub move_in_date: DateTime<Utc>,
    pub move_out_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResidentRow> for Resident {
    fn from(row: ResidentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            unit_number: row.unit_number,
            block: row.block,
            vehicle_info: row.vehicle_info.map(|v| v.0),
            emergency_contacts: row.emergency_contacts.0,
            profile_photo: row.profile_photo,
            status: row.status,
            move_in_date: row.move_in_date,
            move_out_date: row.move_out_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Guest visit
// ============================================================================

#[derive(Debug, FromRow)]
pub struct VisitRow {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub guest_code_id: Uuid,
    pub guest_name: String,
    pub visit_date: DateTime<Utc>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub vehicle_info: Option<Json<VehicleInfo>>,
    pub number_of_guests: i32,
    pub purpose: Option<String>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub security_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitRow> for GuestVisit {
    fn from(row: VisitRow) -> Self {
        Self {
            id: row.id,
            resident_id: row.resident_id,
            guest_code_id: row.guest_code_id,
            guest_name: row.guest_name,
            visit_date: row.visit_date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            vehicle_info: row.vehicle_info.map(|v| v.0),
            number_of_guests: row.number_of_guests,
            purpose: row.purpose,
            status: row.status,
            notes: row.notes,
            security_notes: row.security_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, FromRow)]
pub struct DeliveryRow {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub delivery_company: String,
    pub tracking_number: Option<String>,
    pub authorized_by: Uuid,
    pub expected_date: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: DeliveryStatus,
    pub items: Json<Vec<DeliveryItem>>,
    pub delivery_person: Option<Json<DeliveryPerson>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            id: row.id,
            resident_id: row.resident_id,
            delivery_company: row.delivery_company,
            tracking_number: row.tracking_number,
            authorized_by: row.authorized_by,
            expected_date: row.expected_date,
            delivered_at: row.delivered_at,
            notes: row.notes,
            status: row.status,
            items: row.items.0,
            delivery_person: row.delivery_person.map(|p| p.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
