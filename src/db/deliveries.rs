// Database queries for deliveries

use super::{schema::DeliveryRow, PgStore};
use crate::domain::delivery::Delivery;
use crate::errors::{AppError, Result};
use crate::store::DeliveryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

const DELIVERY_COLUMNS: &str = "id, resident_id, delivery_company, tracking_number, \
                                authorized_by, expected_date, delivered_at, notes, status, \
                                items, delivery_person, created_at, updated_at";

#[async_trait]
impl DeliveryStore for PgStore {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery> {
        let sql = format!(
            "INSERT INTO deliveries ({DELIVERY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {DELIVERY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(delivery.id)
            .bind(delivery.resident_id)
            .bind(&delivery.delivery_company)
            .bind(&delivery.tracking_number)
            .bind(delivery.authorized_by)
            .bind(delivery.expected_date)
            .bind(delivery.delivered_at)
            .bind(&delivery.notes)
            .bind(delivery.status)
            .bind(Json(&delivery.items))
            .bind(delivery.delivery_person.as_ref().map(Json))
            .bind(delivery.created_at)
            .bind(delivery.updated_at)
            .fetch_one(self.pool())
            .await?;
        Ok(row.into())
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>> {
        let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = $1");
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_delivery(&self, delivery: Delivery) -> Result<Delivery> {
        let sql = format!(
            "UPDATE deliveries \
             SET delivery_company = $2, tracking_number = $3, expected_date = $4, \
                 delivered_at = $5, notes = $6, status = $7, items = $8, \
                 delivery_person = $9, updated_at = $10 \
             WHERE id = $1 \
             RETURNING {DELIVERY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(delivery.id)
            .bind(&delivery.delivery_company)
            .bind(&delivery.tracking_number)
            .bind(delivery.expected_date)
            .bind(delivery.delivered_at)
            .bind(&delivery.notes)
            .bind(delivery.status)
            .bind(Json(&delivery.items))
            .bind(delivery.delivery_person.as_ref().map(Json))
            .bind(delivery.updated_at)
            .fetch_optional(self.pool())
            .await?;

        row.map(Into::into).ok_or(AppError::NotFound("Delivery"))
    }

    async fn list_deliveries(&self, resident_id: Option<Uuid>) -> Result<Vec<Delivery>> {
        let sql = format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries \
             WHERE ($1::uuid IS NULL OR resident_id = $1) \
             ORDER BY expected_date DESC"
        );
        let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(resident_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_pending_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Delivery>> {
        let sql = format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries \
             WHERE status = 'authorized' AND expected_date <= $1 \
             ORDER BY expected_date ASC"
        );
        let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(now)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
