// Database queries for resident profiles

use super::{schema::ResidentRow, unique_violation, PgStore};
use crate::domain::resident::{Resident, ResidentFilter};
use crate::errors::{AppError, Result};
use crate::store::ResidentStore;
use async_trait::async_trait;
use sqlx::{types::Json, Postgres, QueryBuilder};
use uuid::Uuid;

const RESIDENT_COLUMNS: &str = "id, user_id, unit_number, block, vehicle_info, \
                                emergency_contacts, profile_photo, status, move_in_date, \
                                move_out_date, notes, created_at, updated_at";

#[async_trait]
impl ResidentStore for PgStore {
    async fn insert_resident(&self, resident: Resident) -> Result<Resident> {
        let sql = format!(
            "INSERT INTO residents ({RESIDENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {RESIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResidentRow>(&sql)
            .bind(resident.id)
            .bind(resident.user_id)
            .bind(&resident.unit_number)
            .bind(&resident.block)
            .bind(resident.vehicle_info.as_ref().map(Json))
            .bind(Json(&resident.emergency_contacts))
            .bind(&resident.profile_photo)
            .bind(resident.status)
            .bind(resident.move_in_date)
            .bind(resident.move_out_date)
            .bind(&resident.notes)
            .bind(resident.created_at)
            .bind(resident.updated_at)
            .fetch_one(self.pool())
            .await
            .map_err(|e| unique_violation(e, "Resident profile already exists for this user"))?;

        Ok(row.into())
    }

    async fn find_resident(&self, id: Uuid) -> Result<Option<Resident>> {
        let sql = format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = $1");
        let row = sqlx::query_as::<_, ResidentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_resident_by_user(&self, user_id: Uuid) -> Result<Option<Resident>> {
        let sql = format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE user_id = $1");
        let row = sqlx::query_as::<_, ResidentRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_residents(&self, filter: &ResidentFilter) -> Result<Vec<Resident>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE TRUE"
        ));
        if let Some(block) = &filter.block {
            query.push(" AND block = ").push_bind(block.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query.push(" ORDER BY block, unit_number");

        let rows = query
            .build_query_as::<ResidentRow>()
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_resident(&self, resident: Resident) -> Result<Resident> {
        let sql = format!(
            "UPDATE residents \
             SET unit_number = $2, block = $3, vehicle_info = $4, emergency_contacts = $5, \
                 profile_photo = $6, status = $7, move_in_date = $8, move_out_date = $9, \
                 notes = $10, updated_at = $11 \
             WHERE id = $1 \
             RETURNING {RESIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResidentRow>(&sql)
            .bind(resident.id)
            .bind(&resident.unit_number)
            .bind(&resident.block)
            .bind(resident.vehicle_info.as_ref().map(Json))
            .bind(Json(&resident.emergency_contacts))
            .bind(&resident.profile_photo)
            .bind(resident.status)
            .bind(resident.move_in_date)
            .bind(resident.move_out_date)
            .bind(&resident.notes)
            .bind(resident.updated_at)
            .fetch_optional(self.pool())
            .await?;

        row.map(Into::into)
            .ok_or(AppError::NotFound("Resident profile"))
    }

    async fn delete_resident_by_user(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM residents WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
