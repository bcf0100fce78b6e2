// Database queries for guest visits

use super::{schema::VisitRow, PgStore};
use crate::domain::visit::{GuestVisit, VisitFilter};
use crate::errors::{AppError, Result};
use crate::store::VisitStore;
use async_trait::async_trait;
use sqlx::{types::Json, Postgres, QueryBuilder};
use uuid::Uuid;

const VISIT_COLUMNS: &str = "id, resident_id, guest_code_id, guest_name, visit_date, \
                             check_in_time, check_out_time, vehicle_info, number_of_guests, \
                             purpose, status, notes, security_notes, created_at, updated_at";

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &VisitFilter) {
    if let Some(resident_id) = filter.resident_id {
        query.push(" AND resident_id = ").push_bind(resident_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
}

#[async_trait]
impl VisitStore for PgStore {
    async fn insert_visit(&self, visit: GuestVisit) -> Result<GuestVisit> {
        let sql = format!(
            "INSERT INTO guest_visits ({VISIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {VISIT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VisitRow>(&sql)
            .bind(visit.id)
            .bind(visit.resident_id)
            .bind(visit.guest_code_id)
            .bind(&visit.guest_name)
            .bind(visit.visit_date)
            .bind(visit.check_in_time)
            .bind(visit.check_out_time)
            .bind(visit.vehicle_info.as_ref().map(Json))
            .bind(visit.number_of_guests)
            .bind(&visit.purpose)
            .bind(visit.status)
            .bind(&visit.notes)
            .bind(&visit.security_notes)
            .bind(visit.created_at)
            .bind(visit.updated_at)
            .fetch_one(self.pool())
            .await?;
        Ok(row.into())
    }

    async fn find_visit(&self, id: Uuid) -> Result<Option<GuestVisit>> {
        let sql = format!("SELECT {VISIT_COLUMNS} FROM guest_visits WHERE id = $1");
        let row = sqlx::query_as::<_, VisitRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_visit(&self, visit: GuestVisit) -> Result<GuestVisit> {
        let sql = format!(
            "UPDATE guest_visits \
             SET guest_name = $2, check_in_time = $3, check_out_time = $4, \
                 vehicle_info = $5, number_of_guests = $6, purpose = $7, status = $8, \
                 notes = $9, security_notes = $10, updated_at = $11 \
             WHERE id = $1 \
             RETURNING {VISIT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VisitRow>(&sql)
            .bind(visit.id)
            .bind(&visit.guest_name)
            .bind(visit.check_in_time)
            .bind(visit.check_out_time)
            .bind(visit.vehicle_info.as_ref().map(Json))
            .bind(visit.number_of_guests)
            .bind(&visit.purpose)
            .bind(visit.status)
            .bind(&visit.notes)
            .bind(&visit.security_notes)
            .bind(visit.updated_at)
            .fetch_optional(self.pool())
            .await?;

        row.map(Into::into).ok_or(AppError::NotFound("Guest visit"))
    }

    async fn list_visits(
        &self,
        filter: &VisitFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<GuestVisit>, i64)> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM guest_visits WHERE TRUE");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {VISIT_COLUMNS} FROM guest_visits WHERE TRUE"
        ));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY visit_date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<VisitRow>()
            .fetch_all(self.pool())
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn list_active_visits(&self) -> Result<Vec<GuestVisit>> {
        let sql = format!(
            "SELECT {VISIT_COLUMNS} FROM guest_visits \
             WHERE status IN ('scheduled', 'arrived') \
             ORDER BY visit_date DESC"
        );
        let rows = sqlx::query_as::<_, VisitRow>(&sql)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
