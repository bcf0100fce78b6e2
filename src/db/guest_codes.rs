// Database queries for guest codes

use super::{unique_violation, PgStore};
use crate::domain::guest_code::GuestCode;
use crate::errors::{AppError, Result};
use crate::store::GuestCodeStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const CODE_COLUMNS: &str = "id, code, code_type, resident_id, guest_name, purpose, valid_from, \
                            valid_until, status, used_at, revoked_at, usage_count, max_usage, \
                            notes, created_at, updated_at";

#[async_trait]
impl GuestCodeStore for PgStore {
    async fn insert_guest_code(&self, code: GuestCode) -> Result<GuestCode> {
        let sql = format!(
            "INSERT INTO guest_codes ({CODE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {CODE_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(code.id)
            .bind(&code.code)
            .bind(code.code_type)
            .bind(code.resident_id)
            .bind(&code.guest_name)
            .bind(&code.purpose)
            .bind(code.valid_from)
            .bind(code.valid_until)
            .bind(code.status)
            .bind(code.used_at)
            .bind(code.revoked_at)
            .bind(code.usage_count)
            .bind(code.max_usage)
            .bind(&code.notes)
            .bind(code.created_at)
            .bind(code.updated_at)
            .fetch_one(self.pool())
            .await
            .map_err(|e| unique_violation(e, "Guest code already exists"))?;

        Ok(inserted)
    }

    async fn guest_code_exists(&self, code: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM guest_codes WHERE code = $1)")
                .bind(code)
                .fetch_one(self.pool())
                .await?;
        Ok(exists)
    }

    async fn find_guest_code(&self, id: Uuid) -> Result<Option<GuestCode>> {
        let sql = format!("SELECT {CODE_COLUMNS} FROM guest_codes WHERE id = $1");
        let code = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(code)
    }

    async fn find_guest_code_by_code(&self, code: &str) -> Result<Option<GuestCode>> {
        let sql = format!("SELECT {CODE_COLUMNS} FROM guest_codes WHERE code = $1");
        let code = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(code)
            .fetch_optional(self.pool())
            .await?;
        Ok(code)
    }

    async fn list_guest_codes(&self, resident_id: Option<Uuid>) -> Result<Vec<GuestCode>> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM guest_codes \
             WHERE ($1::uuid IS NULL OR resident_id = $1) \
             ORDER BY created_at DESC"
        );
        let codes = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(resident_id)
            .fetch_all(self.pool())
            .await?;
        Ok(codes)
    }

    async fn consume_guest_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GuestCode>> {
        // The predicate and the increment run as one statement, so two
        // concurrent verifications cannot both observe a remaining use.
        let sql = format!(
            "UPDATE guest_codes \
             SET usage_count = usage_count + 1, \
                 used_at = $2, \
                 status = CASE WHEN usage_count + 1 >= max_usage \
                               THEN 'used'::guest_code_status ELSE status END, \
                 updated_at = $2 \
             WHERE code = $1 \
               AND status = 'active' \
               AND valid_from <= $2 \
               AND valid_until >= $2 \
               AND usage_count < max_usage \
             RETURNING {CODE_COLUMNS}"
        );
        let consumed = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(code)
            .bind(now)
            .fetch_optional(self.pool())
            .await?;
        Ok(consumed)
    }

    async fn expire_guest_code(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE guest_codes SET status = 'expired', updated_at = $2 \
             WHERE id = $1 AND status = 'active' AND valid_until < $2",
        )
        .bind(id)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_guest_code(&self, code: GuestCode) -> Result<GuestCode> {
        let sql = format!(
            "UPDATE guest_codes \
             SET guest_name = $2, purpose = $3, valid_from = $4, valid_until = $5, \
                 status = $6, used_at = $7, revoked_at = $8, usage_count = $9, \
                 max_usage = $10, notes = $11, updated_at = $12 \
             WHERE id = $1 \
             RETURNING {CODE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, GuestCode>(&sql)
            .bind(code.id)
            .bind(&code.guest_name)
            .bind(&code.purpose)
            .bind(code.valid_from)
            .bind(code.valid_until)
            .bind(code.status)
            .bind(code.used_at)
            .bind(code.revoked_at)
            .bind(code.usage_count)
            .bind(code.max_usage)
            .bind(&code.notes)
            .bind(code.updated_at)
            .fetch_optional(self.pool())
            .await?;

        updated.ok_or(AppError::NotFound("Guest code"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_store;
    use crate::domain::guest_code::{generate_candidate, GuestCodeStatus, GuestCodeType};
    use chrono::Duration;

    fn code(now: DateTime<Utc>) -> GuestCode {
        GuestCode {
            id: Uuid::new_v4(),
            code: generate_candidate(GuestCodeType::Qr, "TEST_"),
            code_type: GuestCodeType::Qr,
            resident_id: Uuid::new_v4(),
            guest_name: "Guest".to_string(),
            purpose: None,
            valid_from: now - Duration::minutes(1),
            valid_until: now + Duration::hours(1),
            status: GuestCodeStatus::Active,
            used_at: None,
            revoked_at: None,
            usage_count: 0,
            max_usage: 1,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_concurrent_consume_single_success() {
        let store = create_test_store().await;
        let now = Utc::now();
        let inserted = store.insert_guest_code(code(now)).await.unwrap();

        let (a, b) = tokio::join!(
            store.consume_guest_code(&inserted.code, now),
            store.consume_guest_code(&inserted.code, now)
        );
        let successes = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|r| r.is_some())
            .count();
        assert_eq!(successes, 1);

        let stored = store.find_guest_code(inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GuestCodeStatus::Used);
    }
}
