// Database queries for notifications

use super::PgStore;
use crate::domain::notification::Notification;
use crate::errors::{AppError, Result};
use crate::store::NotificationStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, data, read, read_at, \
                                    priority, expires_at, created_at, updated_at";

/// Rows past their expiry are invisible before the purge removes them.
const NOT_EXPIRED: &str = "(expires_at IS NULL OR expires_at >= $2)";

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        let sql = format!(
            "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(notification.kind)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.data)
            .bind(notification.read)
            .bind(notification.read_at)
            .bind(notification.priority)
            .bind(notification.expires_at)
            .bind(notification.created_at)
            .bind(notification.updated_at)
            .fetch_one(self.pool())
            .await?;
        Ok(inserted)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND {NOT_EXPIRED} \
             ORDER BY created_at DESC LIMIT $3"
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(now)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    async fn find_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND {NOT_EXPIRED} AND id = $3"
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(now)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn update_notification(&self, notification: Notification) -> Result<Notification> {
        let sql = format!(
            "UPDATE notifications \
             SET title = $2, message = $3, data = $4, read = $5, read_at = $6, \
                 priority = $7, expires_at = $8, updated_at = $9 \
             WHERE id = $1 \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.data)
            .bind(notification.read)
            .bind(notification.read_at)
            .bind(notification.priority)
            .bind(notification.expires_at)
            .bind(notification.updated_at)
            .fetch_optional(self.pool())
            .await?;

        updated.ok_or(AppError::NotFound("Notification"))
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE notifications SET read = TRUE, read_at = $2, updated_at = $2 \
             WHERE user_id = $1 AND read = FALSE AND {NOT_EXPIRED}"
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(now)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread_notifications(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 AND read = FALSE AND {NOT_EXPIRED}"
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn delete_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = format!(
            "DELETE FROM notifications WHERE user_id = $1 AND {NOT_EXPIRED} AND id = $3"
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_notifications(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_store;
    use crate::domain::notification::{NotificationDraft, NotificationType};

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_mark_all_read_is_idempotent() {
        let store = create_test_store().await;
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        for _ in 0..3 {
            let n = NotificationDraft::new(NotificationType::Info, "Hello", "World")
                .into_notification(user_id, now);
            store.insert_notification(n).await.unwrap();
        }

        assert_eq!(store.mark_all_notifications_read(user_id, now).await.unwrap(), 3);
        assert_eq!(store.mark_all_notifications_read(user_id, now).await.unwrap(), 0);
        assert_eq!(store.count_unread_notifications(user_id, now).await.unwrap(), 0);
    }
}
