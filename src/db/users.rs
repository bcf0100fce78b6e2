// Database queries for identities

use super::{unique_violation, PgStore};
use crate::domain::user::User;
use crate::errors::Result;
use crate::store::UserStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, phone, role, password_hash, status, \
                            last_login_at, created_at, updated_at";

const DUPLICATE_EMAIL: &str = "User with this email already exists";

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {USER_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(user.role)
            .bind(&user.password_hash)
            .bind(user.status)
            .bind(user.last_login_at)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(self.pool())
            .await
            .map_err(|e| unique_violation(e, DUPLICATE_EMAIL))?;

        tracing::info!("Created user {} ({})", inserted.id, inserted.role.as_str());

        Ok(inserted)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let sql = format!(
            "UPDATE users \
             SET name = $2, email = $3, phone = $4, role = $5, password_hash = $6, \
                 status = $7, last_login_at = $8, updated_at = $9 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(user.role)
            .bind(&user.password_hash)
            .bind(user.status)
            .bind(user.last_login_at)
            .bind(user.updated_at)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| unique_violation(e, DUPLICATE_EMAIL))?;

        updated.ok_or(crate::errors::AppError::NotFound("User"))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool())
            .await?;

        tracing::debug!("Updated last login for user {}", id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_store;
    use crate::domain::user::{AccountStatus, Role};
    use crate::errors::AppError;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: email.to_string(),
            phone: String::new(),
            role: Role::Resident,
            password_hash: "hash".to_string(),
            status: AccountStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_insert_and_find_by_email() {
        let store = create_test_store().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let created = store.insert_user(user(&email)).await.unwrap();

        let found = store.find_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, Role::Resident);

        assert!(matches!(
            store.insert_user(user(&email)).await,
            Err(AppError::Conflict(_))
        ));
    }
}
