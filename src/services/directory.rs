// Identities, resident profiles and login

use crate::auth::{
    jwt::AccessToken,
    password::{hash_password, verify_password},
    JwtManager, Principal,
};
use crate::authz::{self, Ownership};
use crate::domain::{
    ensure_optional_max_len, optional, required,
    resident::{
        normalize_unit, EmergencyContact, Resident, ResidentFilter, ResidentWithOwner, VehicleInfo,
    },
    user::{normalize_email, validate_name, validate_phone, AccountStatus, Role, User},
};
use crate::errors::{AppError, Result};
use crate::store::{ResidentStore, Store, UserStore};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: AccessToken,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
    pub unit_number: Option<String>,
    pub block: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub unit_number: Option<String>,
    pub block: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResident {
    pub user_id: Option<Uuid>,
    pub unit_number: Option<String>,
    pub block: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    pub move_in_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// A user with their unit and block merged in when they are a resident.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListing {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: User,
    pub resident_profile: Option<Resident>,
}

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn Store>,
    jwt: Arc<JwtManager>,
    password_min_length: usize,
}

impl Directory {
    pub fn new(store: Arc<dyn Store>, jwt: Arc<JwtManager>, password_min_length: usize) -> Self {
        Self {
            store,
            jwt,
            password_min_length,
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let (Some(email), Some(password)) = (optional(request.email), request.password) else {
            return Err(AppError::ValidationError(
                "Please provide an email and password".to_string(),
            ));
        };

        let email = email.to_lowercase();
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::warn!("Login attempt for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(&password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active() {
            tracing::warn!(user_id = %user.id, status = ?user.status, "Login refused for inactive account");
            return Err(AppError::Forbidden("Account is not active".to_string()));
        }

        let now = Utc::now();
        self.store.touch_last_login(user.id, now).await?;
        let token = self.jwt.generate_access_token(user.id, user.role)?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User logged in");
        Ok(LoginResponse {
            token,
            user: User {
                last_login_at: Some(now),
                ..user
            },
        })
    }

    pub async fn me(&self, principal: &Principal) -> Result<UserDetail> {
        self.detail(principal.user_id).await
    }

    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserListing>> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;

        let users = self.store.list_users().await?;
        let mut listings = Vec::with_capacity(users.len());
        for user in users {
            let profile = match user.role {
                Role::Resident => self.store.find_resident_by_user(user.id).await?,
                _ => None,
            };
            listings.push(UserListing {
                unit_number: profile.as_ref().map(|p| p.unit_number.clone()),
                block: profile.map(|p| p.block),
                user,
            });
        }
        Ok(listings)
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_user(&self, principal: &Principal, input: CreateUser) -> Result<User> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;

        let (Some(name), Some(email), Some(role), Some(password)) = (
            optional(input.name),
            optional(input.email),
            input.role,
            input.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::ValidationError(
                "Name, email, role, and password are required".to_string(),
            ));
        };
        if principal.role == Role::Admin && role == Role::SuperAdmin {
            return Err(AppError::Forbidden(
                "Admins cannot create super admin users".to_string(),
            ));
        }

        validate_name(&name)?;
        let email = normalize_email(&email)?;
        let phone = optional(input.phone).unwrap_or_default();
        validate_phone(&phone)?;
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        let password_hash = hash_password(&password, self.password_min_length)?;

        let now = Utc::now();
        let user = self
            .store
            .insert_user(User {
                id: Uuid::new_v4(),
                name,
                email,
                phone,
                role,
                password_hash,
                status: AccountStatus::Active,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if role == Role::Resident {
            if let (Some(unit), Some(block)) = (optional(input.unit_number), optional(input.block)) {
                self.store
                    .insert_resident(Resident::new(user.id, &unit, &block, now)?)
                    .await?;
            }
        }

        tracing::info!(created = %user.id, role = role.as_str(), "User created");
        Ok(user)
    }

    pub async fn get_user(&self, principal: &Principal, id: Uuid) -> Result<UserDetail> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;
        self.detail(id).await
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn update_user(
        &self,
        principal: &Principal,
        id: Uuid,
        input: UpdateUser,
    ) -> Result<User> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;
        let mut user = self.find_user(id).await?;

        if principal.role == Role::Admin && input.role == Some(Role::SuperAdmin) {
            return Err(AppError::Forbidden(
                "Admins cannot promote users to super admin".to_string(),
            ));
        }

        self.apply_contact_changes(&mut user, input.name, input.email, input.phone)?;
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(status) = input.status {
            user.status = status;
        }
        let now = Utc::now();
        user.updated_at = now;
        let user = self.store.update_user(user).await?;

        if input.role == Some(Role::Resident) {
            if let (Some(unit), Some(block)) = (optional(input.unit_number), optional(input.block)) {
                self.upsert_unit(user.id, &unit, &block, now).await?;
            }
        }

        tracing::info!(updated = %user.id, "User updated");
        Ok(user)
    }

    /// Self-service change of name, email and phone.
    pub async fn update_profile(&self, principal: &Principal, input: UpdateProfile) -> Result<User> {
        let mut user = self.find_user(principal.user_id).await?;
        self.apply_contact_changes(&mut user, input.name, input.email, input.phone)?;
        user.updated_at = Utc::now();
        self.store.update_user(user).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn delete_user(&self, principal: &Principal, id: Uuid) -> Result<()> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;
        let user = self.find_user(id).await?;

        if user.id == principal.user_id {
            return Err(AppError::ValidationError(
                "Cannot delete your own account".to_string(),
            ));
        }
        if principal.role == Role::Admin && user.role == Role::SuperAdmin {
            return Err(AppError::Forbidden(
                "Admins cannot delete super admin users".to_string(),
            ));
        }

        // Profile first so no resident row outlives its identity.
        self.store.delete_resident_by_user(user.id).await?;
        self.store.delete_user(user.id).await?;

        tracing::info!(deleted = %user.id, "User deleted");
        Ok(())
    }

    pub async fn list_residents(
        &self,
        principal: &Principal,
        filter: ResidentFilter,
    ) -> Result<Vec<ResidentWithOwner>> {
        authz::authorize(principal, authz::LIST_RESIDENTS, Ownership::NotApplicable)?;

        let residents = self.store.list_residents(&filter).await?;
        try_join_all(residents.into_iter().map(|resident| async move {
            let owner = self.store.find_user(resident.user_id).await?;
            Ok::<_, AppError>(ResidentWithOwner {
                name: owner.as_ref().map(|u| u.name.clone()),
                email: owner.map(|u| u.email),
                resident,
            })
        }))
        .await
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_resident(
        &self,
        principal: &Principal,
        input: CreateResident,
    ) -> Result<Resident> {
        authz::authorize(principal, authz::MANAGE_USERS, Ownership::NotApplicable)?;

        let user_id = input
            .user_id
            .ok_or_else(|| AppError::ValidationError("User is required".to_string()))?;
        let unit = required("Unit number", input.unit_number)?;
        let block = required("Block", input.block)?;
        let user = self.find_user(user_id).await?;
        if user.role != Role::Resident {
            return Err(AppError::ValidationError(
                "User must have the resident role".to_string(),
            ));
        }
        for contact in &input.emergency_contacts {
            contact.validate()?;
        }
        let notes = optional(input.notes);
        ensure_optional_max_len("Notes", notes.as_deref(), 500)?;

        let now = Utc::now();
        let mut resident = Resident::new(user.id, &unit, &block, now)?;
        resident.vehicle_info = input.vehicle_info.map(VehicleInfo::normalized);
        resident.emergency_contacts = input.emergency_contacts;
        resident.move_in_date = input.move_in_date.unwrap_or(now);
        resident.notes = notes;

        let resident = self.store.insert_resident(resident).await?;
        tracing::info!(resident_id = %resident.id, "Resident profile created");
        Ok(resident)
    }

    async fn find_user(&self, id: Uuid) -> Result<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    async fn detail(&self, id: Uuid) -> Result<UserDetail> {
        let user = self.find_user(id).await?;
        let resident_profile = match user.role {
            Role::Resident => self.store.find_resident_by_user(user.id).await?,
            _ => None,
        };
        Ok(UserDetail {
            user,
            resident_profile,
        })
    }

    fn apply_contact_changes(
        &self,
        user: &mut User,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<()> {
        if let Some(name) = optional(name) {
            validate_name(&name)?;
            user.name = name;
        }
        if let Some(email) = optional(email) {
            user.email = normalize_email(&email)?;
        }
        if let Some(phone) = phone {
            let phone = phone.trim().to_string();
            validate_phone(&phone)?;
            user.phone = phone;
        }
        Ok(())
    }

    async fn upsert_unit(
        &self,
        user_id: Uuid,
        unit: &str,
        block: &str,
        now: DateTime<Utc>,
    ) -> Result<Resident> {
        match self.store.find_resident_by_user(user_id).await? {
            Some(mut resident) => {
                resident.unit_number = normalize_unit(unit)?;
                resident.block = block.trim().to_string();
                resident.updated_at = now;
                self.store.update_resident(resident).await
            }
            None => {
                self.store
                    .insert_resident(Resident::new(user_id, unit, block, now)?)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Harness;

    fn new_user(email: &str, role: Role) -> CreateUser {
        CreateUser {
            name: Some("Jo Bloggs".into()),
            email: Some(email.into()),
            role: Some(role),
            password: Some("hunter22".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_then_login() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let directory = &h.services.directory;

        let input = CreateUser {
            unit_number: Some("b-12".into()),
            block: Some("North".into()),
            ..new_user("Jo@Example.com", Role::Resident)
        };
        let user = directory.create_user(&admin, input).await.unwrap();
        assert_eq!(user.email, "jo@example.com");

        let detail = directory.get_user(&admin, user.id).await.unwrap();
        assert_eq!(detail.resident_profile.unwrap().unit_number, "B-12");

        let login = directory
            .login(LoginRequest {
                email: Some("jo@example.com".into()),
                password: Some("hunter22".into()),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, user.id);
        assert!(login.user.last_login_at.is_some());

        let wrong = directory
            .login(LoginRequest {
                email: Some("jo@example.com".into()),
                password: Some("nope-nope".into()),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_admin_role_limits() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let root = h.user(Role::SuperAdmin).await;
        let directory = &h.services.directory;

        assert!(matches!(
            directory
                .create_user(&admin, new_user("boss@example.com", Role::SuperAdmin))
                .await,
            Err(AppError::Forbidden(m)) if m == "Admins cannot create super admin users"
        ));
        let guard = directory
            .create_user(&admin, new_user("guard@example.com", Role::Security))
            .await
            .unwrap();
        assert!(matches!(
            directory
                .update_user(
                    &admin,
                    guard.id,
                    UpdateUser {
                        role: Some(Role::SuperAdmin),
                        ..Default::default()
                    }
                )
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            directory.delete_user(&admin, root.user_id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            directory.delete_user(&admin, admin.user_id).await,
            Err(AppError::ValidationError(m)) if m == "Cannot delete your own account"
        ));
        directory.delete_user(&root, admin.user_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let directory = &h.services.directory;
        directory
            .create_user(&admin, new_user("dup@example.com", Role::Security))
            .await
            .unwrap();
        assert!(matches!(
            directory
                .create_user(&admin, new_user("DUP@example.com", Role::Security))
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_resident_removes_profile() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let (resident, _) = h.resident().await;
        let directory = &h.services.directory;

        directory.delete_user(&admin, resident.user_id).await.unwrap();
        assert!(h
            .store
            .find_resident_by_user(resident.user_id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            directory.get_user(&admin, resident.user_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_upserts_unit() {
        let h = Harness::new();
        let admin = h.user(Role::SuperAdmin).await;
        let guard = h.user(Role::Security).await;
        let directory = &h.services.directory;

        directory
            .update_user(
                &admin,
                guard.user_id,
                UpdateUser {
                    role: Some(Role::Resident),
                    unit_number: Some("7c".into()),
                    block: Some("East".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let listings = directory.list_users(&admin).await.unwrap();
        let moved = listings.iter().find(|l| l.user.id == guard.user_id).unwrap();
        assert_eq!(moved.unit_number.as_deref(), Some("7C"));
        assert_eq!(moved.block.as_deref(), Some("East"));
    }

    #[tokio::test]
    async fn test_profile_and_resident_listing() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let directory = &h.services.directory;

        let updated = directory
            .update_profile(
                &resident,
                UpdateProfile {
                    phone: Some("+1 555 0100".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone, "+1 555 0100");

        let listed = directory
            .list_residents(&guard, ResidentFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name.as_deref(), Some("resident user"));

        assert!(matches!(
            directory
                .list_residents(&resident, ResidentFilter::default())
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_create_resident_requires_resident_role() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let guard = h.user(Role::Security).await;
        let bare = h.user(Role::Resident).await;
        let directory = &h.services.directory;

        let input = CreateResident {
            user_id: Some(guard.user_id),
            unit_number: Some("1".into()),
            block: Some("A".into()),
            ..Default::default()
        };
        assert!(directory.create_resident(&admin, input.clone()).await.is_err());

        let input = CreateResident {
            user_id: Some(bare.user_id),
            ..input
        };
        directory.create_resident(&admin, input.clone()).await.unwrap();
        assert!(matches!(
            directory.create_resident(&admin, input).await,
            Err(AppError::Conflict(_))
        ));
    }
}
