use super::{own_resident, resident_scope};
use crate::auth::Principal;
use crate::authz::{self, Ownership};
use crate::config::GuestCodeConfig;
use crate::domain::{
    access_log::{AccessEvent, AccessMethod, AccessResult, RequestMeta},
    ensure_max_len, ensure_optional_max_len,
    guest_code::{generate_candidate, GuestCode, GuestCodeStatus, GuestCodeType},
    notification::NotificationDraft,
    optional, required,
};
use crate::errors::{AppError, Result};
use crate::observability::MetricsRecorder;
use crate::realtime::{self, events, EventChannel, RoomEvent};
use crate::services::{AccessEventLog, Notifier};
use crate::store::{GuestCodeStore, ResidentStore, Store, UserStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueGuestCode {
    pub guest_name: Option<String>,
    pub code_type: Option<GuestCodeType>,
    pub valid_until: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub max_usage: Option<i32>,
    pub notes: Option<String>,
}

/// Contact details of the resident a verified guest is visiting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResident {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub unit_number: String,
    pub block: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedGuest {
    pub guest_name: String,
    pub resident: Option<HostResident>,
    pub purpose: Option<String>,
}

/// Issues, verifies and retires guest codes
#[derive(Clone)]
pub struct GuestCodeRegistry {
    store: Arc<dyn Store>,
    events: Arc<dyn EventChannel>,
    access_log: AccessEventLog,
    notifier: Notifier,
    config: GuestCodeConfig,
}

impl GuestCodeRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventChannel>,
        access_log: AccessEventLog,
        notifier: Notifier,
        config: GuestCodeConfig,
    ) -> Self {
        Self {
            store,
            events,
            access_log,
            notifier,
            config,
        }
    }

    /// A code string of `code_type` not currently stored.
    pub async fn generate(&self, code_type: GuestCodeType) -> Result<String> {
        let prefix = self.config.qr_prefix.clone();
        self.generate_with(move || generate_candidate(code_type, &prefix))
            .await
    }

    async fn generate_with(&self, mut candidate: impl FnMut() -> String) -> Result<String> {
        for attempt in 1..=self.config.max_generation_attempts {
            let code = candidate();
            if !self.store.guest_code_exists(&code).await? {
                return Ok(code);
            }
            tracing::debug!(attempt, "Guest code collision, retrying");
        }
        Err(AppError::GenerationExhausted(
            self.config.max_generation_attempts,
        ))
    }

    /// Residents see their own codes, other roles see every code. Status is
    /// reported as of now.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<GuestCode>> {
        let scope = resident_scope(self.store.as_ref(), principal).await?;
        let now = Utc::now();
        let codes = self
            .store
            .list_guest_codes(scope.map(|r| r.id))
            .await?;
        Ok(codes.into_iter().map(|c| c.at(now)).collect())
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn issue(&self, principal: &Principal, input: IssueGuestCode) -> Result<GuestCode> {
        authz::authorize(principal, authz::ISSUE_GUEST_CODE, Ownership::NotApplicable)?;
        let resident = own_resident(self.store.as_ref(), principal).await?;

        let guest_name = required("Guest name", input.guest_name)?;
        ensure_max_len("Guest name", &guest_name, 100)?;
        let code_type = input
            .code_type
            .ok_or_else(|| AppError::ValidationError("Code type is required".to_string()))?;
        let valid_until = input
            .valid_until
            .ok_or_else(|| AppError::ValidationError("Valid until is required".to_string()))?;
        let purpose = optional(input.purpose);
        ensure_optional_max_len("Purpose", purpose.as_deref(), 200)?;
        let notes = optional(input.notes);
        ensure_optional_max_len("Notes", notes.as_deref(), 500)?;
        let max_usage = input.max_usage.unwrap_or(1);
        if max_usage < 1 {
            return Err(AppError::ValidationError(
                "Max usage must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        if valid_until <= now {
            return Err(AppError::ValidationError(
                "Valid until must be in the future".to_string(),
            ));
        }

        let code = GuestCode {
            id: Uuid::new_v4(),
            code: self.generate(code_type).await?,
            code_type,
            resident_id: resident.id,
            guest_name,
            purpose,
            valid_from: now,
            valid_until,
            status: GuestCodeStatus::Active,
            used_at: None,
            revoked_at: None,
            usage_count: 0,
            max_usage,
            notes,
            created_at: now,
            updated_at: now,
        };
        let code = self.store.insert_guest_code(code).await?;

        tracing::info!(
            code_id = %code.id,
            resident_id = %code.resident_id,
            code_type = ?code.code_type,
            "Guest code issued"
        );
        Ok(code)
    }

    /// Consume one use of `code` at the gate.
    ///
    /// The check and the use are a single conditional update in the store, so
    /// concurrent verifications of a single-use code admit exactly one guest.
    /// Every outcome is appended to the access log.
    #[tracing::instrument(skip(self, code, meta), fields(user_id = %principal.user_id))]
    pub async fn verify(
        &self,
        principal: &Principal,
        code: Option<String>,
        meta: RequestMeta,
    ) -> Result<VerifiedGuest> {
        authz::authorize(principal, authz::VERIFY_GUEST_CODE, Ownership::NotApplicable)?;
        let code = required("Code", code)?;
        let now = Utc::now();

        match self.store.consume_guest_code(&code, now).await? {
            Some(consumed) => self.admit(principal, consumed, meta).await,
            None => Err(self.reject(principal, &code, now, meta).await?),
        }
    }

    async fn admit(
        &self,
        principal: &Principal,
        code: GuestCode,
        meta: RequestMeta,
    ) -> Result<VerifiedGuest> {
        MetricsRecorder::record_guest_code_verification("success");
        tracing::info!(code_id = %code.id, usage_count = code.usage_count, "Guest code verified");

        self.access_log
            .record(
                AccessEvent::guest(
                    Some(code.id),
                    None,
                    AccessResult::Success,
                    code.code_type.into(),
                )
                .with_details(json!({
                    "code": code.code,
                    "guestName": code.guest_name,
                    "verifiedBy": principal.user_id,
                }))
                .with_meta(meta),
            )
            .await?;

        // The use is already committed; a lost inbox row must not fail the gate.
        let host = self.host_resident(code.resident_id).await?;
        if let Some(host) = &host {
            let draft = NotificationDraft::guest_arrival(&code.guest_name, &code.code);
            if let Err(e) = self.notifier.notify(host.user_id, draft).await {
                tracing::error!(code_id = %code.id, "Guest arrival notification failed: {}", e);
            }
        }

        let payload = json!({
            "guestName": code.guest_name,
            "codeId": code.id,
            "purpose": code.purpose,
            "timestamp": Utc::now(),
        });
        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_resident(code.resident_id, events::GUEST_ARRIVED, payload.clone()),
        )
        .await;
        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_security(events::GUEST_ARRIVED, payload),
        )
        .await;

        Ok(VerifiedGuest {
            guest_name: code.guest_name,
            resident: host,
            purpose: code.purpose,
        })
    }

    /// Classify a failed consume, persist a lapsed expiry and log the denial.
    async fn reject(
        &self,
        principal: &Principal,
        code: &str,
        now: DateTime<Utc>,
        meta: RequestMeta,
    ) -> Result<AppError> {
        let stored = self.store.find_guest_code_by_code(code).await?;

        let (reason, code_id, method) = match &stored {
            None => (
                AppError::NotFound("Guest code"),
                None,
                self.method_for_unknown(code),
            ),
            Some(stored) => {
                let reason = stored.unusable_reason(now);
                if stored.status == GuestCodeStatus::Active && now > stored.valid_until {
                    self.store.expire_guest_code(stored.id, now).await?;
                }
                (reason, Some(stored.id), stored.code_type.into())
            }
        };

        let outcome = match reason {
            AppError::NotFound(_) => "not_found",
            AppError::GuestCodeExpired => "expired",
            _ => "error",
        };
        MetricsRecorder::record_guest_code_verification(outcome);
        tracing::warn!(outcome, "Guest code rejected");

        self.access_log
            .record(
                AccessEvent::guest(code_id, None, AccessResult::Denied, method)
                    .with_details(json!({
                        "code": code,
                        "reason": reason.to_string(),
                        "verifiedBy": principal.user_id,
                    }))
                    .with_meta(meta),
            )
            .await?;

        Ok(reason)
    }

    /// Codes that were never issued still get a method in the log.
    fn method_for_unknown(&self, code: &str) -> AccessMethod {
        if code.starts_with(&self.config.qr_prefix) {
            AccessMethod::Qr
        } else {
            AccessMethod::Pin
        }
    }

    async fn host_resident(&self, resident_id: Uuid) -> Result<Option<HostResident>> {
        let Some(resident) = self.store.find_resident(resident_id).await? else {
            return Ok(None);
        };
        let user = self.store.find_user(resident.user_id).await?;
        Ok(Some(HostResident {
            id: resident.id,
            user_id: resident.user_id,
            unit_number: resident.unit_number,
            block: resident.block,
            name: user.as_ref().map(|u| u.name.clone()),
            email: user.as_ref().map(|u| u.email.clone()),
            phone: user.map(|u| u.phone),
        }))
    }

    async fn owner_of(&self, resident_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .store
            .find_resident(resident_id)
            .await?
            .map(|r| r.user_id))
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn revoke(&self, principal: &Principal, id: Uuid) -> Result<GuestCode> {
        let mut code = self
            .store
            .find_guest_code(id)
            .await?
            .ok_or(AppError::NotFound("Guest code"))?;

        let is_owner = self.owner_of(code.resident_id).await? == Some(principal.user_id);
        authz::authorize(principal, authz::REVOKE_GUEST_CODE, is_owner.into())?;

        let now = Utc::now();
        code.revoke(now)?;
        let code = self.store.update_guest_code(code).await?;

        tracing::info!(code_id = %code.id, "Guest code revoked");
        Ok(code)
    }
}
