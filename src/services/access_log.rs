use super::{PageRequest, Paginated};
use crate::auth::Principal;
use crate::authz::{self, Ownership};
use crate::domain::{
    access_log::{
        roll_up, AccessEvent, AccessLog, AccessLogEntry, AccessLogFilter, AccessMethod,
        AccessPoint, AccessResult, RequestMeta, ResultStatistics,
    },
    ensure_optional_max_len, optional,
};
use crate::errors::{AppError, Result};
use crate::observability::MetricsRecorder;
use crate::store::{AccessLogStore, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Body of a manually recorded gate event. Omitted fields take the log defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAccessInput {
    pub user_id: Option<Uuid>,
    pub guest_code_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub delivery_id: Option<Uuid>,
    pub access_point: Option<AccessPoint>,
    pub result: Option<AccessResult>,
    pub method: Option<AccessMethod>,
    pub details: Option<serde_json::Value>,
    pub security_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatistics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub results: Vec<ResultStatistics>,
}

/// Append-only record of access attempts
#[derive(Clone)]
pub struct AccessEventLog {
    store: Arc<dyn Store>,
}

impl AccessEventLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append one event. Every entry point of the log funnels through here.
    pub async fn record(&self, event: AccessEvent) -> Result<AccessLog> {
        let log = self.store.append_access_log(event.into_log(Utc::now())).await?;

        MetricsRecorder::record_access_event(log.result.as_str(), log.method.as_str());
        tracing::info!(
            log_id = %log.id,
            result = log.result.as_str(),
            method = log.method.as_str(),
            access_point = ?log.access_point,
            "Access event recorded"
        );

        Ok(log)
    }

    #[tracing::instrument(skip(self, input, meta), fields(user_id = %principal.user_id))]
    pub async fn record_manual(
        &self,
        principal: &Principal,
        input: ManualAccessInput,
        meta: RequestMeta,
    ) -> Result<AccessLog> {
        authz::authorize(principal, authz::RECORD_ACCESS, Ownership::NotApplicable)?;

        let security_notes = optional(input.security_notes);
        ensure_optional_max_len("Security notes", security_notes.as_deref(), 500)?;

        let result = input.result.unwrap_or(AccessResult::Success);
        let method = input.method.unwrap_or_default();
        let base = match input.user_id {
            Some(user_id) => AccessEvent::resident(user_id, result, method),
            None => AccessEvent::new(result, method),
        };
        let mut event = base
            .at(input.access_point.unwrap_or_default())
            .with_meta(meta)
            .with_security_notes(security_notes);
        event.guest_code_id = input.guest_code_id;
        event.visit_id = input.visit_id;
        event.delivery_id = input.delivery_id;
        if let Some(details) = input.details {
            event = event.with_details(details);
        }

        self.record(event).await
    }

    pub async fn query(
        &self,
        principal: &Principal,
        filter: AccessLogFilter,
        page: PageRequest,
    ) -> Result<Paginated<AccessLogEntry>> {
        authz::authorize(principal, authz::VIEW_GATE_ACTIVITY, Ownership::NotApplicable)?;

        let total = self.store.count_access_logs(&filter).await?;
        let entries = self
            .store
            .query_access_logs(&filter, page.limit, page.offset())
            .await?;

        Ok(page.paginate(entries, total))
    }

    /// Two-stage rollup over `[start, end]`. Both bounds are required.
    pub async fn statistics(
        &self,
        principal: &Principal,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<AccessStatistics> {
        authz::authorize(principal, authz::VIEW_GATE_ACTIVITY, Ownership::NotApplicable)?;

        let (Some(start), Some(end)) = (start, end) else {
            return Err(AppError::ValidationError(
                "Start date and end date are required".to_string(),
            ));
        };
        if end < start {
            return Err(AppError::ValidationError(
                "End date must not be before start date".to_string(),
            ));
        }

        let groups = self.store.group_access_logs(start, end).await?;
        Ok(AccessStatistics {
            start,
            end,
            results: roll_up(groups),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use crate::services::test_support::Harness;
    use chrono::Duration;

    #[tokio::test]
    async fn test_statistics_six_success_four_denied() {
        let h = Harness::new();
        let guard = h.user(Role::Security).await;
        let log = &h.services.access_log;
        let start = Utc::now() - Duration::seconds(1);

        for i in 0..6 {
            let method = if i % 2 == 0 { AccessMethod::Pin } else { AccessMethod::Qr };
            log.record(AccessEvent::new(AccessResult::Success, method))
                .await
                .unwrap();
        }
        for _ in 0..4 {
            log.record(AccessEvent::new(AccessResult::Denied, AccessMethod::Pin))
                .await
                .unwrap();
        }

        let stats = log
            .statistics(&guard, Some(start), Some(Utc::now() + Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(stats.results.len(), 2);
        let success = &stats.results[0];
        assert_eq!(success.result, AccessResult::Success);
        assert_eq!(success.total, 6);
        assert_eq!(
            success
                .methods
                .iter()
                .map(|m| (m.method, m.count))
                .collect::<Vec<_>>(),
            vec![(AccessMethod::Qr, 3), (AccessMethod::Pin, 3)]
        );
        let denied = &stats.results[1];
        assert_eq!(denied.result, AccessResult::Denied);
        assert_eq!(denied.total, 4);
        assert_eq!(denied.methods.len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_requires_both_bounds() {
        let h = Harness::new();
        let guard = h.user(Role::Security).await;
        let err = h
            .services
            .access_log
            .statistics(&guard, Some(Utc::now()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(m) if m.contains("required")));
    }

    #[tokio::test]
    async fn test_manual_record_defaults_and_query() {
        let h = Harness::new();
        let guard = h.user(Role::Security).await;
        let meta = RequestMeta {
            ip_address: Some("10.0.0.7".into()),
            user_agent: Some("gate-terminal".into()),
        };

        let log = h
            .services
            .access_log
            .record_manual(&guard, ManualAccessInput::default(), meta)
            .await
            .unwrap();
        assert_eq!(log.access_point, AccessPoint::MainGate);
        assert_eq!(log.result, AccessResult::Success);
        assert_eq!(log.method, AccessMethod::Manual);
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.7"));

        let page = h
            .services
            .access_log
            .query(&guard, AccessLogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].log.id, log.id);
    }

    #[tokio::test]
    async fn test_manual_resident_entry_is_attributed() {
        let h = Harness::new();
        let guard = h.user(Role::Security).await;
        let (resident, _) = h.resident().await;

        let log = h
            .services
            .access_log
            .record_manual(
                &guard,
                ManualAccessInput {
                    user_id: Some(resident.user_id),
                    method: Some(AccessMethod::Keycard),
                    access_point: Some(AccessPoint::SideGate),
                    ..Default::default()
                },
                RequestMeta::default(),
            )
            .await
            .unwrap();
        assert_eq!(log.user_id, Some(resident.user_id));
        assert_eq!(log.guest_code_id, None);

        let page = h
            .services
            .access_log
            .query(
                &guard,
                AccessLogFilter {
                    user_id: Some(resident.user_id),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        let user = page.items[0].user.as_ref().unwrap();
        assert_eq!(user.role, Role::Resident);
        assert_eq!(page.items[0].log.access_point, AccessPoint::SideGate);
    }

    #[tokio::test]
    async fn test_residents_cannot_read_or_write_the_log() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let log = &h.services.access_log;

        assert!(matches!(
            log.record_manual(&resident, ManualAccessInput::default(), RequestMeta::default())
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            log.query(&resident, AccessLogFilter::default(), PageRequest::default())
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_security_notes_length_limit() {
        let h = Harness::new();
        let guard = h.user(Role::Security).await;
        let input = ManualAccessInput {
            security_notes: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(matches!(
            h.services
                .access_log
                .record_manual(&guard, input, RequestMeta::default())
                .await,
            Err(AppError::ValidationError(_))
        ));
    }
}
