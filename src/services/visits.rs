use super::{resident_scope, PageRequest, Paginated};
use crate::auth::Principal;
use crate::authz::{self, Ownership, Rule};
use crate::domain::{
    access_log::{AccessEvent, AccessMethod, AccessResult, RequestMeta},
    ensure_max_len, ensure_optional_max_len, optional,
    resident::VehicleInfo,
    visit::{GuestVisit, VisitFilter, VisitStatus},
};
use crate::errors::{AppError, Result};
use crate::observability::MetricsRecorder;
use crate::realtime::{self, events, EventChannel, RoomEvent};
use crate::services::AccessEventLog;
use crate::store::{GuestCodeStore, ResidentStore, Store, VisitStore};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisit {
    pub guest_code_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub purpose: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
    pub number_of_guests: Option<i32>,
    pub notes: Option<String>,
}

/// Books visits against guest codes and drives check-in / check-out
#[derive(Clone)]
pub struct VisitTracker {
    store: Arc<dyn Store>,
    events: Arc<dyn EventChannel>,
    access_log: AccessEventLog,
}

impl VisitTracker {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventChannel>, access_log: AccessEventLog) -> Self {
        Self {
            store,
            events,
            access_log,
        }
    }

    /// Visit dates descending. Residents only ever see their own visits.
    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: VisitFilter,
        page: PageRequest,
    ) -> Result<Paginated<GuestVisit>> {
        if let Some(resident) = resident_scope(self.store.as_ref(), principal).await? {
            filter.resident_id = Some(resident.id);
        }

        let (visits, total) = self
            .store
            .list_visits(&filter, page.limit, page.offset())
            .await?;
        Ok(page.paginate(visits, total))
    }

    pub async fn active(&self, principal: &Principal) -> Result<Vec<GuestVisit>> {
        authz::authorize(principal, authz::VIEW_GATE_ACTIVITY, Ownership::NotApplicable)?;
        self.store.list_active_visits().await
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<GuestVisit> {
        let visit = self.find(id).await?;
        self.guard(principal, &visit, authz::VIEW_VISIT).await?;
        Ok(visit)
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create(&self, principal: &Principal, input: CreateVisit) -> Result<GuestVisit> {
        let code_id = input
            .guest_code_id
            .ok_or_else(|| AppError::ValidationError("Guest code is required".to_string()))?;
        let code = self
            .store
            .find_guest_code(code_id)
            .await?
            .ok_or(AppError::NotFound("Guest code"))?;

        let ownership = self.ownership(principal, code.resident_id).await?;
        authz::authorize(principal, authz::CREATE_VISIT, ownership)?;

        let guest_name = optional(input.guest_name).unwrap_or_else(|| code.guest_name.clone());
        ensure_max_len("Guest name", &guest_name, 100)?;
        let purpose = optional(input.purpose).or_else(|| code.purpose.clone());
        ensure_optional_max_len("Purpose", purpose.as_deref(), 200)?;
        let notes = optional(input.notes);
        ensure_optional_max_len("Notes", notes.as_deref(), 500)?;
        let number_of_guests = input.number_of_guests.unwrap_or(1);
        if number_of_guests < 1 {
            return Err(AppError::ValidationError(
                "Number of guests must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let visit = GuestVisit {
            id: Uuid::new_v4(),
            resident_id: code.resident_id,
            guest_code_id: code.id,
            guest_name,
            visit_date: now,
            check_in_time: None,
            check_out_time: None,
            vehicle_info: input.vehicle_info.map(VehicleInfo::normalized),
            number_of_guests,
            purpose,
            status: VisitStatus::Scheduled,
            notes,
            security_notes: None,
            created_at: now,
            updated_at: now,
        };
        let visit = self.store.insert_visit(visit).await?;

        tracing::info!(visit_id = %visit.id, code_id = %code.id, "Visit scheduled");
        Ok(visit)
    }

    #[tracing::instrument(skip(self, meta), fields(user_id = %principal.user_id))]
    pub async fn check_in(
        &self,
        principal: &Principal,
        id: Uuid,
        meta: RequestMeta,
    ) -> Result<GuestVisit> {
        authz::authorize(principal, authz::CHECK_VISIT, Ownership::NotApplicable)?;
        let mut visit = self.find(id).await?;
        let now = Utc::now();
        visit.check_in(now)?;
        let visit = self.store.update_visit(visit).await?;
        MetricsRecorder::record_visit_transition("check_in");

        self.access_log
            .record(
                AccessEvent::guest(
                    Some(visit.guest_code_id),
                    Some(visit.id),
                    AccessResult::Success,
                    AccessMethod::Manual,
                )
                .with_details(json!({
                    "event": "check_in",
                    "guestName": visit.guest_name,
                    "verifiedBy": principal.user_id,
                }))
                .with_meta(meta),
            )
            .await?;

        self.announce(&visit, events::GUEST_ARRIVED, now).await;
        Ok(visit)
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn check_out(&self, principal: &Principal, id: Uuid) -> Result<GuestVisit> {
        authz::authorize(principal, authz::CHECK_VISIT, Ownership::NotApplicable)?;
        let mut visit = self.find(id).await?;
        let now = Utc::now();
        visit.check_out(now)?;
        let visit = self.store.update_visit(visit).await?;
        MetricsRecorder::record_visit_transition("check_out");

        self.announce(&visit, events::GUEST_DEPARTED, now).await;
        Ok(visit)
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn cancel(&self, principal: &Principal, id: Uuid) -> Result<GuestVisit> {
        let mut visit = self.find(id).await?;
        self.guard(principal, &visit, authz::CANCEL_VISIT).await?;

        visit.cancel(Utc::now())?;
        let visit = self.store.update_visit(visit).await?;
        MetricsRecorder::record_visit_transition("cancel");

        tracing::info!(visit_id = %visit.id, "Visit cancelled");
        Ok(visit)
    }

    async fn find(&self, id: Uuid) -> Result<GuestVisit> {
        self.store
            .find_visit(id)
            .await?
            .ok_or(AppError::NotFound("Guest visit"))
    }

    async fn guard(&self, principal: &Principal, visit: &GuestVisit, rule: Rule) -> Result<()> {
        let ownership = self.ownership(principal, visit.resident_id).await?;
        authz::authorize(principal, rule, ownership)
    }

    async fn ownership(&self, principal: &Principal, resident_id: Uuid) -> Result<Ownership> {
        let own = self.store.find_resident_by_user(principal.user_id).await?;
        Ok(own.map_or(false, |r| r.id == resident_id).into())
    }

    async fn announce(&self, visit: &GuestVisit, event: &str, at: chrono::DateTime<Utc>) {
        let payload = json!({
            "visitId": visit.id,
            "guestName": visit.guest_name,
            "numberOfGuests": visit.number_of_guests,
            "status": visit.status,
            "timestamp": at,
        });
        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_resident(visit.resident_id, event, payload.clone()),
        )
        .await;
        realtime::push(self.events.as_ref(), RoomEvent::to_security(event, payload)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_log::AccessLogFilter;
    use crate::domain::guest_code::GuestCodeType;
    use crate::domain::user::Role;
    use crate::realtime::rooms;
    use crate::services::guest_codes::IssueGuestCode;
    use crate::services::test_support::Harness;
    use chrono::Duration;

    async fn booked(h: &Harness, resident: &Principal) -> GuestVisit {
        let code = h
            .services
            .guest_codes
            .issue(
                resident,
                IssueGuestCode {
                    guest_name: Some("Gil".into()),
                    code_type: Some(GuestCodeType::Pin),
                    valid_until: Some(Utc::now() + Duration::hours(4)),
                    purpose: Some("Repairs".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        h.services
            .visits
            .create(
                resident,
                CreateVisit {
                    guest_code_id: Some(code.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_in_out_then_cancel_fails() {
        let h = Harness::new();
        let (resident, profile) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let visits = &h.services.visits;

        let mut room = h.hub.subscribe();
        room.join(rooms::resident(profile.id));

        let visit = booked(&h, &resident).await;
        assert_eq!(visit.status, VisitStatus::Scheduled);
        assert_eq!(visit.guest_name, "Gil");
        assert_eq!(visit.purpose.as_deref(), Some("Repairs"));
        assert_eq!(visit.number_of_guests, 1);

        let arrived = visits
            .check_in(&guard, visit.id, RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(arrived.status, VisitStatus::Arrived);
        assert!(arrived.check_in_time.is_some());
        assert_eq!(room.next().await.unwrap().event, events::GUEST_ARRIVED);

        let departed = visits.check_out(&guard, visit.id).await.unwrap();
        assert_eq!(departed.status, VisitStatus::Departed);
        assert!(departed.check_out_time.is_some());
        assert_eq!(room.next().await.unwrap().event, events::GUEST_DEPARTED);

        assert!(matches!(
            visits.cancel(&resident, visit.id).await,
            Err(AppError::InvalidTransition(_))
        ));

        let logs = h
            .services
            .access_log
            .query(&guard, AccessLogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(logs.pagination.total, 1);
        assert_eq!(logs.items[0].log.visit_id, Some(visit.id));
        assert_eq!(logs.items[0].log.guest_code_id, Some(visit.guest_code_id));
    }

    #[tokio::test]
    async fn test_transitions_from_wrong_state() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let visits = &h.services.visits;
        let visit = booked(&h, &resident).await;

        assert!(matches!(
            visits.check_out(&guard, visit.id).await,
            Err(AppError::InvalidTransition(_))
        ));
        visits.cancel(&resident, visit.id).await.unwrap();
        assert!(matches!(
            visits.check_in(&guard, visit.id, RequestMeta::default()).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            visits.cancel(&resident, visit.id).await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_residents_only_touch_their_own_visits() {
        let h = Harness::new();
        let (owner, _) = h.resident().await;
        let (stranger, _) = h.resident().await;
        let visits = &h.services.visits;
        let visit = booked(&h, &owner).await;

        assert!(matches!(
            visits.cancel(&stranger, visit.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            visits.get(&stranger, visit.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            visits
                .create(
                    &stranger,
                    CreateVisit {
                        guest_code_id: Some(visit.guest_code_id),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            visits
                .check_in(&owner, visit.id, RequestMeta::default())
                .await,
            Err(AppError::Forbidden(_))
        ));

        let own = visits
            .list(&stranger, VisitFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(own.pagination.total, 0);
        let all = visits
            .list(&h.user(Role::Admin).await, VisitFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_active_lists_scheduled_and_arrived() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let visits = &h.services.visits;

        let a = booked(&h, &resident).await;
        let b = booked(&h, &resident).await;
        let c = booked(&h, &resident).await;
        visits.check_in(&guard, b.id, RequestMeta::default()).await.unwrap();
        visits.cancel(&resident, c.id).await.unwrap();

        let active = visits.active(&guard).await.unwrap();
        let mut ids: Vec<Uuid> = active.iter().map(|v| v.id).collect();
        ids.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ids, expected);

        assert!(matches!(
            visits.active(&resident).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_create_requires_existing_code_and_guests() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let visits = &h.services.visits;

        assert!(matches!(
            visits
                .create(
                    &resident,
                    CreateVisit {
                        guest_code_id: Some(Uuid::new_v4()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::NotFound(_))
        ));

        let visit = booked(&h, &resident).await;
        assert!(matches!(
            visits
                .create(
                    &resident,
                    CreateVisit {
                        guest_code_id: Some(visit.guest_code_id),
                        number_of_guests: Some(0),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        booked(&h, &resident).await;

        let page = h
            .services
            .visits
            .list(
                &resident,
                VisitFilter::default(),
                PageRequest::new(Some(i64::MAX), Some(2)),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.current, i64::MAX);
    }
}
