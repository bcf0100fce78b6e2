use super::{own_resident, resident_scope};
use crate::auth::Principal;
use crate::authz::{self, Ownership};
use crate::domain::{
    access_log::{AccessEvent, AccessMethod, AccessResult},
    delivery::{Delivery, DeliveryItem, DeliveryPerson, DeliveryStatus},
    ensure_max_len, ensure_optional_max_len,
    notification::NotificationDraft,
    optional,
};
use crate::errors::{AppError, Result};
use crate::realtime::{self, events, EventChannel, RoomEvent};
use crate::services::{AccessEventLog, Notifier};
use crate::store::{DeliveryStore, ResidentStore, Store};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeDelivery {
    pub company: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<DeliveryItem>,
    pub delivery_person: Option<DeliveryPerson>,
}

fn parse_status(status: Option<&str>) -> Result<DeliveryStatus> {
    match status.map(str::trim) {
        Some("authorized") => Ok(DeliveryStatus::Authorized),
        Some("delivered") => Ok(DeliveryStatus::Delivered),
        Some("failed") => Ok(DeliveryStatus::Failed),
        Some("cancelled") => Ok(DeliveryStatus::Cancelled),
        _ => Err(AppError::ValidationError("Invalid status".to_string())),
    }
}

/// Resident-authorized delivery windows and their outcome at the gate
#[derive(Clone)]
pub struct DeliveryTracker {
    store: Arc<dyn Store>,
    events: Arc<dyn EventChannel>,
    access_log: AccessEventLog,
    notifier: Notifier,
}

impl DeliveryTracker {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventChannel>,
        access_log: AccessEventLog,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            events,
            access_log,
            notifier,
        }
    }

    /// Expected date descending; residents see only their own.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Delivery>> {
        let scope = resident_scope(self.store.as_ref(), principal).await?;
        self.store.list_deliveries(scope.map(|r| r.id)).await
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn authorize(
        &self,
        principal: &Principal,
        input: AuthorizeDelivery,
    ) -> Result<Delivery> {
        authz::authorize(principal, authz::AUTHORIZE_DELIVERY, Ownership::NotApplicable)?;

        let (Some(company), Some(expected_date)) = (optional(input.company), input.expected_date)
        else {
            return Err(AppError::ValidationError(
                "Company and expected date are required".to_string(),
            ));
        };
        ensure_max_len("Delivery company", &company, 100)?;
        let tracking_number = optional(input.tracking_number);
        ensure_optional_max_len("Tracking number", tracking_number.as_deref(), 50)?;
        let notes = optional(input.notes);
        ensure_optional_max_len("Notes", notes.as_deref(), 500)?;
        for item in &input.items {
            item.validate()?;
        }

        let resident = own_resident(self.store.as_ref(), principal).await?;
        let now = Utc::now();
        let delivery = Delivery {
            id: Uuid::new_v4(),
            resident_id: resident.id,
            delivery_company: company,
            tracking_number,
            authorized_by: principal.user_id,
            expected_date,
            delivered_at: None,
            notes,
            status: DeliveryStatus::Authorized,
            items: input.items,
            delivery_person: input.delivery_person,
            created_at: now,
            updated_at: now,
        };
        let delivery = self.store.insert_delivery(delivery).await?;
        tracing::info!(delivery_id = %delivery.id, "Delivery authorized");

        let draft = NotificationDraft::delivery_scheduled(
            &delivery.delivery_company,
            delivery.tracking_number.as_deref(),
        );
        if let Err(e) = self.notifier.notify(principal.user_id, draft).await {
            tracing::error!(delivery_id = %delivery.id, "Delivery scheduled notification failed: {}", e);
        }
        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_security(
                events::DELIVERY_SCHEDULED,
                json!({
                    "deliveryId": delivery.id,
                    "residentId": delivery.resident_id,
                    "unitNumber": resident.unit_number,
                    "block": resident.block,
                    "company": delivery.delivery_company,
                    "trackingNumber": delivery.tracking_number,
                    "expectedDate": delivery.expected_date,
                }),
            ),
        )
        .await;

        Ok(delivery)
    }

    /// Any status may follow any other. Entering `delivered` stamps the time,
    /// logs the entrance and tells the resident.
    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn set_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status: Option<&str>,
    ) -> Result<Delivery> {
        authz::authorize(principal, authz::UPDATE_DELIVERY_STATUS, Ownership::NotApplicable)?;
        let status = parse_status(status)?;

        let mut delivery = self
            .store
            .find_delivery(id)
            .await?
            .ok_or(AppError::NotFound("Delivery"))?;
        delivery.set_status(status, Utc::now());
        let delivery = self.store.update_delivery(delivery).await?;
        tracing::info!(delivery_id = %delivery.id, status = ?delivery.status, "Delivery status changed");

        if status == DeliveryStatus::Delivered {
            self.complete(principal, &delivery).await?;
        }
        Ok(delivery)
    }

    async fn complete(&self, principal: &Principal, delivery: &Delivery) -> Result<()> {
        self.access_log
            .record(
                AccessEvent::delivery(delivery.id, AccessResult::Success, AccessMethod::Manual)
                    .with_details(json!({
                        "event": "delivery_completed",
                        "company": delivery.delivery_company,
                        "verifiedBy": principal.user_id,
                    })),
            )
            .await?;

        if let Some(resident) = self.store.find_resident(delivery.resident_id).await? {
            let draft = NotificationDraft::delivery_completed(&delivery.delivery_company);
            if let Err(e) = self.notifier.notify(resident.user_id, draft).await {
                tracing::error!(delivery_id = %delivery.id, "Delivery completed notification failed: {}", e);
            }
        }

        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_resident(
                delivery.resident_id,
                events::DELIVERY_COMPLETED,
                json!({
                    "deliveryId": delivery.id,
                    "company": delivery.delivery_company,
                    "deliveredAt": delivery.delivered_at,
                }),
            ),
        )
        .await;
        Ok(())
    }

    /// Authorized deliveries whose expected date has passed.
    pub async fn pending(&self, principal: &Principal) -> Result<Vec<Delivery>> {
        authz::authorize(principal, authz::VIEW_GATE_ACTIVITY, Ownership::NotApplicable)?;
        self.store.list_pending_deliveries(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_log::{AccessLogFilter, AccessPoint};
    use crate::domain::user::Role;
    use crate::realtime::rooms;
    use crate::services::test_support::Harness;
    use crate::services::PageRequest;
    use chrono::Duration;

    fn dhl(expected_in_hours: i64) -> AuthorizeDelivery {
        AuthorizeDelivery {
            company: Some("DHL".into()),
            tracking_number: Some("JD0001".into()),
            expected_date: Some(Utc::now() + Duration::hours(expected_in_hours)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_overdue_delivery_pending_until_delivered() {
        let h = Harness::new();
        let (resident, profile) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let tracker = &h.services.deliveries;

        let mut security_room = h.hub.subscribe();
        security_room.join(rooms::SECURITY);
        let mut resident_room = h.hub.subscribe();
        resident_room.join(rooms::resident(profile.id));

        let overdue = tracker.authorize(&resident, dhl(-2)).await.unwrap();
        let future = tracker.authorize(&resident, dhl(48)).await.unwrap();
        assert_eq!(overdue.status, DeliveryStatus::Authorized);
        assert_eq!(
            security_room.next().await.unwrap().event,
            events::DELIVERY_SCHEDULED
        );

        let pending = tracker.pending(&guard).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, overdue.id);

        let delivered = tracker
            .set_status(&guard, overdue.id, Some("delivered"))
            .await
            .unwrap();
        assert_eq!(delivered.status, DeliveryStatus::Delivered);
        assert!(delivered.delivered_at.is_some());
        assert!(tracker.pending(&guard).await.unwrap().is_empty());
        assert_eq!(
            resident_room.next().await.unwrap().event,
            events::DELIVERY_COMPLETED
        );

        let logs = h
            .services
            .access_log
            .query(&guard, AccessLogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(logs.pagination.total, 1);
        assert_eq!(logs.items[0].log.delivery_id, Some(overdue.id));
        assert_eq!(logs.items[0].log.access_point, AccessPoint::DeliveryEntrance);

        let inbox = h.services.notifier.list(&resident).await.unwrap();
        let titles: Vec<&str> = inbox.iter().map(|n| n.title.as_str()).collect();
        assert!(titles.contains(&"Delivery Scheduled"));
        assert!(titles.contains(&"Delivery Completed"));

        let listed = tracker.list(&resident).await.unwrap();
        assert_eq!(listed[0].id, future.id);
    }

    #[tokio::test]
    async fn test_delivery_flow_survives_inbox_failure() {
        let h = Harness::new();
        let (resident, profile) = h.resident().await;
        let guard = h.user(Role::Security).await;
        let tracker = &h.services.deliveries;
        let mut resident_room = h.hub.subscribe();
        resident_room.join(rooms::resident(profile.id));

        h.store.fail_notification_inserts(true);
        let delivery = tracker.authorize(&resident, dhl(1)).await.unwrap();
        let delivered = tracker
            .set_status(&guard, delivery.id, Some("delivered"))
            .await
            .unwrap();
        h.store.fail_notification_inserts(false);

        assert_eq!(delivered.status, DeliveryStatus::Delivered);
        assert_eq!(
            resident_room.next().await.unwrap().event,
            events::DELIVERY_COMPLETED
        );
        assert!(h.services.notifier.list(&resident).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_is_unconstrained_but_must_be_known() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let guard = h.user(Role::Admin).await;
        let tracker = &h.services.deliveries;
        let delivery = tracker.authorize(&resident, dhl(1)).await.unwrap();

        for status in ["cancelled", "authorized", "failed", "authorized"] {
            tracker
                .set_status(&guard, delivery.id, Some(status))
                .await
                .unwrap();
        }
        assert!(matches!(
            tracker.set_status(&guard, delivery.id, Some("lost")).await,
            Err(AppError::ValidationError(m)) if m == "Invalid status"
        ));
        assert!(matches!(
            tracker.set_status(&guard, Uuid::new_v4(), Some("failed")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            tracker.set_status(&resident, delivery.id, Some("failed")).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_validation() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let tracker = &h.services.deliveries;

        let missing = AuthorizeDelivery {
            company: Some("  ".into()),
            ..dhl(1)
        };
        assert!(matches!(
            tracker.authorize(&resident, missing).await,
            Err(AppError::ValidationError(m)) if m == "Company and expected date are required"
        ));

        let bad_item = AuthorizeDelivery {
            items: vec![DeliveryItem {
                description: "Box".into(),
                quantity: 0,
            }],
            ..dhl(1)
        };
        assert!(tracker.authorize(&resident, bad_item).await.is_err());

        let long_tracking = AuthorizeDelivery {
            tracking_number: Some("9".repeat(51)),
            ..dhl(1)
        };
        assert!(tracker.authorize(&resident, long_tracking).await.is_err());

        let guard = h.user(Role::Security).await;
        assert!(matches!(
            tracker.authorize(&guard, dhl(1)).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_for_residents() {
        let h = Harness::new();
        let (a, _) = h.resident().await;
        let (b, _) = h.resident().await;
        let tracker = &h.services.deliveries;
        tracker.authorize(&a, dhl(1)).await.unwrap();
        tracker.authorize(&b, dhl(2)).await.unwrap();

        assert_eq!(tracker.list(&a).await.unwrap().len(), 1);
        let guard = h.user(Role::Security).await;
        assert_eq!(tracker.list(&guard).await.unwrap().len(), 2);
    }
}
