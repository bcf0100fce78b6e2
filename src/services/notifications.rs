use crate::auth::Principal;
use crate::authz::{self, Ownership};
use crate::domain::{
    ensure_max_len,
    notification::{Notification, NotificationDraft, NotificationType, Priority},
    required,
};
use crate::errors::{AppError, Result};
use crate::realtime::{self, events, EventChannel, RoomEvent};
use crate::store::{NotificationStore, Store, UserStore};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use uuid::Uuid;

/// Administrator-authored notification addressed to one identity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
    pub priority: Option<Priority>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-user inbox with best-effort live delivery
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn Store>,
    events: Arc<dyn EventChannel>,
    list_limit: i64,
}

impl Notifier {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventChannel>, list_limit: i64) -> Self {
        Self {
            store,
            events,
            list_limit,
        }
    }

    /// Store an unread inbox row, then try to push it to the user's live sessions.
    /// A failed push leaves the stored row in place.
    pub async fn notify(&self, user_id: Uuid, draft: NotificationDraft) -> Result<Notification> {
        let notification = self
            .store
            .insert_notification(draft.into_notification(user_id, Utc::now()))
            .await?;

        let payload = serde_json::to_value(&notification)
            .map_err(|e| AppError::Internal(format!("Failed to encode notification: {}", e)))?;
        realtime::push(
            self.events.as_ref(),
            RoomEvent::to_user(user_id, events::NOTIFICATION, payload),
        )
        .await;

        Ok(notification)
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn send(&self, principal: &Principal, input: NewNotification) -> Result<Notification> {
        authz::authorize(principal, authz::SEND_NOTIFICATION, Ownership::NotApplicable)?;

        let user_id = input
            .user_id
            .ok_or_else(|| AppError::ValidationError("User is required".to_string()))?;
        let kind = input
            .kind
            .ok_or_else(|| AppError::ValidationError("Type is required".to_string()))?;
        let title = required("Title", input.title)?;
        ensure_max_len("Title", &title, 100)?;
        let message = required("Message", input.message)?;
        ensure_max_len("Message", &message, 500)?;

        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound("User"));
        }

        let mut draft = NotificationDraft::new(kind, title, message)
            .with_priority(input.priority.unwrap_or_default())
            .expires_at(input.expires_at);
        if let Some(data) = input.data {
            draft = draft.with_data(data);
        }

        self.notify(user_id, draft).await
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Notification>> {
        self.store
            .list_notifications(principal.user_id, Utc::now(), self.list_limit)
            .await
    }

    /// Idempotent; expired rows read as absent.
    pub async fn mark_read(&self, principal: &Principal, id: Uuid) -> Result<Notification> {
        let now = Utc::now();
        let mut notification = self
            .store
            .find_notification(id, principal.user_id, now)
            .await?
            .ok_or(AppError::NotFound("Notification"))?;

        if notification.mark_read(now) {
            notification = self.store.update_notification(notification).await?;
        }
        Ok(notification)
    }

    /// Returns how many rows changed; a repeat call reports zero.
    pub async fn mark_all_read(&self, principal: &Principal) -> Result<u64> {
        self.store
            .mark_all_notifications_read(principal.user_id, Utc::now())
            .await
    }

    pub async fn unread_count(&self, principal: &Principal) -> Result<i64> {
        self.store
            .count_unread_notifications(principal.user_id, Utc::now())
            .await
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        if !self
            .store
            .delete_notification(id, principal.user_id, Utc::now())
            .await?
        {
            return Err(AppError::NotFound("Notification"));
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.purge_expired_notifications(Utc::now()).await
    }

    /// Periodically remove notifications whose expiry has passed.
    pub fn spawn_purge(&self, every: Duration) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Notification purge started (interval={:?})", every);

            loop {
                ticker.tick().await;
                match notifier.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Purged expired notifications"),
                    Err(e) => tracing::error!("Failed to purge expired notifications: {:?}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use crate::services::test_support::Harness;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_notify_stores_and_pushes_to_user_room() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let mut sub = h.hub.subscribe();
        sub.join(realtime::rooms::user(resident.user_id));

        let stored = h
            .services
            .notifier
            .notify(resident.user_id, NotificationDraft::delivery_completed("DHL"))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.event, events::NOTIFICATION);
        assert_eq!(event.payload["id"], stored.id.to_string());
        assert_eq!(h.services.notifier.unread_count(&resident).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_twice_reports_zero() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let notifier = &h.services.notifier;
        for _ in 0..3 {
            notifier
                .notify(resident.user_id, NotificationDraft::guest_arrival("Ana", "123456"))
                .await
                .unwrap();
        }

        assert_eq!(notifier.mark_all_read(&resident).await.unwrap(), 3);
        assert_eq!(notifier.mark_all_read(&resident).await.unwrap(), 0);
        assert_eq!(notifier.unread_count(&resident).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_owner_scoped() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let other = h.user(Role::Security).await;
        let notifier = &h.services.notifier;
        let n = notifier
            .notify(resident.user_id, NotificationDraft::delivery_completed("UPS"))
            .await
            .unwrap();

        let first = notifier.mark_read(&resident, n.id).await.unwrap();
        let second = notifier.mark_read(&resident, n.id).await.unwrap();
        assert!(second.read);
        assert_eq!(first.read_at, second.read_at);

        assert!(matches!(
            notifier.mark_read(&other, n.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            notifier.delete(&other, n.id).await,
            Err(AppError::NotFound(_))
        ));
        notifier.delete(&resident, n.id).await.unwrap();
        assert!(notifier.list(&resident).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_rows_are_absent_before_purge() {
        let h = Harness::new();
        let (resident, _) = h.resident().await;
        let notifier = &h.services.notifier;
        let draft = NotificationDraft::new(NotificationType::Info, "Old", "Gone")
            .expires_at(Some(Utc::now() - ChronoDuration::minutes(1)));
        let n = notifier.notify(resident.user_id, draft).await.unwrap();

        assert!(notifier.list(&resident).await.unwrap().is_empty());
        assert!(matches!(
            notifier.mark_read(&resident, n.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(notifier.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_admin_and_fields() {
        let h = Harness::new();
        let admin = h.user(Role::Admin).await;
        let (resident, _) = h.resident().await;
        let notifier = &h.services.notifier;

        let input = NewNotification {
            user_id: Some(resident.user_id),
            kind: Some(NotificationType::Warning),
            title: Some("Water".into()),
            message: Some("Water will be off at noon".into()),
            ..Default::default()
        };
        assert!(matches!(
            notifier.send(&resident, input.clone()).await,
            Err(AppError::Forbidden(_))
        ));

        let sent = notifier.send(&admin, input.clone()).await.unwrap();
        assert_eq!(sent.priority, Priority::Medium);
        assert_eq!(sent.user_id, resident.user_id);

        let missing_title = NewNotification {
            title: None,
            ..input.clone()
        };
        assert!(matches!(
            notifier.send(&admin, missing_title).await,
            Err(AppError::ValidationError(_))
        ));

        let unknown_user = NewNotification {
            user_id: Some(Uuid::new_v4()),
            ..input
        };
        assert!(matches!(
            notifier.send(&admin, unknown_user).await,
            Err(AppError::NotFound(_))
        ));
    }
}
