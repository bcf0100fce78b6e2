// Per-user inbox entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Alert,
    Emergency,
    Success,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "notification_priority", rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Free-form payload. System events carry an `eventType` key.
    pub data: serde_json::Value,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Expired rows are logically absent even before the purge removes them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| now > at)
    }

    /// Idempotent: an already-read notification keeps its original read time.
    /// Returns whether anything changed.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(now);
        self.updated_at = now;
        true
    }
}

/// Content of a notification before it is addressed and stored.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub priority: Priority,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            data: json!({}),
            priority: Priority::default(),
            expires_at: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn guest_arrival(guest_name: &str, code: &str) -> Self {
        Self::new(
            NotificationType::Info,
            "Guest Arrival",
            format!(
                "{} has arrived at the main gate using code {}",
                guest_name, code
            ),
        )
        .with_data(json!({
            "guestName": guest_name,
            "guestCode": code,
            "eventType": "guest_arrival",
        }))
    }

    pub fn delivery_scheduled(company: &str, tracking_number: Option<&str>) -> Self {
        let suffix = tracking_number
            .map(|t| format!(" ({})", t))
            .unwrap_or_default();
        Self::new(
            NotificationType::Alert,
            "Delivery Scheduled",
            format!("{} delivery scheduled{}", company, suffix),
        )
        .with_data(json!({
            "company": company,
            "trackingNumber": tracking_number,
            "eventType": "delivery_scheduled",
        }))
    }

    pub fn delivery_completed(company: &str) -> Self {
        Self::new(
            NotificationType::Success,
            "Delivery Completed",
            format!("{} delivery has been completed", company),
        )
        .with_data(json!({
            "company": company,
            "eventType": "delivery_completed",
        }))
    }

    pub fn into_notification(self, user_id: Uuid, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            data: self.data,
            read: false,
            read_at: None,
            priority: self.priority,
            expires_at: self.expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let mut n = NotificationDraft::new(NotificationType::Info, "t", "m")
            .into_notification(Uuid::new_v4(), now);
        assert!(!n.is_expired(now));
        n.expires_at = Some(now - Duration::seconds(1));
        assert!(n.is_expired(now));
    }

    #[test]
    fn test_mark_read_idempotent() {
        let now = Utc::now();
        let mut n = NotificationDraft::new(NotificationType::Info, "t", "m")
            .into_notification(Uuid::new_v4(), now);
        assert!(n.mark_read(now));
        let first = n.read_at;
        assert!(!n.mark_read(now + Duration::minutes(5)));
        assert_eq!(n.read_at, first);
    }

    #[test]
    fn test_system_messages() {
        let draft = NotificationDraft::delivery_scheduled("UPS", Some("1Z999"));
        assert_eq!(draft.message, "UPS delivery scheduled (1Z999)");
        assert_eq!(draft.kind, NotificationType::Alert);
        assert_eq!(draft.data["eventType"], "delivery_scheduled");

        let draft = NotificationDraft::delivery_scheduled("UPS", None);
        assert_eq!(draft.message, "UPS delivery scheduled");

        let draft = NotificationDraft::guest_arrival("Ana", "123456");
        assert_eq!(
            draft.message,
            "Ana has arrived at the main gate using code 123456"
        );
    }

    #[test]
    fn test_type_field_name() {
        let n = NotificationDraft::new(NotificationType::Warning, "t", "m")
            .into_notification(Uuid::new_v4(), Utc::now());
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["read"], false);
    }
}
