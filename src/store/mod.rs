// Repository traits over the document store.
//
// Every write is a single-record operation. The only multi-step guarantee is
// `GuestCodeStore::consume_guest_code`, which must check usability and record
// the use as one atomic conditional update.

pub mod memory;

use crate::domain::{
    access_log::{AccessLog, AccessLogEntry, AccessLogFilter, GroupCount},
    delivery::Delivery,
    guest_code::GuestCode,
    notification::Notification,
    resident::{Resident, ResidentFilter},
    user::User,
    visit::{GuestVisit, VisitFilter},
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new identity. Fails with `Conflict` on a duplicate email.
    async fn insert_user(&self, user: User) -> Result<User>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// All identities, newest first.
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn update_user(&self, user: User) -> Result<User>;
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait ResidentStore: Send + Sync {
    /// Insert a profile. Fails with `Conflict` if the identity already has one.
    async fn insert_resident(&self, resident: Resident) -> Result<Resident>;
    async fn find_resident(&self, id: Uuid) -> Result<Option<Resident>>;
    async fn find_resident_by_user(&self, user_id: Uuid) -> Result<Option<Resident>>;
    async fn list_residents(&self, filter: &ResidentFilter) -> Result<Vec<Resident>>;
    async fn update_resident(&self, resident: Resident) -> Result<Resident>;
    async fn delete_resident_by_user(&self, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait GuestCodeStore: Send + Sync {
    /// Insert a code. Fails with `Conflict` on a duplicate code string.
    async fn insert_guest_code(&self, code: GuestCode) -> Result<GuestCode>;
    async fn guest_code_exists(&self, code: &str) -> Result<bool>;
    async fn find_guest_code(&self, id: Uuid) -> Result<Option<GuestCode>>;
    async fn find_guest_code_by_code(&self, code: &str) -> Result<Option<GuestCode>>;
    /// Codes for one resident, or all codes, newest first.
    async fn list_guest_codes(&self, resident_id: Option<Uuid>) -> Result<Vec<GuestCode>>;
    /// Atomically record one use of `code` if it is usable at `now`.
    /// Returns the updated code, or `None` when nothing was consumed.
    async fn consume_guest_code(&self, code: &str, now: DateTime<Utc>)
        -> Result<Option<GuestCode>>;
    /// Persist the `expired` status for a code still stored as active past its window.
    async fn expire_guest_code(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
    async fn update_guest_code(&self, code: GuestCode) -> Result<GuestCode>;
}

#[async_trait]
pub trait VisitStore: Send + Sync {
    async fn insert_visit(&self, visit: GuestVisit) -> Result<GuestVisit>;
    async fn find_visit(&self, id: Uuid) -> Result<Option<GuestVisit>>;
    async fn update_visit(&self, visit: GuestVisit) -> Result<GuestVisit>;
    /// One page of matching visits by visit date descending, plus the total match count.
    async fn list_visits(
        &self,
        filter: &VisitFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<GuestVisit>, i64)>;
    /// Visits that are scheduled or arrived.
    async fn list_active_visits(&self) -> Result<Vec<GuestVisit>>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery>;
    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>>;
    async fn update_delivery(&self, delivery: Delivery) -> Result<Delivery>;
    /// Deliveries for one resident, or all, by expected date descending.
    async fn list_deliveries(&self, resident_id: Option<Uuid>) -> Result<Vec<Delivery>>;
    /// Authorized deliveries whose expected date is at or before `now`.
    async fn list_pending_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Delivery>>;
}

#[async_trait]
pub trait AccessLogStore: Send + Sync {
    /// Append one row. There is no update or delete.
    async fn append_access_log(&self, log: AccessLog) -> Result<AccessLog>;
    /// Newest first, with related-entity projections joined in.
    async fn query_access_logs(
        &self,
        filter: &AccessLogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLogEntry>>;
    async fn count_access_logs(&self, filter: &AccessLogFilter) -> Result<i64>;
    /// Counts grouped by (result, method, access point) within `[start, end]`.
    async fn group_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GroupCount>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;
    /// Unexpired notifications for `user_id`, newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>>;
    async fn find_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>>;
    async fn update_notification(&self, notification: Notification) -> Result<Notification>;
    /// Mark every unread, unexpired notification read. Returns rows changed.
    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>)
        -> Result<u64>;
    async fn count_unread_notifications(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64>;
    async fn delete_notification(&self, id: Uuid, user_id: Uuid, now: DateTime<Utc>)
        -> Result<bool>;
    /// Remove rows whose expiry has passed. Returns rows removed.
    async fn purge_expired_notifications(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Everything the services need from persistence.
#[async_trait]
pub trait Store:
    UserStore
    + ResidentStore
    + GuestCodeStore
    + VisitStore
    + DeliveryStore
    + AccessLogStore
    + NotificationStore
{
    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}
