// In-memory store used for local development and tests.
//
// All tables sit behind one lock, so every trait method is atomic with
// respect to every other.

use super::{
    AccessLogStore, DeliveryStore, GuestCodeStore, NotificationStore, ResidentStore, Store,
    UserStore, VisitStore,
};
use crate::domain::{
    access_log::{group_counts, AccessLog, AccessLogEntry, AccessLogFilter, GroupCount},
    delivery::{Delivery, DeliverySummary},
    guest_code::{GuestCode, GuestCodeStatus, GuestCodeSummary},
    notification::Notification,
    resident::{Resident, ResidentFilter},
    user::{User, UserSummary},
    visit::{GuestVisit, VisitFilter, VisitStatus, VisitSummary},
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    residents: Vec<Resident>,
    guest_codes: Vec<GuestCode>,
    visits: Vec<GuestVisit>,
    deliveries: Vec<Delivery>,
    access_logs: Vec<AccessLog>,
    notifications: Vec<Notification>,
}

/// Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(test)]
    fail_notifications: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every notification insert fail until switched off again.
    #[cfg(test)]
    pub(crate) fn fail_notification_inserts(&self, fail: bool) {
        self.fail_notifications
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Newest first by `key`, with later insertions ahead of earlier ones on ties.
fn newest_first<T: Clone, K: Ord>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    out
}

fn replace<T>(rows: &mut [T], id: Uuid, id_of: impl Fn(&T) -> Uuid, value: T, what: &'static str)
    -> Result<()>
{
    match rows.iter_mut().find(|r| id_of(r) == id) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(AppError::NotFound(what)),
    }
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.users, |u| u.created_at))
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        replace(&mut tables.users, user.id, |u| u.id, user.clone(), "User")?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        Ok(tables.users.len() != before)
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ResidentStore for MemoryStore {
    async fn insert_resident(&self, resident: Resident) -> Result<Resident> {
        let mut tables = self.tables.write().await;
        if tables
            .residents
            .iter()
            .any(|r| r.user_id == resident.user_id)
        {
            return Err(AppError::Conflict(
                "Resident profile already exists for this user".to_string(),
            ));
        }
        tables.residents.push(resident.clone());
        Ok(resident)
    }

    async fn find_resident(&self, id: Uuid) -> Result<Option<Resident>> {
        let tables = self.tables.read().await;
        Ok(tables.residents.iter().find(|r| r.id == id).cloned())
    }

    async fn find_resident_by_user(&self, user_id: Uuid) -> Result<Option<Resident>> {
        let tables = self.tables.read().await;
        Ok(tables
            .residents
            .iter()
            .find(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_residents(&self, filter: &ResidentFilter) -> Result<Vec<Resident>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Resident> = tables
            .residents
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.block.as_str(), a.unit_number.as_str()).cmp(&(b.block.as_str(), b.unit_number.as_str()))
        });
        Ok(rows)
    }

    async fn update_resident(&self, resident: Resident) -> Result<Resident> {
        let mut tables = self.tables.write().await;
        replace(
            &mut tables.residents,
            resident.id,
            |r| r.id,
            resident.clone(),
            "Resident profile",
        )?;
        Ok(resident)
    }

    async fn delete_resident_by_user(&self, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.residents.len();
        tables.residents.retain(|r| r.user_id != user_id);
        Ok(tables.residents.len() != before)
    }
}

#[async_trait]
impl GuestCodeStore for MemoryStore {
    async fn insert_guest_code(&self, code: GuestCode) -> Result<GuestCode> {
        let mut tables = self.tables.write().await;
        if tables.guest_codes.iter().any(|c| c.code == code.code) {
            return Err(AppError::Conflict("Guest code already exists".to_string()));
        }
        tables.guest_codes.push(code.clone());
        Ok(code)
    }

    async fn guest_code_exists(&self, code: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.guest_codes.iter().any(|c| c.code == code))
    }

    async fn find_guest_code(&self, id: Uuid) -> Result<Option<GuestCode>> {
        let tables = self.tables.read().await;
        Ok(tables.guest_codes.iter().find(|c| c.id == id).cloned())
    }

    async fn find_guest_code_by_code(&self, code: &str) -> Result<Option<GuestCode>> {
        let tables = self.tables.read().await;
        Ok(tables.guest_codes.iter().find(|c| c.code == code).cloned())
    }

    async fn list_guest_codes(&self, resident_id: Option<Uuid>) -> Result<Vec<GuestCode>> {
        let tables = self.tables.read().await;
        let rows: Vec<GuestCode> = tables
            .guest_codes
            .iter()
            .filter(|c| resident_id.map_or(true, |r| c.resident_id == r))
            .cloned()
            .collect();
        Ok(newest_first(&rows, |c| c.created_at))
    }

    async fn consume_guest_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GuestCode>> {
        // Check and mark under the same write guard.
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.guest_codes.iter_mut().find(|c| c.code == code) else {
            return Ok(None);
        };
        if stored.record_use(now).is_err() {
            return Ok(None);
        }
        Ok(Some(stored.clone()))
    }

    async fn expire_guest_code(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.guest_codes.iter_mut().find(|c| c.id == id) {
            if stored.status == GuestCodeStatus::Active && now > stored.valid_until {
                stored.status = GuestCodeStatus::Expired;
                stored.updated_at = now;
            }
        }
        Ok(())
    }

    async fn update_guest_code(&self, code: GuestCode) -> Result<GuestCode> {
        let mut tables = self.tables.write().await;
        replace(
            &mut tables.guest_codes,
            code.id,
            |c| c.id,
            code.clone(),
            "Guest code",
        )?;
        Ok(code)
    }
}

#[async_trait]
impl VisitStore for MemoryStore {
    async fn insert_visit(&self, visit: GuestVisit) -> Result<GuestVisit> {
        let mut tables = self.tables.write().await;
        tables.visits.push(visit.clone());
        Ok(visit)
    }

    async fn find_visit(&self, id: Uuid) -> Result<Option<GuestVisit>> {
        let tables = self.tables.read().await;
        Ok(tables.visits.iter().find(|v| v.id == id).cloned())
    }

    async fn update_visit(&self, visit: GuestVisit) -> Result<GuestVisit> {
        let mut tables = self.tables.write().await;
        replace(
            &mut tables.visits,
            visit.id,
            |v| v.id,
            visit.clone(),
            "Guest visit",
        )?;
        Ok(visit)
    }

    async fn list_visits(
        &self,
        filter: &VisitFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<GuestVisit>, i64)> {
        let tables = self.tables.read().await;
        let matching: Vec<GuestVisit> = tables
            .visits
            .iter()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let sorted = newest_first(&matching, |v| v.visit_date);
        Ok((page(sorted, limit, offset), total))
    }

    async fn list_active_visits(&self) -> Result<Vec<GuestVisit>> {
        let tables = self.tables.read().await;
        let rows: Vec<GuestVisit> = tables
            .visits
            .iter()
            .filter(|v| matches!(v.status, VisitStatus::Scheduled | VisitStatus::Arrived))
            .cloned()
            .collect();
        Ok(newest_first(&rows, |v| v.visit_date))
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery> {
        let mut tables = self.tables.write().await;
        tables.deliveries.push(delivery.clone());
        Ok(delivery)
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>> {
        let tables = self.tables.read().await;
        Ok(tables.deliveries.iter().find(|d| d.id == id).cloned())
    }

    async fn update_delivery(&self, delivery: Delivery) -> Result<Delivery> {
        let mut tables = self.tables.write().await;
        replace(
            &mut tables.deliveries,
            delivery.id,
            |d| d.id,
            delivery.clone(),
            "Delivery",
        )?;
        Ok(delivery)
    }

    async fn list_deliveries(&self, resident_id: Option<Uuid>) -> Result<Vec<Delivery>> {
        let tables = self.tables.read().await;
        let rows: Vec<Delivery> = tables
            .deliveries
            .iter()
            .filter(|d| resident_id.map_or(true, |r| d.resident_id == r))
            .cloned()
            .collect();
        Ok(newest_first(&rows, |d| d.expected_date))
    }

    async fn list_pending_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Delivery>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Delivery> = tables
            .deliveries
            .iter()
            .filter(|d| d.is_pending(now))
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.expected_date);
        Ok(rows)
    }
}

#[async_trait]
impl AccessLogStore for MemoryStore {
    async fn append_access_log(&self, log: AccessLog) -> Result<AccessLog> {
        let mut tables = self.tables.write().await;
        tables.access_logs.push(log.clone());
        Ok(log)
    }

    async fn query_access_logs(
        &self,
        filter: &AccessLogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLogEntry>> {
        let tables = self.tables.read().await;
        let matching: Vec<AccessLog> = tables
            .access_logs
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        let rows = page(newest_first(&matching, |l| l.timestamp), limit, offset);

        Ok(rows
            .into_iter()
            .map(|log| AccessLogEntry {
                user: log
                    .user_id
                    .and_then(|id| tables.users.iter().find(|u| u.id == id))
                    .map(UserSummary::from),
                guest_code: log
                    .guest_code_id
                    .and_then(|id| tables.guest_codes.iter().find(|c| c.id == id))
                    .map(GuestCodeSummary::from),
                visit: log
                    .visit_id
                    .and_then(|id| tables.visits.iter().find(|v| v.id == id))
                    .map(VisitSummary::from),
                delivery: log
                    .delivery_id
                    .and_then(|id| tables.deliveries.iter().find(|d| d.id == id))
                    .map(DeliverySummary::from),
                log,
            })
            .collect())
    }

    async fn count_access_logs(&self, filter: &AccessLogFilter) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .access_logs
            .iter()
            .filter(|l| filter.matches(l))
            .count() as i64)
    }

    async fn group_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GroupCount>> {
        let tables = self.tables.read().await;
        Ok(group_counts(
            tables
                .access_logs
                .iter()
                .filter(|l| l.timestamp >= start && l.timestamp <= end),
        ))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        #[cfg(test)]
        if self.fail_notifications.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::Internal("notification inserts disabled".to_string()));
        }
        let mut tables = self.tables.write().await;
        tables.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let rows: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_expired(now))
            .cloned()
            .collect();
        Ok(page(newest_first(&rows, |n| n.created_at), limit, 0))
    }

    async fn find_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .find(|n| n.id == id && n.user_id == user_id && !n.is_expired(now))
            .cloned())
    }

    async fn update_notification(&self, notification: Notification) -> Result<Notification> {
        let mut tables = self.tables.write().await;
        replace(
            &mut tables.notifications,
            notification.id,
            |n| n.id,
            notification.clone(),
            "Notification",
        )?;
        Ok(notification)
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for n in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_expired(now))
        {
            if n.mark_read(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_unread_notifications(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read && !n.is_expired(now))
            .count() as i64)
    }

    async fn delete_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id && !n.is_expired(now)));
        Ok(tables.notifications.len() != before)
    }

    async fn purge_expired_notifications(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|n| !n.is_expired(now));
        Ok((before - tables.notifications.len()) as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guest_code::sample_code;
    use chrono::Duration;

    #[tokio::test]
    async fn test_consume_is_single_use_under_contention() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = sample_code(
            GuestCodeStatus::Active,
            now - Duration::minutes(1),
            now + Duration::hours(1),
            0,
            1,
        );
        store.insert_guest_code(code.clone()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let value = code.code.clone();
            handles.push(tokio::spawn(async move {
                store.consume_guest_code(&value, Utc::now()).await.unwrap()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);

        let stored = store.find_guest_code(code.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GuestCodeStatus::Used);
        assert_eq!(stored.usage_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = sample_code(GuestCodeStatus::Active, now, now, 0, 1);
        store.insert_guest_code(code.clone()).await.unwrap();

        let mut dup = code.clone();
        dup.id = Uuid::new_v4();
        assert!(matches!(
            store.insert_guest_code(dup).await,
            Err(AppError::Conflict(_))
        ));
        assert!(store.guest_code_exists(&code.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_only_touches_stale_active_codes() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stale = sample_code(
            GuestCodeStatus::Active,
            now - Duration::days(2),
            now - Duration::days(1),
            0,
            1,
        );
        store.insert_guest_code(stale.clone()).await.unwrap();
        store.expire_guest_code(stale.id, now).await.unwrap();
        let stored = store.find_guest_code(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GuestCodeStatus::Expired);
    }
}
