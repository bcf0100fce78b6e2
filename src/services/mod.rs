// Application components: validation, authorization and side effects over the store

pub mod access_log;
pub mod deliveries;
pub mod directory;
pub mod guest_codes;
pub mod notifications;
pub mod visits;

pub use access_log::AccessEventLog;
pub use deliveries::DeliveryTracker;
pub use directory::Directory;
pub use guest_codes::GuestCodeRegistry;
pub use notifications::Notifier;
pub use visits::VisitTracker;

use crate::auth::{JwtManager, Principal};
use crate::config::Config;
use crate::domain::resident::Resident;
use crate::errors::{AppError, Result};
use crate::realtime::EventChannel;
use crate::store::{ResidentStore, Store};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Every component, wired to one store and one event channel.
#[derive(Clone)]
pub struct Services {
    pub directory: Directory,
    pub guest_codes: GuestCodeRegistry,
    pub visits: VisitTracker,
    pub deliveries: DeliveryTracker,
    pub access_log: AccessEventLog,
    pub notifier: Notifier,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventChannel>,
        jwt: Arc<JwtManager>,
        config: &Config,
    ) -> Self {
        let access_log = AccessEventLog::new(store.clone());
        let notifier = Notifier::new(
            store.clone(),
            events.clone(),
            config.notifications.list_limit,
        );

        Self {
            directory: Directory::new(store.clone(), jwt, config.auth.password_min_length),
            guest_codes: GuestCodeRegistry::new(
                store.clone(),
                events.clone(),
                access_log.clone(),
                notifier.clone(),
                config.guest_codes.clone(),
            ),
            visits: VisitTracker::new(store.clone(), events.clone(), access_log.clone()),
            deliveries: DeliveryTracker::new(store, events, access_log.clone(), notifier.clone()),
            access_log,
            notifier,
        }
    }
}

/// 1-based page number and page size taken from query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip. Saturates so an absurd page number yields an empty page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn paginate<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            items,
            pagination: Pagination {
                current: self.page,
                pages: (total + self.limit - 1) / self.limit,
                total,
            },
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// The caller's own resident profile; residents without one cannot act.
pub(crate) async fn own_resident(store: &dyn Store, principal: &Principal) -> Result<Resident> {
    store
        .find_resident_by_user(principal.user_id)
        .await?
        .ok_or(AppError::NotFound("Resident profile"))
}

/// The caller's profile when they are a resident, `None` for every other role.
pub(crate) async fn resident_scope(store: &dyn Store, principal: &Principal) -> Result<Option<Resident>> {
    if principal.role == crate::domain::user::Role::Resident {
        return own_resident(store, principal).await.map(Some);
    }
    Ok(None)
}
