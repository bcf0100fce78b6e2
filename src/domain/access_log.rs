use super::{
    delivery::DeliverySummary, guest_code::GuestCodeSummary, user::UserSummary,
    visit::VisitSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "access_point", rename_all = "snake_case")]
pub enum AccessPoint {
    MainGate,
    SideGate,
    EmergencyExit,
    DeliveryEntrance,
}

impl Default for AccessPoint {
    fn default() -> Self {
        AccessPoint::MainGate
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "access_result", rename_all = "lowercase")]
pub enum AccessResult {
    Success,
    Failure,
    Denied,
}

impl AccessResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessResult::Success => "success",
            AccessResult::Failure => "failure",
            AccessResult::Denied => "denied",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "access_method")]
pub enum AccessMethod {
    #[serde(rename = "QR")]
    #[sqlx(rename = "QR")]
    Qr,
    #[serde(rename = "PIN")]
    #[sqlx(rename = "PIN")]
    Pin,
    #[serde(rename = "manual")]
    #[sqlx(rename = "manual")]
    Manual,
    #[serde(rename = "keycard")]
    #[sqlx(rename = "keycard")]
    Keycard,
    #[serde(rename = "biometric")]
    #[sqlx(rename = "biometric")]
    Biometric,
}

impl AccessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::Qr => "QR",
            AccessMethod::Pin => "PIN",
            AccessMethod::Manual => "manual",
            AccessMethod::Keycard => "keycard",
            AccessMethod::Biometric => "biometric",
        }
    }
}

impl Default for AccessMethod {
    fn default() -> Self {
        AccessMethod::Manual
    }
}

impl From<super::guest_code::GuestCodeType> for AccessMethod {
    fn from(code_type: super::guest_code::GuestCodeType) -> Self {
        match code_type {
            super::guest_code::GuestCodeType::Qr => AccessMethod::Qr,
            super::guest_code::GuestCodeType::Pin => AccessMethod::Pin,
        }
    }
}

/// Request metadata captured with every access event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Append-only access event. Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_code_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub delivery_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub access_point: AccessPoint,
    pub result: AccessResult,
    pub method: AccessMethod,
    /// Free-form metadata. Conventional keys: `code`, `reason`, `guestName`,
    /// `verifiedBy`, `event`.
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub security_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Builder for access events, one entry point per actor kind
#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub user_id: Option<Uuid>,
    pub guest_code_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub delivery_id: Option<Uuid>,
    pub access_point: AccessPoint,
    pub result: AccessResult,
    pub method: AccessMethod,
    pub details: serde_json::Value,
    pub meta: RequestMeta,
    pub security_notes: Option<String>,
}

impl AccessEvent {
    pub fn new(result: AccessResult, method: AccessMethod) -> Self {
        Self {
            user_id: None,
            guest_code_id: None,
            visit_id: None,
            delivery_id: None,
            access_point: AccessPoint::default(),
            result,
            method,
            details: serde_json::json!({}),
            meta: RequestMeta::default(),
            security_notes: None,
        }
    }

    pub fn resident(user_id: Uuid, result: AccessResult, method: AccessMethod) -> Self {
        let mut event = Self::new(result, method);
        event.user_id = Some(user_id);
        event
    }

    pub fn guest(
        guest_code_id: Option<Uuid>,
        visit_id: Option<Uuid>,
        result: AccessResult,
        method: AccessMethod,
    ) -> Self {
        let mut event = Self::new(result, method);
        event.guest_code_id = guest_code_id;
        event.visit_id = visit_id;
        event
    }

    pub fn delivery(delivery_id: Uuid, result: AccessResult, method: AccessMethod) -> Self {
        let mut event = Self::new(result, method);
        event.delivery_id = Some(delivery_id);
        event.access_point = AccessPoint::DeliveryEntrance;
        event
    }

    pub fn at(mut self, access_point: AccessPoint) -> Self {
        self.access_point = access_point;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_security_notes(mut self, notes: Option<String>) -> Self {
        self.security_notes = notes;
        self
    }

    pub fn into_log(self, now: DateTime<Utc>) -> AccessLog {
        AccessLog {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            guest_code_id: self.guest_code_id,
            visit_id: self.visit_id,
            delivery_id: self.delivery_id,
            timestamp: now,
            access_point: self.access_point,
            result: self.result,
            method: self.method,
            details: self.details,
            ip_address: self.meta.ip_address,
            user_agent: self.meta.user_agent,
            security_notes: self.security_notes,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessLogFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub result: Option<AccessResult>,
    pub method: Option<AccessMethod>,
    pub access_point: Option<AccessPoint>,
    pub user_id: Option<Uuid>,
}

impl AccessLogFilter {
    pub fn matches(&self, log: &AccessLog) -> bool {
        self.start.map_or(true, |s| log.timestamp >= s)
            && self.end.map_or(true, |e| log.timestamp <= e)
            && self.result.map_or(true, |r| log.result == r)
            && self.method.map_or(true, |m| log.method == m)
            && self.access_point.map_or(true, |p| log.access_point == p)
            && self.user_id.map_or(true, |u| log.user_id == Some(u))
    }
}

/// A stored row with read-time projections of the referenced entities.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    #[serde(flatten)]
    pub log: AccessLog,
    pub user: Option<UserSummary>,
    pub guest_code: Option<GuestCodeSummary>,
    pub visit: Option<VisitSummary>,
    pub delivery: Option<DeliverySummary>,
}

/// First-stage aggregation: one count per (result, method, access point).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GroupCount {
    pub result: AccessResult,
    pub method: AccessMethod,
    pub access_point: AccessPoint,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCount {
    pub method: AccessMethod,
    pub access_point: AccessPoint,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStatistics {
    pub result: AccessResult,
    pub methods: Vec<MethodCount>,
    pub total: i64,
}

/// Second-stage rollup: regroup the per-triple counts by result, keeping the
/// per-method/point breakdown and a total for each result.
pub fn roll_up(groups: impl IntoIterator<Item = GroupCount>) -> Vec<ResultStatistics> {
    let mut by_result: BTreeMap<AccessResult, ResultStatistics> = BTreeMap::new();

    for group in groups {
        let entry = by_result
            .entry(group.result)
            .or_insert_with(|| ResultStatistics {
                result: group.result,
                methods: Vec::new(),
                total: 0,
            });
        entry.total += group.count;
        entry.methods.push(MethodCount {
            method: group.method,
            access_point: group.access_point,
            count: group.count,
        });
    }

    by_result
        .into_values()
        .map(|mut stats| {
            stats.methods.sort_by_key(|m| (m.method, m.access_point));
            stats
        })
        .collect()
}

/// First-stage grouping done in memory, for stores without an aggregation engine.
pub fn group_counts<'a>(logs: impl IntoIterator<Item = &'a AccessLog>) -> Vec<GroupCount> {
    let mut counts: BTreeMap<(AccessResult, AccessMethod, AccessPoint), i64> = BTreeMap::new();
    for log in logs {
        *counts
            .entry((log.result, log.method, log.access_point))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((result, method, access_point), count)| GroupCount {
            result,
            method,
            access_point,
            count,
        })
        .collect()
}
