// Database queries for the append-only access log

use super::PgStore;
use crate::domain::{
    access_log::{AccessLog, AccessLogEntry, AccessLogFilter, GroupCount},
    delivery::DeliverySummary,
    guest_code::{GuestCodeSummary, GuestCodeType},
    user::{Role, UserSummary},
    visit::VisitSummary,
};
use crate::errors::Result;
use crate::store::AccessLogStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};

const LOG_COLUMNS: &str = "id, user_id, guest_code_id, visit_id, delivery_id, timestamp, \
                           access_point, result, method, details, ip_address, user_agent, \
                           security_notes, created_at";

/// A log row with the referenced entities' display columns joined in.
#[derive(Debug, FromRow)]
struct EntryRow {
    #[sqlx(flatten)]
    log: AccessLog,
    user_name: Option<String>,
    user_email: Option<String>,
    user_role: Option<Role>,
    code_guest_name: Option<String>,
    code_type: Option<GuestCodeType>,
    visit_guest_name: Option<String>,
    visit_purpose: Option<String>,
    delivery_company: Option<String>,
    delivery_tracking_number: Option<String>,
}

impl From<EntryRow> for AccessLogEntry {
    fn from(row: EntryRow) -> Self {
        let user = match (row.user_name, row.user_email, row.user_role) {
            (Some(name), Some(email), Some(role)) => Some(UserSummary { name, email, role }),
            _ => None,
        };
        let guest_code = match (row.code_guest_name, row.code_type) {
            (Some(guest_name), Some(code_type)) => Some(GuestCodeSummary {
                guest_name,
                code_type,
            }),
            _ => None,
        };
        let visit = row.visit_guest_name.map(|guest_name| VisitSummary {
            guest_name,
            purpose: row.visit_purpose,
        });
        let delivery = row.delivery_company.map(|company| DeliverySummary {
            company,
            tracking_number: row.delivery_tracking_number,
        });

        Self {
            log: row.log,
            user,
            guest_code,
            visit,
            delivery,
        }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &AccessLogFilter) {
    if let Some(start) = filter.start {
        query.push(" AND l.timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        query.push(" AND l.timestamp <= ").push_bind(end);
    }
    if let Some(result) = filter.result {
        query.push(" AND l.result = ").push_bind(result);
    }
    if let Some(method) = filter.method {
        query.push(" AND l.method = ").push_bind(method);
    }
    if let Some(access_point) = filter.access_point {
        query.push(" AND l.access_point = ").push_bind(access_point);
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND l.user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl AccessLogStore for PgStore {
    async fn append_access_log(&self, log: AccessLog) -> Result<AccessLog> {
        let sql = format!(
            "INSERT INTO access_logs ({LOG_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {LOG_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, AccessLog>(&sql)
            .bind(log.id)
            .bind(log.user_id)
            .bind(log.guest_code_id)
            .bind(log.visit_id)
            .bind(log.delivery_id)
            .bind(log.timestamp)
            .bind(log.access_point)
            .bind(log.result)
            .bind(log.method)
            .bind(&log.details)
            .bind(&log.ip_address)
            .bind(&log.user_agent)
            .bind(&log.security_notes)
            .bind(log.created_at)
            .fetch_one(self.pool())
            .await?;
        Ok(stored)
    }

    async fn query_access_logs(
        &self,
        filter: &AccessLogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccessLogEntry>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT l.id, l.user_id, l.guest_code_id, l.visit_id, l.delivery_id, l.timestamp, \
                    l.access_point, l.result, l.method, l.details, l.ip_address, l.user_agent, \
                    l.security_notes, l.created_at, \
                    u.name AS user_name, u.email AS user_email, u.role AS user_role, \
                    c.guest_name AS code_guest_name, c.code_type AS code_type, \
                    v.guest_name AS visit_guest_name, v.purpose AS visit_purpose, \
                    d.delivery_company AS delivery_company, \
                    d.tracking_number AS delivery_tracking_number \
             FROM access_logs l \
             LEFT JOIN users u ON u.id = l.user_id \
             LEFT JOIN guest_codes c ON c.id = l.guest_code_id \
             LEFT JOIN guest_visits v ON v.id = l.visit_id \
             LEFT JOIN deliveries d ON d.id = l.delivery_id \
             WHERE TRUE",
        );
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY l.timestamp DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<EntryRow>()
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_access_logs(&self, filter: &AccessLogFilter) -> Result<i64> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM access_logs l WHERE TRUE");
        push_filter(&mut query, filter);
        let total: i64 = query
            .build_query_scalar()
            .fetch_one(self.pool())
            .await?;
        Ok(total)
    }

    async fn group_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GroupCount>> {
        let groups = sqlx::query_as::<_, GroupCount>(
            "SELECT result, method, access_point, COUNT(*) AS count \
             FROM access_logs \
             WHERE timestamp >= $1 AND timestamp <= $2 \
             GROUP BY result, method, access_point \
             ORDER BY result, method, access_point",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_store;
    use crate::domain::access_log::{roll_up, AccessEvent, AccessMethod, AccessResult};
    use chrono::Duration;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_group_counts_within_window() {
        let store = create_test_store().await;
        // Far-future window so rows from other runs do not interfere.
        let base = Utc::now() + Duration::days(365 * 50 + rand::random::<u16>() as i64);

        for i in 0..6 {
            let method = if i % 2 == 0 { AccessMethod::Pin } else { AccessMethod::Qr };
            let log = AccessEvent::new(AccessResult::Success, method).into_log(base);
            store.append_access_log(log).await.unwrap();
        }
        for _ in 0..4 {
            let log = AccessEvent::new(AccessResult::Denied, AccessMethod::Pin).into_log(base);
            store.append_access_log(log).await.unwrap();
        }

        let groups = store
            .group_access_logs(base - Duration::seconds(1), base + Duration::seconds(1))
            .await
            .unwrap();
        let stats = roll_up(groups);
        assert_eq!(stats[0].total, 6);
        assert_eq!(stats[1].total, 4);
    }
}
