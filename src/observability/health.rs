use crate::store::Store;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub store: ComponentStatus,
    pub redis: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: String,
    pub message: Option<String>,
}

impl ComponentStatus {
    fn with_status(status: &str, message: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            message,
        }
    }

    /// `ok` and `disabled` both count as healthy.
    fn is_healthy(&self) -> bool {
        self.status == "ok" || self.status == "disabled"
    }
}

pub struct HealthChecker {
    store: Arc<dyn Store>,
    redis_manager: Option<ConnectionManager>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn Store>, redis_manager: Option<ConnectionManager>) -> Self {
        Self {
            store,
            redis_manager,
        }
    }

    /// Liveness check - is the service running?
    pub async fn liveness(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                store: ComponentStatus::with_status("unknown", None),
                redis: ComponentStatus::with_status("unknown", None),
            },
        }
    }

    /// Readiness check - can the service handle requests?
    pub async fn readiness(&self) -> HealthStatus {
        let store_status = self.check_store().await;
        let redis_status = self.check_redis().await;

        let overall_status = if store_status.is_healthy() && redis_status.is_healthy() {
            "ok"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                store: store_status,
                redis: redis_status,
            },
        }
    }

    async fn check_store(&self) -> ComponentStatus {
        match self.store.ping().await {
            Ok(_) => ComponentStatus::with_status("ok", None),
            Err(e) => ComponentStatus::with_status(
                "error",
                Some(format!("Store check failed: {}", e)),
            ),
        }
    }

    async fn check_redis(&self) -> ComponentStatus {
        let Some(manager) = &self.redis_manager else {
            return ComponentStatus::with_status("disabled", None);
        };
        let mut manager = manager.clone();
        match crate::realtime::redis::health_check(&mut manager).await {
            Ok(_) => ComponentStatus::with_status("ok", None),
            Err(e) => ComponentStatus::with_status(
                "error",
                Some(format!("Redis check failed: {}", e)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_ready_with_memory_store_and_no_redis() {
        let checker = HealthChecker::new(Arc::new(MemoryStore::new()), None);
        let status = checker.readiness().await;
        assert!(status.is_ok());
        assert_eq!(status.checks.redis.status, "disabled");
        assert_eq!(status.checks.store.status, "ok");
    }
}
