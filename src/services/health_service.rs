//! Health service - liveness and dependency checks.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::infra::HealthCheck;

/// Overall status reported by a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Health check result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Per-dependency result, `"ok"` or the error message
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

#[async_trait]
pub trait HealthService: Send + Sync {
    /// Process liveness only
    async fn check(&self) -> HealthReport;

    /// Ping every registered dependency
    async fn deep_check(&self) -> HealthReport;
}

/// Pings a fixed set of named dependencies.
pub struct HealthMonitor {
    probes: Vec<(&'static str, Arc<dyn HealthCheck>)>,
}

impl HealthMonitor {
    pub fn new(probes: Vec<(&'static str, Arc<dyn HealthCheck>)>) -> Self {
        Self { probes }
    }
}

#[async_trait]
impl HealthService for HealthMonitor {
    async fn check(&self) -> HealthReport {
        HealthReport {
            status: HealthStatus::Ok,
            checks: BTreeMap::new(),
        }
    }

    async fn deep_check(&self) -> HealthReport {
        let results = futures::future::join_all(
            self.probes
                .iter()
                .map(|(name, probe)| async move { (*name, probe.ping().await) }),
        )
        .await;

        let mut status = HealthStatus::Ok;
        let mut checks = BTreeMap::new();
        for (name, result) in results {
            let outcome = match result {
                Ok(()) => "ok".to_string(),
                Err(e) => {
                    tracing::warn!(dependency = name, error = %e, "Health check failed");
                    status = HealthStatus::Degraded;
                    e.to_string()
                }
            };
            checks.insert(name.to_string(), outcome);
        }

        HealthReport { status, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{MemoryCache, MemoryDatabase};

    #[tokio::test]
    async fn test_deep_check_reports_each_dependency() {
        let db = MemoryDatabase::new();
        let cache = Arc::new(MemoryCache::new());
        let monitor = HealthMonitor::new(vec![
            ("database", db.clone() as Arc<dyn HealthCheck>),
            ("cache", cache.clone() as Arc<dyn HealthCheck>),
        ]);

        let report = monitor.deep_check().await;
        assert!(report.is_healthy());
        assert_eq!(report.checks["database"], "ok");

        cache.set_unavailable(true);
        let report = monitor.deep_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks["database"], "ok");
        assert_ne!(report.checks["cache"], "ok");
    }
}
