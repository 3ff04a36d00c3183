use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall service health, from the `health_check` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: HealthChecks,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub backend: BackendHealth,
    pub auditors: AuditorsHealth,
    pub system: SystemHealth,
}

#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub reachable: bool,
    pub host: String,
    pub available_models: usize,
}

#[derive(Debug, Serialize)]
pub struct AuditorsHealth {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemHealth {
    pub active_audits: usize,
    pub version: String,
}

impl HealthCheckResult {
    /// Unreachable backend is unhealthy; reachable with nothing installed is
    /// degraded (audits will fail selection); otherwise healthy.
    pub fn derive_status(reachable: bool, available_models: usize) -> HealthStatus {
        if !reachable {
            HealthStatus::Unhealthy
        } else if available_models == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
