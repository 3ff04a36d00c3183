use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::audit::orchestrator::AuditorSettingsPatch;

/// Parameters for the `update_config` tool. Auditor settings apply live;
/// backend settings are accepted but need a restart to take effect.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UpdateConfigRequest {
    /// Per-category auditor patches, keyed by category name.
    pub auditors: Option<BTreeMap<String, AuditorSettingsPatch>>,
    /// Backend connection patches (restart required).
    pub backend: Option<BackendPatch>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct BackendPatch {
    pub host: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl BackendPatch {
    pub fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.timeout_ms.is_none()
            && self.retry_attempts.is_none()
            && self.retry_delay_ms.is_none()
    }
}
