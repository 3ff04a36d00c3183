use serde::Serialize;

use crate::catalog::{ModelConfig, PerformanceProfile};
use crate::ollama::metrics::ModelMetrics;
use crate::types::AuditCategory;

/// One catalog entry enriched with live availability and runtime metrics,
/// from the `list_models` tool.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub specializations: Vec<AuditCategory>,
    pub profile: PerformanceProfile,
    pub fallbacks: Vec<String>,
    /// Present in the backend's last-known tag list.
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ModelMetrics>,
}

impl ModelInfo {
    pub fn from_catalog(
        config: &ModelConfig,
        available: bool,
        metrics: Option<ModelMetrics>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            display_name: config.display_name.clone(),
            specializations: config.specializations.clone(),
            profile: config.profile,
            fallbacks: config.fallbacks.clone(),
            available,
            metrics,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListModelsResponse {
    pub models: Vec<ModelInfo>,
    /// Installed models the catalog does not know about.
    pub uncataloged: Vec<String>,
}
