use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::audit::orchestrator::Orchestrator;
use crate::catalog::ModelCatalog;
use crate::config::{SelectionStrategyKind, ServerConfig};
use crate::ollama::OllamaClient;
use crate::response::{ToolMetadata, ToolResponse};
use crate::selector::{
    CapabilitySelector, PerformanceSelector, QualitySelector, SelectionStrategy, SelectorHandle,
};
use crate::tools::audit::AuditCodeRequest;
use crate::tools::health::{
    AuditorsHealth, BackendHealth, HealthCheckResult, HealthChecks, SystemHealth,
};
use crate::tools::models::{ListModelsResponse, ModelInfo};
use crate::tools::update::UpdateConfigRequest;
use crate::types::AuditCategory;

#[derive(Clone)]
pub struct GavelServer {
    orchestrator: Arc<Orchestrator>,
    client: Arc<OllamaClient>,
    catalog: Arc<ModelCatalog>,
    backend_host: String,
    started: Instant,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GavelServer {
    pub fn new(config: ServerConfig) -> Self {
        let mut catalog = ModelCatalog::builtin();
        for (name, update) in &config.models {
            catalog.merge_update(name, update);
        }
        let catalog = Arc::new(catalog);

        let client = Arc::new(OllamaClient::new(config.ollama.clone()));

        let strategy: Arc<dyn SelectionStrategy> = match config.performance.selection_strategy {
            SelectionStrategyKind::Capability => {
                Arc::new(CapabilitySelector::new(catalog.clone()))
            }
            SelectionStrategyKind::Performance => {
                Arc::new(PerformanceSelector::new(client.metrics()))
            }
            SelectionStrategyKind::Quality => Arc::new(QualitySelector::new(catalog.clone())),
        };
        let selector = Arc::new(SelectorHandle::new(strategy));

        let orchestrator = Arc::new(Orchestrator::new(
            client.clone(),
            selector,
            catalog.clone(),
            &config,
        ));

        Self {
            orchestrator,
            client,
            catalog,
            backend_host: config.ollama.host.clone(),
            started: Instant::now(),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "audit_code",
        description = "Audit source code with a local LLM. Pick an audit_type (security, performance, quality, architecture, testing, documentation, completeness) or \"all\" to fan out across every category.",
        annotations(read_only_hint = true)
    )]
    async fn audit_code(
        &self,
        Parameters(req): Parameters<AuditCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let request = req.into_request();

        // Validation failures are parameter errors at the transport level,
        // not audit errors in the payload.
        if let Err(e) = request.validate() {
            return Err(McpError::invalid_params(e.user_message(), None));
        }

        let response = match self.orchestrator.audit(request).await {
            Ok(result) => {
                let model_used = result.model.clone();
                let body = serde_json::to_string(result.as_ref()).map_err(|e| {
                    McpError::internal_error(format!("result serialization failed: {e}"), None)
                })?;
                ToolResponse::success(
                    body,
                    ToolMetadata {
                        tool_name: "audit_code".to_string(),
                        model_used,
                        duration_seconds: start.elapsed().as_secs_f64(),
                    },
                )
            }
            Err(e) => {
                tracing::warn!("audit_code failed: {e}");
                ToolResponse::error(
                    &e,
                    ToolMetadata {
                        tool_name: "audit_code".to_string(),
                        model_used: "none".to_string(),
                        duration_seconds: start.elapsed().as_secs_f64(),
                    },
                )
            }
        };

        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "health_check",
        description = "Check backend reachability, auditor availability, and server state.",
        annotations(read_only_hint = true)
    )]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();

        let (reachable, available_models) = match self.client.available_models().await {
            Ok(models) => (true, models.len()),
            Err(_) => (false, 0),
        };
        let (enabled, disabled) = self.orchestrator.auditor_states();

        let result = HealthCheckResult {
            status: HealthCheckResult::derive_status(reachable, available_models),
            checks: HealthChecks {
                backend: BackendHealth {
                    reachable,
                    host: self.backend_host.clone(),
                    available_models,
                },
                auditors: AuditorsHealth { enabled, disabled },
                system: SystemHealth {
                    active_audits: self.orchestrator.active_count(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            },
            timestamp: Utc::now(),
            uptime_seconds: self.started.elapsed().as_secs(),
        };

        let body = serde_json::to_string(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let response = ToolResponse::success(
            body,
            ToolMetadata {
                tool_name: "health_check".to_string(),
                model_used: "none".to_string(),
                duration_seconds: start.elapsed().as_secs_f64(),
            },
        );
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "list_models",
        description = "List the model catalog with live availability and per-model runtime metrics.",
        annotations(read_only_hint = true)
    )]
    async fn list_models(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();

        let available = self.client.available_models().await.unwrap_or_default();
        let metrics = self.client.metrics();

        let models: Vec<ModelInfo> = self
            .catalog
            .iter()
            .map(|config| {
                ModelInfo::from_catalog(
                    config,
                    available.iter().any(|m| m == &config.name),
                    metrics.snapshot(&config.name),
                )
            })
            .collect();

        let uncataloged: Vec<String> = available
            .iter()
            .filter(|name| self.catalog.get(name).is_none())
            .cloned()
            .collect();

        let list = ListModelsResponse { models, uncataloged };
        let body = serde_json::to_string(&list)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let response = ToolResponse::success(
            body,
            ToolMetadata {
                tool_name: "list_models".to_string(),
                model_used: "none".to_string(),
                duration_seconds: start.elapsed().as_secs_f64(),
            },
        );
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "update_config",
        description = "Update auditor settings (applied live) or backend settings (stored; restart required)."
    )]
    async fn update_config(
        &self,
        Parameters(req): Parameters<UpdateConfigRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let mut notes: Vec<String> = Vec::new();

        if let Some(auditors) = &req.auditors {
            // Reject unknown categories before applying anything, so a bad
            // request never half-applies.
            let unknown: Vec<&str> = auditors
                .keys()
                .filter(|key| AuditCategory::parse(key).is_none())
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Err(McpError::invalid_params(
                    format!("unknown auditor categories: {}", unknown.join(", ")),
                    None,
                ));
            }
            let (applied, _) = self.orchestrator.update_auditor_settings(auditors);
            if !applied.is_empty() {
                notes.push(format!("auditors updated: {}", applied.join(", ")));
            }
        }

        if let Some(backend) = &req.backend {
            if !backend.is_empty() {
                // Accepted but not hot-swapped: the HTTP client and retry
                // loop read their config once at construction.
                notes.push(
                    "backend settings accepted; restart the server for them to take effect"
                        .to_string(),
                );
            }
        }

        if notes.is_empty() {
            notes.push("no changes".to_string());
        }

        let response = ToolResponse::success(
            notes.join("; "),
            ToolMetadata {
                tool_name: "update_config".to_string(),
                model_used: "none".to_string(),
                duration_seconds: start.elapsed().as_secs_f64(),
            },
        );
        Ok(response.into_call_tool_result())
    }
}

#[tool_handler]
impl ServerHandler for GavelServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "gavel".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Gavel: code auditing through a local Ollama runtime.\n\n\
                 Workflow:\n\
                 1. Call `health_check` to confirm the backend is up and models are installed.\n\
                 2. Call `audit_code` with the source, its language, and an audit_type.\n\
                    - `audit_type: \"all\"` fans out across all seven categories and merges.\n\
                    - `priority: \"fast\"` runs a rapid security+completeness triage instead.\n\
                    - Pass `context` (framework, performance_critical, ...) to sharpen prompts.\n\
                 3. Call `list_models` to see the catalog, availability, and latency metrics.\n\
                 4. Call `update_config` to toggle auditors or raise severity thresholds live.\n\n\
                 Findings are model-generated; confidence scores are the model's own estimate."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

impl GavelServer {
    /// Shutdown hook: drop cached metrics and availability state.
    pub fn cleanup(&self) {
        self.client.cleanup();
    }
}
