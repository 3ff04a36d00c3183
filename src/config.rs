use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;

use crate::types::{AuditCategory, Severity};

/// Top-level server configuration: optional `gavel.toml` merged with
/// environment overrides. The core consumes this struct as given; all
/// validation happens at load time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ollama: OllamaConfig,
    /// Per-category auditor settings, keyed by category name.
    pub auditors: BTreeMap<String, AuditorSettings>,
    pub performance: PerformanceConfig,
    /// Startup overrides merged into the built-in model catalog,
    /// keyed by model name.
    pub models: BTreeMap<String, ModelOverride>,
}

/// Backend connection and retry knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    /// Per-generation-call hard timeout.
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    /// Base backoff delay; doubles per attempt.
    pub retry_delay_ms: u64,
    /// How long a health-check result stays cached.
    pub health_check_interval_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:11434".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            health_check_interval_ms: 60_000,
        }
    }
}

/// Live-updatable per-auditor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditorSettings {
    pub enabled: bool,
    /// Least severe tier still reported. `info` keeps everything.
    pub min_severity: Severity,
    /// Per-auditor issue cap, applied before merge.
    pub max_issues: Option<usize>,
}

impl Default for AuditorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: Severity::Info,
            max_issues: None,
        }
    }
}

/// Orchestration knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Fan-out chunk size for `all`-type audits.
    pub max_concurrent_audits: usize,
    pub selection_strategy: SelectionStrategyKind,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_audits: 3,
            selection_strategy: SelectionStrategyKind::Capability,
        }
    }
}

/// Which selection strategy the orchestrator starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategyKind {
    #[default]
    Capability,
    Performance,
    Quality,
}

/// Partial model-catalog entry; only set fields are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelOverride {
    pub display_name: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub fallbacks: Option<Vec<String>>,
}

impl ServerConfig {
    /// Load `gavel.toml` (path overridable via `GAVEL_CONFIG`), then apply
    /// environment overrides. A missing file is normal; a malformed file is
    /// logged and replaced with defaults rather than aborting startup.
    pub fn load() -> Self {
        let path = env::var("GAVEL_CONFIG").unwrap_or_else(|_| "gavel.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<ServerConfig>(&raw) {
                Ok(config) => {
                    tracing::info!(path, "loaded config file");
                    config
                }
                Err(e) => {
                    tracing::warn!(path, "config file malformed, using defaults: {e}");
                    ServerConfig::default()
                }
            },
            Err(_) => ServerConfig::default(),
        };
        config.apply_env();
        config
    }

    /// Environment variables override file values. `GAVEL_OLLAMA_HOST` is the
    /// one most installs set.
    fn apply_env(&mut self) {
        if let Ok(host) = env::var("GAVEL_OLLAMA_HOST")
            && !host.trim().is_empty()
        {
            self.ollama.host = host;
        }
        if let Some(ms) = env_parse::<u64>("GAVEL_OLLAMA_TIMEOUT_MS") {
            self.ollama.timeout_ms = ms;
        }
        if let Some(n) = env_parse::<u32>("GAVEL_RETRY_ATTEMPTS") {
            self.ollama.retry_attempts = n;
        }
        if let Some(ms) = env_parse::<u64>("GAVEL_RETRY_DELAY_MS") {
            self.ollama.retry_delay_ms = ms;
        }
        if let Some(n) = env_parse::<usize>("GAVEL_MAX_CONCURRENT_AUDITS") {
            self.performance.max_concurrent_audits = n.max(1);
        }
        if let Ok(strategy) = env::var("GAVEL_SELECTION_STRATEGY") {
            match strategy.to_lowercase().as_str() {
                "capability" => {
                    self.performance.selection_strategy = SelectionStrategyKind::Capability;
                }
                "performance" => {
                    self.performance.selection_strategy = SelectionStrategyKind::Performance;
                }
                "quality" => {
                    self.performance.selection_strategy = SelectionStrategyKind::Quality;
                }
                other => tracing::warn!("unknown selection strategy: {other}"),
            }
        }
    }

    /// Settings for one auditor category, falling back to defaults for
    /// categories the config file does not mention.
    pub fn auditor_settings(&self, category: AuditCategory) -> AuditorSettings {
        self.auditors
            .get(category.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
