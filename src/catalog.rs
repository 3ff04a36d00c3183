use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ModelOverride;
use crate::types::AuditCategory;

/// Qualitative speed tier from the built-in table. Never measured, only
/// declared; measured latency lives in `ollama::metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTier {
    Low,
    Medium,
    High,
}

/// Qualitative performance profile for one model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceProfile {
    pub speed: SpeedTier,
    pub accuracy: AccuracyTier,
    pub resource_usage: ResourceTier,
}

/// Static descriptor for one known model. Loaded once at startup from the
/// built-in table; mutable only through `merge_update`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    /// Ollama tag, e.g. "qwen2.5-coder:7b".
    pub name: String,
    pub display_name: String,
    /// Audit categories this model is preferred for.
    pub specializations: Vec<AuditCategory>,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Ordered fallback models to try when this one is not installed.
    pub fallbacks: Vec<String>,
    pub profile: PerformanceProfile,
}

impl ModelConfig {
    /// Merge partial fields from a config override. Unset fields keep their
    /// built-in values.
    pub fn merge_update(&mut self, update: &ModelOverride) {
        if let Some(display_name) = &update.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(top_p) = update.top_p {
            self.top_p = Some(top_p);
        }
        if let Some(fallbacks) = &update.fallbacks {
            self.fallbacks = fallbacks.clone();
        }
    }
}

/// Catalog of known models. Backed by a Vec so registration order is
/// preserved; selector tie-breaking depends on it.
pub struct ModelCatalog {
    models: Vec<ModelConfig>,
}

impl ModelCatalog {
    /// The built-in table. Registration order doubles as the tie-break order
    /// for equal selector scores.
    pub fn builtin() -> Self {
        use AuditCategory::*;

        let models = vec![
            ModelConfig {
                name: "qwen2.5-coder:7b".to_string(),
                display_name: "Qwen 2.5 Coder 7B".to_string(),
                specializations: vec![Quality, Performance],
                max_tokens: 4096,
                temperature: 0.2,
                top_p: Some(0.9),
                fallbacks: vec!["codellama:7b".to_string(), "llama3.1:8b".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Fast,
                    accuracy: AccuracyTier::High,
                    resource_usage: ResourceTier::Medium,
                },
            },
            ModelConfig {
                name: "deepseek-coder:6.7b".to_string(),
                display_name: "DeepSeek Coder 6.7B".to_string(),
                specializations: vec![Security, Completeness],
                max_tokens: 4096,
                temperature: 0.1,
                top_p: Some(0.95),
                fallbacks: vec!["qwen2.5-coder:7b".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Fast,
                    accuracy: AccuracyTier::High,
                    resource_usage: ResourceTier::Medium,
                },
            },
            ModelConfig {
                name: "codellama:13b".to_string(),
                display_name: "Code Llama 13B".to_string(),
                specializations: vec![Architecture, Security],
                max_tokens: 4096,
                temperature: 0.2,
                top_p: None,
                fallbacks: vec!["codellama:7b".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Slow,
                    accuracy: AccuracyTier::High,
                    resource_usage: ResourceTier::High,
                },
            },
            ModelConfig {
                name: "codellama:7b".to_string(),
                display_name: "Code Llama 7B".to_string(),
                specializations: vec![Quality, Testing],
                max_tokens: 4096,
                temperature: 0.2,
                top_p: None,
                fallbacks: vec!["llama3.1:8b".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Fast,
                    accuracy: AccuracyTier::Medium,
                    resource_usage: ResourceTier::Medium,
                },
            },
            ModelConfig {
                name: "llama3.1:8b".to_string(),
                display_name: "Llama 3.1 8B".to_string(),
                specializations: vec![Documentation, Architecture],
                max_tokens: 4096,
                temperature: 0.3,
                top_p: Some(0.9),
                fallbacks: vec!["mistral:7b".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Medium,
                    accuracy: AccuracyTier::Medium,
                    resource_usage: ResourceTier::Medium,
                },
            },
            ModelConfig {
                name: "mistral:7b".to_string(),
                display_name: "Mistral 7B".to_string(),
                specializations: vec![Testing, Documentation],
                max_tokens: 4096,
                temperature: 0.3,
                top_p: None,
                fallbacks: vec!["phi3:mini".to_string()],
                profile: PerformanceProfile {
                    speed: SpeedTier::Fast,
                    accuracy: AccuracyTier::Medium,
                    resource_usage: ResourceTier::Low,
                },
            },
            ModelConfig {
                name: "phi3:mini".to_string(),
                display_name: "Phi-3 Mini".to_string(),
                specializations: vec![Completeness],
                max_tokens: 2048,
                temperature: 0.2,
                top_p: None,
                fallbacks: vec![],
                profile: PerformanceProfile {
                    speed: SpeedTier::Fast,
                    accuracy: AccuracyTier::Low,
                    resource_usage: ResourceTier::Low,
                },
            },
        ];

        Self { models }
    }

    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Position in registration order; unknown models sort after all known
    /// ones so tie-breaking stays total.
    pub fn registration_index(&self, name: &str) -> usize {
        self.models
            .iter()
            .position(|m| m.name == name)
            .unwrap_or(usize::MAX)
    }

    /// Apply a partial override to one entry. Unknown names are logged and
    /// ignored; the catalog never grows at runtime.
    pub fn merge_update(&mut self, name: &str, update: &ModelOverride) {
        match self.models.iter_mut().find(|m| m.name == name) {
            Some(model) => model.merge_update(update),
            None => tracing::warn!(model = name, "config override for unknown model ignored"),
        }
    }
}
