use std::sync::{Arc, Mutex};

use crate::catalog::{AccuracyTier, ModelCatalog};
use crate::ollama::metrics::MetricsRegistry;
use crate::types::{AuditCategory, Priority};

/// Pluggable model-selection algorithm. The orchestrator holds one behind a
/// [`SelectorHandle`] so the strategy can be swapped at runtime without
/// touching the auditors.
pub trait SelectionStrategy: Send + Sync {
    /// Pick the best model for this audit. Returns `None` only when
    /// `available` is empty.
    fn select(
        &self,
        audit_type: AuditCategory,
        language: &str,
        priority: Priority,
        available: &[String],
    ) -> Option<String>;
}

/// Static per-category model ranking. First entry is the strongest match.
fn audit_type_preferences(category: AuditCategory) -> &'static [&'static str] {
    match category {
        AuditCategory::Security => &["deepseek-coder:6.7b", "codellama:13b", "qwen2.5-coder:7b"],
        AuditCategory::Performance => {
            &["qwen2.5-coder:7b", "deepseek-coder:6.7b", "codellama:13b"]
        }
        AuditCategory::Quality => &["qwen2.5-coder:7b", "codellama:7b", "llama3.1:8b"],
        AuditCategory::Architecture => &["codellama:13b", "llama3.1:8b", "qwen2.5-coder:7b"],
        AuditCategory::Testing => &["codellama:7b", "mistral:7b", "qwen2.5-coder:7b"],
        AuditCategory::Documentation => &["llama3.1:8b", "mistral:7b", "codellama:7b"],
        AuditCategory::Completeness => &["deepseek-coder:6.7b", "phi3:mini", "qwen2.5-coder:7b"],
    }
}

/// Static per-language model ranking. Unknown languages contribute nothing.
fn language_preferences(language: &str) -> &'static [&'static str] {
    match language {
        "rust" => &["qwen2.5-coder:7b", "deepseek-coder:6.7b", "codellama:13b"],
        "python" => &["deepseek-coder:6.7b", "qwen2.5-coder:7b", "codellama:7b"],
        "javascript" | "typescript" | "js" | "ts" => {
            &["qwen2.5-coder:7b", "codellama:7b", "deepseek-coder:6.7b"]
        }
        "go" => &["qwen2.5-coder:7b", "codellama:13b"],
        "java" | "kotlin" => &["codellama:13b", "qwen2.5-coder:7b"],
        "c" | "cpp" | "c++" => &["codellama:13b", "deepseek-coder:6.7b"],
        _ => &[],
    }
}

/// Priority ranking: fast favors small models, thorough favors large ones.
fn priority_preferences(priority: Priority) -> &'static [&'static str] {
    match priority {
        Priority::Fast => &["phi3:mini", "mistral:7b", "codellama:7b", "qwen2.5-coder:7b"],
        Priority::Thorough => &[
            "codellama:13b",
            "deepseek-coder:6.7b",
            "qwen2.5-coder:7b",
            "llama3.1:8b",
        ],
    }
}

/// Weighted position score: weight × (list length − index), zero for models
/// not on the list.
fn list_score(list: &[&str], weight: usize, model: &str) -> usize {
    list.iter()
        .position(|candidate| *candidate == model)
        .map(|index| weight * (list.len() - index))
        .unwrap_or(0)
}

/// Default strategy: additive scoring over the audit-type (×3), language
/// (×2), and priority (×1) preference lists. A model ranked in several lists
/// beats a model ranked highly in one.
pub struct CapabilitySelector {
    catalog: Arc<ModelCatalog>,
}

impl CapabilitySelector {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self { catalog }
    }
}

impl SelectionStrategy for CapabilitySelector {
    fn select(
        &self,
        audit_type: AuditCategory,
        language: &str,
        priority: Priority,
        available: &[String],
    ) -> Option<String> {
        if available.is_empty() {
            return None;
        }

        let type_list = audit_type_preferences(audit_type);
        let language_list = language_preferences(&language.trim().to_lowercase());
        let priority_list = priority_preferences(priority);

        let mut best: Option<(usize, usize, &String)> = None;
        for model in available {
            let score = list_score(type_list, 3, model)
                + list_score(language_list, 2, model)
                + list_score(priority_list, 1, model);
            if score == 0 {
                continue;
            }
            // Higher score wins; equal scores fall back to catalog
            // registration order, independent of `available` ordering.
            let registration = self.catalog.registration_index(model);
            let better = match &best {
                None => true,
                Some((best_score, best_registration, _)) => {
                    score > *best_score || (score == *best_score && registration < *best_registration)
                }
            };
            if better {
                best = Some((score, registration, model));
            }
        }

        match best {
            Some((_, _, model)) => Some(model.clone()),
            // Nothing scored: arbitrary but deterministic fallback.
            None => available.first().cloned(),
        }
    }
}

/// Performance-aware strategy: scores observed success rate and latency.
/// Models without history get a neutral 0.5 so they are preferred over
/// models with a poor record but not over proven ones.
pub struct PerformanceSelector {
    metrics: Arc<MetricsRegistry>,
}

/// Latency above this counts as zero in the score.
const LATENCY_CEILING_MS: f64 = 30_000.0;

impl PerformanceSelector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    fn score(&self, model: &str) -> f64 {
        match self.metrics.snapshot(model) {
            Some(m) if m.requests > 0 => {
                let latency_factor = (1.0 - m.ema_response_ms / LATENCY_CEILING_MS).max(0.0);
                0.7 * m.success_rate() + 0.3 * latency_factor
            }
            _ => 0.5,
        }
    }
}

impl SelectionStrategy for PerformanceSelector {
    fn select(
        &self,
        _audit_type: AuditCategory,
        _language: &str,
        _priority: Priority,
        available: &[String],
    ) -> Option<String> {
        if available.is_empty() {
            return None;
        }

        let mut candidates: Vec<&String> = available.iter().collect();
        // Name order makes ties deterministic regardless of input order.
        candidates.sort();

        let mut best: Option<(f64, &String)> = None;
        for model in candidates {
            let score = self.score(model);
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, model));
            }
        }
        best.map(|(_, model)| model.clone())
    }
}

/// Quality-first strategy: accuracy tier from the catalog outranks
/// everything; capability score breaks ties within a tier.
pub struct QualitySelector {
    catalog: Arc<ModelCatalog>,
    capability: CapabilitySelector,
}

impl QualitySelector {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            capability: CapabilitySelector::new(catalog.clone()),
            catalog,
        }
    }
}

impl SelectionStrategy for QualitySelector {
    fn select(
        &self,
        audit_type: AuditCategory,
        language: &str,
        priority: Priority,
        available: &[String],
    ) -> Option<String> {
        if available.is_empty() {
            return None;
        }

        let top_tier = available
            .iter()
            .filter_map(|m| self.catalog.get(m).map(|c| c.profile.accuracy))
            .max()
            .unwrap_or(AccuracyTier::Low);

        let top_models: Vec<String> = available
            .iter()
            .filter(|m| {
                self.catalog
                    .get(m)
                    .is_some_and(|c| c.profile.accuracy == top_tier)
            })
            .cloned()
            .collect();

        if top_models.is_empty() {
            return available.first().cloned();
        }
        self.capability
            .select(audit_type, language, priority, &top_models)
    }
}

/// Runtime-swappable strategy holder. Auditors hold this one handle; swapping
/// the inner strategy takes effect on the next selection.
pub struct SelectorHandle {
    inner: Mutex<Arc<dyn SelectionStrategy>>,
}

impl SelectorHandle {
    pub fn new(strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self {
            inner: Mutex::new(strategy),
        }
    }

    pub fn swap(&self, strategy: Arc<dyn SelectionStrategy>) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = strategy;
    }

    fn current(&self) -> Arc<dyn SelectionStrategy> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SelectionStrategy for SelectorHandle {
    fn select(
        &self,
        audit_type: AuditCategory,
        language: &str,
        priority: Priority,
        available: &[String],
    ) -> Option<String> {
        self.current()
            .select(audit_type, language, priority, available)
    }
}
