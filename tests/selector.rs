//! Tests for model selection: weighted scoring, determinism, fallback, and
//! the performance- and quality-aware strategies.

use std::sync::Arc;

use gavel::catalog::ModelCatalog;
use gavel::ollama::metrics::MetricsRegistry;
use gavel::selector::{
    CapabilitySelector, PerformanceSelector, QualitySelector, SelectionStrategy, SelectorHandle,
};
use gavel::types::{AuditCategory, Priority};

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn capability() -> CapabilitySelector {
    CapabilitySelector::new(Arc::new(ModelCatalog::builtin()))
}

// ---------------------------------------------------------------------------
// CapabilitySelector: weighted scoring
// ---------------------------------------------------------------------------

#[test]
fn security_rust_thorough_prefers_the_multi_list_model() {
    let selector = capability();
    let available = models(&["qwen2.5-coder:7b", "deepseek-coder:6.7b", "codellama:13b"]);

    // deepseek leads the security list, is second for rust, and is second in
    // the thorough list; its accumulated score beats both alternatives.
    let picked = selector.select(AuditCategory::Security, "rust", Priority::Thorough, &available);
    assert_eq!(picked.as_deref(), Some("deepseek-coder:6.7b"));
}

#[test]
fn fast_priority_tilts_toward_small_models() {
    let selector = capability();
    let available = models(&["phi3:mini", "codellama:13b"]);

    let picked = selector.select(
        AuditCategory::Completeness,
        "haskell", // no language list: only type + priority contribute
        Priority::Fast,
        &available,
    );
    assert_eq!(picked.as_deref(), Some("phi3:mini"));
}

#[test]
fn selection_is_deterministic_and_order_independent() {
    let selector = capability();
    let forward = models(&["qwen2.5-coder:7b", "deepseek-coder:6.7b", "codellama:13b"]);
    let reversed = models(&["codellama:13b", "deepseek-coder:6.7b", "qwen2.5-coder:7b"]);

    for _ in 0..10 {
        let a = selector.select(AuditCategory::Quality, "python", Priority::Thorough, &forward);
        let b = selector.select(AuditCategory::Quality, "python", Priority::Thorough, &reversed);
        assert_eq!(a, b);
        assert!(a.is_some());
    }
}

#[test]
fn unknown_models_fall_back_to_first_available() {
    let selector = capability();
    let available = models(&["some-custom-model:1b", "another-model:3b"]);

    let picked = selector.select(AuditCategory::Security, "rust", Priority::Thorough, &available);
    assert_eq!(picked.as_deref(), Some("some-custom-model:1b"));
}

#[test]
fn empty_availability_returns_none() {
    let selector = capability();
    assert_eq!(
        selector.select(AuditCategory::Security, "rust", Priority::Thorough, &[]),
        None
    );
}

#[test]
fn language_affinity_breaks_type_list_proximity() {
    let selector = capability();
    // Neither model is on the documentation type list's top spot for python,
    // but llama3.1 leads documentation while codellama:7b trails it; the
    // python list pushes codellama:7b up without overtaking.
    let available = models(&["llama3.1:8b", "codellama:7b"]);
    let picked = selector.select(
        AuditCategory::Documentation,
        "python",
        Priority::Thorough,
        &available,
    );
    assert_eq!(picked.as_deref(), Some("llama3.1:8b"));
}

// ---------------------------------------------------------------------------
// PerformanceSelector
// ---------------------------------------------------------------------------

#[test]
fn performance_selector_prefers_proven_fast_models() {
    let metrics = Arc::new(MetricsRegistry::new());
    // m-good: all successes, fast. m-bad: all failures.
    for _ in 0..5 {
        metrics.record("m-good", 500, true);
        metrics.record("m-bad", 500, false);
    }
    let selector = PerformanceSelector::new(metrics);

    let picked = selector.select(
        AuditCategory::Security,
        "rust",
        Priority::Thorough,
        &models(&["m-bad", "m-good"]),
    );
    assert_eq!(picked.as_deref(), Some("m-good"));
}

#[test]
fn untested_models_beat_models_with_poor_history() {
    let metrics = Arc::new(MetricsRegistry::new());
    for _ in 0..5 {
        metrics.record("m-bad", 500, false);
    }
    let selector = PerformanceSelector::new(metrics);

    // m-new has no history: neutral 0.5 beats m-bad's failure-dominated score.
    let picked = selector.select(
        AuditCategory::Security,
        "rust",
        Priority::Thorough,
        &models(&["m-bad", "m-new"]),
    );
    assert_eq!(picked.as_deref(), Some("m-new"));
}

#[test]
fn performance_selector_is_order_independent() {
    let metrics = Arc::new(MetricsRegistry::new());
    let selector = PerformanceSelector::new(metrics);

    // All untested: every score is 0.5, so the tie-break must not depend on
    // input order.
    let a = selector.select(
        AuditCategory::Quality,
        "go",
        Priority::Fast,
        &models(&["zeta", "alpha", "mid"]),
    );
    let b = selector.select(
        AuditCategory::Quality,
        "go",
        Priority::Fast,
        &models(&["mid", "zeta", "alpha"]),
    );
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// QualitySelector
// ---------------------------------------------------------------------------

#[test]
fn quality_selector_ranks_accuracy_above_speed() {
    let catalog = Arc::new(ModelCatalog::builtin());
    let selector = QualitySelector::new(catalog);

    // mistral is fast but medium accuracy; codellama:13b is slow but high.
    let picked = selector.select(
        AuditCategory::Testing,
        "rust",
        Priority::Fast,
        &models(&["mistral:7b", "codellama:13b"]),
    );
    assert_eq!(picked.as_deref(), Some("codellama:13b"));
}

// ---------------------------------------------------------------------------
// SelectorHandle: runtime strategy swap
// ---------------------------------------------------------------------------

#[test]
fn selector_handle_swaps_strategies_live() {
    let catalog = Arc::new(ModelCatalog::builtin());
    let handle = SelectorHandle::new(Arc::new(CapabilitySelector::new(catalog.clone())));

    let available = models(&["mistral:7b", "codellama:13b"]);
    let before = handle.select(AuditCategory::Testing, "rust", Priority::Fast, &available);

    handle.swap(Arc::new(QualitySelector::new(catalog)));
    let after = handle.select(AuditCategory::Testing, "rust", Priority::Fast, &available);

    // Capability scoring with fast priority favors mistral; quality scoring
    // favors the high-accuracy model.
    assert_eq!(before.as_deref(), Some("mistral:7b"));
    assert_eq!(after.as_deref(), Some("codellama:13b"));
}
