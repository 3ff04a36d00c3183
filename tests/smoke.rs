//! Type-level smoke tests: serialization envelopes, severity ordering,
//! fingerprints, catalog defaults, and config merging.

use gavel::catalog::ModelCatalog;
use gavel::config::{ModelOverride, OllamaConfig, PerformanceConfig, ServerConfig};
use gavel::error::AuditError;
use gavel::response::{ToolMetadata, ToolResponse};
use gavel::types::{AuditRequest, AuditScope, Priority, Severity};

// ---------------------------------------------------------------------------
// ToolResponse envelope
// ---------------------------------------------------------------------------

#[test]
fn tool_response_success_serializes_correctly() {
    let response = ToolResponse::success(
        r#"{"issues":[]}"#.to_string(),
        ToolMetadata {
            tool_name: "audit_code".to_string(),
            model_used: "qwen2.5-coder:7b".to_string(),
            duration_seconds: 4.2,
        },
    );

    let json_str = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();

    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["content_type"], "json");
    assert_eq!(parsed["metadata"]["tool_name"], "audit_code");
    assert_eq!(parsed["metadata"]["model_used"], "qwen2.5-coder:7b");
    assert!(parsed["metadata"]["duration_seconds"].is_f64());
    assert!(parsed.get("error_code").is_none());
}

#[test]
fn tool_response_error_carries_code_and_recoverable_flag() {
    let err = AuditError::ModelNotFound {
        model: "codellama:13b".to_string(),
    };
    let response = ToolResponse::error(
        &err,
        ToolMetadata {
            tool_name: "audit_code".to_string(),
            model_used: "none".to_string(),
            duration_seconds: 0.01,
        },
    );

    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();

    assert_eq!(parsed["status"], "error");
    assert_eq!(parsed["error_code"], "MODEL_NOT_FOUND");
    assert_eq!(parsed["recoverable"], true);
    assert!(parsed["timestamp"].is_string());
    assert!(parsed["content"].as_str().unwrap().contains("ollama pull"));
}

#[test]
fn unavailable_backend_is_not_recoverable() {
    let err = AuditError::OllamaUnavailable("connection refused".to_string());
    assert_eq!(err.code(), "OLLAMA_UNAVAILABLE");
    assert!(!err.recoverable());
    // Sanitized message should not echo raw connection details.
    assert!(!err.user_message().contains("connection refused"));
}

// ---------------------------------------------------------------------------
// Severity ordering and escalation
// ---------------------------------------------------------------------------

#[test]
fn severity_ranks_are_totally_ordered() {
    assert!(Severity::Critical < Severity::High);
    assert!(Severity::High < Severity::Medium);
    assert!(Severity::Medium < Severity::Low);
    assert!(Severity::Low < Severity::Info);
    assert_eq!(Severity::Critical.rank(), 0);
    assert_eq!(Severity::Info.rank(), 4);
}

#[test]
fn escalation_moves_one_tier_and_saturates_at_critical() {
    assert_eq!(Severity::Info.escalate(), Severity::Low);
    assert_eq!(Severity::Low.escalate(), Severity::Medium);
    assert_eq!(Severity::Medium.escalate(), Severity::High);
    assert_eq!(Severity::High.escalate(), Severity::Critical);
    assert_eq!(Severity::Critical.escalate(), Severity::Critical);
}

#[test]
fn severity_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    assert_eq!(serde_json::from_str::<Severity>("\"info\"").unwrap(), Severity::Info);
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

fn request(code: &str, language: &str, scope: AuditScope, priority: Priority) -> AuditRequest {
    AuditRequest {
        code: code.to_string(),
        language: language.to_string(),
        audit_type: scope,
        file: None,
        context: None,
        priority,
        max_issues: None,
        include_fix_suggestions: false,
    }
}

#[test]
fn identical_requests_share_a_fingerprint() {
    let a = request("let x = 1;", "rust", AuditScope::Security, Priority::Thorough);
    let b = request("let x = 1;", "rust", AuditScope::Security, Priority::Thorough);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn fingerprint_varies_with_every_key_component() {
    let base = request("let x = 1;", "rust", AuditScope::Security, Priority::Thorough);
    let code = request("let x = 2;", "rust", AuditScope::Security, Priority::Thorough);
    let lang = request("let x = 1;", "go", AuditScope::Security, Priority::Thorough);
    let scope = request("let x = 1;", "rust", AuditScope::Quality, Priority::Thorough);
    let fast = request("let x = 1;", "rust", AuditScope::Security, Priority::Fast);

    for other in [&code, &lang, &scope, &fast] {
        assert_ne!(base.fingerprint(), other.fingerprint());
    }
}

#[test]
fn language_case_does_not_split_the_fingerprint() {
    let a = request("x", "Rust", AuditScope::Security, Priority::Thorough);
    let b = request("x", "rust", AuditScope::Security, Priority::Thorough);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

// ---------------------------------------------------------------------------
// Config defaults and catalog merging
// ---------------------------------------------------------------------------

#[test]
fn ollama_config_defaults_match_documented_values() {
    let config = OllamaConfig::default();
    assert_eq!(config.host, "http://127.0.0.1:11434");
    assert_eq!(config.timeout_ms, 30_000);
    assert_eq!(config.retry_attempts, 3);
    assert_eq!(config.retry_delay_ms, 1_000);
    assert_eq!(config.health_check_interval_ms, 60_000);
}

#[test]
fn performance_config_defaults_to_three_concurrent_audits() {
    assert_eq!(PerformanceConfig::default().max_concurrent_audits, 3);
}

#[test]
fn config_parses_from_toml_with_partial_sections() {
    let raw = r#"
        [ollama]
        host = "http://10.0.0.5:11434"

        [auditors.security]
        min_severity = "high"

        [auditors.documentation]
        enabled = false

        [performance]
        max_concurrent_audits = 5
    "#;
    let config: ServerConfig = toml::from_str(raw).unwrap();
    assert_eq!(config.ollama.host, "http://10.0.0.5:11434");
    // Unset fields keep their defaults.
    assert_eq!(config.ollama.retry_attempts, 3);
    assert_eq!(
        config.auditors.get("security").unwrap().min_severity,
        Severity::High
    );
    assert!(!config.auditors.get("documentation").unwrap().enabled);
    assert_eq!(config.performance.max_concurrent_audits, 5);
}

#[test]
fn builtin_catalog_preserves_registration_order() {
    let catalog = ModelCatalog::builtin();
    assert!(!catalog.is_empty());
    assert_eq!(catalog.registration_index("qwen2.5-coder:7b"), 0);
    assert!(catalog.registration_index("no-such-model") > catalog.len());
    assert!(catalog.get("codellama:13b").is_some());
}

#[test]
fn model_override_merges_only_set_fields() {
    let mut catalog = ModelCatalog::builtin();
    let before = catalog.get("phi3:mini").unwrap().clone();

    catalog.merge_update(
        "phi3:mini",
        &ModelOverride {
            temperature: Some(0.7),
            ..ModelOverride::default()
        },
    );

    let after = catalog.get("phi3:mini").unwrap();
    assert_eq!(after.temperature, 0.7);
    assert_eq!(after.max_tokens, before.max_tokens);
    assert_eq!(after.display_name, before.display_name);
}
