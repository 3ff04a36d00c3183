//! Tests for the Ollama client: retry with exponential backoff, health-check
//! caching, availability gating, and metrics accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;

use gavel::config::OllamaConfig;
use gavel::error::AuditError;
use gavel::ollama::api::{GenerateRequest, GenerateResponse, TagModel, TagsResponse};
use gavel::ollama::{GenerateParams, OllamaClient, OllamaTransport};

/// Scripted transport: a fixed set of installed models, a queue of generation
/// outcomes consumed front to back (the last entry repeats), and call
/// counters.
struct ScriptedTransport {
    installed: Mutex<Vec<String>>,
    script: Mutex<Vec<Result<String, AuditError>>>,
    generate_calls: AtomicUsize,
    tags_calls: AtomicUsize,
    tags_fail: bool,
    generate_delay: Option<Duration>,
}

impl ScriptedTransport {
    fn new(installed: &[&str], script: Vec<Result<String, AuditError>>) -> Self {
        Self {
            installed: Mutex::new(installed.iter().map(|s| s.to_string()).collect()),
            script: Mutex::new(script),
            generate_calls: AtomicUsize::new(0),
            tags_calls: AtomicUsize::new(0),
            tags_fail: false,
            generate_delay: None,
        }
    }

    fn unreachable_backend() -> Self {
        let mut t = Self::new(&[], vec![]);
        t.tags_fail = true;
        t
    }

    fn next_outcome(&self) -> Result<String, AuditError> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script
                .first()
                .cloned()
                .unwrap_or_else(|| Ok(r#"{"issues":[]}"#.to_string()))
        }
    }
}

impl OllamaTransport for ScriptedTransport {
    fn generate(&self, body: GenerateRequest) -> BoxFuture<'_, Result<GenerateResponse, AuditError>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome();
        let delay = self.generate_delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            outcome.map(|text| GenerateResponse {
                response: text,
                model: body.model,
                created_at: None,
                done: true,
                total_duration: None,
                prompt_eval_count: Some(12),
                eval_count: Some(48),
            })
        })
    }

    fn tags(&self) -> BoxFuture<'_, Result<TagsResponse, AuditError>> {
        self.tags_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.tags_fail {
            Err(AuditError::OllamaUnavailable("connection refused".into()))
        } else {
            Ok(TagsResponse {
                models: self
                    .installed
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|name| TagModel {
                        name: name.clone(),
                        size: None,
                    })
                    .collect(),
            })
        };
        Box::pin(async move { result })
    }

    fn pull<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>> {
        self.installed.lock().unwrap().push(model.to_string());
        Box::pin(async move { Ok(()) })
    }

    fn delete<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>> {
        self.installed.lock().unwrap().retain(|m| m != model);
        Box::pin(async move { Ok(()) })
    }
}

fn config() -> OllamaConfig {
    OllamaConfig {
        retry_attempts: 3,
        retry_delay_ms: 1000,
        ..OllamaConfig::default()
    }
}

fn params(model: &str) -> GenerateParams {
    GenerateParams {
        model: model.to_string(),
        prompt: "audit this".to_string(),
        system: None,
        temperature: None,
        top_p: None,
        max_tokens: None,
    }
}

fn upstream_failure() -> AuditError {
    AuditError::Upstream {
        status: 500,
        message: "model runner crashed".into(),
    }
}

// ---------------------------------------------------------------------------
// Retry and backoff
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_with_exponential_backoff() {
    let transport = Arc::new(ScriptedTransport::new(
        &["m1"],
        vec![
            Err(upstream_failure()),
            Err(upstream_failure()),
            Ok(r#"{"issues":[]}"#.to_string()),
        ],
    ));
    let client = OllamaClient::with_transport(config(), transport.clone());

    let start = tokio::time::Instant::now();
    let outcome = client.generate(params("m1")).await.expect("third attempt succeeds");
    assert_eq!(outcome.model, "m1");

    // Backoff: 1000ms after attempt 1, 2000ms after attempt 2.
    assert!(start.elapsed() >= Duration::from_millis(3000));
    assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 3);

    let metrics = client.metrics().snapshot("m1").expect("metrics recorded");
    assert_eq!(metrics.requests, 3);
    assert_eq!(metrics.failures, 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_generation_failed_with_last_error() {
    let transport = Arc::new(ScriptedTransport::new(&["m1"], vec![Err(upstream_failure())]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    let err = client.generate(params("m1")).await.expect_err("all attempts fail");
    match &err {
        AuditError::GenerationFailed {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("model runner crashed"), "{last_error}");
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
    assert_eq!(err.code(), "GENERATION_FAILED");
    assert!(err.recoverable());
    assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn per_attempt_timeout_counts_as_a_failure() {
    let mut transport = ScriptedTransport::new(&["m1"], vec![Ok(r#"{"issues":[]}"#.to_string())]);
    transport.generate_delay = Some(Duration::from_secs(120)); // beyond the 30s call timeout
    let transport = Arc::new(transport);
    let client = OllamaClient::with_transport(config(), transport.clone());

    let err = client.generate(params("m1")).await.expect_err("every attempt times out");
    assert!(matches!(err, AuditError::GenerationFailed { .. }));

    let metrics = client.metrics().snapshot("m1").expect("metrics recorded");
    assert_eq!(metrics.requests, 3);
    assert_eq!(metrics.failures, 3);
}

// ---------------------------------------------------------------------------
// Health gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_backend_fails_fast_without_generation_attempts() {
    let transport = Arc::new(ScriptedTransport::unreachable_backend());
    let client = OllamaClient::with_transport(config(), transport.clone());

    let err = client.generate(params("m1")).await.expect_err("backend down");
    assert_eq!(err.code(), "OLLAMA_UNAVAILABLE");
    assert!(!err.recoverable());
    // No retry attempt was consumed.
    assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 0);
    assert!(client.metrics().snapshot("m1").is_none());
}

#[tokio::test]
async fn missing_model_is_rejected_before_generation() {
    let transport = Arc::new(ScriptedTransport::new(&["other-model:7b"], vec![]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    let err = client.generate(params("m1")).await.expect_err("model absent");
    assert_eq!(err.code(), "MODEL_NOT_FOUND");
    assert!(err.recoverable());
    assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_check_result_is_cached_within_the_interval() {
    let transport = Arc::new(ScriptedTransport::new(&["m1"], vec![]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    assert!(client.health_check().await);
    assert!(client.health_check().await);
    let _ = client.available_models().await;
    // One tags call serves all three lookups inside the cache interval.
    assert_eq!(transport.tags_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cleanup_clears_metrics_and_forces_a_fresh_health_check() {
    let transport = Arc::new(ScriptedTransport::new(&["m1"], vec![]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    client.generate(params("m1")).await.expect("generation succeeds");
    assert!(client.metrics().snapshot("m1").is_some());
    assert_eq!(transport.tags_calls.load(Ordering::SeqCst), 1);

    client.cleanup();
    assert!(client.metrics().snapshot("m1").is_none());
    assert!(client.health_check().await);
    assert_eq!(transport.tags_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn ensure_model_pulls_when_missing() {
    let transport = Arc::new(ScriptedTransport::new(&["m1"], vec![]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    assert!(client.ensure_model("m1").await.expect("already installed"));
    assert!(client.ensure_model("m2").await.expect("pulled"));
    assert_eq!(transport.installed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn untagged_model_matches_its_latest_install() {
    let transport = Arc::new(ScriptedTransport::new(&["mistral:latest"], vec![]));
    let client = OllamaClient::with_transport(config(), transport.clone());

    client.generate(params("mistral")).await.expect("latest tag matches");
    assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 1);
}
