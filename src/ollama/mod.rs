//! Client for the local Ollama runtime: health checking with a cached
//! result, generation with per-call timeout and exponential-backoff retry,
//! and per-model metrics.

pub mod api;
pub mod metrics;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use reqwest::Client;

use crate::config::OllamaConfig;
use crate::error::AuditError;
use api::{DeleteRequest, GenerateRequest, GenerateResponse, PullRequest, TagsResponse};
use metrics::MetricsRegistry;

/// Model pulls download gigabytes; they get their own generous bound,
/// independent of the per-generation timeout.
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Transport boundary to the Ollama HTTP API. The production implementation
/// is [`HttpTransport`]; tests inject scripted ones.
pub trait OllamaTransport: Send + Sync {
    fn generate(&self, body: GenerateRequest) -> BoxFuture<'_, Result<GenerateResponse, AuditError>>;
    fn tags(&self) -> BoxFuture<'_, Result<TagsResponse, AuditError>>;
    fn pull<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>>;
    fn delete<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>>;
}

pub struct HttpTransport {
    client: Client,
    host: String,
}

impl HttpTransport {
    pub fn new(host: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }
}

fn transport_error(e: reqwest::Error) -> AuditError {
    AuditError::OllamaUnavailable(e.to_string())
}

async fn check_status(response: reqwest::Response, model: &str) -> Result<reqwest::Response, AuditError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AuditError::ModelNotFound {
            model: model.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let mut message: String = body.chars().take(200).collect();
        if message.is_empty() {
            message = status.to_string();
        }
        return Err(AuditError::Upstream {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

impl OllamaTransport for HttpTransport {
    fn generate(&self, body: GenerateRequest) -> BoxFuture<'_, Result<GenerateResponse, AuditError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/api/generate"))
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response, &body.model).await?;
            response
                .json::<GenerateResponse>()
                .await
                .map_err(|e| AuditError::ResponseParse(e.to_string()))
        })
    }

    fn tags(&self) -> BoxFuture<'_, Result<TagsResponse, AuditError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url("/api/tags"))
                .timeout(Duration::from_secs(5))
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response, "").await?;
            response
                .json::<TagsResponse>()
                .await
                .map_err(|e| AuditError::ResponseParse(e.to_string()))
        })
    }

    fn pull<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>> {
        Box::pin(async move {
            let body = PullRequest {
                name: model.to_string(),
                stream: false,
            };
            let response = self
                .client
                .post(self.url("/api/pull"))
                .timeout(PULL_TIMEOUT)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response, model).await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, model: &'a str) -> BoxFuture<'a, Result<(), AuditError>> {
        Box::pin(async move {
            let body = DeleteRequest {
                name: model.to_string(),
            };
            let response = self
                .client
                .delete(self.url("/api/delete"))
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response, model).await?;
            Ok(())
        })
    }
}

/// Parameters for one generation call, resolved from the model catalog by
/// the calling auditor.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Successful generation plus timing metadata.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub text: String,
    pub model: String,
    pub elapsed_ms: u64,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
}

#[derive(Default)]
struct HealthState {
    healthy: bool,
    last_check: Option<Instant>,
    /// Model names from the last successful tags call.
    available: Vec<String>,
}

pub struct OllamaClient {
    transport: Arc<dyn OllamaTransport>,
    config: OllamaConfig,
    metrics: Arc<MetricsRegistry>,
    health: Mutex<HealthState>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.host));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: OllamaConfig, transport: Arc<dyn OllamaTransport>) -> Self {
        Self {
            transport,
            config,
            metrics: Arc::new(MetricsRegistry::new()),
            health: Mutex::new(HealthState::default()),
        }
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    fn health_interval(&self) -> Duration {
        Duration::from_millis(self.config.health_check_interval_ms)
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, HealthState> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn refresh_health(&self) -> Result<Vec<String>, AuditError> {
        match self.transport.tags().await {
            Ok(tags) => {
                let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
                let mut state = self.lock_health();
                state.healthy = true;
                state.last_check = Some(Instant::now());
                state.available = names.clone();
                Ok(names)
            }
            Err(e) => {
                let mut state = self.lock_health();
                state.healthy = false;
                state.last_check = Some(Instant::now());
                tracing::warn!("ollama health check failed: {e}");
                Err(match e {
                    AuditError::OllamaUnavailable(_) => e,
                    other => AuditError::OllamaUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Names of currently installed models. Serves the cached set while it is
    /// fresh and the backend was healthy; otherwise forces a health check.
    pub async fn available_models(&self) -> Result<Vec<String>, AuditError> {
        {
            let state = self.lock_health();
            let fresh = state
                .last_check
                .is_some_and(|t| t.elapsed() < self.health_interval());
            if state.healthy && fresh {
                return Ok(state.available.clone());
            }
        }
        self.refresh_health().await
    }

    pub async fn health_check(&self) -> bool {
        self.available_models().await.is_ok()
    }

    /// True when the model is installed. If it is missing, a pull is
    /// attempted and availability re-checked.
    pub async fn ensure_model(&self, model: &str) -> Result<bool, AuditError> {
        let available = self.available_models().await?;
        if model_available(&available, model) {
            return Ok(true);
        }
        tracing::info!(model, "model missing, pulling");
        if let Err(e) = self.transport.pull(model).await {
            tracing::warn!(model, "pull failed: {e}");
            return Ok(false);
        }
        let available = self.refresh_health().await?;
        Ok(model_available(&available, model))
    }

    pub async fn delete_model(&self, model: &str) -> Result<(), AuditError> {
        self.transport.delete(model).await?;
        self.refresh_health().await?;
        Ok(())
    }

    /// Generate text with retry. Backoff doubles per attempt starting from
    /// `retry_delay_ms`. A failed health check surfaces immediately without
    /// consuming a retry attempt; an uninstalled model fails before the first
    /// attempt.
    pub async fn generate(&self, params: GenerateParams) -> Result<GenerateOutcome, AuditError> {
        let available = self.available_models().await?;
        if !model_available(&available, &params.model) {
            return Err(AuditError::ModelNotFound {
                model: params.model.clone(),
            });
        }

        let attempts = self.config.retry_attempts.max(1);
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let started = Instant::now();
            let call = self.transport.generate(build_body(&params));
            let result = tokio::time::timeout(timeout, call).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(Ok(response)) => {
                    self.metrics.record(&params.model, elapsed_ms, true);
                    return Ok(GenerateOutcome {
                        text: response.response,
                        model: params.model.clone(),
                        elapsed_ms,
                        prompt_eval_count: response.prompt_eval_count,
                        eval_count: response.eval_count,
                    });
                }
                Ok(Err(e)) => {
                    self.metrics.record(&params.model, elapsed_ms, false);
                    last_error = e.to_string();
                    tracing::warn!(
                        model = params.model,
                        attempt,
                        "generation attempt failed: {last_error}"
                    );
                }
                Err(_) => {
                    self.metrics.record(&params.model, elapsed_ms, false);
                    last_error = format!("timed out after {}ms", self.config.timeout_ms);
                    tracing::warn!(model = params.model, attempt, "generation attempt timed out");
                }
            }

            if attempt < attempts {
                let delay = self.config.retry_delay_ms.saturating_mul(1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AuditError::GenerationFailed {
            attempts,
            last_error,
        })
    }

    /// Drop all cached metrics and availability state. Used on shutdown.
    pub fn cleanup(&self) {
        self.metrics.clear();
        let mut state = self.lock_health();
        *state = HealthState::default();
    }
}

fn build_body(params: &GenerateParams) -> GenerateRequest {
    GenerateRequest {
        model: params.model.clone(),
        prompt: params.prompt.clone(),
        system: params.system.clone(),
        stream: false,
        options: api::ModelOptions {
            temperature: params.temperature,
            top_p: params.top_p,
            num_predict: params.max_tokens,
        },
    }
}

/// Tag-aware availability check: "codellama:13b" matches exactly, and an
/// untagged request matches its ":latest" install.
fn model_available(available: &[String], model: &str) -> bool {
    available.iter().any(|installed| {
        installed == model
            || (!model.contains(':') && installed.strip_suffix(":latest") == Some(model))
    })
}
