use thiserror::Error;

/// Error taxonomy for the audit pipeline. Every variant carries only owned
/// strings so results can flow through shared (cloned) futures during
/// duplicate-request suppression.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("ollama backend unreachable: {0}")]
    OllamaUnavailable(String),

    #[error("model not installed: {model}")]
    ModelNotFound { model: String },

    #[error("generation failed after {attempts} attempts: {last_error}")]
    GenerationFailed { attempts: u32, last_error: String },

    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("audit timed out after {0}s")]
    AuditTimeout(u64),

    #[error("no models available for selection")]
    NoModelsAvailable,

    #[error("response parse error: {0}")]
    ResponseParse(String),

    #[error("{0}")]
    Internal(String),
}

impl AuditError {
    /// Stable machine-readable code, kept constant across releases so MCP
    /// clients can match on it.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OllamaUnavailable(_) => "OLLAMA_UNAVAILABLE",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::GenerationFailed { .. } => "GENERATION_FAILED",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::AuditTimeout(_) => "AUDIT_TIMEOUT",
            Self::NoModelsAvailable => "NO_MODELS_AVAILABLE",
            Self::ResponseParse(_) => "PARSE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true when the caller may reasonably retry the same request.
    /// A dead backend is not recoverable from the caller's side; a missing
    /// model is (pull it first).
    pub fn recoverable(&self) -> bool {
        match self {
            Self::OllamaUnavailable(_) => false,
            Self::ModelNotFound { .. } => true,
            Self::GenerationFailed { .. } => true,
            Self::Upstream { status, .. } => *status >= 500,
            Self::InvalidRequest(_) => false,
            Self::AuditTimeout(_) => true,
            Self::NoModelsAvailable => true,
            Self::ResponseParse(_) => true,
            Self::Internal(_) => false,
        }
    }

    /// Produce a sanitized message safe for returning to MCP clients.
    /// Does not leak hosts, URLs, or raw upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::OllamaUnavailable(_) => {
                "Ollama backend is unreachable — check that `ollama serve` is running \
                 and the configured host is correct"
                    .to_string()
            }
            Self::ModelNotFound { model } => {
                format!("model not installed: {model} — run `ollama pull {model}`")
            }
            Self::GenerationFailed {
                attempts,
                last_error,
            } => {
                format!("generation failed after {attempts} attempts: {last_error}")
            }
            Self::Upstream { status, .. } => format!("ollama returned HTTP {status}"),
            Self::InvalidRequest(msg) => format!("invalid request: {msg}"),
            Self::AuditTimeout(secs) => format!("audit timed out after {secs}s"),
            Self::NoModelsAvailable => {
                "no models available — pull at least one supported model".to_string()
            }
            Self::ResponseParse(_) => "failed to parse model response".to_string(),
            Self::Internal(msg) => msg.clone(),
        }
    }
}
