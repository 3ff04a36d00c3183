use chrono::{DateTime, Utc};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::AuditError;

/// Uniform tool response envelope. All tools return
/// `Content::text(json_string)`; error details live in the payload
/// (`"status": "error"` plus a stable code) rather than at the MCP transport
/// level, so one failed audit does not cascade into sibling tool failures.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub status: &'static str,
    pub content: String,
    pub content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: ToolMetadata,
}

#[derive(Debug, Serialize)]
pub struct ToolMetadata {
    pub tool_name: String,
    pub model_used: String,
    #[serde(serialize_with = "serialize_finite_f64")]
    pub duration_seconds: f64,
}

/// Serialize f64, clamping non-finite values (NaN, Inf) to 0.0.
fn serialize_finite_f64<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(if v.is_finite() { *v } else { 0.0 })
}

impl ToolResponse {
    pub fn success(content: String, metadata: ToolMetadata) -> Self {
        Self {
            status: "success",
            content,
            content_type: "json",
            error_code: None,
            recoverable: None,
            timestamp: None,
            metadata,
        }
    }

    pub fn error(error: &AuditError, metadata: ToolMetadata) -> Self {
        Self {
            status: "error",
            content: error.user_message(),
            content_type: "text",
            error_code: Some(error.code()),
            recoverable: Some(error.recoverable()),
            timestamp: Some(Utc::now()),
            metadata,
        }
    }

    /// Convert to an MCP CallToolResult. Serialization failure of the
    /// envelope itself degrades to a hand-built error payload.
    pub fn into_call_tool_result(self) -> CallToolResult {
        match serde_json::to_string(&self) {
            Ok(json) => CallToolResult::success(vec![Content::text(json)]),
            Err(e) => {
                let escaped = e.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                CallToolResult::success(vec![Content::text(format!(
                    r#"{{"status":"error","content":"serialization failed: {escaped}","content_type":"text","metadata":{{}}}}"#
                ))])
            }
        }
    }
}
