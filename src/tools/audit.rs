use schemars::JsonSchema;
use serde::Deserialize;

use crate::types::{AuditContext, AuditRequest, AuditScope, Priority};

/// Parameters for the `audit_code` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AuditCodeRequest {
    /// Source code to audit (max 100 000 bytes).
    pub code: String,
    /// Language identifier, e.g. "rust", "python", "typescript".
    pub language: String,
    /// Audit category, or "all" to fan out across every category.
    pub audit_type: AuditScope,
    /// Optional file name, used only as prompt context.
    pub file: Option<String>,
    /// Optional project context (framework, environment, performance_critical, ...).
    pub context: Option<AuditContext>,
    /// "fast" runs a narrow security+completeness triage on small models;
    /// "thorough" (default) runs the requested scope on stronger models.
    pub priority: Option<Priority>,
    /// Cap on the number of issues returned after merge.
    pub max_issues: Option<usize>,
    /// Include fix suggestions in issues (default false).
    pub include_fix_suggestions: Option<bool>,
}

impl AuditCodeRequest {
    pub fn into_request(self) -> AuditRequest {
        AuditRequest {
            code: self.code,
            language: self.language,
            audit_type: self.audit_type,
            file: self.file,
            context: self.context,
            priority: self.priority.unwrap_or_default(),
            max_issues: self.max_issues,
            include_fix_suggestions: self.include_fix_suggestions.unwrap_or(false),
        }
    }
}
