use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuditError;

/// Hard cap on audited source size. Requests above this are rejected before
/// any model call.
pub const MAX_CODE_BYTES: usize = 100_000;

/// The seven audit categories, in fixed fan-out order. Chunked dispatch for
/// `all`-type requests walks this list front to back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Security,
    Performance,
    Quality,
    Architecture,
    Testing,
    Documentation,
    Completeness,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 7] = [
        AuditCategory::Security,
        AuditCategory::Performance,
        AuditCategory::Quality,
        AuditCategory::Architecture,
        AuditCategory::Testing,
        AuditCategory::Documentation,
        AuditCategory::Completeness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Quality => "quality",
            Self::Architecture => "architecture",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Completeness => "completeness",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// Requested audit scope: a single category or the `all` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditScope {
    Security,
    Performance,
    Quality,
    Architecture,
    Testing,
    Documentation,
    Completeness,
    All,
}

impl AuditScope {
    /// The single category this scope names, or None for `all`.
    pub fn category(&self) -> Option<AuditCategory> {
        match self {
            Self::Security => Some(AuditCategory::Security),
            Self::Performance => Some(AuditCategory::Performance),
            Self::Quality => Some(AuditCategory::Quality),
            Self::Architecture => Some(AuditCategory::Architecture),
            Self::Testing => Some(AuditCategory::Testing),
            Self::Documentation => Some(AuditCategory::Documentation),
            Self::Completeness => Some(AuditCategory::Completeness),
            Self::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self.category() {
            Some(category) => category.as_str(),
            None => "all",
        }
    }
}

/// Caller-selected speed/depth tradeoff.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Fast,
    #[default]
    Thorough,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Thorough => "thorough",
        }
    }
}

/// Severity tiers, declared most-severe-first so the derived `Ord` sorts
/// critical before info and `rank()` is the discriminant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// 0 = critical … 4 = info.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// One tier toward critical. Critical stays critical.
    pub fn escalate(self) -> Self {
        match self {
            Self::Info => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

/// Free-form project context the caller may attach to sharpen prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AuditContext {
    /// Framework in use (e.g. "axum", "react", "django").
    pub framework: Option<String>,
    /// Deployment environment (e.g. "production", "embedded").
    pub environment: Option<String>,
    /// Team size, used only as prompt color.
    pub team_size: Option<u32>,
    /// Project type (e.g. "library", "web-service").
    pub project_type: Option<String>,
    /// When set, the performance auditor escalates its findings one tier.
    #[serde(default)]
    pub performance_critical: bool,
}

/// One audit request as the orchestrator consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    pub code: String,
    pub language: String,
    pub audit_type: AuditScope,
    pub file: Option<String>,
    pub context: Option<AuditContext>,
    #[serde(default)]
    pub priority: Priority,
    pub max_issues: Option<usize>,
    #[serde(default)]
    pub include_fix_suggestions: bool,
}

impl AuditRequest {
    /// Fail-fast validation. Unknown audit types never reach here: the typed
    /// enum rejects them at deserialization, which the transport maps to an
    /// invalid-parameters error.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.code.trim().is_empty() {
            return Err(AuditError::InvalidRequest("code must not be empty".into()));
        }
        if self.language.trim().is_empty() {
            return Err(AuditError::InvalidRequest(
                "language must not be empty".into(),
            ));
        }
        if self.code.len() > MAX_CODE_BYTES {
            return Err(AuditError::InvalidRequest(format!(
                "code exceeds {MAX_CODE_BYTES} bytes ({} given)",
                self.code.len()
            )));
        }
        Ok(())
    }

    /// Hex SHA-256 of the code content, truncated to 16 bytes. Stable across
    /// identical submissions, which is what makes dedup work.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.code.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    /// Dedup key: language + audit type + priority + content hash. Two
    /// requests with the same fingerprint attach to one in-flight audit.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.language.trim().to_lowercase(),
            self.audit_type.as_str(),
            self.priority.as_str(),
            self.content_hash()
        )
    }
}

/// One finding. Immutable after creation except the documented severity
/// escalation pass for performance-critical context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditIssue {
    pub id: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    pub severity: Severity,
    pub issue_type: String,
    pub category: AuditCategory,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Model-reported, clamped to [0, 1], never verified.
    pub confidence: f64,
    pub fixable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
}

/// Issue counts by severity and category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_issues(issues: &[AuditIssue]) -> Self {
        let mut summary = Summary::default();
        for issue in issues {
            summary.count(issue);
        }
        summary
    }

    fn count(&mut self, issue: &AuditIssue) {
        self.total += 1;
        match issue.severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
        *self
            .by_category
            .entry(issue.category.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Field-by-field sum; category maps are unioned.
    pub fn merge(&mut self, other: &Summary) {
        self.total += other.total;
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.info += other.info;
        for (category, count) in &other.by_category {
            *self.by_category.entry(category.clone()).or_insert(0) += count;
        }
    }
}

/// Rough static estimate of what was analyzed. Auditors estimate
/// independently; the merge step trusts the largest value per field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub lines: u32,
    pub functions: u32,
    pub classes: u32,
    pub complexity: f64,
}

impl Coverage {
    pub fn merge_max(&mut self, other: &Coverage) {
        self.lines = self.lines.max(other.lines);
        self.functions = self.functions.max(other.functions);
        self.classes = self.classes.max(other.classes);
        self.complexity = self.complexity.max(other.complexity);
    }
}

/// Filtered views of the issue list, referenced by issue id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub auto_fixable: Vec<String>,
    pub priority: Vec<String>,
    pub quick_wins: Vec<String>,
    pub technical_debt: Vec<String>,
}

impl Suggestions {
    pub fn from_issues(issues: &[AuditIssue]) -> Self {
        let mut buckets = Suggestions::default();
        for issue in issues {
            if issue.fixable {
                buckets.auto_fixable.push(issue.id.clone());
            }
            if matches!(issue.severity, Severity::Critical | Severity::High) {
                buckets.priority.push(issue.id.clone());
            }
            if issue.fixable && issue.effort.as_deref() == Some("low") {
                buckets.quick_wins.push(issue.id.clone());
            }
            if issue.effort.as_deref() == Some("high") || issue.issue_type == "technical_debt" {
                buckets.technical_debt.push(issue.id.clone());
            }
        }
        buckets
    }

    pub fn merge(&mut self, other: &Suggestions) {
        self.auto_fixable.extend(other.auto_fixable.iter().cloned());
        self.priority.extend(other.priority.iter().cloned());
        self.quick_wins.extend(other.quick_wins.iter().cloned());
        self.technical_debt
            .extend(other.technical_debt.iter().cloned());
    }

    /// Drop references to issues that were truncated away.
    pub fn retain_ids(&mut self, keep: &std::collections::HashSet<&str>) {
        self.auto_fixable.retain(|id| keep.contains(id.as_str()));
        self.priority.retain(|id| keep.contains(id.as_str()));
        self.quick_wins.retain(|id| keep.contains(id.as_str()));
        self.technical_debt.retain(|id| keep.contains(id.as_str()));
    }
}

/// Wall-clock accounting for one auditor invocation; summed across auditors
/// on merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub total_ms: u64,
    pub model_ms: u64,
    pub parse_ms: u64,
    pub post_ms: u64,
}

impl AuditMetrics {
    pub fn merge_sum(&mut self, other: &AuditMetrics) {
        self.total_ms += other.total_ms;
        self.model_ms += other.model_ms;
        self.parse_ms += other.parse_ms;
        self.post_ms += other.post_ms;
    }
}

/// Output of one auditor invocation, later merged across auditors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub request_id: String,
    pub issues: Vec<AuditIssue>,
    pub summary: Summary,
    pub coverage: Coverage,
    pub suggestions: Suggestions,
    pub metrics: AuditMetrics,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
