//! One auditor per category. An auditor is configuration data, not a class
//! hierarchy: the category tag selects the prompt, the selector picks the
//! model, and the shared pipeline does the rest.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use crate::catalog::ModelCatalog;
use crate::config::AuditorSettings;
use crate::error::AuditError;
use crate::ollama::{GenerateParams, OllamaClient};
use crate::selector::SelectionStrategy;
use crate::types::{
    AuditCategory, AuditIssue, AuditMetrics, AuditRequest, AuditResult, Coverage, Severity,
    Suggestions, Summary,
};

use super::patterns::PatternDetector;
use super::prompts;

pub struct Auditor {
    category: AuditCategory,
    client: Arc<OllamaClient>,
    selector: Arc<dyn SelectionStrategy>,
    catalog: Arc<ModelCatalog>,
    /// Static pattern overlay; only the performance auditor carries one.
    detector: Option<PatternDetector>,
}

impl Auditor {
    pub fn new(
        category: AuditCategory,
        client: Arc<OllamaClient>,
        selector: Arc<dyn SelectionStrategy>,
        catalog: Arc<ModelCatalog>,
    ) -> Self {
        let detector = match category {
            AuditCategory::Performance => Some(PatternDetector::new()),
            _ => None,
        };
        Self {
            category,
            client,
            selector,
            catalog,
            detector,
        }
    }

    pub fn category(&self) -> AuditCategory {
        self.category
    }

    /// Run one audit for this category. Model-client failures propagate and
    /// fail the call; malformed individual issues are dropped, never fatal.
    /// Retry lives in the client layer only.
    pub async fn audit(
        &self,
        request: &AuditRequest,
        settings: &AuditorSettings,
    ) -> Result<AuditResult, AuditError> {
        let started = Instant::now();

        let available = self.client.available_models().await?;
        let model = self
            .selector
            .select(
                self.category,
                &request.language,
                request.priority,
                &available,
            )
            .ok_or(AuditError::NoModelsAvailable)?;

        let fast = request.priority == crate::types::Priority::Fast
            && prompts::fast_system_prompt(self.category).is_some();
        let system = prompts::build_system_prompt(self.category, request, fast);
        let prompt = prompts::build_user_prompt(request);

        // Catalog defaults for sampling; a model outside the catalog still
        // works with backend defaults.
        let entry = self.catalog.get(&model);
        let params = GenerateParams {
            model: model.clone(),
            prompt,
            system: Some(system),
            temperature: entry.map(|e| e.temperature),
            top_p: entry.and_then(|e| e.top_p),
            max_tokens: entry.map(|e| e.max_tokens),
        };

        let outcome = self.client.generate(params).await?;
        let model_ms = outcome.elapsed_ms;

        let parse_started = Instant::now();
        let mut issues = parse_issues(&outcome.text, self.category);
        let parse_ms = parse_started.elapsed().as_millis() as u64;

        let post_started = Instant::now();

        if let Some(detector) = &self.detector {
            let static_issues = detector.scan(&request.code);
            merge_static(&mut issues, static_issues);
            let escalate = request
                .context
                .as_ref()
                .is_some_and(|c| c.performance_critical);
            if escalate {
                for issue in &mut issues {
                    issue.severity = issue.severity.escalate();
                }
            }
        }

        // Severity threshold from live config, then deterministic order and
        // the per-auditor cap.
        issues.retain(|issue| issue.severity <= settings.min_severity);
        super::merge::sort_issues(&mut issues);
        if let Some(cap) = settings.max_issues {
            issues.truncate(cap);
        }

        if !request.include_fix_suggestions {
            for issue in &mut issues {
                issue.suggestion = None;
            }
        }

        assign_ids(&mut issues, &request.content_hash()[..8], self.category);

        let summary = Summary::from_issues(&issues);
        let suggestions = Suggestions::from_issues(&issues);
        let coverage = estimate_coverage(&request.code);
        let post_ms = post_started.elapsed().as_millis() as u64;

        Ok(AuditResult {
            request_id: String::new(), // set by the orchestrator
            issues,
            summary,
            coverage,
            suggestions,
            metrics: AuditMetrics {
                total_ms: started.elapsed().as_millis() as u64,
                model_ms,
                parse_ms,
                post_ms,
            },
            model,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// Raw issue shape requested from the model. Strict per-entry parse; a field
/// that fails to deserialize drops that entry only.
#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default = "default_line")]
    line: u32,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default)]
    end_column: Option<u32>,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(rename = "type", alias = "issue_type", default)]
    issue_type: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    fixable: bool,
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    effort: Option<String>,
}

fn default_line() -> u32 {
    1
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct RawFindings {
    #[serde(default)]
    issues: Vec<serde_json::Value>,
}

/// Parse a model response into issues, tolerating prose around the JSON and
/// discarding malformed entries rather than failing the audit.
pub(crate) fn parse_issues(text: &str, category: AuditCategory) -> Vec<AuditIssue> {
    let Some(body) = extract_json(text) else {
        tracing::debug!(category = category.as_str(), "no JSON object in model response");
        return Vec::new();
    };

    let findings: RawFindings = match serde_json::from_str(body) {
        Ok(findings) => findings,
        Err(e) => {
            tracing::debug!(
                category = category.as_str(),
                "model response envelope did not parse: {e}"
            );
            return Vec::new();
        }
    };

    let mut issues = Vec::with_capacity(findings.issues.len());
    let mut dropped = 0usize;
    for value in findings.issues {
        match serde_json::from_value::<RawIssue>(value) {
            Ok(raw) => issues.push(AuditIssue {
                id: String::new(),
                line: raw.line.max(1),
                column: raw.column,
                end_line: raw.end_line,
                end_column: raw.end_column,
                severity: raw.severity.unwrap_or(Severity::Medium),
                issue_type: raw
                    .issue_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "general".to_string()),
                category,
                title: raw.title,
                description: raw.description,
                suggestion: raw.suggestion,
                confidence: raw.confidence.clamp(0.0, 1.0),
                fixable: raw.fixable,
                rule_id: raw.rule_id,
                effort: raw.effort,
            }),
            Err(e) => {
                dropped += 1;
                tracing::debug!(category = category.as_str(), "dropping malformed issue: {e}");
            }
        }
    }
    if dropped > 0 {
        tracing::warn!(
            category = category.as_str(),
            dropped,
            "discarded malformed issues from model response"
        );
    }
    issues
}

/// Locate the JSON body in a model response: strip a fenced block if present,
/// otherwise take the outermost brace span.
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let fenced = trimmed
        .split_once("```json")
        .or_else(|| trimmed.split_once("```"))
        .and_then(|(_, rest)| rest.split_once("```"))
        .map(|(body, _)| body.trim());
    let candidate = fenced.unwrap_or(trimmed);

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&candidate[start..=end])
}

/// Merge static-pattern issues into model issues, keeping the model's entry
/// on a (line, type) collision.
fn merge_static(issues: &mut Vec<AuditIssue>, static_issues: Vec<AuditIssue>) {
    let seen: HashSet<(u32, String)> = issues
        .iter()
        .map(|i| (i.line, i.issue_type.clone()))
        .collect();
    for issue in static_issues {
        if !seen.contains(&(issue.line, issue.issue_type.clone())) {
            issues.push(issue);
        }
    }
}

/// Stable ids: content-hash prefix + category + position after sorting, so
/// identical requests produce identical ids.
fn assign_ids(issues: &mut [AuditIssue], hash_prefix: &str, category: AuditCategory) {
    for (index, issue) in issues.iter_mut().enumerate() {
        issue.id = format!("{}-{}-{:03}", category.as_str(), hash_prefix, index + 1);
    }
}

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfn\s+\w+|\bdef\s+\w+|\bfunction\b|=>\s*\{|\bfunc\s+\w+")
        .expect("static pattern")
});

static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+\w+|\bstruct\s+\w+|\binterface\s+\w+|\bimpl\s+\w+")
        .expect("static pattern")
});

static DECISION_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bif\b|\bfor\b|\bwhile\b|\bmatch\b|\bcase\b|&&|\|\|").expect("static pattern")
});

/// Cheap static coverage estimate. Each auditor computes this independently;
/// the merge step keeps the maximum per field.
pub(crate) fn estimate_coverage(code: &str) -> Coverage {
    let lines = code.lines().count() as u32;
    let functions = FUNCTION_DECL.find_iter(code).count() as u32;
    let classes = CLASS_DECL.find_iter(code).count() as u32;
    let decisions = DECISION_POINT.find_iter(code).count() as u32;
    // Decision points per function, as a rough cyclomatic stand-in.
    let complexity = f64::from(decisions) / f64::from(functions.max(1));
    Coverage {
        lines,
        functions,
        classes,
        complexity,
    }
}
