//! Merging per-auditor results into one unified result. Deterministic
//! regardless of auditor completion order: issues are re-sorted by severity
//! then line after concatenation.

use std::collections::HashSet;

use chrono::Utc;

use crate::types::{AuditIssue, AuditMetrics, AuditResult, Coverage, Suggestions, Summary};

/// Severity rank ascending (critical first), then line ascending.
pub fn sort_issues(issues: &mut [AuditIssue]) {
    issues.sort_by(|a, b| a.severity.cmp(&b.severity).then(a.line.cmp(&b.line)));
}

/// Combine per-auditor results: concatenate issues, sum summaries and
/// metrics, take the max of each coverage field, concatenate suggestion
/// buckets. When `max_issues` truncates, the summary is recomputed and
/// suggestion buckets are filtered so both stay consistent with the issue
/// list actually returned.
pub fn merge_results(
    request_id: String,
    parts: Vec<AuditResult>,
    max_issues: Option<usize>,
) -> AuditResult {
    let mut issues: Vec<AuditIssue> = Vec::new();
    let mut summary = Summary::default();
    let mut coverage = Coverage::default();
    let mut suggestions = Suggestions::default();
    let mut metrics = AuditMetrics::default();
    let mut models: Vec<String> = Vec::new();
    let mut version = env!("CARGO_PKG_VERSION").to_string();

    for part in parts {
        summary.merge(&part.summary);
        coverage.merge_max(&part.coverage);
        suggestions.merge(&part.suggestions);
        metrics.merge_sum(&part.metrics);
        if !models.contains(&part.model) {
            models.push(part.model.clone());
        }
        version = part.version;
        issues.extend(part.issues);
    }

    sort_issues(&mut issues);

    if let Some(cap) = max_issues
        && issues.len() > cap
    {
        issues.truncate(cap);
        summary = Summary::from_issues(&issues);
        let keep: HashSet<&str> = issues.iter().map(|i| i.id.as_str()).collect();
        suggestions.retain_ids(&keep);
    }

    AuditResult {
        request_id,
        issues,
        summary,
        coverage,
        suggestions,
        metrics,
        model: if models.is_empty() {
            "none".to_string()
        } else {
            models.join("+")
        },
        timestamp: Utc::now(),
        version,
    }
}
