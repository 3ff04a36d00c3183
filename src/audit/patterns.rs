//! Regex-based static detection for the performance auditor. These run
//! without a model and are merged with model findings, deduplicated by
//! (line, type).

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{AuditCategory, AuditIssue, Severity};

/// A single-line rule checked against each source line. `loop_scoped` rules
/// only fire inside a loop body.
struct LineRule {
    issue_type: &'static str,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    suggestion: &'static str,
    pattern: &'static LazyLock<Regex>,
    loop_scoped: bool,
}

static LOOP_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(for\b|while\b|foreach\b|loop\b|\.forEach\(|for\s*\()")
        .expect("static pattern")
});

static QUERY_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(query|execute|find_one|findone|find_by|fetch|get)\s*\(|SELECT\s+.+\s+FROM")
        .expect("static pattern")
});

static SYNC_IO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w+Sync\s*\(|std::fs::(read|write|read_to_string)\b|\bsleep\s*\(")
        .expect("static pattern")
});

static ASYNC_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\basync\b").expect("static pattern"));

static LISTENER_ADD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(addEventListener|addListener|on)\s*\(\s*['\x22]").expect("static pattern")
});

static LISTENER_REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(removeEventListener|removeListener|off)\s*\(").expect("static pattern")
});

static STRING_CONCAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\+=\s*['\x22`]|=\s*\w+\s*\+\s*['\x22`]|\.push_str\s*\("#)
        .expect("static pattern")
});

static LINE_RULES: &[LineRule] = &[
    LineRule {
        issue_type: "n_plus_one_query",
        severity: Severity::High,
        title: "Query executed inside a loop",
        description: "A database or repository call runs once per loop iteration, \
                      multiplying round trips with input size.",
        suggestion: "Batch the lookups into one query outside the loop.",
        pattern: &QUERY_CALL,
        loop_scoped: true,
    },
    LineRule {
        issue_type: "string_concat_in_loop",
        severity: Severity::Medium,
        title: "String concatenation inside a loop",
        description: "Repeated concatenation reallocates the accumulator each \
                      iteration.",
        suggestion: "Collect parts and join once, or preallocate a buffer.",
        pattern: &STRING_CONCAT,
        loop_scoped: true,
    },
];

/// Detector instance held by the performance auditor. Stateless; `scan` is a
/// pure function of the source text.
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan source text and emit issues. Ids are assigned later by the
    /// auditor's post-processing pass together with model-found issues.
    pub fn scan(&self, code: &str) -> Vec<AuditIssue> {
        let mut issues = Vec::new();
        let has_async = ASYNC_MARKER.is_match(code);
        let adds_listeners = LISTENER_ADD.is_match(code);
        let removes_listeners = LISTENER_REMOVE.is_match(code);

        // Indentation stack of open loops; a loop head deeper than an open
        // loop means nesting.
        let mut open_loops: Vec<usize> = Vec::new();

        for (index, raw_line) in code.lines().enumerate() {
            let line_no = (index + 1) as u32;
            let trimmed = raw_line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            let indent = raw_line.len() - trimmed.len();

            // Close loops we have dedented out of.
            open_loops.retain(|loop_indent| indent > *loop_indent);
            let in_loop = !open_loops.is_empty();

            if LOOP_HEAD.is_match(raw_line) {
                if in_loop {
                    issues.push(static_issue(
                        line_no,
                        Severity::High,
                        "nested_loops",
                        "Nested loops",
                        "A loop inside another loop gives quadratic (or worse) \
                         complexity over the input.",
                        "Restructure with a lookup table or a single pass if possible.",
                    ));
                }
                open_loops.push(indent);
                continue;
            }

            for rule in LINE_RULES {
                if rule.loop_scoped && !in_loop {
                    continue;
                }
                if rule.pattern.is_match(raw_line) {
                    issues.push(static_issue(
                        line_no,
                        rule.severity,
                        rule.issue_type,
                        rule.title,
                        rule.description,
                        rule.suggestion,
                    ));
                }
            }

            if has_async && SYNC_IO.is_match(raw_line) {
                issues.push(static_issue(
                    line_no,
                    Severity::Medium,
                    "sync_io_in_async",
                    "Blocking call in async code",
                    "Synchronous I/O or sleep inside an async context stalls the \
                     executor thread.",
                    "Use the async equivalent or move the call to a blocking pool.",
                ));
            }

            if adds_listeners && !removes_listeners && LISTENER_ADD.is_match(raw_line) {
                issues.push(static_issue(
                    line_no,
                    Severity::Medium,
                    "unbounded_listeners",
                    "Listener added without matching removal",
                    "Event listeners registered here are never removed anywhere in \
                     this code, which leaks handlers on repeated setup.",
                    "Remove the listener in the teardown path.",
                ));
            }
        }

        issues
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn static_issue(
    line: u32,
    severity: Severity,
    issue_type: &str,
    title: &str,
    description: &str,
    suggestion: &str,
) -> AuditIssue {
    AuditIssue {
        id: String::new(),
        line,
        column: None,
        end_line: None,
        end_column: None,
        severity,
        issue_type: issue_type.to_string(),
        category: AuditCategory::Performance,
        title: title.to_string(),
        description: description.to_string(),
        suggestion: Some(suggestion.to_string()),
        // Static matches are certain about the pattern, not the impact.
        confidence: 0.9,
        fixable: true,
        rule_id: Some(format!("static:{issue_type}")),
        effort: Some("low".to_string()),
    }
}
