//! Prompt assembly: per-category system prompts, language and framework
//! guidance fragments, and the strict-JSON instruction block.

use crate::types::{AuditCategory, AuditRequest};

/// Category system prompt, thorough mode.
pub fn system_prompt(category: AuditCategory) -> &'static str {
    match category {
        AuditCategory::Security => {
            "You are a security auditor. Examine the code for injection flaws, \
             unsafe deserialization, path traversal, hardcoded credentials, weak \
             cryptography, missing input validation, and authentication or \
             authorization gaps. Report only issues present in the given code."
        }
        AuditCategory::Performance => {
            "You are a performance auditor. Examine the code for algorithmic \
             inefficiency, redundant work inside loops, N+1 query patterns, \
             blocking calls on hot paths, unbounded memory growth, and missed \
             caching opportunities. Report only issues present in the given code."
        }
        AuditCategory::Quality => {
            "You are a code-quality auditor. Examine the code for readability \
             problems, duplicated logic, dead code, overly long functions, \
             inconsistent naming, and error handling that swallows failures. \
             Report only issues present in the given code."
        }
        AuditCategory::Architecture => {
            "You are a software-architecture auditor. Examine the code for \
             layering violations, tight coupling, missing abstraction boundaries, \
             god objects, and responsibilities that belong elsewhere. Report only \
             issues present in the given code."
        }
        AuditCategory::Testing => {
            "You are a test-coverage auditor. Examine the code for untested \
             branches, missing edge-case handling that tests would catch, \
             hard-to-test constructs, and hidden dependencies that block \
             isolation. Report only issues present in the given code."
        }
        AuditCategory::Documentation => {
            "You are a documentation auditor. Examine the code for missing or \
             stale doc comments on public surfaces, misleading names, magic \
             numbers without explanation, and undocumented invariants. Report \
             only issues present in the given code."
        }
        AuditCategory::Completeness => {
            "You are a completeness auditor. Examine the code for unimplemented \
             stubs, TODO and FIXME markers, unhandled error paths, missing null \
             or bounds checks, and partially applied changes. Report only issues \
             present in the given code."
        }
    }
}

/// Narrowed fast-mode prompt. Only security and completeness have one; fast
/// dispatch runs exactly those two categories.
pub fn fast_system_prompt(category: AuditCategory) -> Option<&'static str> {
    match category {
        AuditCategory::Security => Some(
            "You are a security auditor doing a rapid triage pass. Report only \
             critical-impact findings: exploitable injection, credential leaks, \
             and authentication bypass. Skip style and low-impact issues entirely.",
        ),
        AuditCategory::Completeness => Some(
            "You are a completeness auditor doing a rapid triage pass. Report \
             only critical-impact gaps: unimplemented code paths that will be \
             executed, and unhandled errors that will crash. Skip everything else.",
        ),
        _ => None,
    }
}

/// Language-specific guidance appended to the system prompt.
pub fn language_guidance(language: &str) -> Option<&'static str> {
    match language {
        "rust" => Some(
            "Pay attention to unwrap/expect on fallible paths, unnecessary \
             clones, and unsafe blocks without safety comments.",
        ),
        "python" => Some(
            "Pay attention to mutable default arguments, bare except clauses, \
             and blocking I/O inside async functions.",
        ),
        "javascript" | "typescript" | "js" | "ts" => Some(
            "Pay attention to unawaited promises, prototype pollution, == vs \
             ===, and listeners that are added but never removed.",
        ),
        "go" => Some(
            "Pay attention to ignored error returns, goroutine leaks, and data \
             races on shared maps.",
        ),
        "java" | "kotlin" => Some(
            "Pay attention to resource leaks outside try-with-resources, \
             equals/hashCode contracts, and synchronization on non-final fields.",
        ),
        _ => None,
    }
}

/// Framework-specific guidance appended to the system prompt.
pub fn framework_guidance(framework: &str) -> Option<&'static str> {
    match framework.to_lowercase().as_str() {
        "react" => Some("Watch for missing hook dependency arrays and state mutations."),
        "django" => Some("Watch for raw SQL bypassing the ORM and missing CSRF protection."),
        "express" => Some("Watch for unvalidated request bodies reaching handlers."),
        "axum" | "actix" => Some("Watch for blocking calls inside async handlers."),
        "spring" => Some("Watch for field injection and unbounded thread pools."),
        _ => None,
    }
}

/// Full system prompt: category text plus applicable guidance fragments.
pub fn build_system_prompt(category: AuditCategory, request: &AuditRequest, fast: bool) -> String {
    let base = if fast {
        fast_system_prompt(category).unwrap_or_else(|| system_prompt(category))
    } else {
        system_prompt(category)
    };

    let mut prompt = base.to_string();
    let language = request.language.trim().to_lowercase();
    if let Some(guidance) = language_guidance(&language) {
        prompt.push(' ');
        prompt.push_str(guidance);
    }
    if let Some(framework) = request.context.as_ref().and_then(|c| c.framework.as_deref())
        && let Some(guidance) = framework_guidance(framework)
    {
        prompt.push(' ');
        prompt.push_str(guidance);
    }
    prompt
}

/// User prompt: context lines, the code block, and the strict-JSON output
/// instructions the parser depends on.
pub fn build_user_prompt(request: &AuditRequest) -> String {
    let mut prompt = String::with_capacity(request.code.len() + 1024);

    prompt.push_str(&format!("Analyze the following {} code", request.language));
    if let Some(file) = &request.file {
        prompt.push_str(&format!(" from `{file}`"));
    }
    prompt.push_str(".\n");

    if let Some(context) = &request.context {
        if let Some(environment) = &context.environment {
            prompt.push_str(&format!("Environment: {environment}.\n"));
        }
        if let Some(project_type) = &context.project_type {
            prompt.push_str(&format!("Project type: {project_type}.\n"));
        }
        if let Some(team_size) = context.team_size {
            prompt.push_str(&format!("Team size: {team_size}.\n"));
        }
        if context.performance_critical {
            prompt.push_str("This code is performance-critical.\n");
        }
    }

    prompt.push_str(&format!("\n```{}\n{}\n```\n\n", request.language, request.code));

    prompt.push_str(
        "Respond with a single JSON object and no other text:\n\
         {\"issues\":[{\"line\":<int>,\"severity\":\"critical|high|medium|low|info\",\
         \"type\":\"<short_snake_case_tag>\",\"title\":\"<one line>\",\
         \"description\":\"<what and why>\"",
    );
    if request.include_fix_suggestions {
        prompt.push_str(",\"suggestion\":\"<how to fix>\"");
    }
    prompt.push_str(",\"confidence\":<0.0-1.0>,\"fixable\":<true|false>}]}\n");

    if let Some(max_issues) = request.max_issues {
        prompt.push_str(&format!("Report at most {max_issues} issues.\n"));
    }

    prompt
}
