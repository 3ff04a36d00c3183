//! The request-handling core: validation, duplicate-request suppression,
//! chunked fan-out across auditors, merge, and the per-request timeout.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::catalog::ModelCatalog;
use crate::config::{AuditorSettings, ServerConfig};
use crate::error::AuditError;
use crate::ollama::OllamaClient;
use crate::selector::{SelectionStrategy, SelectorHandle};
use crate::types::{AuditCategory, AuditRequest, AuditResult, Priority};

use super::auditor::Auditor;
use super::merge::merge_results;

/// Wall-clock bound on one request, dedup wait included. Fixed by design;
/// the per-generation timeout is the configurable one.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// The shared in-flight future concurrent identical requests attach to.
type SharedOutcome = Shared<BoxFuture<'static, Result<Arc<AuditResult>, AuditError>>>;

struct ActiveAudit {
    /// Guards eviction: a late-finishing task only removes the entry it
    /// created, never a successor with the same fingerprint.
    generation: u64,
    started: Instant,
    outcome: SharedOutcome,
}

pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    auditors: BTreeMap<AuditCategory, Auditor>,
    settings: Mutex<BTreeMap<AuditCategory, AuditorSettings>>,
    selector: Arc<SelectorHandle>,
    max_concurrent_audits: usize,
    active: Mutex<HashMap<String, ActiveAudit>>,
    request_counter: AtomicU64,
    generation_counter: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        client: Arc<OllamaClient>,
        selector: Arc<SelectorHandle>,
        catalog: Arc<ModelCatalog>,
        config: &ServerConfig,
    ) -> Self {
        let mut auditors = BTreeMap::new();
        let mut settings = BTreeMap::new();
        for category in AuditCategory::ALL {
            auditors.insert(
                category,
                Auditor::new(
                    category,
                    client.clone(),
                    selector.clone() as Arc<dyn SelectionStrategy>,
                    catalog.clone(),
                ),
            );
            settings.insert(category, config.auditor_settings(category));
        }

        Self {
            inner: Arc::new(Inner {
                auditors,
                settings: Mutex::new(settings),
                selector,
                max_concurrent_audits: config.performance.max_concurrent_audits.max(1),
                active: Mutex::new(HashMap::new()),
                request_counter: AtomicU64::new(0),
                generation_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Swap the active selection strategy. Takes effect on the next audit.
    pub fn set_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        self.inner.selector.swap(strategy);
    }

    /// Number of audits currently in flight.
    pub fn active_count(&self) -> usize {
        self.inner.lock_active().len()
    }

    /// Enabled/disabled category names, for health reporting.
    pub fn auditor_states(&self) -> (Vec<String>, Vec<String>) {
        let settings = self.inner.lock_settings();
        let mut enabled = Vec::new();
        let mut disabled = Vec::new();
        for category in AuditCategory::ALL {
            let on = settings.get(&category).map(|s| s.enabled).unwrap_or(true);
            if on {
                enabled.push(category.as_str().to_string());
            } else {
                disabled.push(category.as_str().to_string());
            }
        }
        (enabled, disabled)
    }

    /// Live-apply auditor settings patches. Returns the categories that were
    /// actually updated; unknown keys are reported back for the caller to
    /// surface.
    pub fn update_auditor_settings(
        &self,
        updates: &BTreeMap<String, AuditorSettingsPatch>,
    ) -> (Vec<String>, Vec<String>) {
        let mut settings = self.inner.lock_settings();
        let mut applied = Vec::new();
        let mut unknown = Vec::new();
        for (key, patch) in updates {
            match AuditCategory::parse(key) {
                Some(category) => {
                    let entry = settings.entry(category).or_default();
                    if let Some(enabled) = patch.enabled {
                        entry.enabled = enabled;
                    }
                    if let Some(min_severity) = patch.min_severity {
                        entry.min_severity = min_severity;
                    }
                    if let Some(max_issues) = patch.max_issues {
                        entry.max_issues = Some(max_issues);
                    }
                    applied.push(key.clone());
                }
                None => unknown.push(key.clone()),
            }
        }
        (applied, unknown)
    }

    /// Handle one audit request end to end. Identical concurrent requests
    /// (same fingerprint) share a single underlying audit; every caller gets
    /// the same result. The 5-minute bound covers the dedup wait too. On
    /// expiry the entry is evicted and an error surfaced, but an in-flight
    /// generation call is not cancelled — it finishes or times out on its
    /// own, best effort.
    pub async fn audit(&self, request: AuditRequest) -> Result<Arc<AuditResult>, AuditError> {
        request.validate()?;
        let key = request.fingerprint();

        let (outcome, generation) = {
            let mut active = self.inner.lock_active();
            if let Some(entry) = active.get(&key) {
                tracing::debug!(fingerprint = key, "attaching to in-flight audit");
                (entry.outcome.clone(), entry.generation)
            } else {
                let generation = self.inner.generation_counter.fetch_add(1, Ordering::Relaxed);
                let outcome = spawn_audit(self.inner.clone(), request, key.clone(), generation);
                active.insert(
                    key.clone(),
                    ActiveAudit {
                        generation,
                        started: Instant::now(),
                        outcome: outcome.clone(),
                    },
                );
                (outcome, generation)
            }
        };

        match tokio::time::timeout(REQUEST_TIMEOUT, outcome).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.evict(&key, generation);
                Err(AuditError::AuditTimeout(REQUEST_TIMEOUT.as_secs()))
            }
        }
    }
}

impl Inner {
    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<String, ActiveAudit>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, BTreeMap<AuditCategory, AuditorSettings>> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict(&self, key: &str, generation: u64) {
        let mut active = self.lock_active();
        if let Some(entry) = active.get(key)
            && entry.generation == generation
        {
            let elapsed_ms = entry.started.elapsed().as_millis() as u64;
            active.remove(key);
            tracing::debug!(fingerprint = key, elapsed_ms, "audit entry evicted");
        }
    }
}

/// Partial per-auditor settings, applied live by `update_config`.
#[derive(Debug, Clone, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct AuditorSettingsPatch {
    pub enabled: Option<bool>,
    pub min_severity: Option<crate::types::Severity>,
    pub max_issues: Option<usize>,
}

/// Spawn the underlying audit as a detached task and wrap its handle in a
/// shared future. Detaching keeps dedup semantics honest: the audit keeps
/// running even if every waiter times out, and late attachers still get its
/// result.
fn spawn_audit(
    inner: Arc<Inner>,
    request: AuditRequest,
    key: String,
    generation: u64,
) -> SharedOutcome {
    let handle = tokio::spawn(async move {
        let result = run_audit(&inner, &request).await.map(Arc::new);
        inner.evict(&key, generation);
        result
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(AuditError::Internal(format!("audit task failed: {e}"))),
        }
    }
    .boxed()
    .shared()
}

/// The dispatch state machine: pick categories, fan out in chunks, merge.
async fn run_audit(inner: &Inner, request: &AuditRequest) -> Result<AuditResult, AuditError> {
    let sequence = inner.request_counter.fetch_add(1, Ordering::Relaxed);
    let request_id = format!("req-{}-{sequence:04}", &request.content_hash()[..8]);

    let fan_out = request.priority == Priority::Fast || request.audit_type.category().is_none();
    let categories: Vec<AuditCategory> = if request.priority == Priority::Fast {
        // Fast mode ignores the requested type and always runs the two
        // triage auditors. Source behavior, preserved deliberately.
        vec![AuditCategory::Security, AuditCategory::Completeness]
    } else {
        match request.audit_type.category() {
            Some(category) => vec![category],
            None => AuditCategory::ALL.to_vec(),
        }
    };

    // Snapshot settings once so one request sees one consistent config.
    let settings: BTreeMap<AuditCategory, AuditorSettings> = inner.lock_settings().clone();

    let mut selected: Vec<(AuditCategory, AuditorSettings)> = Vec::new();
    for category in categories {
        let config = settings.get(&category).cloned().unwrap_or_default();
        if !config.enabled {
            if fan_out {
                // Disabled auditors are skipped silently during fan-out; a
                // partial result is better than none.
                tracing::debug!(category = category.as_str(), "auditor disabled, skipping");
                continue;
            }
            return Err(AuditError::InvalidRequest(format!(
                "auditor disabled: {}",
                category.as_str()
            )));
        }
        selected.push((category, config));
    }

    if selected.is_empty() {
        return Err(AuditError::InvalidRequest(
            "all requested auditors are disabled".to_string(),
        ));
    }

    // Bounded fan-out: launch up to max_concurrent_audits auditors, await
    // the chunk, then launch the next. Not a work-stealing pool; chunk
    // boundaries are deliberate.
    let mut parts: Vec<AuditResult> = Vec::with_capacity(selected.len());
    for chunk in selected.chunks(inner.max_concurrent_audits) {
        let futures = chunk.iter().map(|(category, config)| {
            let auditor = &inner.auditors[category];
            auditor.audit(request, config)
        });
        for result in futures_util::future::join_all(futures).await {
            // Auditor failures propagate unmodified; retry happened (or
            // didn't) in the client layer.
            parts.push(result?);
        }
    }

    Ok(merge_results(request_id, parts, request.max_issues))
}
