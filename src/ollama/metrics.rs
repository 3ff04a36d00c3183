//! Per-model runtime counters. Updated after every generation attempt,
//! read by the performance-aware selector, cleared only on client cleanup.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// EMA smoothing factor for response latency.
pub const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelMetrics {
    pub requests: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    /// Exponential moving average of attempt latency.
    pub ema_response_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl ModelMetrics {
    fn record(&mut self, duration_ms: u64, success: bool) {
        self.requests += 1;
        if !success {
            self.failures += 1;
        }
        self.total_duration_ms += duration_ms;
        self.ema_response_ms = if self.requests == 1 {
            duration_ms as f64
        } else {
            EMA_ALPHA * duration_ms as f64 + (1.0 - EMA_ALPHA) * self.ema_response_ms
        };
        self.last_used = Some(Utc::now());
    }

    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 1.0;
        }
        (self.requests - self.failures) as f64 / self.requests as f64
    }
}

/// Shared counter table. Guarded by a plain mutex; the read-modify-write of
/// the EMA is not atomic, so every touch goes through the lock.
#[derive(Default)]
pub struct MetricsRegistry {
    inner: Mutex<HashMap<String, ModelMetrics>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model: &str, duration_ms: u64, success: bool) {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table
            .entry(model.to_string())
            .or_default()
            .record(duration_ms, success);
    }

    pub fn snapshot(&self, model: &str) -> Option<ModelMetrics> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .cloned()
    }

    pub fn all(&self) -> HashMap<String, ModelMetrics> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_the_ema() {
        let registry = MetricsRegistry::new();
        registry.record("m", 1000, true);
        let m = registry.snapshot("m").unwrap();
        assert_eq!(m.ema_response_ms, 1000.0);
        assert_eq!(m.requests, 1);
        assert_eq!(m.failures, 0);
    }

    #[test]
    fn ema_smooths_subsequent_samples() {
        let registry = MetricsRegistry::new();
        registry.record("m", 1000, true);
        registry.record("m", 2000, true);
        let m = registry.snapshot("m").unwrap();
        // 0.2 * 2000 + 0.8 * 1000
        assert!((m.ema_response_ms - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn success_rate_counts_failures() {
        let registry = MetricsRegistry::new();
        registry.record("m", 100, false);
        registry.record("m", 100, false);
        registry.record("m", 100, true);
        registry.record("m", 100, true);
        let m = registry.snapshot("m").unwrap();
        assert_eq!(m.failures, 2);
        assert!((m.success_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn clear_resets_everything() {
        let registry = MetricsRegistry::new();
        registry.record("m", 100, true);
        registry.clear();
        assert!(registry.snapshot("m").is_none());
    }
}
