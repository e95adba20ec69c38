//! Running spend totals, keyed by provider
//!
//! Lives as long as the router that owns it; nothing is persisted.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

/// Spend attributed to one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProviderCost {
    pub cost: f64,
    pub requests: u64,
}

/// Snapshot of accumulated spend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostStats {
    pub total_cost: f64,
    pub total_requests: u64,
    pub by_provider: BTreeMap<String, ProviderCost>,
}

/// Thread-safe accumulator shared by every in-flight request of a router
#[derive(Debug, Default)]
pub struct CostTracker {
    stats: Mutex<CostStats>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one billed request.
    ///
    /// A zero (or NaN) cost is not recorded at all, not even as a request.
    /// Returns whether the request was counted.
    pub fn record(&self, provider: &str, cost: f64) -> bool {
        if cost == 0.0 || cost.is_nan() {
            debug!("Skipping zero cost for provider {}", provider);
            return false;
        }

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.total_cost += cost;
        stats.total_requests += 1;
        let entry = stats.by_provider.entry(provider.to_string()).or_default();
        entry.cost += cost;
        entry.requests += 1;
        true
    }

    /// Copy of the current totals; mutating it has no effect on the tracker
    pub fn snapshot(&self) -> CostStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accumulates_per_provider() {
        let tracker = CostTracker::new();
        assert!(tracker.record("openai", 0.01));
        assert!(tracker.record("openai", 0.02));
        assert!(tracker.record("anthropic", 0.5));

        let stats = tracker.snapshot();
        assert!(approx(stats.total_cost, 0.53));
        assert_eq!(stats.total_requests, 3);
        assert!(approx(stats.by_provider["openai"].cost, 0.03));
        assert_eq!(stats.by_provider["openai"].requests, 2);
        assert_eq!(stats.by_provider["anthropic"].requests, 1);
    }

    #[test]
    fn test_zero_cost_not_recorded() {
        let tracker = CostTracker::new();
        assert!(!tracker.record("gemini", 0.0));
        assert!(!tracker.record("gemini", f64::NAN));
        let stats = tracker.snapshot();
        assert_eq!(stats.total_requests, 0);
        assert!(stats.by_provider.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let tracker = CostTracker::new();
        tracker.record("openai", 1.0);
        let mut snap = tracker.snapshot();
        snap.total_cost = 100.0;
        snap.by_provider.clear();
        let fresh = tracker.snapshot();
        assert!(approx(fresh.total_cost, 1.0));
        assert_eq!(fresh.by_provider.len(), 1);
    }

    #[test]
    fn test_concurrent_increments() {
        let tracker = Arc::new(CostTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record("openai", 0.25);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = tracker.snapshot();
        assert_eq!(stats.total_requests, 800);
        assert_eq!(stats.by_provider["openai"].requests, 800);
        assert!(approx(stats.total_cost, 200.0));
    }

    #[test]
    fn test_stats_serialize() {
        let tracker = CostTracker::new();
        tracker.record("openai", 0.5);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["by_provider"]["openai"]["requests"], 1);
    }
}
