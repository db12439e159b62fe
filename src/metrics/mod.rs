//! Usage records emitted by the gateway and an in-memory tracker for them

use crate::api::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Records kept by default in the recent-call ring
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Success,
    Error,
}

/// One forwarded gateway call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub action: Operation,
    pub provider: String,
    pub model: Option<String>,
    pub tokens_used: u32,
    /// Estimated cost in USD, when the model has pricing
    pub cost: Option<f64>,
    pub response_time_ms: u64,
    pub status: UsageStatus,
    /// Error code for failed calls
    pub error: Option<String>,
    pub user_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn is_success(&self) -> bool {
        self.status == UsageStatus::Success
    }
}

/// Destination for usage records
pub trait UsageSink: Send + Sync {
    fn record(&self, record: UsageRecord);
}

/// Sink that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl UsageSink for NoopSink {
    fn record(&self, _record: UsageRecord) {}
}

/// Running totals for one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub requests: u64,
    pub errors: u64,
    pub tokens: u64,
    pub estimated_cost: f64,
}

#[derive(Debug, Default)]
struct UsageLog {
    providers: BTreeMap<String, ProviderUsage>,
    recent: VecDeque<UsageRecord>,
}

/// Thread-safe usage tracker
#[derive(Clone)]
pub struct UsageTracker {
    inner: Arc<Mutex<UsageLog>>,
    capacity: usize,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }

    /// Tracker keeping at most `capacity` recent records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageLog::default())),
            capacity,
        }
    }

    /// Most recent records, oldest first
    pub fn recent(&self) -> Vec<UsageRecord> {
        self.inner
            .lock()
            .map(|log| log.recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn provider(&self, name: &str) -> Option<ProviderUsage> {
        self.inner.lock().ok()?.providers.get(name).cloned()
    }

    pub fn summary(&self) -> UsageSummary {
        let providers = self
            .inner
            .lock()
            .map(|log| log.providers.clone())
            .unwrap_or_default();

        UsageSummary {
            total_requests: providers.values().map(|p| p.requests).sum(),
            total_errors: providers.values().map(|p| p.errors).sum(),
            total_tokens: providers.values().map(|p| p.tokens).sum(),
            estimated_cost: providers.values().map(|p| p.estimated_cost).sum(),
            providers,
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSink for UsageTracker {
    fn record(&self, record: UsageRecord) {
        if let Ok(mut log) = self.inner.lock() {
            let totals = log.providers.entry(record.provider.clone()).or_default();
            totals.requests += 1;
            if !record.is_success() {
                totals.errors += 1;
            }
            totals.tokens += record.tokens_used as u64;
            if let Some(cost) = record.cost {
                totals.estimated_cost += cost;
            }

            if self.capacity == 0 {
                return;
            }
            if log.recent.len() == self.capacity {
                log.recent.pop_front();
            }
            log.recent.push_back(record);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub providers: BTreeMap<String, ProviderUsage>,
}

impl std::fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Usage Summary ===")?;
        writeln!(f, "Total requests: {}", self.total_requests)?;
        writeln!(f, "Failed requests: {}", self.total_errors)?;
        writeln!(f, "Total tokens used: {}", self.total_tokens)?;
        writeln!(f, "Estimated cost: ${:.4}", self.estimated_cost)?;
        for (name, usage) in &self.providers {
            writeln!(
                f,
                "  {}: {} requests, {} errors, {} tokens, ${:.4}",
                name, usage.requests, usage.errors, usage.tokens, usage.estimated_cost
            )?;
        }
        Ok(())
    }
}
