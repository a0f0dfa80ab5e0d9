use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use planning_core::SequenceEvaluationResult;
use serde::{Deserialize, Serialize};

/// Internal cache entry with timestamp
struct CacheEntry {
    result: SequenceEvaluationResult,
    cached_at: DateTime<Utc>,
}

pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Evaluation results keyed by (evaluation context key, sequence hash).
///
/// A changed portfolio or configuration produces a different key, so
/// entries never need explicit invalidation; the TTL only bounds memory.
pub struct EvaluationCache {
    entries: DashMap<(String, String), CacheEntry>,
    ttl_secs: i64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECS)
    }
}

impl EvaluationCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, context_key: &str, sequence_hash: &str) -> Option<SequenceEvaluationResult> {
        let key = (context_key.to_string(), sequence_hash.to_string());
        if let Some(entry) = self.entries.get(&key) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < self.ttl_secs {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
        }
        // expired entries are dropped lazily
        self.entries
            .remove_if(&key, |_, e| (Utc::now() - e.cached_at).num_seconds() >= self.ttl_secs);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, context_key: &str, result: SequenceEvaluationResult) {
        let key = (
            context_key.to_string(),
            result.sequence.sequence_hash.clone(),
        );
        self.entries.insert(
            key,
            CacheEntry {
                result,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
