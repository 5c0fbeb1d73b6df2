//! Cache entry types.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::probe::CheckResult;

/// Cache key: the method takes part so a lookup under another method misses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
    pub name: String,
}

impl CacheKey {
    pub fn new(name: &str, url: &str, method: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            name: name.to_string(),
        }
    }
}

/// A cached result with the instant it was stored and its own TTL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: CheckResult,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(result: CheckResult, ttl: Duration) -> Self {
        Self {
            result,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Whether the entry has outlived `ttl` at `now`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// Cache statistics, each entry classified against its own TTL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub default_ttl_secs: f64,
}
