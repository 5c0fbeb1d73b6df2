//! Probe model types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A validated endpoint to probe.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
    /// Upper-case HTTP method, `GET` unless configured otherwise.
    pub method: String,
    pub timeout: Duration,
    pub expected_status: u16,
    pub headers: BTreeMap<String, String>,
}

impl EndpointSpec {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method: "GET".to_string(),
            timeout: Duration::from_secs(5),
            expected_status: 200,
            headers: BTreeMap::new(),
        }
    }
}

/// Outcome of a single endpoint check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub url: String,
    /// Absent when the request never produced a response.
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub success: bool,
    /// Set for every failure except a clean wrong-status response.
    pub error: Option<String>,
    pub timeout: bool,
}

impl CheckResult {
    /// A failed result with no status code.
    pub fn failure(spec: &EndpointSpec, latency_ms: f64, error: String) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.url.clone(),
            status_code: None,
            latency_ms,
            success: false,
            error: Some(error),
            timeout: false,
        }
    }
}

/// Round an elapsed duration to milliseconds with two decimals.
pub fn latency_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
