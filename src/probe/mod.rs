//! Probe module for endpoint monitoring.
//!
//! A probe sends one HTTP request for an endpoint and folds every outcome,
//! including transport failures, into a [`CheckResult`].

mod http;
mod models;
mod runner;

pub use http::*;
pub use models::*;
pub use runner::*;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("{0}")]
    Request(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// A single request handed to an [`HttpClient`].
#[derive(Debug, Clone, Copy)]
pub struct ProbeRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub timeout: Duration,
}

impl<'a> From<&'a EndpointSpec> for ProbeRequest<'a> {
    fn from(spec: &'a EndpointSpec) -> Self {
        Self {
            method: &spec.method,
            url: &spec.url,
            headers: &spec.headers,
            timeout: spec.timeout,
        }
    }
}

/// Transport used by probes.
///
/// Returns the response status code, or a classified failure.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: ProbeRequest<'_>) -> Result<u16, ProbeError>;
}

/// Probe a single endpoint.
///
/// Never fails: timeouts, connection errors and other transport problems are
/// recorded in the returned result. Latency is measured on every path.
pub async fn check_endpoint(client: &dyn HttpClient, spec: &EndpointSpec) -> CheckResult {
    let start = Instant::now();
    let outcome = client.send(ProbeRequest::from(spec)).await;
    let latency = latency_ms(start.elapsed());

    match outcome {
        Ok(status) => CheckResult {
            name: spec.name.clone(),
            url: spec.url.clone(),
            status_code: Some(status),
            latency_ms: latency,
            success: status == spec.expected_status,
            error: None,
            timeout: false,
        },
        Err(ProbeError::Timeout(_)) => CheckResult {
            timeout: true,
            ..CheckResult::failure(
                spec,
                latency,
                format!("Timeout after {}s", spec.timeout.as_secs_f64()),
            )
        },
        Err(ProbeError::Connection(_)) => {
            CheckResult::failure(spec, latency, "Connection error".to_string())
        }
        Err(ProbeError::Request(msg)) => CheckResult::failure(spec, latency, msg),
        Err(ProbeError::Unexpected(msg)) => {
            CheckResult::failure(spec, latency, format!("Unexpected error: {}", msg))
        }
    }
}
