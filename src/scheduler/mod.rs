//! Scheduler module for running check cycles.
//!
//! A cycle probes every registered endpoint, trims the cache, feeds the
//! notifier and hands the ordered results to each report sink. Cycles never
//! overlap and shutdown is only observed between them.

mod registry;

pub use registry::*;

use chrono::Local;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::ResultCache;
use crate::notify::Notifier;
use crate::probe::{check_all, panic_message, HttpClient};
use crate::report::{exit_code, ReportSink};

/// Batches larger than this are probed concurrently.
pub const CONCURRENCY_THRESHOLD: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum SchedulerError {
    #[error("check interval must be greater than zero")]
    InvalidInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// The main scheduler that drives check cycles.
pub struct Scheduler {
    registry: EndpointRegistry,
    client: Arc<dyn HttpClient>,
    cache: Arc<ResultCache>,
    notifier: Option<Notifier>,
    reporters: Vec<Arc<dyn ReportSink>>,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    /// Create a scheduler whose cache keeps results for `cache_ttl`.
    pub fn new(registry: EndpointRegistry, client: Arc<dyn HttpClient>, cache_ttl: Duration) -> Self {
        Self {
            registry,
            client,
            cache: Arc::new(ResultCache::new(cache_ttl)),
            notifier: None,
            reporters: Vec::new(),
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ReportSink>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Run a single cycle and return its exit status.
    pub async fn run_once(&mut self) -> i32 {
        self.cycles += 1;
        tracing::info!(
            "Check #{} - {}",
            self.cycles,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let endpoints = self.registry.snapshot().await;
        let concurrent = endpoints.len() > CONCURRENCY_THRESHOLD;
        let results = check_all(self.client.clone(), &endpoints, Some(&self.cache), concurrent).await;

        let evicted = self.cache.cleanup_expired();
        if evicted > 0 {
            tracing::debug!("Evicted {} expired cache entries", evicted);
        }

        let notifier = self.notifier.as_mut();
        let reporters = &self.reporters;
        let delivered = AssertUnwindSafe(async {
            if let Some(notifier) = notifier {
                notifier.notify(&results).await;
            }

            let mut sink_failed = false;
            for reporter in reporters {
                if let Err(e) = reporter.publish(&results).await {
                    tracing::error!("Error during check cycle: {}", e);
                    sink_failed = true;
                }
            }
            sink_failed
        })
        .catch_unwind()
        .await;

        let sink_failed = match delivered {
            Ok(sink_failed) => sink_failed,
            Err(payload) => {
                tracing::error!("Error during check cycle: {}", panic_message(payload.as_ref()));
                true
            }
        };

        let successful = results.iter().filter(|r| r.success).count();
        tracing::info!(
            "Result: {}/{} successful, {} failed",
            successful,
            results.len(),
            results.len() - successful
        );

        if sink_failed {
            1
        } else {
            exit_code(&results)
        }
    }

    /// Run cycles every `interval` until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. Returns the status of the last
    /// completed cycle.
    pub async fn run(&mut self, interval: Duration, shutdown: CancellationToken) -> Result<i32, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }

        self.state = SchedulerState::Running;
        tracing::info!(
            "Starting scheduler for {} endpoints every {}s",
            self.registry.len().await,
            interval.as_secs_f64()
        );

        let mut status = self.run_once().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.state = SchedulerState::Stopping;
                    tracing::info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    status = self.run_once().await;
                }
            }
        }

        tracing::info!("Total checks performed: {}", self.cycles);
        self.state = SchedulerState::Stopped;
        Ok(status)
    }
}
