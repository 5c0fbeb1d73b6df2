//! Multi-endpoint check runner.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use super::{check_endpoint, CheckResult, EndpointSpec, HttpClient};
use crate::cache::ResultCache;

/// Upper bound on probes in flight during a concurrent batch.
pub const MAX_WORKERS: usize = 10;

/// Check every endpoint, returning results in the order of `specs`.
///
/// A fresh cached result is used instead of probing. Only successful results
/// are written back, so a failing endpoint is probed again on every call.
pub async fn check_all(
    client: Arc<dyn HttpClient>,
    specs: &[EndpointSpec],
    cache: Option<&Arc<ResultCache>>,
    concurrent: bool,
) -> Vec<CheckResult> {
    if concurrent {
        check_concurrent(client, specs, cache).await
    } else {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let cache = cache.map(|c| c.as_ref());
            results.push(check_with_cache(client.as_ref(), spec, cache).await);
        }
        results
    }
}

async fn check_with_cache(
    client: &dyn HttpClient,
    spec: &EndpointSpec,
    cache: Option<&ResultCache>,
) -> CheckResult {
    if let Some(cached) = cache.and_then(|c| c.get(&spec.name, &spec.url, &spec.method, None)) {
        tracing::debug!("Cache hit for {}", spec.name);
        return cached;
    }

    let result = check_endpoint(client, spec).await;

    if let Some(cache) = cache {
        if result.success {
            cache.insert(&spec.method, result.clone(), None);
        }
    }

    result
}

async fn check_concurrent(
    client: Arc<dyn HttpClient>,
    specs: &[EndpointSpec],
    cache: Option<&Arc<ResultCache>>,
) -> Vec<CheckResult> {
    if specs.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(specs.len().min(MAX_WORKERS)));
    let mut set = JoinSet::new();
    let mut task_index = HashMap::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let client = client.clone();
        let cache = cache.cloned();
        let spec = spec.clone();
        let semaphore = semaphore.clone();

        let handle = set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok(); // Hold permit until done
            let result = check_with_cache(client.as_ref(), &spec, cache.as_deref()).await;
            (index, result)
        });
        task_index.insert(handle.id(), index);
    }

    let mut completed = Vec::with_capacity(specs.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(done) => completed.push(done),
            Err(e) => {
                let Some(&index) = task_index.get(&e.id()) else {
                    tracing::error!("Lost track of a failed check task: {}", e);
                    continue;
                };
                let spec = &specs[index];
                tracing::error!("Check task for {} failed: {}", spec.name, e);
                let error = format!("Error during check: {}", task_failure(e));
                completed.push((index, CheckResult::failure(spec, 0.0, error)));
            }
        }
    }

    restore_input_order(completed, specs.len())
}

/// Put completed results back into input order.
///
/// Falls back to completion order when the indices do not cover the input
/// exactly once.
fn restore_input_order(mut completed: Vec<(usize, CheckResult)>, len: usize) -> Vec<CheckResult> {
    let mut seen = vec![false; len];
    let exact = completed.len() == len
        && completed
            .iter()
            .all(|(index, _)| *index < len && !std::mem::replace(&mut seen[*index], true));

    if exact {
        completed.sort_by_key(|(index, _)| *index);
    } else {
        tracing::warn!(
            "Could not restore input order for {} of {} results, keeping completion order",
            completed.len(),
            len
        );
    }

    completed.into_iter().map(|(_, result)| result).collect()
}

fn task_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    panic_message(err.into_panic().as_ref())
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
