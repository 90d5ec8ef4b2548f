//! Concurrent fan-out aggregation
//!
//! Every request runs in its own task and reports an `IndexedResult` over a
//! channel buffered to the request count, so workers never block on send.
//! The collector restores request order before returning.
//!
//! Two policies share the same fan-out:
//! - `aggregate` fails fast on the first error and has no deadline
//! - `gather_best_effort` waits up to a deadline and keeps whatever succeeded

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::{EndpointsClient, MetricsClient};
use crate::error::{MeshError, Result};
use crate::models::{Endpoint, Row};
use crate::request::MetricRequest;

/// One worker's outcome, tagged with the position of its request
#[derive(Debug)]
pub struct IndexedResult<T> {
    pub index: usize,
    pub result: Result<T>,
}

/// Run every request concurrently and merge the rows in request order
///
/// The first failing request aborts the batch with
/// `MeshError::AggregationFailure`. Workers still in flight are left to
/// finish; their results are dropped with the channel.
///
/// There is no per-request timeout: a request that never completes stalls
/// the whole batch.
pub async fn aggregate<C>(requests: Vec<MetricRequest>, client: Arc<C>) -> Result<Vec<Row>>
where
    C: MetricsClient + ?Sized + 'static,
{
    let total = requests.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let targets: Vec<String> = requests.iter().map(|r| r.target.to_string()).collect();
    tracing::debug!("Fanning out {} request(s)", total);

    let mut rx = spawn_workers(requests, move |request: MetricRequest| {
        let client = Arc::clone(&client);
        async move { client.fetch(&request).await }
    });

    let mut slots: Vec<Option<Vec<Row>>> = (0..total).map(|_| None).collect();
    for received in 0..total {
        let Some(IndexedResult { index, result }) = rx.recv().await else {
            return Err(MeshError::Backend(format!(
                "{} of {} request(s) exited without a result",
                total - received,
                total
            )));
        };

        match result {
            Ok(rows) => {
                tracing::debug!(
                    "Request #{} ({}) returned {} row(s)",
                    index,
                    targets[index],
                    rows.len()
                );
                slots[index] = Some(rows);
            }
            Err(source) => {
                return Err(MeshError::AggregationFailure {
                    index,
                    target: targets[index].clone(),
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(slots.into_iter().flatten().flatten().collect())
}

/// Stable fallback display order: namespace, then name
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Run `f` over every item concurrently, keeping the successes that arrive
/// before `timeout`
///
/// Failures and late results are logged and skipped. Successes come back in
/// item order.
pub async fn gather_best_effort<I, T, F, Fut>(items: Vec<I>, timeout: Duration, f: F) -> Vec<T>
where
    I: fmt::Display + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let labels: Vec<String> = items.iter().map(ToString::to_string).collect();
    let mut rx = spawn_workers(items, f);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut received = 0;
    while received < total {
        tokio::select! {
            _ = &mut deadline => {
                tracing::warn!(
                    "Timed out after {:?} with {} of {} result(s) outstanding",
                    timeout,
                    total - received,
                    total
                );
                break;
            }
            next = rx.recv() => {
                let Some(IndexedResult { index, result }) = next else {
                    break;
                };
                received += 1;
                match result {
                    Ok(value) => slots[index] = Some(value),
                    Err(e) => tracing::warn!("Skipping {}: {}", labels[index], e),
                }
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Look up the pod endpoints behind each authority, best effort
pub async fn discover_endpoints<C>(
    authorities: Vec<String>,
    client: Arc<C>,
    timeout: Duration,
) -> Vec<Endpoint>
where
    C: EndpointsClient + ?Sized + 'static,
{
    gather_best_effort(authorities, timeout, move |authority: String| {
        let client = Arc::clone(&client);
        async move { client.endpoints(&authority).await }
    })
    .await
    .into_iter()
    .flatten()
    .collect()
}

fn spawn_workers<I, T, F, Fut>(items: Vec<I>, f: F) -> mpsc::Receiver<IndexedResult<T>>
where
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(items.len().max(1));

    for (index, item) in items.into_iter().enumerate() {
        let tx = tx.clone();
        let work = f(item);
        tokio::spawn(async move {
            let result = work.await;
            // The collector may already have returned
            let _ = tx.send(IndexedResult { index, result }).await;
        });
    }

    rx
}
