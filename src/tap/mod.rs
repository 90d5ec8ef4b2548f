//! Tap stream correlation
//!
//! Pairs request-init and response-end events that share a stream identity
//! and emits one `CompletedExchange` per pair. Per-stream states:
//!
//! ```text
//! Unseen -> AwaitingResponseInit -> AwaitingResponseEnd -> Completed
//! ```
//!
//! A response-end completes the exchange whether or not response headers
//! were seen. Events for unknown streams are reported as warnings and
//! dropped; they never end the feed.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::EventStream;
use crate::error::{MeshError, Result};
use crate::models::{
    CompletedExchange, Peer, RequestInit, ResponseEnd, ResponseInit, StreamId, TapEvent,
    TapPayload,
};

/// Correlator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatorConfig {
    /// Capacity of the queue between the correlator and the consumer
    pub queue_capacity: usize,
    /// Drop half-open exchanges older than this; `None` keeps them forever
    pub pending_ttl: Option<Duration>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            pending_ttl: None,
        }
    }
}

/// An event that did not match any pending exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationWarning {
    UnknownResponseInit(StreamId),
    UnknownResponseEnd(StreamId),
}

impl fmt::Display for CorrelationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationWarning::UnknownResponseInit(id) => {
                write!(f, "got response headers for unknown stream {}", id)
            }
            CorrelationWarning::UnknownResponseEnd(id) => {
                write!(f, "got response end for unknown stream {}", id)
            }
        }
    }
}

/// Outcome of feeding one event to the correlator
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    /// The exchange is still open
    Pending,
    Completed(Box<CompletedExchange>),
    Warning(CorrelationWarning),
}

/// How the event feed ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The backend closed the stream
    Eof,
    /// The consumer of completed exchanges went away
    ReceiverClosed,
}

#[derive(Debug)]
struct PendingExchange {
    source: Peer,
    destination: Peer,
    request: RequestInit,
    response: Option<ResponseInit>,
    opened_at: Instant,
}

/// Stream-identity matcher for tap events
#[derive(Debug, Default)]
pub struct Correlator {
    pending: HashMap<StreamId, PendingExchange>,
    pending_ttl: Option<Duration>,
    last_sweep: Option<Instant>,
    warnings: u64,
}

impl Correlator {
    /// A zero TTL is treated as no TTL
    pub fn new(pending_ttl: Option<Duration>) -> Self {
        Self {
            pending_ttl: pending_ttl.filter(|ttl| !ttl.is_zero()),
            ..Default::default()
        }
    }

    /// Exchanges opened but not yet completed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Warnings reported so far
    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    pub fn observe(&mut self, event: TapEvent) -> Correlation {
        let now = Instant::now();
        self.maybe_sweep(now);

        let id = event.stream_id();
        match event.payload {
            TapPayload::RequestInit(request) => {
                let pending = PendingExchange {
                    source: event.source,
                    destination: event.destination,
                    request,
                    response: None,
                    opened_at: now,
                };
                if self.pending.insert(id.clone(), pending).is_some() {
                    tracing::debug!("Restarting exchange for stream {}", id);
                }
                Correlation::Pending
            }
            TapPayload::ResponseInit(response) => match self.pending.get_mut(&id) {
                Some(pending) => {
                    pending.response = Some(response);
                    Correlation::Pending
                }
                None => self.warn(CorrelationWarning::UnknownResponseInit(id)),
            },
            TapPayload::ResponseEnd(end) => match self.pending.remove(&id) {
                Some(pending) => Correlation::Completed(Box::new(complete(id, pending, end))),
                None => self.warn(CorrelationWarning::UnknownResponseEnd(id)),
            },
        }
    }

    /// Drop pending exchanges opened more than the TTL before `now`
    ///
    /// Returns how many were dropped. No-op without a TTL.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.pending_ttl else {
            return 0;
        };
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| now.saturating_duration_since(pending.opened_at) < ttl);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} stale pending exchange(s)", evicted);
        }
        evicted
    }

    fn maybe_sweep(&mut self, now: Instant) {
        let Some(ttl) = self.pending_ttl else {
            return;
        };
        let due = self
            .last_sweep
            .is_none_or(|last| now.saturating_duration_since(last) >= ttl);
        if due {
            self.evict_stale(now);
            self.last_sweep = Some(now);
        }
    }

    fn warn(&mut self, warning: CorrelationWarning) -> Correlation {
        self.warnings += 1;
        Correlation::Warning(warning)
    }
}

fn complete(id: StreamId, pending: PendingExchange, end: ResponseEnd) -> CompletedExchange {
    CompletedExchange {
        id,
        source: pending.source,
        destination: pending.destination,
        method: pending.request.method,
        authority: pending.request.authority,
        path: pending.request.path,
        route: pending.request.route,
        started_at: pending.request.timestamp,
        http_status: pending.response.map(|r| r.http_status),
        grpc_status: end.grpc_status,
        reset_error_code: end.reset_error_code,
        latency: end.since_request_init,
    }
}

/// Drive a correlator over an event stream in its own task
///
/// Completed exchanges are handed over a bounded queue; a full queue
/// applies backpressure to the stream. The task ends with
/// `Termination::Eof` when the stream closes, `Termination::ReceiverClosed`
/// when the receiver is dropped, and `MeshError::StreamTerminated` on a
/// transport error. Exchanges still pending at that point are discarded.
pub fn correlate(
    mut events: EventStream,
    config: CorrelatorConfig,
) -> (
    mpsc::Receiver<CompletedExchange>,
    JoinHandle<Result<Termination>>,
) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut correlator = Correlator::new(config.pending_ttl);

        loop {
            let event = match events.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::debug!(
                        "Tap stream failed with {} exchange(s) pending",
                        correlator.pending_len()
                    );
                    return Err(match e {
                        MeshError::StreamTerminated(_) => e,
                        other => MeshError::StreamTerminated(other.to_string()),
                    });
                }
                None => {
                    tracing::debug!(
                        "Tap stream closed with {} exchange(s) pending, {} warning(s)",
                        correlator.pending_len(),
                        correlator.warnings()
                    );
                    return Ok(Termination::Eof);
                }
            };

            match correlator.observe(event) {
                Correlation::Completed(exchange) => {
                    if tx.send(*exchange).await.is_err() {
                        return Ok(Termination::ReceiverClosed);
                    }
                }
                Correlation::Warning(warning) => tracing::warn!("{}", warning),
                Correlation::Pending => {}
            }
        }
    });

    (rx, handle)
}
