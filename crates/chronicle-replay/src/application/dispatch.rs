//! Batch dispatch: one worker per aggregate stream, fanned in over a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chronicle_core::event::{EventRecord, StreamKey};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::application::registry::{EventTypeRegistry, ReplayHandler};
use crate::domain::report::FailureReason;

/// Result of attempting one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed(FailureReason),
    /// Not attempted because a fail-fast run aborted first.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatchSettings {
    pub dispatch_timeout: Duration,
    pub max_concurrent_streams: usize,
    pub fail_fast: bool,
}

/// Dispatches every event of `batch` and returns outcomes in fetch order.
///
/// Events sharing a stream run serially in fetch order; distinct streams run
/// concurrently, at most `max_concurrent_streams` at a time.
pub(crate) async fn dispatch_batch(
    batch: Arc<[EventRecord]>,
    registry: &Arc<EventTypeRegistry>,
    settings: DispatchSettings,
) -> Vec<Outcome> {
    let streams = group_by_stream(&batch);
    let permits = Arc::new(Semaphore::new(settings.max_concurrent_streams.max(1)));
    let abort = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Outcome)>();

    let mut workers = JoinSet::new();
    for (stream, indices) in streams {
        let worker = StreamWorker {
            stream,
            indices,
            batch: Arc::clone(&batch),
            registry: Arc::clone(registry),
            abort: Arc::clone(&abort),
            settings,
            tx: tx.clone(),
        };
        let permits = Arc::clone(&permits);
        workers.spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            worker.run().await;
        });
    }
    drop(tx);

    let mut outcomes: Vec<Option<Outcome>> = vec![None; batch.len()];
    while let Some((index, outcome)) = rx.recv().await {
        outcomes[index] = Some(outcome);
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "replay stream worker ended abnormally");
        }
    }

    outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap_or(Outcome::Failed(FailureReason::Panicked)))
        .collect()
}

/// Groups batch indices by stream, keeping first-seen stream order and fetch
/// order within each stream.
fn group_by_stream(batch: &[EventRecord]) -> Vec<(StreamKey, Vec<usize>)> {
    let mut positions: HashMap<StreamKey, usize> = HashMap::new();
    let mut streams: Vec<(StreamKey, Vec<usize>)> = Vec::new();
    for (index, event) in batch.iter().enumerate() {
        let key = event.stream_key();
        match positions.get(&key) {
            Some(&slot) => streams[slot].1.push(index),
            None => {
                positions.insert(key.clone(), streams.len());
                streams.push((key, vec![index]));
            }
        }
    }
    streams
}

struct StreamWorker {
    stream: StreamKey,
    indices: Vec<usize>,
    batch: Arc<[EventRecord]>,
    registry: Arc<EventTypeRegistry>,
    abort: Arc<AtomicBool>,
    settings: DispatchSettings,
    tx: mpsc::UnboundedSender<(usize, Outcome)>,
}

impl StreamWorker {
    async fn run(self) {
        for &index in &self.indices {
            if self.abort.load(Ordering::Acquire) {
                let _ = self.tx.send((index, Outcome::Skipped));
                continue;
            }

            let event = &self.batch[index];
            let outcome = match self.registry.resolve(event.event_type()) {
                Ok(handler) => self.invoke(handler, index).await,
                Err(_) => Outcome::Failed(FailureReason::UnsupportedEventType(
                    event.event_type().to_owned(),
                )),
            };

            if let Outcome::Failed(reason) = &outcome {
                debug!(
                    stream = %self.stream,
                    event_id = %event.id(),
                    reason = %reason,
                    "replay event failed"
                );
                if self.settings.fail_fast {
                    self.abort.store(true, Ordering::Release);
                }
            }
            let _ = self.tx.send((index, outcome));
        }
    }

    /// Runs the handler on its own task so a panic or a timeout is contained
    /// to this event.
    async fn invoke(&self, handler: Arc<dyn ReplayHandler>, index: usize) -> Outcome {
        let batch = Arc::clone(&self.batch);
        let mut task = tokio::spawn(async move { handler.handle(&batch[index]).await });

        match tokio::time::timeout(self.settings.dispatch_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => Outcome::Succeeded,
            Ok(Ok(Err(err))) => Outcome::Failed(err.into()),
            Ok(Err(_)) => Outcome::Failed(FailureReason::Panicked),
            Err(_) => {
                task.abort();
                let after_ms =
                    u64::try_from(self.settings.dispatch_timeout.as_millis()).unwrap_or(u64::MAX);
                Outcome::Failed(FailureReason::Timeout { after_ms })
            }
        }
    }
}
