//! Replay coordinator: validates a request, then runs the
//! fetch, dispatch, checkpoint loop until the scan is exhausted.

use std::fmt;
use std::sync::Arc;

use chronicle_core::clock::Clock;
use chronicle_core::criteria::Criteria;
use chronicle_core::event::EventRecord;
use chronicle_core::store::EventReadStore;
use tracing::{Span, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::control::{CheckpointObserver, ReplayControl};
use crate::application::dispatch::{DispatchSettings, Outcome, dispatch_batch};
use crate::application::registry::EventTypeRegistry;
use crate::config::ReplayConfig;
use crate::domain::report::{Checkpoint, EventFailure, ReplayReport, ReplayStatus};
use crate::domain::request::ReplayRequest;
use crate::error::ReplayError;

/// Why a fetch gave up.
enum FetchStop {
    Cancelled,
    Failed(String),
}

/// Drives replay runs against a read store.
///
/// Runs share no mutable state, so one coordinator can serve concurrent
/// requests.
pub struct ReplayCoordinator {
    store: Arc<dyn EventReadStore>,
    registry: Arc<EventTypeRegistry>,
    clock: Arc<dyn Clock>,
    config: ReplayConfig,
}

impl fmt::Debug for ReplayCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayCoordinator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReplayCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventReadStore>,
        registry: Arc<EventTypeRegistry>,
        clock: Arc<dyn Clock>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            config,
        }
    }

    /// Handlers this coordinator dispatches to.
    #[must_use]
    pub fn registry(&self) -> &EventTypeRegistry {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Runs `request` to completion without cancellation or observer.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError` if the request is rejected during validation.
    /// Once validation passes, the outcome is reported in the
    /// `ReplayReport` status instead.
    pub async fn replay(&self, request: &ReplayRequest) -> Result<ReplayReport, ReplayError> {
        self.replay_with(request, &ReplayControl::new(), None).await
    }

    /// Runs `request`, honouring `control` and notifying `observer` of every
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError` if the request is rejected during validation;
    /// no storage access happens in that case.
    #[instrument(
        skip(self, request, control, observer),
        fields(
            run_id = tracing::field::Empty,
            from = %request.from,
            to = %request.to,
            event_type = request.event_type.as_deref(),
        )
    )]
    pub async fn replay_with(
        &self,
        request: &ReplayRequest,
        control: &ReplayControl,
        observer: Option<&dyn CheckpointObserver>,
    ) -> Result<ReplayReport, ReplayError> {
        let batch_size = self.validate(request)?;

        let run_id = Uuid::now_v7();
        Span::current().record("run_id", tracing::field::display(run_id));
        let mut report = ReplayReport::start(run_id, self.clock.now(), request.after);
        let settings = DispatchSettings {
            dispatch_timeout: self.config.dispatch_timeout,
            max_concurrent_streams: self.config.max_concurrent_streams,
            fail_fast: request.fail_fast.unwrap_or(self.config.fail_fast),
        };
        info!(batch_size, single = request.id.is_some(), "replay started");

        self.scan(request, batch_size, settings, control, observer, &mut report)
            .await;

        report.finished_at = self.clock.now();
        info!(
            status = ?report.status,
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            batches = report.batches,
            "replay finished"
        );
        Ok(report)
    }

    /// Rejects the request before any I/O and returns the batch size to use.
    fn validate(&self, request: &ReplayRequest) -> Result<u32, ReplayError> {
        self.config.validate()?;
        if request.from > request.to {
            return Err(ReplayError::InvalidRange {
                from: request.from,
                to: request.to,
            });
        }

        let batch_size = request
            .batch_size
            .unwrap_or(self.config.default_batch_size);
        if batch_size == 0 || batch_size > self.config.max_batch_size {
            return Err(ReplayError::Validation(format!(
                "batch_size must be between 1 and {}",
                self.config.max_batch_size
            )));
        }

        for (name, value) in [
            ("aggregate_type", &request.aggregate_type),
            ("aggregate_id", &request.aggregate_id),
            ("event_type", &request.event_type),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ReplayError::Validation(format!("{name} must not be blank")));
            }
        }

        if let Some(event_type) = &request.event_type {
            self.registry.resolve(event_type)?;
        }

        // A single-id replay needs at most one record.
        Ok(if request.id.is_some() { 1 } else { batch_size })
    }

    async fn scan(
        &self,
        request: &ReplayRequest,
        batch_size: u32,
        settings: DispatchSettings,
        control: &ReplayControl,
        observer: Option<&dyn CheckpointObserver>,
        report: &mut ReplayReport,
    ) {
        let mut after = request.after;
        let mut batch_no: u64 = 0;

        loop {
            if control.is_cancelled() {
                info!(checkpoint = ?report.checkpoint, "replay cancelled");
                report.status = ReplayStatus::Cancelled;
                return;
            }

            let criteria = request.batch_criteria(batch_size, after);
            let items = match self.fetch(&criteria, control).await {
                Ok(items) => items,
                Err(FetchStop::Cancelled) => {
                    info!(checkpoint = ?report.checkpoint, "replay cancelled during fetch retry");
                    report.status = ReplayStatus::Cancelled;
                    return;
                }
                Err(FetchStop::Failed(message)) => {
                    error!(error = %message, checkpoint = ?report.checkpoint, "replay failed");
                    report.fail(message);
                    return;
                }
            };
            let Some(last) = items.last().map(EventRecord::cursor) else {
                if let Some(id) = request.id {
                    let message = format!("event {id} not found in the replay window");
                    warn!(event_id = %id, "{message}");
                    report.fail(message);
                }
                return;
            };

            batch_no += 1;
            let fetched = items.len();
            report.batches += 1;
            report.scanned += fetched as u64;

            let batch: Arc<[EventRecord]> = items.into();
            let outcomes = dispatch_batch(Arc::clone(&batch), &self.registry, settings).await;
            if self.tally(&batch, outcomes, settings.fail_fast, report) {
                let message = format!("fail-fast: batch {batch_no} stopped at the first failure");
                error!(batch = batch_no, checkpoint = ?report.checkpoint, "{message}");
                report.fail(message);
                return;
            }

            let checkpoint = Checkpoint {
                batch: batch_no,
                cursor: last,
                events_in_batch: fetched,
            };
            report.checkpoint = Some(last);
            info!(
                batch = batch_no,
                events = fetched,
                cursor_timestamp = %last.timestamp,
                cursor_id = %last.id,
                "replay checkpoint"
            );
            if let Some(observer) = observer {
                observer.on_checkpoint(report.run_id, &checkpoint).await;
            }

            after = Some(last);
            if request.id.is_some() || fetched < batch_size as usize {
                return;
            }
        }
    }

    /// Folds batch outcomes into the report. Returns `true` when a fail-fast
    /// run must stop.
    fn tally(
        &self,
        batch: &[EventRecord],
        outcomes: Vec<Outcome>,
        fail_fast: bool,
        report: &mut ReplayReport,
    ) -> bool {
        let mut stop = false;
        for (event, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                Outcome::Succeeded => report.record_success(),
                Outcome::Failed(reason) => {
                    warn!(
                        event_id = %event.id(),
                        event_type = event.event_type(),
                        stream = %event.stream_key(),
                        reason = %reason,
                        "replay event failed"
                    );
                    report.record_failure(
                        EventFailure::new(event, reason),
                        self.config.max_recorded_failures,
                    );
                    stop |= fail_fast;
                }
                Outcome::Skipped => report.skipped += 1,
            }
        }
        stop
    }

    /// Fetches one batch, retrying transient failures with backoff.
    async fn fetch(
        &self,
        criteria: &Criteria,
        control: &ReplayControl,
    ) -> Result<Vec<EventRecord>, FetchStop> {
        let timeout = self.config.fetch_timeout;
        let mut attempt: u32 = 0;
        loop {
            let cause = match tokio::time::timeout(timeout, self.store.find_by_criteria(criteria))
                .await
            {
                Ok(Ok(page)) => return Ok(page.items),
                Ok(Err(err)) if !err.is_transient() => {
                    return Err(FetchStop::Failed(format!("batch fetch rejected: {err}")));
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("batch fetch timed out after {}ms", timeout.as_millis()),
            };

            if attempt >= self.config.max_fetch_retries {
                return Err(FetchStop::Failed(format!(
                    "batch fetch failed after {} attempts: {cause}",
                    attempt + 1
                )));
            }
            let delay = self.config.backoff(attempt);
            attempt += 1;
            warn!(
                attempt,
                error = %cause,
                retry_in = ?delay,
                "batch fetch failed; retrying"
            );
            if control.cancelled_within(delay).await {
                return Err(FetchStop::Cancelled);
            }
        }
    }
}
