//! Ingestion scheduler: one cycle at startup, then fixed-interval polling.
//!
//! A cycle is fetch + project. Cycles are strictly serialized: a timer
//! fire that arrives while a cycle is in flight is a debug-logged no-op
//! (the single-flight guard). A non-positive interval disables the
//! repeating timer entirely — one startup cycle, then the scheduler
//! returns. Shutdown stops future fires; an in-flight cycle always runs
//! to completion.

use super::error::IngestError;
use super::fetcher::Fetcher;
use super::projector::{ProjectionSummary, Projector};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// What one requested cycle amounted to.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(ProjectionSummary),
    /// Another cycle was in flight; this request was a no-op.
    Skipped,
    /// The fetch failed; nothing was projected. The next scheduled cycle
    /// retries naturally.
    Failed(IngestError),
}

pub struct IngestScheduler {
    fetcher: Fetcher,
    projector: Mutex<Projector>,
    cycling: AtomicBool,
    poll_interval_ms: i64,
}

impl IngestScheduler {
    pub fn new(fetcher: Fetcher, projector: Projector, poll_interval_ms: i64) -> Self {
        Self {
            fetcher,
            projector: Mutex::new(projector),
            cycling: AtomicBool::new(false),
            poll_interval_ms,
        }
    }

    /// Run one fetch + project cycle, unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .cycling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Ingestion cycle already in flight; skipping this fire");
            return CycleOutcome::Skipped;
        }

        let outcome = self.cycle_inner().await;
        self.cycling.store(false, Ordering::SeqCst);
        outcome
    }

    async fn cycle_inner(&self) -> CycleOutcome {
        let batch = match self.fetcher.fetch_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("Ingestion cycle aborted: {}", e);
                return CycleOutcome::Failed(e);
            }
        };

        let fetched = batch.len();
        let summary = {
            let mut projector = self.projector.lock().await;
            projector.project_batch(&batch).await
        };

        log::info!(
            "Cycle complete: {} fetched | {} applied, {} skipped, {} duplicates, {} failed",
            fetched,
            summary.applied,
            summary.skipped,
            summary.duplicates,
            summary.failed
        );
        CycleOutcome::Completed(summary)
    }

    /// Drive the scheduler until `shutdown` fires.
    ///
    /// One synchronous cycle runs before the repeating timer is armed.
    /// With a non-positive interval no timer is armed at all (one-shot
    /// mode). Because cycles run inline in this loop, a shutdown signal
    /// received mid-cycle takes effect only after the cycle finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.run_cycle().await;

        if self.poll_interval_ms <= 0 {
            log::info!(
                "Polling disabled (TX_POLL_INTERVAL_MS = {}); ran one-shot cycle",
                self.poll_interval_ms
            );
            return;
        }

        log::info!(
            "Starting ingestion scheduler (interval: {}ms)",
            self.poll_interval_ms
        );
        let mut timer = interval(Duration::from_millis(self.poll_interval_ms as u64));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately and
        // the startup cycle already ran; consume it.
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received; scheduler stopping");
                    break;
                }
            }
        }
    }
}
