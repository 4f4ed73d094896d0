//! State projection: decoded contract calls → challenge and participant
//! rows.
//!
//! The Projector consumes one ascending batch per cycle. For every
//! transaction that passes the dedup window it decodes the call data,
//! dispatches exhaustively over [`ChallengeCall`], and applies the effect
//! through the [`ChallengeStore`]. Each handler is individually
//! idempotent against replay of the same transaction hash — the dedup
//! window is memory-only and a restart replays recent history, so the
//! guards here are what make reprocessing safe.
//!
//! Failure policy: a handler error (e.g. a store failure) is caught per
//! transaction, logged, and the transaction is still marked processed.
//! It will not be retried within this process lifetime. This favors
//! forward progress over guaranteed delivery; a stricter design would
//! leave the hash out of the window so the next cycle retries.

use super::db::ChallengeStore;
use super::decoder::{decode_call_data, parse_tracked_call, ChallengeCall};
use super::dedup::DedupWindow;
use super::error::IngestError;
use super::types::{Challenge, NormalizedTransaction, Participant};
use alloy_primitives::U256;
use std::sync::Arc;

/// Per-batch projection counters, logged by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    /// Transactions whose effect was applied.
    pub applied: usize,
    /// Novel transactions that produced no effect (untracked function,
    /// validation skip, or an idempotency guard).
    pub skipped: usize,
    /// Transactions whose handler failed; still marked processed.
    pub failed: usize,
    /// Transactions filtered out by the dedup window.
    pub duplicates: usize,
}

enum Outcome {
    Applied,
    Skipped,
}

/// Projects ordered transaction batches into challenge state.
///
/// Owns the dedup window; shares nothing. One instance per pipeline.
pub struct Projector {
    store: Arc<dyn ChallengeStore>,
    window: DedupWindow,
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl Projector {
    pub fn new(store: Arc<dyn ChallengeStore>) -> Self {
        Self::new_with_timestamp_fn(store, Box::new(|| chrono::Utc::now().timestamp()))
    }

    /// Custom clock for deterministic tests.
    pub fn new_with_timestamp_fn(
        store: Arc<dyn ChallengeStore>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            store,
            window: DedupWindow::default(),
            now_fn,
        }
    }

    pub fn window(&self) -> &DedupWindow {
        &self.window
    }

    /// Apply one time-ordered batch.
    ///
    /// Transactions are handled strictly in order; a failure never aborts
    /// the rest of the batch.
    pub async fn project_batch(&mut self, batch: &[NormalizedTransaction]) -> ProjectionSummary {
        let mut summary = ProjectionSummary::default();

        for tx in batch {
            if !self.window.is_novel(tx) {
                log::debug!("Skipping already-processed transaction {}", tx.tx_hash);
                summary.duplicates += 1;
                continue;
            }

            match self.apply(tx).await {
                Ok(Outcome::Applied) => summary.applied += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    log::error!("Failed to project transaction {}: {}", tx.tx_hash, e);
                    summary.failed += 1;
                }
            }

            // Marked processed regardless of the handler outcome; see the
            // failure policy in the module docs.
            self.window.mark_processed(tx);
        }

        summary
    }

    async fn apply(&self, tx: &NormalizedTransaction) -> Result<Outcome, IngestError> {
        let Some(call) = decode_call_data(tx.data.as_deref()) else {
            return Ok(Outcome::Skipped);
        };

        let call = match parse_tracked_call(&call) {
            Ok(Some(call)) => call,
            Ok(None) => return Ok(Outcome::Skipped),
            Err(e) => {
                log::warn!("Skipping transaction {}: {}", tx.tx_hash, e);
                return Ok(Outcome::Skipped);
            }
        };

        match call {
            ChallengeCall::Create {
                start,
                end,
                reward_budget,
                reward_per_point,
            } => {
                self.apply_create(tx, start, end, reward_budget, reward_per_point)
                    .await
            }
            ChallengeCall::Join => self.apply_join(tx).await,
            ChallengeCall::SubmitWorkout { points } => self.apply_submit(tx, points).await,
            ChallengeCall::Close => self.apply_close(tx).await,
        }
    }

    /// Deactivate any current challenge, then create a new active one
    /// keyed by this transaction's hash.
    async fn apply_create(
        &self,
        tx: &NormalizedTransaction,
        start: i64,
        end: i64,
        reward_budget: U256,
        reward_per_point: U256,
    ) -> Result<Outcome, IngestError> {
        if self.store.find_challenge(&tx.tx_hash).await?.is_some() {
            log::debug!("Challenge {} already projected", tx.tx_hash);
            return Ok(Outcome::Skipped);
        }

        if let Some(mut active) = self.store.find_active_challenge().await? {
            active.active = false;
            active.last_updated_tx_hash = tx.tx_hash.clone();
            self.store.save_challenge(&active).await?;
            log::info!("Challenge {} superseded by {}", active.id, tx.tx_hash);
        }

        let challenge = Challenge {
            id: tx.tx_hash.clone(),
            creator: tx.sender.clone(),
            start_timestamp: start,
            end_timestamp: end,
            reward_budget: reward_budget.to_string(),
            reward_per_point: reward_per_point.to_string(),
            active: true,
            created_tx_hash: tx.tx_hash.clone(),
            closed_tx_hash: None,
            last_updated_tx_hash: tx.tx_hash.clone(),
            opened_at: Some(self.effect_timestamp(tx)),
            closed_at: None,
        };
        self.store.save_challenge(&challenge).await?;

        log::info!(
            "Created challenge {} (start {}, end {})",
            challenge.id,
            start,
            end
        );
        Ok(Outcome::Applied)
    }

    async fn apply_close(&self, tx: &NormalizedTransaction) -> Result<Outcome, IngestError> {
        let Some(mut active) = self.store.find_active_challenge().await? else {
            log::warn!(
                "closeChallenge {} ignored: no active challenge",
                tx.tx_hash
            );
            return Ok(Outcome::Skipped);
        };

        if active.last_updated_tx_hash == tx.tx_hash {
            log::debug!("closeChallenge {} already applied", tx.tx_hash);
            return Ok(Outcome::Skipped);
        }

        active.active = false;
        active.closed_tx_hash = Some(tx.tx_hash.clone());
        active.last_updated_tx_hash = tx.tx_hash.clone();
        active.closed_at = Some(self.effect_timestamp(tx));
        self.store.save_challenge(&active).await?;

        log::info!("Closed challenge {} by {}", active.id, tx.tx_hash);
        Ok(Outcome::Applied)
    }

    async fn apply_join(&self, tx: &NormalizedTransaction) -> Result<Outcome, IngestError> {
        let Some(sender) = tx.sender.as_deref() else {
            log::warn!("joinChallenge {} ignored: no sender", tx.tx_hash);
            return Ok(Outcome::Skipped);
        };
        let Some(active) = self.store.find_active_challenge().await? else {
            log::warn!(
                "joinChallenge {} ignored: no active challenge",
                tx.tx_hash
            );
            return Ok(Outcome::Skipped);
        };

        let existing = self.store.find_participant(&active.id, sender).await?;
        if let Some(participant) = &existing {
            if participant.join_tx_hash == tx.tx_hash {
                log::debug!("joinChallenge {} already applied", tx.tx_hash);
                return Ok(Outcome::Skipped);
            }
        }

        let joined_at = Some(self.effect_timestamp(tx));
        let participant = match existing {
            // Re-join keeps the accumulated score and update tracking
            Some(mut participant) => {
                participant.join_tx_hash = tx.tx_hash.clone();
                participant.joined_at = joined_at;
                participant
            }
            None => Participant {
                challenge_id: active.id.clone(),
                address: sender.to_owned(),
                score: U256::ZERO.to_string(),
                join_tx_hash: tx.tx_hash.clone(),
                joined_at,
                last_update_tx_hash: None,
                last_score_change_at: None,
            },
        };
        self.store.save_participant(&participant).await?;

        log::info!(
            "Participant {} joined challenge {}",
            participant.address,
            participant.challenge_id
        );
        Ok(Outcome::Applied)
    }

    async fn apply_submit(
        &self,
        tx: &NormalizedTransaction,
        points: U256,
    ) -> Result<Outcome, IngestError> {
        let Some(sender) = tx.sender.as_deref() else {
            log::warn!("submitWorkout {} ignored: no sender", tx.tx_hash);
            return Ok(Outcome::Skipped);
        };
        let Some(active) = self.store.find_active_challenge().await? else {
            log::warn!(
                "submitWorkout {} ignored: no active challenge",
                tx.tx_hash
            );
            return Ok(Outcome::Skipped);
        };

        let existing = self.store.find_participant(&active.id, sender).await?;
        if let Some(participant) = &existing {
            if participant.last_update_tx_hash.as_deref() == Some(tx.tx_hash.as_str()) {
                log::debug!("submitWorkout {} already applied", tx.tx_hash);
                return Ok(Outcome::Skipped);
            }
        }

        // A workout without a prior join implicitly creates the
        // participant with score 0 before the points are added.
        let mut participant = existing.unwrap_or_else(|| Participant {
            challenge_id: active.id.clone(),
            address: sender.to_owned(),
            score: U256::ZERO.to_string(),
            join_tx_hash: tx.tx_hash.clone(),
            joined_at: None,
            last_update_tx_hash: None,
            last_score_change_at: None,
        });

        let current = U256::from_str_radix(&participant.score, 10).unwrap_or_else(|_| {
            log::warn!(
                "Participant ({}, {}) has unreadable score {:?}; treating as 0",
                participant.challenge_id,
                participant.address,
                participant.score
            );
            U256::ZERO
        });
        participant.score = current.saturating_add(points).to_string();
        participant.last_update_tx_hash = Some(tx.tx_hash.clone());
        participant.last_score_change_at = Some(self.effect_timestamp(tx));
        self.store.save_participant(&participant).await?;

        log::info!(
            "Participant {} scored {} points in challenge {} (total {})",
            participant.address,
            points,
            participant.challenge_id,
            participant.score
        );
        Ok(Outcome::Applied)
    }

    /// Effect timestamps come from the transaction itself when it has
    /// one, so replays stay deterministic; the clock is a fallback.
    fn effect_timestamp(&self, tx: &NormalizedTransaction) -> i64 {
        tx.timestamp_secs().unwrap_or_else(|| (self.now_fn)())
    }
}
