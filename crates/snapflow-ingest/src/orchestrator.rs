//! Upload orchestrator: batch submission, concurrent per-file work, and the
//! caller-facing result list.

use std::sync::Arc;

use anyhow::{Context, Result};
use snapflow_core::{CandidateFile, TranscodeOptions, UploadPolicy, UploadRecord};
use snapflow_processing::{BatchValidator, RejectReason};
use snapflow_storage::{Locator, Storage};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::arena::{self, ArenaCommand, CommandSender};
use crate::worker;

/// Optional channel on which terminal records are delivered as completions
/// merge, in completion order.
pub type CompletionSender = mpsc::Sender<UploadRecord>;

/// A candidate turned away at submission time. Never becomes a record.
#[derive(Debug)]
pub struct RejectedUpload {
    pub name: String,
    pub reason: RejectReason,
}

impl RejectedUpload {
    /// Short human-readable reason, suitable for inline rendering.
    pub fn message(&self) -> String {
        self.reason.to_string()
    }
}

/// Result of one `submit` call: accepted records (all `InProgress`) in
/// submission order, plus the rejection list.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub accepted: Vec<UploadRecord>,
    pub rejected: Vec<RejectedUpload>,
}

/// The stateful coordinator of the ingestion pipeline.
///
/// Each accepted file is processed by an independent task; a slow or failing
/// file never delays siblings. All record state lives in the single-writer
/// arena task, reached over a command channel; batch validation runs inside
/// that task too, so the count ceiling holds under concurrent submits.
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    policy: UploadPolicy,
    options: TranscodeOptions,
    commands: CommandSender,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        policy: UploadPolicy,
        options: TranscodeOptions,
    ) -> Result<Self> {
        Self::build(storage, policy, options, None)
    }

    /// Like [`new`](Self::new), additionally delivering every terminal record
    /// on `completion_tx` as it merges.
    pub fn with_completions(
        storage: Arc<dyn Storage>,
        policy: UploadPolicy,
        options: TranscodeOptions,
        completion_tx: CompletionSender,
    ) -> Result<Self> {
        Self::build(storage, policy, options, Some(completion_tx))
    }

    fn build(
        storage: Arc<dyn Storage>,
        policy: UploadPolicy,
        options: TranscodeOptions,
        completion_tx: Option<CompletionSender>,
    ) -> Result<Self> {
        policy.validate().context("Invalid upload policy")?;
        options.validate().context("Invalid transcode options")?;

        let commands = arena::spawn(BatchValidator::new(policy.clone()), completion_tx);

        Ok(Self {
            storage,
            policy,
            options,
            commands,
        })
    }

    /// Submit a batch of candidate files.
    ///
    /// The arena task validates the batch against the live record count
    /// (count ceiling first, all-or-nothing; then per-file size/type) and
    /// registers an `InProgress` record for every accepted candidate in the
    /// same step, then the encode + store work for each is spawned here. The
    /// rejection list is returned immediately; completions are merged into
    /// the result list as they arrive, in arbitrary order.
    pub async fn submit(&self, candidates: Vec<CandidateFile>) -> Result<SubmitOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ArenaCommand::Submit {
                candidates,
                reply: reply_tx,
            })
            .await
            .context("Record arena unavailable")?;
        let admitted = reply_rx.await.context("Record arena unavailable")?;

        let rejected: Vec<RejectedUpload> = admitted
            .rejected
            .into_iter()
            .map(|(candidate, reason)| {
                tracing::debug!(
                    name = %candidate.name,
                    reason = %reason,
                    "Candidate rejected"
                );
                RejectedUpload {
                    name: candidate.name,
                    reason,
                }
            })
            .collect();

        let mut records = Vec::with_capacity(admitted.accepted.len());
        for (record, candidate) in admitted.accepted {
            tracing::info!(
                record_id = %record.id,
                name = %candidate.name,
                size_bytes = candidate.declared_size,
                "Upload dispatched"
            );
            let handle = tokio::spawn(worker::run_upload(
                record.id,
                candidate.data,
                self.options.clone(),
                Arc::clone(&self.storage),
                self.policy.store_timeout(),
                self.commands.clone(),
            ));
            self.commands
                .send(ArenaCommand::Attach {
                    id: record.id,
                    handle,
                })
                .await
                .context("Record arena unavailable")?;
            records.push(record);
        }

        Ok(SubmitOutcome {
            accepted: records,
            rejected,
        })
    }

    /// Snapshot of all records in submission order.
    pub async fn list(&self) -> Result<Vec<UploadRecord>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ArenaCommand::List { reply: reply_tx })
            .await
            .context("Record arena unavailable")?;
        reply_rx.await.context("Record arena unavailable")
    }

    /// Remove a record from the result list. Returns whether it existed.
    ///
    /// In-flight work is aborted best-effort. If the record had succeeded its
    /// stored artifacts are deleted fire-and-forget: failures are logged and
    /// never surfaced, the record is gone from `list()` regardless.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ArenaCommand::Remove {
                id,
                reply: reply_tx,
            })
            .await
            .context("Record arena unavailable")?;
        let removed = reply_rx.await.context("Record arena unavailable")?;

        let Some(removed) = removed else {
            return Ok(false);
        };

        if removed.succeeded {
            for locator in [removed.url, removed.thumbnail_url].into_iter().flatten() {
                self.spawn_best_effort_delete(id, locator);
            }
        }

        Ok(true)
    }

    fn spawn_best_effort_delete(&self, id: Uuid, locator: Locator) {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(e) = storage.delete(&locator).await {
                tracing::warn!(
                    record_id = %id,
                    locator = %locator,
                    error = %e,
                    "Best-effort artifact delete failed, object orphaned"
                );
            } else {
                tracing::info!(record_id = %id, locator = %locator, "Artifact deleted");
            }
        });
    }
}
