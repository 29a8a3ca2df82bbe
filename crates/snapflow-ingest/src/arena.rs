//! Single-writer record arena.
//!
//! One task owns every `UploadRecord` for the orchestrator's lifetime; all
//! reads and writes travel over a command channel. Batch admission runs
//! inside the arena too, so the count ceiling is checked against the live
//! record count and the accepted records are inserted in the same message —
//! concurrent submits cannot both observe a stale count. Merges are
//! serialized and atomic per record, and `List` replies are consistent
//! snapshots in submission order. A merge for an id that has been removed is
//! a logged no-op, never a re-insert.

use std::collections::HashMap;

use snapflow_core::{CandidateFile, EncodedImageMetadata, UploadRecord};
use snapflow_processing::{BatchValidator, RejectReason};
use snapflow_storage::Locator;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Terminal outcome of one file's transcode + store work.
#[derive(Debug)]
pub(crate) enum WorkOutcome {
    Success {
        url: Locator,
        thumbnail_url: Option<Locator>,
        metadata: EncodedImageMetadata,
    },
    Failure {
        message: String,
    },
}

/// One batch's admission result: accepted records paired with their source
/// candidates (the orchestrator still needs the bytes to spawn work), plus
/// the rejections.
#[derive(Debug)]
pub(crate) struct AdmittedBatch {
    pub accepted: Vec<(UploadRecord, CandidateFile)>,
    pub rejected: Vec<(CandidateFile, RejectReason)>,
}

/// What `Remove` hands back so the orchestrator can reclaim storage.
#[derive(Debug)]
pub(crate) struct RemovedRecord {
    pub succeeded: bool,
    pub url: Option<Locator>,
    pub thumbnail_url: Option<Locator>,
}

pub(crate) enum ArenaCommand {
    /// Validate a batch against the live record count and insert the
    /// accepted records, as one atomic step.
    Submit {
        candidates: Vec<CandidateFile>,
        reply: oneshot::Sender<AdmittedBatch>,
    },
    /// Associate the in-flight task handle with a record for cancellation.
    Attach { id: Uuid, handle: JoinHandle<()> },
    /// Merge a completion into the record matching `id`.
    Merge { id: Uuid, outcome: WorkOutcome },
    /// Drop a record, aborting its task if still running.
    Remove {
        id: Uuid,
        reply: oneshot::Sender<Option<RemovedRecord>>,
    },
    /// Snapshot of all records in submission order.
    List {
        reply: oneshot::Sender<Vec<UploadRecord>>,
    },
}

pub(crate) type CommandSender = mpsc::Sender<ArenaCommand>;

/// Spawn the arena task. It runs until every command sender is dropped.
pub(crate) fn spawn(
    validator: BatchValidator,
    completion_tx: Option<mpsc::Sender<UploadRecord>>,
) -> CommandSender {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run(rx, validator, completion_tx));
    tx
}

async fn run(
    mut rx: mpsc::Receiver<ArenaCommand>,
    validator: BatchValidator,
    completion_tx: Option<mpsc::Sender<UploadRecord>>,
) {
    let mut records: Vec<UploadRecord> = Vec::new();
    let mut handles: HashMap<Uuid, JoinHandle<()>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            ArenaCommand::Submit { candidates, reply } => {
                let outcome = validator.validate(candidates, records.len());

                // Pending is instantaneous: records are promoted before the
                // reply is sent, so callers only ever see InProgress or a
                // terminal state, never a gap.
                let mut accepted = Vec::with_capacity(outcome.accepted.len());
                for candidate in outcome.accepted {
                    let mut record = UploadRecord::new(&candidate);
                    record.begin();
                    records.push(record.clone());
                    accepted.push((record, candidate));
                }

                let _ = reply.send(AdmittedBatch {
                    accepted,
                    rejected: outcome.rejected,
                });
            }
            ArenaCommand::Attach { id, handle } => {
                // The worker may already have merged (and the record may even
                // be gone) by the time the handle arrives; only keep handles
                // for records that are still in flight.
                let in_flight = records
                    .iter()
                    .any(|r| r.id == id && !r.status.is_terminal());
                if in_flight {
                    handles.insert(id, handle);
                }
            }
            ArenaCommand::Merge { id, outcome } => {
                handles.remove(&id);
                match records.iter_mut().find(|r| r.id == id) {
                    Some(record) => {
                        match outcome {
                            WorkOutcome::Success {
                                url,
                                thumbnail_url,
                                metadata,
                            } => {
                                record.complete_success(
                                    url.into_string(),
                                    thumbnail_url.map(Locator::into_string),
                                    metadata,
                                );
                                tracing::info!(
                                    record_id = %id,
                                    name = %record.name,
                                    "Upload succeeded"
                                );
                            }
                            WorkOutcome::Failure { message } => {
                                tracing::warn!(
                                    record_id = %id,
                                    name = %record.name,
                                    error = %message,
                                    "Upload failed"
                                );
                                record.complete_failure(message);
                            }
                        }
                        if let Some(ref tx) = completion_tx {
                            let _ = tx.send(record.clone()).await;
                        }
                    }
                    None => {
                        tracing::debug!(
                            record_id = %id,
                            "Completion for removed record, dropping"
                        );
                    }
                }
            }
            ArenaCommand::Remove { id, reply } => {
                if let Some(handle) = handles.remove(&id) {
                    handle.abort();
                }
                let removed = records
                    .iter()
                    .position(|r| r.id == id)
                    .map(|idx| records.remove(idx))
                    .map(|record| RemovedRecord {
                        succeeded: record.status == snapflow_core::UploadStatus::Succeeded,
                        url: record.url.map(Locator::new),
                        thumbnail_url: record.thumbnail_url.map(Locator::new),
                    });
                let _ = reply.send(removed);
            }
            ArenaCommand::List { reply } => {
                let _ = reply.send(records.clone());
            }
        }
    }

    // Orchestrator gone; nothing left will observe these tasks.
    for handle in handles.into_values() {
        handle.abort();
    }
}
