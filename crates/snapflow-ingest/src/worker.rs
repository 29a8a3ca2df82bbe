//! Per-file pipeline: transcode (on the blocking pool) then timed storage
//! writes, reporting a single terminal outcome back to the arena.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use snapflow_core::{compression_ratio, EncodedImageMetadata, TranscodeOptions};
use snapflow_processing::{OutputFormat, TranscodeError, Transcoder};
use snapflow_storage::{Locator, Storage, StorageError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::arena::{ArenaCommand, WorkOutcome};

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Transcode worker failed: {0}")]
    Worker(String),
}

/// Run one file's encode + store work and merge the result by id. Exactly one
/// `Merge` is sent per invocation; the arena tolerates it arriving after the
/// record was removed.
pub(crate) async fn run_upload(
    id: Uuid,
    data: Bytes,
    options: TranscodeOptions,
    storage: Arc<dyn Storage>,
    store_timeout: Duration,
    commands: mpsc::Sender<ArenaCommand>,
) {
    let outcome = match process(data, options, storage, store_timeout).await {
        Ok((url, thumbnail_url, metadata)) => WorkOutcome::Success {
            url,
            thumbnail_url,
            metadata,
        },
        Err(e) => WorkOutcome::Failure {
            message: e.to_string(),
        },
    };

    let _ = commands.send(ArenaCommand::Merge { id, outcome }).await;
}

async fn process(
    data: Bytes,
    options: TranscodeOptions,
    storage: Arc<dyn Storage>,
    store_timeout: Duration,
) -> Result<(Locator, Option<Locator>, EncodedImageMetadata), UploadError> {
    let original_size = data.len() as u64;
    let format = OutputFormat::default();

    // CPU-bound encode goes to the blocking pool so it cannot stall the
    // runtime; the buffer handle is cheap to move.
    let encoded =
        tokio::task::spawn_blocking(move || Transcoder::encode_as(&data, &options, format))
            .await
            .map_err(|e| UploadError::Worker(e.to_string()))??;

    let encoded_size = encoded.primary.bytes.len() as u64;
    let metadata = EncodedImageMetadata {
        width: encoded.primary.width,
        height: encoded.primary.height,
        original_size,
        encoded_size,
        compression_ratio: compression_ratio(original_size, encoded_size),
    };

    let url = store_with_timeout(
        storage.as_ref(),
        encoded.primary.bytes.to_vec(),
        format,
        store_timeout,
    )
    .await?;

    let thumbnail_url = match encoded.thumbnail {
        Some(thumb) => {
            match store_with_timeout(storage.as_ref(), thumb.bytes.to_vec(), format, store_timeout)
                .await
            {
                Ok(locator) => Some(locator),
                Err(e) => {
                    // The primary write already landed; reclaim it so a failed
                    // upload leaves nothing behind.
                    if let Err(delete_err) = storage.delete(&url).await {
                        tracing::warn!(
                            locator = %url,
                            error = %delete_err,
                            "Failed to reclaim primary artifact after thumbnail failure"
                        );
                    }
                    return Err(e);
                }
            }
        }
        None => None,
    };

    Ok((url, thumbnail_url, metadata))
}

async fn store_with_timeout(
    storage: &dyn Storage,
    data: Vec<u8>,
    format: OutputFormat,
    store_timeout: Duration,
) -> Result<Locator, UploadError> {
    match tokio::time::timeout(
        store_timeout,
        storage.store(data, format.extension(), format.to_mime_type()),
    )
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => Err(UploadError::Storage(StorageError::Timeout {
            seconds: store_timeout.as_secs(),
        })),
    }
}
