//! Snapflow Ingest Library
//!
//! The upload orchestrator: accepts a batch of candidate files, validates
//! them, runs each accepted file through transcode + store concurrently, and
//! maintains a live result list merged by record id. All record mutation is
//! funneled through a single-writer arena task, so concurrent completions can
//! never clobber each other.

pub mod orchestrator;

mod arena;
mod worker;

// Re-export commonly used types
pub use orchestrator::{CompletionSender, RejectedUpload, SubmitOutcome, UploadOrchestrator};
pub use snapflow_core::{
    compression_ratio, CandidateFile, EncodedImageMetadata, FitMode, TranscodeOptions,
    UploadPolicy, UploadRecord, UploadStatus,
};
pub use snapflow_processing::RejectReason;
pub use snapflow_storage::{Locator, Storage};
