//! Snapflow Core Library
//!
//! This crate provides the domain models and configuration shared across all
//! snapflow components: candidate files, upload records with their status
//! state machine, encoded-image metadata, and the upload/transcode policy
//! structs.

pub mod config;
pub mod models;

// Re-export commonly used types
pub use config::{FitMode, TranscodeOptions, UploadPolicy};
pub use models::{
    compression_ratio, CandidateFile, EncodedImageMetadata, UploadRecord, UploadStatus,
};
