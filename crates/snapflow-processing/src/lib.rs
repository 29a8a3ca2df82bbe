//! Snapflow Processing Library
//!
//! Pure, side-effect-free building blocks of the ingestion pipeline: the batch
//! validator that enforces the upload policy, and the transcoder that converts
//! raw image buffers into web-delivery encodes (plus optional thumbnails).
//!
//! Nothing in this crate performs I/O; both the validator and the transcoder
//! are safe to invoke concurrently with independent inputs.

pub mod image;
pub mod transcoder;
pub mod validator;

// Re-export commonly used types
pub use image::{ImageEncoder, ImageResize, OutputFormat};
pub use transcoder::{EncodedArtifact, EncodedImage, TranscodeError, Transcoder};
pub use validator::{BatchOutcome, BatchValidator, RejectReason};
