//! Domain models: candidate files, upload records, and encoded-image metadata.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A raw, unvalidated input to the pipeline. Exists only for the duration of
/// validation and dispatch; never persisted.
#[derive(Clone, Debug)]
pub struct CandidateFile {
    pub data: Bytes,
    pub name: String,
    pub content_type: String,
    pub declared_size: u64,
}

impl CandidateFile {
    pub fn new(data: impl Into<Bytes>, name: impl Into<String>, content_type: impl Into<String>) -> Self {
        let data = data.into();
        let declared_size = data.len() as u64;
        Self {
            data,
            name: name.into(),
            content_type: content_type.into(),
            declared_size,
        }
    }
}

/// Per-record lifecycle: `Pending -> InProgress -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Succeeded | UploadStatus::Failed)
    }
}

/// Size and geometry accounting for a successful encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodedImageMetadata {
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub encoded_size: u64,
    /// Signed percentage reduction in byte size. Negative when the encode
    /// enlarged the file, which is valid for already-compressed inputs.
    pub compression_ratio: i32,
}

/// Signed compression ratio as a rounded percentage:
/// `round((1 - encoded/original) * 100)`.
pub fn compression_ratio(original_size: u64, encoded_size: u64) -> i32 {
    if original_size == 0 {
        return 0;
    }
    let ratio = 1.0 - (encoded_size as f64 / original_size as f64);
    (ratio * 100.0).round() as i32
}

/// The tracked, mutable result of processing one candidate file.
///
/// The `id` is assigned at acceptance and never changes; it is the merge key
/// for completion callbacks. Status transitions are monotonic, and the
/// success fields (url, metadata) are only ever set together with the
/// transition into `Succeeded`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub name: String,
    pub declared_size: u64,
    pub declared_type: String,
    pub status: UploadStatus,
    /// Coarse progress signal: 0 until a terminal state, then 100.
    pub progress: u8,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<EncodedImageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Create a new Pending record for an accepted candidate.
    pub fn new(candidate: &CandidateFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: candidate.name.clone(),
            declared_size: candidate.declared_size,
            declared_type: candidate.content_type.clone(),
            status: UploadStatus::Pending,
            progress: 0,
            url: None,
            thumbnail_url: None,
            error_message: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Promote `Pending` to `InProgress`. No-op for any other state.
    pub fn begin(&mut self) {
        if self.status == UploadStatus::Pending {
            self.status = UploadStatus::InProgress;
        }
    }

    /// Transition into `Succeeded`, setting url, thumbnail and metadata in the
    /// same call so the record is never observable partially populated.
    pub fn complete_success(
        &mut self,
        url: String,
        thumbnail_url: Option<String>,
        metadata: EncodedImageMetadata,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.status = UploadStatus::Succeeded;
        self.progress = 100;
        self.url = Some(url);
        self.thumbnail_url = thumbnail_url;
        self.metadata = Some(metadata);
        self.error_message = None;
    }

    /// Transition into `Failed` with a short, caller-renderable message.
    pub fn complete_failure(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = UploadStatus::Failed;
        self.progress = 100;
        self.error_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> CandidateFile {
        CandidateFile::new(vec![0u8; 64], "photo.jpg", "image/jpeg")
    }

    fn metadata() -> EncodedImageMetadata {
        EncodedImageMetadata {
            width: 800,
            height: 600,
            original_size: 1000,
            encoded_size: 400,
            compression_ratio: compression_ratio(1000, 400),
        }
    }

    #[test]
    fn candidate_declared_size_matches_data() {
        let c = candidate();
        assert_eq!(c.declared_size, 64);
        assert_eq!(c.content_type, "image/jpeg");
    }

    #[test]
    fn compression_ratio_positive() {
        assert_eq!(compression_ratio(1000, 400), 60);
        assert_eq!(compression_ratio(2_000_000, 500_000), 75);
    }

    #[test]
    fn compression_ratio_negative_when_enlarged() {
        // Already-compressed inputs can re-encode larger. Not an error.
        assert_eq!(compression_ratio(100, 150), -50);
        assert_eq!(compression_ratio(1000, 1000), 0);
    }

    #[test]
    fn compression_ratio_zero_original() {
        assert_eq!(compression_ratio(0, 100), 0);
    }

    #[test]
    fn record_lifecycle_success() {
        let mut record = UploadRecord::new(&candidate());
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.progress, 0);

        record.begin();
        assert_eq!(record.status, UploadStatus::InProgress);

        record.complete_success("http://x/a.webp".to_string(), None, metadata());
        assert_eq!(record.status, UploadStatus::Succeeded);
        assert_eq!(record.progress, 100);
        assert!(record.url.is_some());
        assert!(record.metadata.is_some());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn record_lifecycle_failure() {
        let mut record = UploadRecord::new(&candidate());
        record.begin();
        record.complete_failure("decode failed");
        assert_eq!(record.status, UploadStatus::Failed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.error_message.as_deref(), Some("decode failed"));
        assert!(record.url.is_none());
        assert!(record.metadata.is_none());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut record = UploadRecord::new(&candidate());
        record.begin();
        record.complete_success("http://x/a.webp".to_string(), None, metadata());

        // A later failure callback must not clobber the success.
        record.complete_failure("late failure");
        assert_eq!(record.status, UploadStatus::Succeeded);
        assert!(record.error_message.is_none());

        let mut record = UploadRecord::new(&candidate());
        record.begin();
        record.complete_failure("boom");
        record.complete_success("http://x/b.webp".to_string(), None, metadata());
        assert_eq!(record.status, UploadStatus::Failed);
    }

    #[test]
    fn begin_only_promotes_pending() {
        let mut record = UploadRecord::new(&candidate());
        record.begin();
        record.complete_failure("boom");
        record.begin();
        assert_eq!(record.status, UploadStatus::Failed);
    }
}
