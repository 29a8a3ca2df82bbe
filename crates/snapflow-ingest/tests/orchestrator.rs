//! Orchestrator integration tests: concurrent merge correctness, policy
//! enforcement, removal semantics, and timeout handling.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use snapflow_ingest::{
    compression_ratio, CandidateFile, RejectReason, TranscodeOptions, UploadOrchestrator,
    UploadPolicy, UploadRecord, UploadStatus,
};
use snapflow_storage::{Locator, MemoryStorage, Storage, StorageResult};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Deterministic pseudo-noise image; compresses poorly as PNG so the lossy
/// web encode reliably shrinks it.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let h = x.wrapping_mul(31).wrapping_add(y.wrapping_mul(57));
        let h = h.wrapping_mul(2654435761);
        Rgba([(h >> 8) as u8, (h >> 16) as u8, (h >> 24) as u8, 255])
    });
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

fn valid_candidate(name: &str) -> CandidateFile {
    CandidateFile::new(png_bytes(96, 96), name, "image/png")
}

fn garbage_candidate(name: &str) -> CandidateFile {
    CandidateFile::new(b"definitely not image bytes".to_vec(), name, "image/jpeg")
}

fn permissive_policy() -> UploadPolicy {
    UploadPolicy {
        max_files_total: 100,
        ..UploadPolicy::default()
    }
}

async fn drain_completions(
    rx: &mut mpsc::Receiver<UploadRecord>,
    n: usize,
) -> Vec<UploadRecord> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let record = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("completion channel closed");
        out.push(record);
    }
    out
}

/// Storage whose deletes always fail, for removal semantics tests.
#[derive(Clone, Default)]
struct FailingDeleteStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl Storage for FailingDeleteStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<Locator> {
        self.inner.store(data, extension, content_type).await
    }

    async fn delete(&self, _locator: &Locator) -> StorageResult<()> {
        Err(snapflow_storage::StorageError::DeleteFailed(
            "simulated backend outage".to_string(),
        ))
    }
}

/// Storage that stalls every write by a fixed delay.
#[derive(Clone)]
struct SlowStorage {
    inner: MemoryStorage,
    delay: Duration,
}

impl SlowStorage {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
        }
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<Locator> {
        tokio::time::sleep(self.delay).await;
        self.inner.store(data, extension, content_type).await
    }

    async fn delete(&self, locator: &Locator) -> StorageResult<()> {
        self.inner.delete(locator).await
    }
}

#[tokio::test]
async fn batch_merges_by_id_regardless_of_completion_order() {
    let storage = Arc::new(MemoryStorage::new());
    let (tx, mut rx) = mpsc::channel(16);
    let orchestrator = UploadOrchestrator::with_completions(
        storage.clone(),
        permissive_policy(),
        TranscodeOptions::default(),
        tx,
    )
    .unwrap();

    // Interleave files that will succeed with files that will fail at decode.
    let batch = vec![
        valid_candidate("a.png"),
        garbage_candidate("b.jpg"),
        valid_candidate("c.png"),
        garbage_candidate("d.jpg"),
        valid_candidate("e.png"),
        valid_candidate("f.png"),
    ];
    let outcome = orchestrator.submit(batch).await.unwrap();
    assert_eq!(outcome.accepted.len(), 6);
    assert!(outcome.rejected.is_empty());
    for record in &outcome.accepted {
        assert_eq!(record.status, UploadStatus::InProgress);
        assert_eq!(record.progress, 0);
    }

    let completions = drain_completions(&mut rx, 6).await;
    assert_eq!(completions.len(), 6);

    let records = orchestrator.list().await.unwrap();
    assert_eq!(records.len(), 6);

    // Submission order is preserved however completions interleaved.
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "b.jpg", "c.png", "d.jpg", "e.png", "f.png"]);

    for record in &records {
        assert!(record.status.is_terminal());
        assert_eq!(record.progress, 100);
        if record.name.ends_with(".png") {
            assert_eq!(record.status, UploadStatus::Succeeded, "{}", record.name);
            assert!(record.url.is_some());
            assert!(record.error_message.is_none());

            // No cross-contamination: each record's url resolves to its own
            // artifact and the accounting matches that artifact exactly.
            let metadata = record.metadata.expect("succeeded record has metadata");
            let stored = storage
                .get(&Locator::new(record.url.clone().unwrap()))
                .expect("stored artifact resolvable");
            assert_eq!(metadata.encoded_size, stored.len() as u64);
        } else {
            assert_eq!(record.status, UploadStatus::Failed, "{}", record.name);
            assert!(record.url.is_none());
            assert!(record.metadata.is_none());
            let message = record.error_message.as_deref().unwrap();
            assert!(message.contains("decode"), "unexpected message: {message}");
        }
    }
}

#[tokio::test]
async fn count_ceiling_rejects_batch_atomically() {
    let storage = Arc::new(MemoryStorage::new());
    let policy = UploadPolicy {
        max_files_total: 3,
        ..UploadPolicy::default()
    };
    let orchestrator =
        UploadOrchestrator::new(storage, policy, TranscodeOptions::default()).unwrap();

    let batch = vec![
        valid_candidate("a.png"),
        valid_candidate("b.png"),
        valid_candidate("c.png"),
        valid_candidate("d.png"),
    ];
    let outcome = orchestrator.submit(batch).await.unwrap();

    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.rejected.len(), 4);
    for rejected in &outcome.rejected {
        assert!(matches!(rejected.reason, RejectReason::TooManyFiles { .. }));
    }
    assert!(orchestrator.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_submits_respect_count_ceiling() {
    let storage = Arc::new(MemoryStorage::new());
    let policy = UploadPolicy {
        max_files_total: 2,
        ..UploadPolicy::default()
    };
    let orchestrator = Arc::new(
        UploadOrchestrator::new(storage, policy, TranscodeOptions::default()).unwrap(),
    );

    // Two racing submits of 2 files each against a ceiling of 2: admission is
    // atomic in the arena, so exactly one batch wins and the other is turned
    // away whole.
    let mut joins = Vec::new();
    for batch in [
        vec![valid_candidate("a.png"), valid_candidate("b.png")],
        vec![valid_candidate("c.png"), valid_candidate("d.png")],
    ] {
        let orchestrator = Arc::clone(&orchestrator);
        joins.push(tokio::spawn(async move {
            orchestrator.submit(batch).await.unwrap()
        }));
    }

    let mut total_accepted = 0;
    let mut batches_rejected = 0;
    for join in joins {
        let outcome = join.await.unwrap();
        total_accepted += outcome.accepted.len();
        if !outcome.rejected.is_empty() {
            assert!(outcome.accepted.is_empty());
            assert_eq!(outcome.rejected.len(), 2);
            for rejected in &outcome.rejected {
                assert!(matches!(rejected.reason, RejectReason::TooManyFiles { .. }));
            }
            batches_rejected += 1;
        }
    }

    assert_eq!(total_accepted, 2);
    assert_eq!(batches_rejected, 1);
    assert_eq!(orchestrator.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn count_ceiling_includes_existing_records() {
    let storage = Arc::new(MemoryStorage::new());
    let policy = UploadPolicy {
        max_files_total: 3,
        ..UploadPolicy::default()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator =
        UploadOrchestrator::with_completions(storage, policy, TranscodeOptions::default(), tx)
            .unwrap();

    let first = orchestrator
        .submit(vec![valid_candidate("a.png"), valid_candidate("b.png")])
        .await
        .unwrap();
    assert_eq!(first.accepted.len(), 2);
    drain_completions(&mut rx, 2).await;

    // 2 existing + 2 submitted > 3: whole second batch turned away.
    let second = orchestrator
        .submit(vec![valid_candidate("c.png"), valid_candidate("d.png")])
        .await
        .unwrap();
    assert!(second.accepted.is_empty());
    assert_eq!(second.rejected.len(), 2);
    assert_eq!(orchestrator.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn per_file_rejection_leaves_siblings_untouched() {
    let storage = Arc::new(MemoryStorage::new());
    let policy = UploadPolicy {
        max_file_size_bytes: 5 * 1024 * 1024,
        ..permissive_policy()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator =
        UploadOrchestrator::with_completions(storage, policy, TranscodeOptions::default(), tx)
            .unwrap();

    let oversized = CandidateFile::new(vec![0u8; 6 * 1024 * 1024], "c.png", "image/png");
    let outcome = orchestrator
        .submit(vec![
            valid_candidate("a.png"),
            CandidateFile::new(b"plain text".to_vec(), "b.txt", "text/plain"),
            oversized,
        ])
        .await
        .unwrap();

    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.accepted[0].name, "a.png");
    assert_eq!(outcome.rejected.len(), 2);
    assert!(matches!(
        outcome.rejected[0].reason,
        RejectReason::UnsupportedType { .. }
    ));
    assert!(matches!(
        outcome.rejected[1].reason,
        RejectReason::TooLarge { .. }
    ));

    let completed = drain_completions(&mut rx, 1).await;
    assert_eq!(completed[0].status, UploadStatus::Succeeded);
    assert_eq!(orchestrator.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn mislabeled_bytes_fail_at_transcode_not_validation() {
    // b.txt falsely labeled image/jpeg passes policy checks but fails decode;
    // the sibling still succeeds with a positive compression ratio.
    let storage = Arc::new(MemoryStorage::new());
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator = UploadOrchestrator::with_completions(
        storage,
        permissive_policy(),
        TranscodeOptions::default(),
        tx,
    )
    .unwrap();

    let mislabeled = CandidateFile::new(b"just some text".to_vec(), "b.txt", "image/jpeg");
    let outcome = orchestrator
        .submit(vec![valid_candidate("a.png"), mislabeled])
        .await
        .unwrap();
    assert_eq!(outcome.accepted.len(), 2);

    drain_completions(&mut rx, 2).await;
    let records = orchestrator.list().await.unwrap();

    let a = records.iter().find(|r| r.name == "a.png").unwrap();
    assert_eq!(a.status, UploadStatus::Succeeded);
    assert!(a.metadata.unwrap().compression_ratio > 0);

    let b = records.iter().find(|r| r.name == "b.txt").unwrap();
    assert_eq!(b.status, UploadStatus::Failed);
}

#[tokio::test]
async fn compression_accounting_is_exact_and_idempotent() {
    let storage = Arc::new(MemoryStorage::new());
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator = UploadOrchestrator::with_completions(
        storage.clone(),
        permissive_policy(),
        TranscodeOptions::default(),
        tx,
    )
    .unwrap();

    let candidate = valid_candidate("a.png");
    let original_size = candidate.declared_size;
    orchestrator.submit(vec![candidate]).await.unwrap();

    let record = drain_completions(&mut rx, 1).await.pop().unwrap();
    let metadata = record.metadata.unwrap();

    assert_eq!(metadata.original_size, original_size);
    let stored = storage
        .get(&Locator::new(record.url.unwrap()))
        .expect("artifact stored");
    assert_eq!(metadata.encoded_size, stored.len() as u64);
    // Recomputing the formula reproduces the stored value bit-for-bit.
    assert_eq!(
        metadata.compression_ratio,
        compression_ratio(metadata.original_size, metadata.encoded_size)
    );
}

#[tokio::test]
async fn thumbnails_are_stored_alongside_primaries() {
    let storage = Arc::new(MemoryStorage::new());
    let (tx, mut rx) = mpsc::channel(8);
    let options = TranscodeOptions {
        generate_thumbnail: true,
        thumbnail_width: 32,
        ..TranscodeOptions::default()
    };
    let orchestrator =
        UploadOrchestrator::with_completions(storage.clone(), permissive_policy(), options, tx)
            .unwrap();

    orchestrator
        .submit(vec![valid_candidate("a.png")])
        .await
        .unwrap();
    let record = drain_completions(&mut rx, 1).await.pop().unwrap();

    assert_eq!(record.status, UploadStatus::Succeeded);
    assert!(record.thumbnail_url.is_some());
    assert_eq!(storage.object_count(), 2);
}

#[tokio::test]
async fn remove_drops_record_even_when_backend_delete_fails() {
    let storage = Arc::new(FailingDeleteStorage::default());
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator = UploadOrchestrator::with_completions(
        storage,
        permissive_policy(),
        TranscodeOptions::default(),
        tx,
    )
    .unwrap();

    orchestrator
        .submit(vec![valid_candidate("a.png")])
        .await
        .unwrap();
    let record = drain_completions(&mut rx, 1).await.pop().unwrap();
    assert_eq!(record.status, UploadStatus::Succeeded);

    // The delete failure is logged, never surfaced: the record is gone
    // immediately regardless.
    assert!(orchestrator.remove(record.id).await.unwrap());
    assert!(orchestrator.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_reclaims_stored_artifacts() {
    let storage = Arc::new(MemoryStorage::new());
    let (tx, mut rx) = mpsc::channel(8);
    let options = TranscodeOptions {
        generate_thumbnail: true,
        thumbnail_width: 32,
        ..TranscodeOptions::default()
    };
    let orchestrator =
        UploadOrchestrator::with_completions(storage.clone(), permissive_policy(), options, tx)
            .unwrap();

    orchestrator
        .submit(vec![valid_candidate("a.png")])
        .await
        .unwrap();
    let record = drain_completions(&mut rx, 1).await.pop().unwrap();
    assert_eq!(storage.object_count(), 2);

    assert!(orchestrator.remove(record.id).await.unwrap());

    // Deletion is fire-and-forget; poll briefly for it to land.
    for _ in 0..50 {
        if storage.object_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn remove_unknown_id_is_false() {
    let storage = Arc::new(MemoryStorage::new());
    let orchestrator =
        UploadOrchestrator::new(storage, permissive_policy(), TranscodeOptions::default())
            .unwrap();

    assert!(!orchestrator.remove(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn remove_while_in_flight_tolerates_late_completion() {
    let storage = Arc::new(SlowStorage::new(Duration::from_millis(300)));
    let orchestrator =
        UploadOrchestrator::new(storage, permissive_policy(), TranscodeOptions::default())
            .unwrap();

    let outcome = orchestrator
        .submit(vec![valid_candidate("a.png")])
        .await
        .unwrap();
    let id = outcome.accepted[0].id;

    // Remove while the store is still sleeping.
    assert!(orchestrator.remove(id).await.unwrap());
    assert!(orchestrator.list().await.unwrap().is_empty());

    // Whether the task was aborted or its completion arrived late, the record
    // must not reappear.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(orchestrator.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_timeout_fails_the_record() {
    let storage = Arc::new(SlowStorage::new(Duration::from_secs(5)));
    let policy = UploadPolicy {
        store_timeout_secs: 1,
        ..permissive_policy()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator =
        UploadOrchestrator::with_completions(storage, policy, TranscodeOptions::default(), tx)
            .unwrap();

    orchestrator
        .submit(vec![valid_candidate("a.png")])
        .await
        .unwrap();
    let record = drain_completions(&mut rx, 1).await.pop().unwrap();

    assert_eq!(record.status, UploadStatus::Failed);
    let message = record.error_message.unwrap();
    assert!(message.contains("timed out"), "unexpected message: {message}");
}

#[tokio::test]
async fn slow_file_does_not_block_siblings() {
    // One submission against slow storage, one against fast storage, sharing
    // nothing: the fast record must finish while the slow one is in flight.
    let storage = Arc::new(SlowStorage::new(Duration::from_millis(500)));
    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator = UploadOrchestrator::with_completions(
        storage,
        permissive_policy(),
        TranscodeOptions::default(),
        tx,
    )
    .unwrap();

    orchestrator
        .submit(vec![garbage_candidate("fails-fast.jpg"), valid_candidate("slow.png")])
        .await
        .unwrap();

    // The decode failure short-circuits before storage, so it completes first.
    let first = drain_completions(&mut rx, 1).await.pop().unwrap();
    assert_eq!(first.name, "fails-fast.jpg");
    assert_eq!(first.status, UploadStatus::Failed);

    let records = orchestrator.list().await.unwrap();
    let slow = records.iter().find(|r| r.name == "slow.png").unwrap();
    assert_eq!(slow.status, UploadStatus::InProgress);

    let second = drain_completions(&mut rx, 1).await.pop().unwrap();
    assert_eq!(second.name, "slow.png");
    assert_eq!(second.status, UploadStatus::Succeeded);
}
