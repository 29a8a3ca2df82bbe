//! Batch validator: size/type/count policy enforcement before any work begins.

use snapflow_core::{CandidateFile, UploadPolicy};

/// Why a candidate file (or a whole batch) was rejected at submission time.
///
/// The Display impl is the short, human-readable reason surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    #[error("Too many files: {existing} existing + {submitted} submitted exceeds limit of {max}")]
    TooManyFiles {
        existing: usize,
        submitted: usize,
        max: usize,
    },
}

/// Result of validating one batch: accepted candidates in submission order,
/// and rejected candidates paired with their reason.
#[derive(Debug)]
pub struct BatchOutcome {
    pub accepted: Vec<CandidateFile>,
    pub rejected: Vec<(CandidateFile, RejectReason)>,
}

/// Enforces the upload policy on candidate batches.
///
/// Purely computational and deterministic: the same batch, existing count and
/// policy always produce the same outcome.
pub struct BatchValidator {
    policy: UploadPolicy,
}

impl BatchValidator {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    /// Validate a batch against the policy.
    ///
    /// The count ceiling is evaluated first and is all-or-nothing: if
    /// `existing_count + batch.len()` exceeds `max_files_total`, every
    /// candidate is rejected with `TooManyFiles` and nothing is dispatched.
    /// Otherwise each file is checked individually for size and content type;
    /// one file's rejection does not affect its siblings.
    pub fn validate(&self, batch: Vec<CandidateFile>, existing_count: usize) -> BatchOutcome {
        let submitted = batch.len();

        if existing_count + submitted > self.policy.max_files_total {
            let reason = RejectReason::TooManyFiles {
                existing: existing_count,
                submitted,
                max: self.policy.max_files_total,
            };
            return BatchOutcome {
                accepted: Vec::new(),
                rejected: batch.into_iter().map(|c| (c, reason.clone())).collect(),
            };
        }

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for candidate in batch {
            if candidate.declared_size > self.policy.max_file_size_bytes as u64 {
                let reason = RejectReason::TooLarge {
                    size: candidate.declared_size,
                    max: self.policy.max_file_size_bytes as u64,
                };
                rejected.push((candidate, reason));
            } else if !self.policy.allows_content_type(&candidate.content_type) {
                let reason = RejectReason::UnsupportedType {
                    content_type: candidate.content_type.clone(),
                };
                rejected.push((candidate, reason));
            } else {
                accepted.push(candidate);
            }
        }

        BatchOutcome { accepted, rejected }
    }
}
