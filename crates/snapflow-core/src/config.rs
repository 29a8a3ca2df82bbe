//! Configuration module
//!
//! Typed configuration for the upload policy and the transcode pipeline, with
//! explicit defaults and environment-variable loading for service deployments.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_FILE_SIZE_MB: usize = 10;
const DEFAULT_MAX_FILES_TOTAL: usize = 20;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUALITY: u8 = 85;
const DEFAULT_THUMBNAIL_WIDTH: u32 = 300;
const MIN_THUMBNAIL_QUALITY: u8 = 60;

/// Policy enforced on a batch of candidate files before any work begins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadPolicy {
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub max_files_total: usize,
    /// Upper bound for a single storage write, in seconds.
    pub store_timeout_secs: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            max_files_total: DEFAULT_MAX_FILES_TOTAL,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }
}

impl UploadPolicy {
    /// Load the policy from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();

        let max_file_size_mb = env::var("SNAPFLOW_MAX_FILE_SIZE_MB")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid SNAPFLOW_MAX_FILE_SIZE_MB: {}", e))?
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);

        let allowed_content_types = env::var("SNAPFLOW_ALLOWED_CONTENT_TYPES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.allowed_content_types);

        let max_files_total = env::var("SNAPFLOW_MAX_FILES_TOTAL")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid SNAPFLOW_MAX_FILES_TOTAL: {}", e))?
            .unwrap_or(DEFAULT_MAX_FILES_TOTAL);

        let store_timeout_secs = env::var("SNAPFLOW_STORE_TIMEOUT_SECONDS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid SNAPFLOW_STORE_TIMEOUT_SECONDS: {}", e))?
            .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS);

        let policy = Self {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_content_types,
            max_files_total,
            store_timeout_secs,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("max_file_size_bytes must be greater than zero");
        }
        if self.allowed_content_types.is_empty() {
            anyhow::bail!("allowed_content_types must not be empty");
        }
        if self.max_files_total == 0 {
            anyhow::bail!("max_files_total must be greater than zero");
        }
        if self.store_timeout_secs == 0 {
            anyhow::bail!("store_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let normalized = content_type.to_lowercase();
        self.allowed_content_types.iter().any(|ct| ct == &normalized)
    }
}

/// Geometric policy for mapping a source image into a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the box completely, cropping overflow.
    #[default]
    Cover,
    /// Fit entirely inside the box, preserving aspect ratio.
    Contain,
    /// Stretch to the exact box dimensions.
    Fill,
}

impl FitMode {
    pub fn parse(s: &str) -> Result<Self, anyhow::Error> {
        match s.to_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "fill" => Ok(FitMode::Fill),
            _ => Err(anyhow::anyhow!("Invalid fit mode: {}", s)),
        }
    }
}

/// Options governing a single transcode: quality, bounding box, and optional
/// thumbnail derivation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Encoder quality, 1-100. Lower is smaller and blurrier.
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub fit_mode: FitMode,
    pub generate_thumbnail: bool,
    /// Bounding width for the thumbnail encode.
    pub thumbnail_width: u32,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_width: None,
            max_height: None,
            fit_mode: FitMode::default(),
            generate_thumbnail: false,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
        }
    }
}

impl TranscodeOptions {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.quality == 0 || self.quality > 100 {
            anyhow::bail!("quality must be in 1..=100, got {}", self.quality);
        }
        if self.thumbnail_width == 0 {
            anyhow::bail!("thumbnail_width must be greater than zero");
        }
        if matches!(self.max_width, Some(0)) || matches!(self.max_height, Some(0)) {
            anyhow::bail!("bounding box dimensions must be greater than zero");
        }
        Ok(())
    }

    /// Thumbnail quality derived from the primary quality, floored at 60.
    pub fn thumbnail_quality(&self) -> u8 {
        self.quality.saturating_sub(10).max(MIN_THUMBNAIL_QUALITY)
    }

    pub fn bounding_box(&self) -> Option<(Option<u32>, Option<u32>)> {
        if self.max_width.is_none() && self.max_height.is_none() {
            None
        } else {
            Some((self.max_width, self.max_height))
        }
    }
}
