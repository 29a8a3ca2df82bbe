//! Transcoder: raw image buffer in, web-delivery encode (plus optional
//! thumbnail) out.
//!
//! Pure function over its inputs: the source buffer is never mutated, and no
//! encoder state is shared, so concurrent invocations with independent
//! buffers are safe.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageReader};
use snapflow_core::{FitMode, TranscodeOptions};

use crate::image::{ImageEncoder, ImageResize, OutputFormat};

/// Transcode failure modes.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// The source bytes could not be decoded: corrupt data, or a format the
    /// declared MIME type lied about.
    #[error("Failed to decode source image: {0}")]
    DecodeFailed(String),

    /// The encoder rejected the resulting surface (e.g. zero-dimension
    /// geometry after resize).
    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// One encoded output buffer with its pixel geometry.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

/// The full transcode result: the primary encode and, when requested, an
/// independently derived thumbnail.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub primary: EncodedArtifact,
    pub thumbnail: Option<EncodedArtifact>,
}

pub struct Transcoder;

impl Transcoder {
    /// Transcode to the default web-delivery codec (WebP).
    pub fn encode(data: &[u8], opts: &TranscodeOptions) -> Result<EncodedImage, TranscodeError> {
        Self::encode_as(data, opts, OutputFormat::default())
    }

    /// Transcode to an explicit output codec.
    ///
    /// Decodes the source once; the primary encode goes through the bounding
    /// box (if any) with the configured fit mode, and the thumbnail is always
    /// derived from the *original* surface so its geometry is independent of
    /// the primary's.
    pub fn encode_as(
        data: &[u8],
        opts: &TranscodeOptions,
        format: OutputFormat,
    ) -> Result<EncodedImage, TranscodeError> {
        let img = Self::decode(data)?;

        let primary_surface = match opts.bounding_box() {
            Some((max_width, max_height)) => {
                ImageResize::fit_within(&img, max_width, max_height, opts.fit_mode)
            }
            None => img.clone(),
        };
        let (width, height) = primary_surface.dimensions();
        let bytes = ImageEncoder::encode(&primary_surface, format, opts.quality)?;

        tracing::debug!(
            width = width,
            height = height,
            original_bytes = data.len(),
            encoded_bytes = bytes.len(),
            format = format.to_mime_type(),
            quality = opts.quality,
            "Primary encode complete"
        );

        let primary = EncodedArtifact { bytes, width, height };

        let thumbnail = if opts.generate_thumbnail {
            Some(Self::encode_thumbnail(&img, opts, format)?)
        } else {
            None
        };

        Ok(EncodedImage { primary, thumbnail })
    }

    fn decode(data: &[u8]) -> Result<DynamicImage, TranscodeError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?
            .decode()
            .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))
    }

    fn encode_thumbnail(
        img: &DynamicImage,
        opts: &TranscodeOptions,
        format: OutputFormat,
    ) -> Result<EncodedArtifact, TranscodeError> {
        let surface =
            ImageResize::fit_within(img, Some(opts.thumbnail_width), None, FitMode::Cover);
        let (width, height) = surface.dimensions();
        let bytes = ImageEncoder::encode(&surface, format, opts.thumbnail_quality())?;

        tracing::debug!(
            width = width,
            height = height,
            encoded_bytes = bytes.len(),
            quality = opts.thumbnail_quality(),
            "Thumbnail encode complete"
        );

        Ok(EncodedArtifact { bytes, width, height })
    }
}
