//! Lossy web-delivery encoders (WebP primary, JPEG fallback).

use bytes::Bytes;
use image::DynamicImage;

use crate::transcoder::TranscodeError;

/// Output codec for encoded artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, TranscodeError> {
        match s.to_lowercase().as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            _ => Err(TranscodeError::EncodeFailed(format!(
                "Unsupported output format: {}",
                s
            ))),
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Stateless image encoder. Holds no shared mutable encoder state, so it is
/// safe to call from multiple tasks with independent surfaces.
pub struct ImageEncoder;

impl ImageEncoder {
    /// Encode a pixel surface at the given quality (1-100).
    pub fn encode(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Bytes, TranscodeError> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(TranscodeError::EncodeFailed(format!(
                "Invalid geometry: {}x{}",
                width, height
            )));
        }

        match format {
            OutputFormat::WebP => Self::encode_webp(img, quality),
            OutputFormat::Jpeg => Self::encode_jpeg(img, quality),
        }
    }

    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, TranscodeError> {
        let (width, height) = (img.width(), img.height());
        let rgba = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, TranscodeError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| TranscodeError::EncodeFailed(e.to_string()))?;
        comp.write_scanlines(&rgb)
            .map_err(|e| TranscodeError::EncodeFailed(e.to_string()))?;
        let jpeg_data = comp
            .finish()
            .map_err(|e| TranscodeError::EncodeFailed(e.to_string()))?;

        Ok(Bytes::from(jpeg_data))
    }
}
