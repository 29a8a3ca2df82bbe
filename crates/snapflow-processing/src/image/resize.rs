//! Bounded resize with fit-mode semantics and a without-enlargement policy.

use image::{DynamicImage, GenericImageView};
use snapflow_core::FitMode;

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> image::imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            image::imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            image::imageops::FilterType::CatmullRom
        } else {
            image::imageops::FilterType::Lanczos3
        }
    }

    /// Aspect-preserving dimensions for a single bounded axis.
    fn scale_to_width(orig_width: u32, orig_height: u32, width: u32) -> (u32, u32) {
        let aspect_ratio = orig_height as f32 / orig_width as f32;
        let height = (width as f32 * aspect_ratio).round() as u32;
        (width, height.max(1))
    }

    fn scale_to_height(orig_width: u32, orig_height: u32, height: u32) -> (u32, u32) {
        let aspect_ratio = orig_width as f32 / orig_height as f32;
        let width = (height as f32 * aspect_ratio).round() as u32;
        (width.max(1), height)
    }

    /// Resize `img` into the bounding box according to the fit mode, never
    /// enlarging beyond the source dimensions.
    ///
    /// If the source already fits inside the box (or no effective downscale is
    /// required), the image is returned unchanged. With a single bounded axis
    /// the resize is always aspect-preserving, whatever the fit mode; with
    /// both axes bounded, `Cover` fills and crops, `Contain` fits within, and
    /// `Fill` stretches to the exact (clamped) box.
    pub fn fit_within(
        img: &DynamicImage,
        max_width: Option<u32>,
        max_height: Option<u32>,
        fit: FitMode,
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();

        let target_width = max_width.unwrap_or(orig_width);
        let target_height = max_height.unwrap_or(orig_height);

        // Without-enlargement policy: a box at least as large as the source
        // on every bounded axis means no work.
        if target_width >= orig_width && target_height >= orig_height {
            return img.clone();
        }

        match (max_width, max_height) {
            (Some(width), None) => {
                let (w, h) = Self::scale_to_width(orig_width, orig_height, width);
                let filter = Self::select_filter(orig_width, orig_height, w, h);
                img.resize_exact(w, h, filter)
            }
            (None, Some(height)) => {
                let (w, h) = Self::scale_to_height(orig_width, orig_height, height);
                let filter = Self::select_filter(orig_width, orig_height, w, h);
                img.resize_exact(w, h, filter)
            }
            (Some(_), Some(_)) => {
                // Clamp to the source so cropping fit modes cannot upscale the
                // shorter axis.
                let box_width = target_width.min(orig_width);
                let box_height = target_height.min(orig_height);
                let filter = Self::select_filter(orig_width, orig_height, box_width, box_height);
                match fit {
                    FitMode::Cover => img.resize_to_fill(box_width, box_height, filter),
                    FitMode::Contain => img.resize(box_width, box_height, filter),
                    FitMode::Fill => img.resize_exact(box_width, box_height, filter),
                }
            }
            (None, None) => img.clone(),
        }
    }
}
