// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Finishing pipeline — turns captured, imported or scanned stills into the
// images delivered to the host: orientation normalized, enhanced, resized to
// the quality profile and recompressed. Also performs the user's crop.

use camkit_core::config::CaptureConfig;
use camkit_core::error::{CaptureError, Result};
use camkit_core::geometry::{constrain_to_unit_square, to_overlay_space};
use camkit_core::types::{EnhancementMode, NormalizedRect, OutputQuality, Size};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use crate::asset::ImageAsset;
use crate::processor::{AUTO_CONTRAST, ImageProcessor};

/// The result of one finishing batch.
///
/// `processed[i]` is the finished form of `originals[i]`; `originals` hold
/// the orientation-normalized inputs before enhancement or resizing.
#[derive(Debug, Clone, Default)]
pub struct FinishedImages {
    pub processed: Vec<ImageAsset>,
    pub originals: Vec<ImageAsset>,
}

impl FinishedImages {
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

/// Applies an enhancement preset and an output-quality profile to batches of
/// images. Stateless apart from its settings, so one finisher can be shared.
#[derive(Debug, Clone, Copy)]
pub struct ImageFinisher {
    enhancement: EnhancementMode,
    quality: OutputQuality,
}

impl ImageFinisher {
    pub fn new(enhancement: EnhancementMode, quality: OutputQuality) -> Self {
        Self {
            enhancement,
            quality,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.enhancement, config.output_quality)
    }

    pub fn enhancement(&self) -> EnhancementMode {
        self.enhancement
    }

    pub fn quality(&self) -> &OutputQuality {
        &self.quality
    }

    /// Finish every image in order.
    ///
    /// An image whose orientation cannot be normalized aborts the whole batch
    /// with `ProcessingFailed`. Enhancement and recompression problems are
    /// not fatal: the image continues unenhanced or uncompressed.
    #[instrument(skip_all, fields(count = images.len(), enhancement = ?self.enhancement))]
    pub fn process(&self, images: Vec<ImageAsset>) -> Result<FinishedImages> {
        let mut finished = FinishedImages {
            processed: Vec::with_capacity(images.len()),
            originals: Vec::with_capacity(images.len()),
        };

        for (index, image) in images.into_iter().enumerate() {
            let (processed, original) = self.finish_one(image).map_err(|err| {
                warn!(index, error = %err, "Orientation normalization failed");
                CaptureError::ProcessingFailed(format!("image {index}: {err}"))
            })?;
            finished.processed.push(processed);
            finished.originals.push(original);
        }

        info!(count = finished.len(), "Images finished");
        Ok(finished)
    }

    /// Finish a single image, returning `(processed, original)`.
    fn finish_one(&self, image: ImageAsset) -> Result<(ImageAsset, ImageAsset)> {
        let scale = image.scale();
        let original = image.normalized_orientation()?;
        let pixels = original.clone().into_dynamic()?;

        let enhanced = match enhance(&pixels, self.enhancement) {
            Ok(enhanced) => enhanced,
            Err(err) => {
                warn!(error = %err, "Enhancement failed, keeping unenhanced image");
                pixels
            }
        };

        let finished = self.resample(enhanced, scale);
        Ok((finished.with_scale(scale), original))
    }

    /// Resize to the quality profile's target, then recompress at its
    /// compression quality. The asset keeps the compressed bytes. If
    /// recompression fails the resized raster is kept without any.
    fn resample(&self, image: DynamicImage, scale: f64) -> ImageAsset {
        let logical = Size::new(
            f64::from(image.width()) / scale,
            f64::from(image.height()) / scale,
        );

        let mut processor = ImageProcessor::from_dynamic(image);
        if let Some(target) = self.quality.resolve_target_size(logical.width, logical.height) {
            let width = (target.width * scale).round().max(1.0) as u32;
            let height = (target.height * scale).round().max(1.0) as u32;
            processor = processor.resize_exact(width, height);
        }

        let quality = self.quality.jpeg_quality();
        let before = processor.as_dynamic().clone();
        match processor.compress_jpeg(quality) {
            Ok((recompressed, bytes)) => {
                ImageAsset::from_compressed(recompressed.into_dynamic(), bytes)
            }
            Err(err) => {
                warn!(error = %err, quality, "Recompression failed, keeping resized image");
                ImageAsset::from_dynamic(before)
            }
        }
    }

    /// Crop `image` to `rect` (relative to the upright image, top-left
    /// origin).
    ///
    /// The rect is standardized and clamped into the unit square first, then
    /// expanded to whole pixels. The result is upright and keeps the source
    /// scale. `None` when the image has no decodable pixels or the rect
    /// covers none of them.
    #[instrument(skip(image))]
    pub fn crop(image: &ImageAsset, rect: NormalizedRect) -> Option<ImageAsset> {
        let scale = image.scale();
        let upright = match image.clone().normalized_orientation() {
            Ok(upright) => upright,
            Err(err) => {
                warn!(error = %err, "Cannot crop undecodable image");
                return None;
            }
        };
        let pixels = upright.into_dynamic().ok()?;
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }

        let rect = constrain_to_unit_square(rect.standardized());
        let pixel_rect = to_overlay_space(
            rect,
            Size::new(f64::from(pixels.width()), f64::from(pixels.height())),
        );
        let cropped = ImageProcessor::from_dynamic(pixels).crop(pixel_rect)?;
        debug!(
            width = cropped.width(),
            height = cropped.height(),
            "Crop applied"
        );
        Some(ImageAsset::from_dynamic(cropped.into_dynamic()).with_scale(scale))
    }
}

/// Apply an enhancement preset. Fails on an image with no pixels.
pub fn enhance(image: &DynamicImage, mode: EnhancementMode) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CaptureError::Image("cannot enhance an empty image".into()));
    }
    let processor = ImageProcessor::from_dynamic(image.clone());
    let out = match mode {
        EnhancementMode::None => processor,
        EnhancementMode::Auto => processor.adjust_contrast(AUTO_CONTRAST),
        EnhancementMode::Grayscale => processor.grayscale(),
    };
    Ok(out.into_dynamic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ImageOrientation;
    use camkit_core::types::Resolution;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32) -> ImageAsset {
        ImageAsset::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([120, 140, 160]),
        )))
    }

    fn quality(max_width: Option<f64>, target: Option<Resolution>) -> OutputQuality {
        OutputQuality {
            target_resolution: target,
            compression_quality: 0.85,
            max_output_width: max_width,
        }
    }

    #[test]
    fn max_width_halves_wide_image() {
        let finisher = ImageFinisher::new(EnhancementMode::None, quality(Some(1000.0), None));
        let out = finisher.process(vec![solid(2000, 1000)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.processed[0].pixel_dimensions(), Some((1000, 500)));
        assert_eq!(out.originals[0].pixel_dimensions(), Some((2000, 1000)));
    }

    #[test]
    fn target_resolution_only_downscales() {
        let target = Some(Resolution::new(400.0, 400.0));
        let finisher = ImageFinisher::new(EnhancementMode::None, quality(None, target));
        let out = finisher
            .process(vec![solid(800, 200), solid(300, 100)])
            .unwrap();
        assert_eq!(out.processed[0].pixel_dimensions(), Some((400, 100)));
        assert_eq!(out.processed[1].pixel_dimensions(), Some((300, 100)));
    }

    #[test]
    fn resize_works_in_points_for_scaled_assets() {
        let finisher = ImageFinisher::new(EnhancementMode::None, quality(Some(500.0), None));
        let asset = solid(2000, 1000).with_scale(2.0);
        let out = finisher.process(vec![asset]).unwrap();
        let processed = &out.processed[0];
        assert_eq!(processed.pixel_dimensions(), Some((1000, 500)));
        assert_eq!(processed.logical_size(), Some(Size::new(500.0, 250.0)));
    }

    #[test]
    fn originals_are_upright_and_unenhanced() {
        let finisher = ImageFinisher::new(EnhancementMode::Grayscale, OutputQuality::default());
        let asset = solid(40, 20).with_orientation(ImageOrientation::Left);
        let out = finisher.process(vec![asset]).unwrap();

        let original = &out.originals[0];
        assert!(original.orientation().is_upright());
        assert_eq!(original.pixel_dimensions(), Some((20, 40)));
        assert_eq!(
            original.as_dynamic().unwrap().to_rgb8().get_pixel(0, 0),
            &Rgb([120, 140, 160])
        );

        let processed = out.processed[0].as_dynamic().unwrap().to_rgb8();
        let Rgb([r, g, b]) = *processed.get_pixel(10, 10);
        assert!(r.abs_diff(g) <= 2 && g.abs_diff(b) <= 2, "not grey: {r},{g},{b}");
    }

    #[test]
    fn undecodable_image_fails_the_batch() {
        let finisher = ImageFinisher::new(EnhancementMode::Auto, OutputQuality::default());
        let bad = ImageAsset::from_encoded(vec![1u8, 2, 3], ImageOrientation::Right);
        let err = finisher.process(vec![solid(10, 10), bad]).unwrap_err();
        assert!(matches!(err, CaptureError::ProcessingFailed(_)));
    }

    #[test]
    fn empty_image_cannot_be_enhanced() {
        let empty = DynamicImage::new_rgb8(0, 0);
        assert!(enhance(&empty, EnhancementMode::Auto).is_err());
    }

    #[test]
    fn recompression_failure_keeps_raster() {
        // Baseline JPEG cannot encode a width above 65535.
        let finisher = ImageFinisher::new(EnhancementMode::None, OutputQuality::default());
        let out = finisher.process(vec![solid(70_000, 1)]).unwrap();
        assert_eq!(out.processed[0].pixel_dimensions(), Some((70_000, 1)));
        assert!(out.processed[0].compressed_jpeg().is_none());
    }

    #[test]
    fn processed_image_keeps_its_jpeg_bytes() {
        let finisher = ImageFinisher::new(EnhancementMode::Auto, quality(Some(100.0), None));
        let out = finisher.process(vec![solid(200, 100)]).unwrap();
        let processed = &out.processed[0];

        let bytes = processed.compressed_jpeg().expect("kept jpeg");
        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), processed.as_dynamic().unwrap().to_rgb8());
        assert!(out.originals[0].compressed_jpeg().is_none());
    }

    #[test]
    fn crop_uses_enclosing_pixels_and_keeps_scale() {
        let asset = solid(200, 100).with_scale(2.0);
        let cropped =
            ImageFinisher::crop(&asset, NormalizedRect::new(0.1, 0.2, 0.5, 0.5)).unwrap();
        assert_eq!(cropped.pixel_dimensions(), Some((100, 50)));
        assert_eq!(cropped.scale(), 2.0);
        assert!(cropped.orientation().is_upright());
    }

    #[test]
    fn crop_applies_orientation_first() {
        let asset = solid(200, 100).with_orientation(ImageOrientation::Right);
        let cropped =
            ImageFinisher::crop(&asset, NormalizedRect::new(0.0, 0.0, 1.0, 0.5)).unwrap();
        assert_eq!(cropped.pixel_dimensions(), Some((100, 100)));
    }

    #[test]
    fn crop_clamps_out_of_range_rects() {
        let asset = solid(100, 100);
        let cropped =
            ImageFinisher::crop(&asset, NormalizedRect::new(0.8, -0.5, 0.5, 2.0)).unwrap();
        assert_eq!(cropped.pixel_dimensions(), Some((20, 100)));
    }

    #[test]
    fn crop_without_pixels_is_none() {
        let bad = ImageAsset::from_encoded(vec![0u8; 4], ImageOrientation::Up);
        assert!(ImageFinisher::crop(&bad, NormalizedRect::UNIT).is_none());
        let empty = ImageAsset::from_dynamic(DynamicImage::new_rgb8(0, 0));
        assert!(ImageFinisher::crop(&empty, NormalizedRect::UNIT).is_none());
    }
}
