// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — the raster operations behind the finishing pipeline:
// enhancement presets, resampling, pixel cropping and the JPEG round trip.

use std::io::Cursor;

use camkit_core::error::{CaptureError, Result};
use camkit_core::types::PixelRect;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tracing::{debug, instrument};

/// Contrast boost applied by the auto-enhance preset.
pub const AUTO_CONTRAST: f32 = 1.1;

/// Raster pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns the transformed processor, so
/// steps chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(img)
///     .adjust_contrast(1.1)
///     .resize_exact(1000, 500)
///     .to_jpeg_bytes(85)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Resample to exactly `width` x `height` with Lanczos3.
    #[instrument(skip(self))]
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            "Resizing image"
        );
        let resized = self
            .image
            .resize_exact(width.max(1), height.max(1), FilterType::Lanczos3);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Cut out `rect` (pixels, top-left origin). The rect is expanded to
    /// whole pixels and clamped to the image bounds; `None` when nothing of
    /// it lies inside the image.
    #[instrument(skip(self))]
    pub fn crop(self, rect: PixelRect) -> Option<Self> {
        let img_w = f64::from(self.image.width());
        let img_h = f64::from(self.image.height());

        let left = rect.x.floor().clamp(0.0, img_w);
        let top = rect.y.floor().clamp(0.0, img_h);
        let right = (rect.x + rect.width).ceil().clamp(left, img_w);
        let bottom = (rect.y + rect.height).ceil().clamp(top, img_h);

        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            debug!("Crop rect lies outside the image");
            return None;
        }

        debug!(left, top, width, height, "Cropping image");
        Some(Self {
            image: self.image.crop_imm(left as u32, top as u32, width, height),
        })
    }

    /// Full desaturation.
    pub fn grayscale(self) -> Self {
        Self {
            image: self.image.grayscale(),
        }
    }

    /// Scale each colour channel's distance from mid-grey by `factor`.
    /// Values > 1.0 increase contrast; alpha is untouched.
    #[instrument(skip(self))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let rgba = self.image.to_rgba8();

        let contrasted = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let adjust = |channel: u8| -> u8 {
                let val = factor * (f32::from(channel) - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            Rgba([adjust(r), adjust(g), adjust(b), a])
        });

        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    /// Encode as JPEG at `quality` (1-100) and decode the result, so the
    /// raster carries the compression the host will see on disk.
    #[instrument(skip(self))]
    pub fn jpeg_round_trip(self, quality: u8) -> Result<Self> {
        self.compress_jpeg(quality).map(|(processor, _)| processor)
    }

    /// Like [`jpeg_round_trip`](Self::jpeg_round_trip), but also returns the
    /// encoded bytes the new raster was decoded from.
    pub fn compress_jpeg(self, quality: u8) -> Result<(Self, Vec<u8>)> {
        let bytes = self.to_jpeg_bytes(quality)?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(|err| CaptureError::Image(format!("JPEG decoding failed: {err}")))?;
        debug!(bytes = bytes.len(), "JPEG round trip complete");
        Ok((Self { image }, bytes))
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|err| CaptureError::Image(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Encode as JPEG with the given quality (1-100). Alpha is dropped.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        let result = match &self.image {
            DynamicImage::ImageLuma8(luma) => luma.write_with_encoder(encoder),
            other => other.to_rgb8().write_with_encoder(encoder),
        };
        result.map_err(|err| CaptureError::Image(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}
