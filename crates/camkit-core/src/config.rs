// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture flow configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::geometry::clamp_realtime_height;
use crate::types::{CaptureMode, EnhancementMode, FlashMode, OutputQuality};

/// Everything the host application configures for one capture flow.
///
/// Construct through [`CaptureConfig::new`], [`CaptureConfig::from_json`] or
/// `Default`; all three return normalized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Which workflow to run.
    pub mode: CaptureMode,
    /// Enhancement preset applied to every finished image.
    pub enhancement: EnhancementMode,
    /// Resize and compression policy.
    pub output_quality: OutputQuality,
    /// Offer importing from the photo library next to the shutter.
    pub allows_photo_library_import: bool,
    /// Route captured/imported images through the crop editor.
    pub allows_post_capture_cropping: bool,
    /// Run live rectangle detection and show its overlay.
    pub enable_live_detection_overlay: bool,
    /// Default overlay / crop height, as a fraction of the viewport.
    pub default_realtime_height: f64,
    /// Flash mode when the session starts.
    pub default_flash_mode: FlashMode,
    /// Opaque payload handed back to the host untouched.
    pub context: serde_json::Value,
}

impl CaptureConfig {
    pub const DEFAULT_REALTIME_HEIGHT: f64 = 0.6;

    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            ..Self::raw_default()
        }
        .normalized()
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    pub fn with_enhancement(mut self, enhancement: EnhancementMode) -> Self {
        self.enhancement = enhancement;
        self
    }

    pub fn with_output_quality(mut self, quality: OutputQuality) -> Self {
        self.output_quality = quality;
        self.normalized()
    }

    pub fn with_photo_library_import(mut self, allowed: bool) -> Self {
        self.allows_photo_library_import = allowed;
        self
    }

    pub fn with_post_capture_cropping(mut self, allowed: bool) -> Self {
        self.allows_post_capture_cropping = allowed;
        self.normalized()
    }

    pub fn with_live_detection_overlay(mut self, enabled: bool) -> Self {
        self.enable_live_detection_overlay = enabled;
        self
    }

    pub fn with_realtime_height(mut self, height: f64) -> Self {
        self.default_realtime_height = height;
        self.normalized()
    }

    pub fn with_flash_mode(mut self, flash: FlashMode) -> Self {
        self.default_flash_mode = flash;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Whether the live detection overlay is shown for this flow.
    pub fn shows_detection_overlay(&self) -> bool {
        self.mode == CaptureMode::RealTime || self.enable_live_detection_overlay
    }

    /// Bring every field back into its valid range.
    ///
    /// - non-positive `max_output_width` / target resolution → disabled
    /// - compression quality outside (0, 1] → clamped, default when unusable
    /// - `PhotoWithCrop` always crops
    /// - overlay height clamped into the slider range
    pub fn normalized(mut self) -> Self {
        let quality = &mut self.output_quality;

        if quality
            .max_output_width
            .is_some_and(|width| !(width.is_finite() && width > 0.0))
        {
            debug!(max_output_width = ?quality.max_output_width, "Disabling max output width");
            quality.max_output_width = None;
        }

        if quality.target_resolution.is_some_and(|target| {
            !(target.width.is_finite()
                && target.height.is_finite()
                && target.width > 0.0
                && target.height > 0.0)
        }) {
            debug!(target = ?quality.target_resolution, "Disabling target resolution");
            quality.target_resolution = None;
        }

        if !(quality.compression_quality.is_finite() && quality.compression_quality > 0.0) {
            quality.compression_quality = OutputQuality::DEFAULT_COMPRESSION;
        } else if quality.compression_quality > 1.0 {
            quality.compression_quality = 1.0;
        }

        if self.mode == CaptureMode::PhotoWithCrop {
            self.allows_post_capture_cropping = true;
        }

        self.default_realtime_height = clamp_realtime_height(self.default_realtime_height);
        self
    }

    fn raw_default() -> Self {
        Self {
            mode: CaptureMode::default(),
            enhancement: EnhancementMode::default(),
            output_quality: OutputQuality::default(),
            allows_photo_library_import: false,
            allows_post_capture_cropping: false,
            enable_live_detection_overlay: false,
            default_realtime_height: Self::DEFAULT_REALTIME_HEIGHT,
            default_flash_mode: FlashMode::default(),
            context: serde_json::Value::Null,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::raw_default().normalized()
    }
}
