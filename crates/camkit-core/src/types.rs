// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the camkit capture pipeline.

use serde::{Deserialize, Serialize};

/// Smallest width/height a crop rectangle may shrink to while editing.
pub const MIN_CROP_SIZE: f64 = 0.1;

/// Smallest width/height used when clamping a rect before pixel cropping.
pub const MIN_PIXEL_CROP_SIZE: f64 = 0.01;

/// A rectangle in 0–1 fractional coordinates relative to a reference frame
/// (the live overlay viewport or the source image).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const UNIT: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rect from two opposite edges on each axis, in any order.
    pub fn from_edges(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1).standardized()
    }

    pub fn min_x(&self) -> f64 {
        self.x.min(self.x + self.width)
    }

    pub fn max_x(&self) -> f64 {
        self.x.max(self.x + self.width)
    }

    pub fn min_y(&self) -> f64 {
        self.y.min(self.y + self.height)
    }

    pub fn max_y(&self) -> f64 {
        self.y.max(self.y + self.height)
    }

    pub fn area(&self) -> f64 {
        (self.width * self.height).abs()
    }

    /// Same rectangle with non-negative width and height. Negative extents
    /// are flipped by swapping the bounds on that axis.
    pub fn standardized(&self) -> Self {
        Self {
            x: self.min_x(),
            y: self.min_y(),
            width: self.width.abs(),
            height: self.height.abs(),
        }
    }

    /// Whether the rect lies inside the unit square and is at least
    /// `min_size` on each axis, allowing `tolerance` for float error.
    pub fn is_within_unit(&self, min_size: f64, tolerance: f64) -> bool {
        self.width >= 0.0
            && self.height >= 0.0
            && self.x >= -tolerance
            && self.y >= -tolerance
            && self.x + self.width <= 1.0 + tolerance
            && self.y + self.height <= 1.0 + tolerance
            && self.width >= min_size - tolerance
            && self.height >= min_size - tolerance
    }
}

/// A point, either normalized (0–1) or in viewport space depending on use.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width/height pair in points or pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A rectangle in viewport or pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// One rectangle candidate reported by a detector.
///
/// `bounding_box` is in the detector's own unit space: origin bottom-left,
/// y increasing upward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectangleObservation {
    pub bounding_box: NormalizedRect,
    pub confidence: f32,
}

/// Filters applied inside a rectangle detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionOptions {
    /// Smallest accepted short-side / long-side ratio.
    pub minimum_aspect_ratio: f32,
    /// Largest accepted short-side / long-side ratio.
    pub maximum_aspect_ratio: f32,
    pub minimum_confidence: f32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            minimum_aspect_ratio: 0.3,
            maximum_aspect_ratio: 1.0,
            minimum_confidence: 0.5,
        }
    }
}

/// The live overlay signal: the best rectangle of the latest sampled frame in
/// overlay space, or `None` when nothing was detected.
pub type DetectionResult = Option<NormalizedRect>;

/// Output resolution in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: f64,
    pub height: f64,
}

impl Resolution {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Output-quality profile governing the finishing pipeline's resize and
/// compression steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputQuality {
    /// Downscale so the output fits inside this resolution.
    pub target_resolution: Option<Resolution>,
    /// JPEG compression quality in (0, 1].
    pub compression_quality: f32,
    /// Downscale so the output is no wider than this. Takes priority over
    /// `target_resolution`.
    pub max_output_width: Option<f64>,
}

impl OutputQuality {
    pub const DEFAULT_COMPRESSION: f32 = 0.85;

    /// Work out the output size for a `width` x `height` source, or `None`
    /// when no resize is needed.
    ///
    /// Max width wins when it is set and exceeded. Otherwise the target
    /// resolution applies, and it only ever downscales.
    pub fn resolve_target_size(&self, width: f64, height: f64) -> Option<Size> {
        if let Some(max_width) = self.max_output_width.filter(|max| *max > 0.0) {
            if width > max_width {
                let scale = max_width / width;
                return Some(Size::new(max_width, height * scale));
            }
        }

        if let Some(target) = self.target_resolution {
            if target.width > 0.0 && target.height > 0.0 && width > 0.0 && height > 0.0 {
                let scale = (target.width / width)
                    .min(target.height / height)
                    .min(1.0);
                if scale < 1.0 {
                    return Some(Size::new(width * scale, height * scale));
                }
            }
        }

        None
    }

    /// Compression quality as a JPEG encoder setting (1–100).
    pub fn jpeg_quality(&self) -> u8 {
        (self.compression_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for OutputQuality {
    fn default() -> Self {
        Self {
            target_resolution: None,
            compression_quality: Self::DEFAULT_COMPRESSION,
            max_output_width: None,
        }
    }
}

/// Image enhancement presets applied uniformly to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementMode {
    None,
    #[default]
    Auto,
    Grayscale,
}

/// Workflow the capture flow follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Plain still capture.
    #[default]
    Photo,
    /// Still capture that always routes through the crop editor.
    PhotoWithCrop,
    /// Still capture with the live detection overlay always on.
    RealTime,
    /// Platform document scanner; bypasses detection and cropping.
    Scan,
}

impl CaptureMode {
    pub fn uses_document_scanner(&self) -> bool {
        matches!(self, Self::Scan)
    }
}

/// Flash setting for still captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Auto,
    On,
    Off,
}

impl FlashMode {
    /// Cycle auto → on → off → auto.
    pub fn next(self) -> Self {
        match self {
            Self::Auto => Self::On,
            Self::On => Self::Off,
            Self::Off => Self::Auto,
        }
    }
}

/// Which physical camera to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Front,
    Back,
}

impl CameraPosition {
    pub fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Lifecycle states of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureSessionState {
    /// Not started, stopped, or dismissed after a terminal error.
    #[default]
    Idle,
    /// Permission request and device configuration in flight.
    Starting,
    /// Preview running, ready to capture.
    Running,
    /// A still capture is in flight.
    Capturing,
    /// Waiting for the user to commit or cancel a crop.
    AwaitingCrop,
    /// The finishing pipeline is running.
    Processing,
}

impl CaptureSessionState {
    /// Whether one of the mutually exclusive capture/crop/process operations
    /// is in progress.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Capturing | Self::AwaitingCrop | Self::Processing
        )
    }

    /// Guarded transition table. Stopping (`-> Idle`) is always allowed.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use CaptureSessionState::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Starting)
                | (Starting, Running)
                | (Running, Capturing)
                | (Running, AwaitingCrop)
                | (Running, Processing)
                | (Capturing, Running)
                | (Capturing, AwaitingCrop)
                | (Capturing, Processing)
                | (AwaitingCrop, Running)
                | (AwaitingCrop, Processing)
                | (Processing, Running)
        )
    }
}
