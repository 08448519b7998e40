// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the capabilities the capture flow
// needs from the host OS.
//
// Every method is synchronous and may block (permission prompts, sensor
// exposure, modal pickers). Callers run them off the async executor.

use std::sync::Arc;

use camkit_core::error::Result;
use camkit_core::types::{CameraPosition, DetectionOptions, FlashMode, RectangleObservation};
use camkit_image::{ImageAsset, ImageOrientation, VideoFrame};

/// Unified bridge that groups all native capabilities.
///
/// Platforms that lack a capability return
/// `CaptureError::PlatformUnavailable` from it.
pub trait CaptureBridge:
    PermissionProvider
    + SessionDevice
    + RectangleDetector
    + DocumentScanner
    + ImageImporter
    + Send
    + Sync
{
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Ask the user for access to protected resources.
pub trait PermissionProvider {
    /// Resolve camera authorization, prompting if undetermined.
    fn request_camera_access(&self) -> bool;

    /// Resolve photo library authorization, prompting if undetermined.
    fn request_photo_library_access(&self) -> bool;
}

/// Receives preview frames while the session runs. Implementations must not
/// block; frames they cannot take are dropped.
pub trait FrameSink: Send + Sync {
    fn offer(&self, frame: VideoFrame);
}

/// What the session learned about the attached camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub position: CameraPosition,
    pub flash_available: bool,
    /// Orientation the sensor delivers stills in.
    pub orientation: ImageOrientation,
}

/// Settings for a single still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillSettings {
    /// Effective flash mode. `Off` when the device has no flash.
    pub flash: FlashMode,
}

/// The camera capture session.
pub trait SessionDevice {
    /// Attach the camera at `position` as the session input, replacing any
    /// current input.
    fn attach_input(&self, position: CameraPosition) -> Result<DeviceInfo>;

    /// Remove the current input, if any.
    fn detach_input(&self);

    /// Start the preview. When `sink` is given, preview frames are offered to
    /// it.
    fn start_running(&self, sink: Option<Arc<dyn FrameSink>>) -> Result<()>;

    fn stop_running(&self);

    /// Take one still and return it with its orientation metadata.
    fn capture_still(&self, settings: &StillSettings) -> Result<ImageAsset>;
}

/// Finds rectangles in a preview frame.
pub trait RectangleDetector {
    /// Bounding boxes are in unit space, origin bottom-left, y up.
    fn detect(
        &self,
        frame: &VideoFrame,
        options: &DetectionOptions,
    ) -> Result<Vec<RectangleObservation>>;
}

/// The system document scanner UI.
pub trait DocumentScanner {
    /// Present the scanner. `Ok(None)` when the user cancelled.
    fn scan(&self) -> Result<Option<Vec<ImageAsset>>>;
}

/// The system photo picker.
pub trait ImageImporter {
    /// Present the picker allowing at most `selection_limit` images
    /// (0 = unlimited). `Ok(None)` when the user cancelled.
    fn pick_images(&self, selection_limit: usize) -> Result<Option<Vec<ImageAsset>>>;
}
