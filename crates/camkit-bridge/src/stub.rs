// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no camera SDK is available.
//
// Permissions are never granted and device-backed capabilities return
// `PlatformUnavailable`. Rectangle detection runs the software detector.

use std::sync::Arc;

use camkit_core::error::{CaptureError, Result};
use camkit_core::types::{CameraPosition, DetectionOptions, RectangleObservation};
use camkit_image::{ImageAsset, SoftwareRectangleDetector, VideoFrame};

use crate::traits::*;

/// Bridge returned on platforms without native capture support.
#[derive(Debug, Default)]
pub struct StubBridge {
    detector: SoftwareRectangleDetector,
}

impl StubBridge {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl PermissionProvider for StubBridge {
    fn request_camera_access(&self) -> bool {
        tracing::warn!("PermissionProvider::request_camera_access called on stub bridge");
        false
    }

    fn request_photo_library_access(&self) -> bool {
        tracing::warn!("PermissionProvider::request_photo_library_access called on stub bridge");
        false
    }
}

impl SessionDevice for StubBridge {
    fn attach_input(&self, _position: CameraPosition) -> Result<DeviceInfo> {
        tracing::warn!("SessionDevice::attach_input called on stub bridge");
        Err(CaptureError::PlatformUnavailable)
    }

    fn detach_input(&self) {}

    fn start_running(&self, _sink: Option<Arc<dyn FrameSink>>) -> Result<()> {
        tracing::warn!("SessionDevice::start_running called on stub bridge");
        Err(CaptureError::PlatformUnavailable)
    }

    fn stop_running(&self) {}

    fn capture_still(&self, _settings: &StillSettings) -> Result<ImageAsset> {
        tracing::warn!("SessionDevice::capture_still called on stub bridge");
        Err(CaptureError::PlatformUnavailable)
    }
}

impl RectangleDetector for StubBridge {
    fn detect(
        &self,
        frame: &VideoFrame,
        options: &DetectionOptions,
    ) -> Result<Vec<RectangleObservation>> {
        Ok(self.detector.detect_frame(frame, options))
    }
}

impl DocumentScanner for StubBridge {
    fn scan(&self) -> Result<Option<Vec<ImageAsset>>> {
        tracing::warn!("DocumentScanner::scan called on stub bridge");
        Err(CaptureError::PlatformUnavailable)
    }
}

impl ImageImporter for StubBridge {
    fn pick_images(&self, _selection_limit: usize) -> Result<Option<Vec<ImageAsset>>> {
        tracing::warn!("ImageImporter::pick_images called on stub bridge");
        Err(CaptureError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camkit_core::error::CaptureErrorKind;
    use image::{DynamicImage, GrayImage, Luma};

    use super::*;

    #[test]
    fn permissions_are_never_granted() {
        let bridge = StubBridge::new();
        assert!(!bridge.request_camera_access());
        assert!(!bridge.request_photo_library_access());
    }

    #[test]
    fn device_reads_as_unavailable() {
        let bridge = StubBridge::new();
        let err = bridge.attach_input(CameraPosition::Back).unwrap_err();
        assert_eq!(err.kind(), CaptureErrorKind::DeviceUnavailable);
        assert!(bridge.scan().is_err());
        assert!(bridge.pick_images(1).is_err());
    }

    #[test]
    fn detector_runs_in_software() {
        let bridge = crate::platform_bridge();
        let frame = VideoFrame::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 48, Luma([128u8]))),
            Duration::ZERO,
        );
        let found = bridge
            .detect(&frame, &DetectionOptions::default())
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(bridge.platform_name(), "Desktop (stub)");
    }
}
