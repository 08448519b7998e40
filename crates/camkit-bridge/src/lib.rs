// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// camkit-bridge — Native capability abstractions for the capture flow.
//
// Defines the traits the orchestrator drives (permissions, camera session,
// rectangle detector, document scanner, photo picker) and selects the
// implementation for the target platform. Hosts with native SDK access
// supply their own `CaptureBridge` to the orchestrator.

use std::sync::Arc;

pub mod stub;
pub mod traits;

pub use stub::StubBridge;
pub use traits::{
    CaptureBridge, DeviceInfo, DocumentScanner, FrameSink, ImageImporter, PermissionProvider,
    RectangleDetector, SessionDevice, StillSettings,
};

/// The built-in bridge for the current platform.
///
/// Desktop and CI builds get [`StubBridge`]: rectangle detection works in
/// software, every device-backed capability reports `PlatformUnavailable`.
pub fn platform_bridge() -> Arc<dyn CaptureBridge> {
    Arc::new(StubBridge::new())
}
