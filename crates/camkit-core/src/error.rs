// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for camkit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all camkit operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    // -- Flow errors surfaced to the host application --
    #[error("camera access was denied")]
    PermissionDenied,

    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("still capture failed: {0}")]
    CaptureFailed(String),

    #[error("image processing failed: {0}")]
    ProcessingFailed(String),

    #[error("photo library unavailable")]
    PhotoLibraryUnavailable,

    #[error("document scanner unavailable")]
    ScannerUnavailable,

    // -- Image errors --
    #[error("image operation failed: {0}")]
    Image(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// The typed error handed to the host application alongside a
/// human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    CaptureFailed,
    ProcessingFailed,
    PhotoLibraryUnavailable,
    ScannerUnavailable,
}

impl CaptureError {
    /// Collapse this error into the kind the caller receives.
    ///
    /// Ambient failures (I/O, decoding, bridge plumbing) surface as
    /// `ProcessingFailed`; a missing platform capability reads as an
    /// unavailable device.
    pub fn kind(&self) -> CaptureErrorKind {
        match self {
            Self::PermissionDenied => CaptureErrorKind::PermissionDenied,
            Self::DeviceUnavailable(_) | Self::PlatformUnavailable => {
                CaptureErrorKind::DeviceUnavailable
            }
            Self::CaptureFailed(_) => CaptureErrorKind::CaptureFailed,
            Self::PhotoLibraryUnavailable => CaptureErrorKind::PhotoLibraryUnavailable,
            Self::ScannerUnavailable => CaptureErrorKind::ScannerUnavailable,
            Self::ProcessingFailed(_)
            | Self::Image(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Bridge(_) => CaptureErrorKind::ProcessingFailed,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CaptureError>;
