// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the host application's alerts.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the host presents it; whether the flow is dismissed is
// decided by the orchestrator at the point of failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CaptureError, CaptureErrorKind};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// A retry may well succeed (e.g. capture the shot again).
    Transient,
    /// User must do something (grant access in Settings, pick another image).
    ActionRequired,
    /// Cannot be fixed by retrying on this device.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanError {
    /// Plain English summary (shown as the alert title).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether re-invoking the same action is worth offering.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// A typed failure as delivered to the host: the error kind, its
/// human-readable form, and the technical detail for logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFailure {
    pub id: Uuid,
    pub kind: CaptureErrorKind,
    pub human: HumanError,
    pub detail: String,
    /// The flow was torn down as a result (permission or device failures).
    pub dismisses_flow: bool,
    pub occurred_at: DateTime<Utc>,
}

impl CaptureFailure {
    pub fn new(err: &CaptureError, dismisses_flow: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: err.kind(),
            human: humanize_error(err),
            detail: err.to_string(),
            dismisses_flow,
            occurred_at: Utc::now(),
        }
    }
}

/// Convert a `CaptureError` into a `HumanError` anyone can act on.
pub fn humanize_error(err: &CaptureError) -> HumanError {
    match err {
        // -- Flow errors --
        CaptureError::PermissionDenied => HumanError {
            message: "The camera can't be used.".into(),
            suggestion: "Allow camera access for this app in Settings, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CaptureError::DeviceUnavailable(_) | CaptureError::PlatformUnavailable => HumanError {
            message: "The camera isn't available right now.".into(),
            suggestion: "Close other apps that might be using the camera, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CaptureError::CaptureFailed(_) => HumanError {
            message: "The photo couldn't be taken.".into(),
            suggestion: "Hold the device steady and press the shutter again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CaptureError::ProcessingFailed(_) | CaptureError::Image(_) => HumanError {
            message: "The image couldn't be processed.".into(),
            suggestion: "Try taking the photo again, or pick a different image.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CaptureError::PhotoLibraryUnavailable => HumanError {
            message: "Your photo library can't be opened.".into(),
            suggestion: "Allow photo library access for this app in Settings, or take a new photo instead.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CaptureError::ScannerUnavailable => HumanError {
            message: "Document scanning isn't available on this device.".into(),
            suggestion: "Take a regular photo of the document instead.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Storage --
        CaptureError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The image file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing an image.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        CaptureError::Serialization(_) => HumanError {
            message: "The camera settings couldn't be read.".into(),
            suggestion: "This is a problem in the app. Please report it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Platform --
        CaptureError::Bridge(_) => HumanError {
            message: "A device-specific feature didn't work.".into(),
            suggestion: "Try restarting the app. Some features may not be available on all devices.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_action_required() {
        let human = humanize_error(&CaptureError::PermissionDenied);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn capture_failure_is_retriable() {
        let human = humanize_error(&CaptureError::CaptureFailed("sensor busy".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn missing_file_is_action_required() {
        let err = CaptureError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn failure_pairs_kind_with_message() {
        let err = CaptureError::ProcessingFailed("truncated JPEG".into());
        let failure = CaptureFailure::new(&err, false);
        assert_eq!(failure.kind, CaptureErrorKind::ProcessingFailed);
        assert_eq!(failure.human, humanize_error(&err));
        assert!(failure.detail.contains("truncated JPEG"));
        assert!(!failure.dismisses_flow);
    }
}
