// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// camkit-session — Runs the capture flow on tokio.
//
// The orchestrator owns the session state machine and talks to the platform
// through `camkit-bridge` capabilities. Device work is serialized on a
// session queue, live detection runs on its own worker, and finished images
// reach the host as `CaptureEvent`s.

pub mod detection;
pub mod orchestrator;
pub mod queue;

pub use detection::{DETECTION_INTERVAL, DetectionSampler, DetectionWorker};
pub use orchestrator::{CaptureEvent, CaptureOrchestrator};
pub use queue::SessionQueue;
