// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// camkit — Core types, geometry, crop editing, and error definitions shared
// across all crates.

pub mod config;
pub mod crop;
pub mod error;
pub mod geometry;
pub mod human_errors;
pub mod types;

pub use config::CaptureConfig;
pub use crop::{Corner, CropEditor};
pub use error::{CaptureError, CaptureErrorKind};
pub use types::*;
