// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// camkit-image — Raster handling for the camkit capture pipeline.
//
// Provides image assets with orientation metadata, a chainable image
// processor (orientation, contrast, grayscale, resampling, JPEG round trip),
// the finishing pipeline that turns captured stills into delivered images,
// and a software rectangle detector used where no native detector exists.

pub mod asset;
pub mod detect;
pub mod finisher;
pub mod processor;

// Re-export the primary structs so callers can use `camkit_image::ImageFinisher` etc.
pub use asset::{ImageAsset, ImageOrientation, VideoFrame};
pub use detect::SoftwareRectangleDetector;
pub use finisher::{FinishedImages, ImageFinisher};
pub use processor::ImageProcessor;
