// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry helpers — rectangle normalization, unit-square clamping, and
// conversion between an image's pixel space, a viewport, and 0–1 relative
// coordinates.

use crate::types::{MIN_PIXEL_CROP_SIZE, NormalizedPoint, NormalizedRect, PixelRect, Size};

/// Range of the live-overlay height slider.
pub const REALTIME_HEIGHT_RANGE: (f64, f64) = (0.3, 0.95);

/// Map a normalized rect into the pixel coordinates of a viewport.
pub fn to_overlay_space(rect: NormalizedRect, viewport: Size) -> PixelRect {
    PixelRect::new(
        rect.x * viewport.width,
        rect.y * viewport.height,
        rect.width * viewport.width,
        rect.height * viewport.height,
    )
}

/// Clamp a rect into the unit square before pixel cropping.
///
/// The origin is clamped into [0, 1] first; each extent is then limited to
/// the space left in the square with a floor of `MIN_PIXEL_CROP_SIZE`, so the
/// result never has zero area. Applying this twice gives the same rect as
/// applying it once.
pub fn constrain_to_unit_square(rect: NormalizedRect) -> NormalizedRect {
    let x = rect.x.clamp(0.0, 1.0);
    let y = rect.y.clamp(0.0, 1.0);
    NormalizedRect {
        x,
        y,
        width: rect.width.min(1.0 - x).max(MIN_PIXEL_CROP_SIZE),
        height: rect.height.min(1.0 - y).max(MIN_PIXEL_CROP_SIZE),
    }
}

/// The letterboxed frame an aspect-fit image occupies inside `viewport`.
///
/// Returns `PixelRect::ZERO` when either size has no area.
pub fn aspect_fit_frame(image: Size, viewport: Size) -> PixelRect {
    if image.is_empty() || viewport.is_empty() {
        return PixelRect::ZERO;
    }
    let scale = (viewport.width / image.width).min(viewport.height / image.height);
    let width = image.width * scale;
    let height = image.height * scale;
    PixelRect::new(
        (viewport.width - width) / 2.0,
        (viewport.height - height) / 2.0,
        width,
        height,
    )
}

/// Convert a viewport-space point into coordinates relative to a displayed
/// image frame, clamped to [0, 1].
///
/// A frame with zero area maps every point to the origin.
pub fn map_point_into_image_frame(point: NormalizedPoint, frame: PixelRect) -> NormalizedPoint {
    if !frame.has_area() {
        return NormalizedPoint::ZERO;
    }
    NormalizedPoint::new(
        ((point.x - frame.x) / frame.width).clamp(0.0, 1.0),
        ((point.y - frame.y) / frame.height).clamp(0.0, 1.0),
    )
}

/// Inverse of [`map_point_into_image_frame`] for points inside the frame:
/// image-relative coordinates back to viewport space.
pub fn map_point_from_image_frame(normalized: NormalizedPoint, frame: PixelRect) -> NormalizedPoint {
    NormalizedPoint::new(
        frame.x + normalized.x * frame.width,
        frame.y + normalized.y * frame.height,
    )
}

/// Flip a detector rect (origin bottom-left, y up) into overlay space
/// (origin top-left, y down). X and both extents pass through unchanged.
pub fn detector_to_overlay(rect: NormalizedRect) -> NormalizedRect {
    NormalizedRect {
        x: rect.x,
        y: 1.0 - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

/// Clamp an overlay height into the slider range.
pub fn clamp_realtime_height(height: f64) -> f64 {
    if height.is_nan() {
        return REALTIME_HEIGHT_RANGE.0;
    }
    height.clamp(REALTIME_HEIGHT_RANGE.0, REALTIME_HEIGHT_RANGE.1)
}

/// Initial crop rect for a given overlay height: 80% wide, horizontally
/// centred, vertically centred but at least 5% from the top.
pub fn default_crop_rect(height: f64) -> NormalizedRect {
    let height = clamp_realtime_height(height);
    NormalizedRect::new(0.1, ((1.0 - height) / 2.0).max(0.05), 0.8, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn overlay_space_scales_componentwise() {
        let rect = NormalizedRect::new(0.1, 0.2, 0.5, 0.25);
        let px = to_overlay_space(rect, Size::new(400.0, 800.0));
        assert_eq!(px, PixelRect::new(40.0, 160.0, 200.0, 200.0));
    }

    #[test]
    fn constrain_clamps_origin_then_size() {
        let rect = constrain_to_unit_square(NormalizedRect::new(-0.5, 0.7, 2.0, 0.6));
        assert!(close(rect.x, 0.0));
        assert!(close(rect.y, 0.7));
        assert!(close(rect.width, 1.0));
        assert!(close(rect.height, 0.3));
    }

    #[test]
    fn constrain_never_returns_zero_area() {
        let rect = constrain_to_unit_square(NormalizedRect::new(1.0, 1.0, 0.0, -3.0));
        assert!(close(rect.width, MIN_PIXEL_CROP_SIZE));
        assert!(close(rect.height, MIN_PIXEL_CROP_SIZE));
    }

    #[test]
    fn constrain_is_idempotent() {
        let samples = [
            NormalizedRect::new(0.2, 0.3, 0.4, 0.5),
            NormalizedRect::new(-1.0, -1.0, 5.0, 5.0),
            NormalizedRect::new(1.5, 0.99, 0.5, 0.5),
            NormalizedRect::new(0.999, 0.0, 0.0, 0.0),
            NormalizedRect::new(0.5, 0.5, -0.2, 0.001),
            NormalizedRect::new(1.0, 1.0, 1.0, 1.0),
        ];
        for rect in samples {
            let once = constrain_to_unit_square(rect);
            let twice = constrain_to_unit_square(once);
            assert_eq!(once, twice, "not idempotent for {rect:?}");
        }
    }

    #[test]
    fn aspect_fit_letterboxes_wide_image() {
        let frame = aspect_fit_frame(Size::new(2000.0, 1000.0), Size::new(400.0, 800.0));
        assert!(close(frame.x, 0.0));
        assert!(close(frame.width, 400.0));
        assert!(close(frame.height, 200.0));
        assert!(close(frame.y, 300.0));
    }

    #[test]
    fn degenerate_frame_maps_to_origin() {
        let frame = aspect_fit_frame(Size::new(0.0, 100.0), Size::new(400.0, 800.0));
        assert_eq!(frame, PixelRect::ZERO);
        let mapped = map_point_into_image_frame(NormalizedPoint::new(120.0, 40.0), frame);
        assert_eq!(mapped, NormalizedPoint::ZERO);
    }

    #[test]
    fn points_outside_frame_clamp_to_unit() {
        let frame = PixelRect::new(0.0, 300.0, 400.0, 200.0);
        let above = map_point_into_image_frame(NormalizedPoint::new(-20.0, 10.0), frame);
        assert_eq!(above, NormalizedPoint::new(0.0, 0.0));
        let below = map_point_into_image_frame(NormalizedPoint::new(500.0, 790.0), frame);
        assert_eq!(below, NormalizedPoint::new(1.0, 1.0));
    }

    #[test]
    fn mapping_back_and_forth_is_identity() {
        let frames = [
            aspect_fit_frame(Size::new(2000.0, 1000.0), Size::new(390.0, 844.0)),
            aspect_fit_frame(Size::new(3024.0, 4032.0), Size::new(1024.0, 768.0)),
            PixelRect::new(13.5, 7.25, 0.5, 1200.0),
        ];
        for frame in frames {
            for i in 0..=10 {
                for j in 0..=10 {
                    let point = NormalizedPoint::new(i as f64 / 10.0, j as f64 / 10.0);
                    let viewport = map_point_from_image_frame(point, frame);
                    let back = map_point_into_image_frame(viewport, frame);
                    assert!(
                        (back.x - point.x).abs() < 1e-9 && (back.y - point.y).abs() < 1e-9,
                        "{point:?} -> {viewport:?} -> {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn detector_rect_flips_vertically() {
        let rect = detector_to_overlay(NormalizedRect::new(0.2, 0.1, 0.5, 0.3));
        assert!(close(rect.x, 0.2));
        assert!(close(rect.y, 0.6));
        assert!(close(rect.width, 0.5));
        assert!(close(rect.height, 0.3));
    }

    #[test]
    fn default_crop_rect_is_centred() {
        let rect = default_crop_rect(0.6);
        assert!(close(rect.x, 0.1));
        assert!(close(rect.y, 0.2));
        assert!(close(rect.width, 0.8));
        assert!(close(rect.height, 0.6));

        let tall = default_crop_rect(2.0);
        assert!(close(tall.height, 0.95));
        assert!(close(tall.y, 0.05));
    }
}
