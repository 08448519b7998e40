// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Software rectangle detector — finds the dominant document-like rectangle in
// a frame with Canny edges and a Hough line transform. Used where the
// platform has no native rectangle detector, and by the CLI.

use camkit_core::types::{DetectionOptions, NormalizedRect, RectangleObservation};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument, trace};

use crate::asset::VideoFrame;

/// A detected quad must cover at least this share of the frame.
const MIN_QUAD_AREA_FRACTION: f32 = 0.10;

/// Edge pixels this close to the quad outline count as support.
const SUPPORT_RADIUS: i64 = 2;

/// Edge-and-line rectangle detector.
///
/// Frames are downscaled so their longest side is at most `max_dimension`
/// before edge detection; results are in unit coordinates and do not depend
/// on the input resolution.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareRectangleDetector {
    max_dimension: u32,
    blur_sigma: f32,
    canny_low: f32,
    canny_high: f32,
}

impl Default for SoftwareRectangleDetector {
    fn default() -> Self {
        Self {
            max_dimension: 320,
            blur_sigma: 2.0,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl SoftwareRectangleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(32);
        self
    }

    pub fn detect_frame(
        &self,
        frame: &VideoFrame,
        options: &DetectionOptions,
    ) -> Vec<RectangleObservation> {
        self.detect(&frame.pixels, options)
    }

    /// Detect rectangle candidates in `image`.
    ///
    /// Bounding boxes use the detector convention: unit square, origin
    /// bottom-left, y up. Candidates outside the options' aspect-ratio range
    /// or below its minimum confidence are dropped.
    #[instrument(skip_all, fields(w = image.width(), h = image.height()))]
    pub fn detect(
        &self,
        image: &DynamicImage,
        options: &DetectionOptions,
    ) -> Vec<RectangleObservation> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }

        let working = if image.width().max(image.height()) > self.max_dimension {
            image.resize(self.max_dimension, self.max_dimension, FilterType::Triangle)
        } else {
            image.clone()
        };
        let (width, height) = (working.width(), working.height());

        let gray = working.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.blur_sigma);
        let edges = canny(&blurred, self.canny_low, self.canny_high);

        let Some(corners) = find_quad(&edges) else {
            return Vec::new();
        };

        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let (w, h) = (width as f32, height as f32);
        let left = min_x.clamp(0.0, w);
        let right = max_x.clamp(0.0, w);
        let top = min_y.clamp(0.0, h);
        let bottom = max_y.clamp(0.0, h);
        let (box_w, box_h) = (right - left, bottom - top);
        if box_w <= 0.0 || box_h <= 0.0 {
            return Vec::new();
        }

        let aspect = box_w.min(box_h) / box_w.max(box_h);
        let confidence = edge_support(&edges, &corners);
        debug!(aspect, confidence, "Rectangle candidate");

        if aspect < options.minimum_aspect_ratio
            || aspect > options.maximum_aspect_ratio
            || confidence < options.minimum_confidence
        {
            return Vec::new();
        }

        // Image rows grow downward; the detector's unit space grows upward.
        let bounding_box = NormalizedRect::new(
            f64::from(left / w),
            f64::from(1.0 - bottom / h),
            f64::from(box_w / w),
            f64::from(box_h / h),
        );
        vec![RectangleObservation {
            bounding_box,
            confidence,
        }]
    }
}

/// Locate the outermost horizontal and vertical edge lines and return their
/// four intersections as `[top_left, top_right, bottom_right, bottom_left]`.
fn find_quad(edges: &GrayImage) -> Option<[(f32, f32); 4]> {
    let (width, height) = edges.dimensions();
    let diagonal = (f64::from(width).powi(2) + f64::from(height).powi(2)).sqrt();
    let vote_threshold = (diagonal * 0.25).max(40.0) as u32;
    let lines = detect_lines(
        edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    );
    trace!(line_count = lines.len(), vote_threshold, "Hough lines");

    let (horizontal, vertical) = classify_lines(&lines);
    if horizontal.len() < 2 || vertical.len() < 2 {
        return None;
    }

    let centre = (width as f32 / 2.0, height as f32 / 2.0);
    let by_row = |line: &PolarLine| row_at(line, centre.0);
    let by_col = |line: &PolarLine| column_at(line, centre.1);

    let top = extreme(&horizontal, by_row, false)?;
    let bottom = extreme(&horizontal, by_row, true)?;
    let left = extreme(&vertical, by_col, false)?;
    let right = extreme(&vertical, by_col, true)?;

    let corners = [
        intersect_polar_lines(&top, &left)?,
        intersect_polar_lines(&top, &right)?,
        intersect_polar_lines(&bottom, &right)?,
        intersect_polar_lines(&bottom, &left)?,
    ];

    let area = shoelace_area(&corners);
    if area < width as f32 * height as f32 * MIN_QUAD_AREA_FRACTION {
        debug!(area, "Quad too small");
        return None;
    }
    Some(corners)
}

/// Split lines into roughly horizontal and roughly vertical sets. A polar
/// line's angle is that of its normal, so a horizontal line sits near 90°.
fn classify_lines(lines: &[PolarLine]) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for line in lines {
        let angle = line.angle_in_degrees;
        if (60..=120).contains(&angle) {
            horizontal.push(*line);
        } else if angle <= 30 || angle >= 150 {
            vertical.push(*line);
        }
    }

    (horizontal, vertical)
}

/// The line with the smallest (or largest) position under `key`.
fn extreme(
    lines: &[PolarLine],
    key: impl Fn(&PolarLine) -> f32,
    largest: bool,
) -> Option<PolarLine> {
    let cmp = |a: &&PolarLine, b: &&PolarLine| key(a).total_cmp(&key(b));
    let found = if largest {
        lines.iter().max_by(cmp)
    } else {
        lines.iter().min_by(cmp)
    };
    found.copied()
}

/// y where a roughly horizontal line crosses column `x`.
fn row_at(line: &PolarLine, x: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - x * theta.cos()) / theta.sin()
}

/// x where a roughly vertical line crosses row `y`.
fn column_at(line: &PolarLine, y: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - y * theta.sin()) / theta.cos()
}

/// Intersection of two lines in Hough form `x·cos θ + y·sin θ = r`, or
/// `None` when they are (nearly) parallel.
fn intersect_polar_lines(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let theta_a = f64::from(a.angle_in_degrees).to_radians();
    let theta_b = f64::from(b.angle_in_degrees).to_radians();
    let (sin_a, cos_a) = theta_a.sin_cos();
    let (sin_b, cos_b) = theta_b.sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (f64::from(a.r), f64::from(b.r));
    let x = (r_a * sin_b - r_b * sin_a) / denom;
    let y = (r_b * cos_a - r_a * cos_b) / denom;
    Some((x as f32, y as f32))
}

fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let mut area = 0.0f32;
    for i in 0..corners.len() {
        let j = (i + 1) % corners.len();
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

/// Fraction of points sampled along the quad outline that have an edge pixel
/// within `SUPPORT_RADIUS`.
fn edge_support(edges: &GrayImage, corners: &[(f32, f32); 4]) -> f32 {
    let (width, height) = (i64::from(edges.width()), i64::from(edges.height()));
    let has_edge_near = |x: f32, y: f32| {
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        (-SUPPORT_RADIUS..=SUPPORT_RADIUS).any(|dy| {
            (-SUPPORT_RADIUS..=SUPPORT_RADIUS).any(|dx| {
                let (px, py) = (cx + dx, cy + dy);
                px >= 0
                    && py >= 0
                    && px < width
                    && py < height
                    && edges.get_pixel(px as u32, py as u32)[0] > 0
            })
        })
    };

    let mut samples = 0u32;
    let mut hits = 0u32;
    for i in 0..corners.len() {
        let (x0, y0) = corners[i];
        let (x1, y1) = corners[(i + 1) % corners.len()];
        let steps = ((x1 - x0).hypot(y1 - y0).ceil() as u32).max(1);
        for step in 0..steps {
            let t = step as f32 / steps as f32;
            samples += 1;
            if has_edge_near(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t) {
                hits += 1;
            }
        }
    }

    if samples == 0 {
        0.0
    } else {
        hits as f32 / samples as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn card(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> DynamicImage {
        let (x0, y0, x1, y1) = rect;
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([240u8])
            } else {
                Luma([30u8])
            }
        }))
    }

    fn assert_near(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.02,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn finds_bright_card_on_dark_background() {
        let image = card(320, 240, (48, 40, 272, 200));
        let found = SoftwareRectangleDetector::new().detect(&image, &DetectionOptions::default());
        assert_eq!(found.len(), 1);

        let rect = found[0].bounding_box;
        assert_near(rect.x, 0.15);
        assert_near(rect.width, 0.7);
        assert_near(rect.height, 2.0 / 3.0);
        // Symmetric vertically, so the flip leaves y unchanged.
        assert_near(rect.y, 1.0 / 6.0);
        assert!(found[0].confidence >= 0.5);
    }

    #[test]
    fn result_is_resolution_independent() {
        let image = card(640, 480, (96, 80, 544, 400));
        let found = SoftwareRectangleDetector::new().detect(&image, &DetectionOptions::default());
        assert_eq!(found.len(), 1);
        assert_near(found[0].bounding_box.x, 0.15);
        assert_near(found[0].bounding_box.width, 0.7);
    }

    #[test]
    fn off_centre_card_flips_to_bottom_left_origin() {
        // Card in the upper part of the frame: small top-left y, large
        // bottom-left y.
        let image = card(320, 240, (40, 24, 280, 144));
        let found = SoftwareRectangleDetector::new().detect(&image, &DetectionOptions::default());
        assert_eq!(found.len(), 1);
        let rect = found[0].bounding_box;
        assert_near(rect.y, 1.0 - 144.0 / 240.0);
        assert_near(rect.height, 0.5);
    }

    #[test]
    fn blank_frame_has_no_candidates() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([200u8])));
        let found = SoftwareRectangleDetector::new().detect(&image, &DetectionOptions::default());
        assert!(found.is_empty());
    }

    #[test]
    fn options_filter_candidates() {
        let image = card(320, 240, (48, 40, 272, 200));
        let detector = SoftwareRectangleDetector::new();

        let squares_only = DetectionOptions {
            minimum_aspect_ratio: 0.9,
            ..DetectionOptions::default()
        };
        assert!(detector.detect(&image, &squares_only).is_empty());

        let impossible = DetectionOptions {
            minimum_confidence: 1.01,
            ..DetectionOptions::default()
        };
        assert!(detector.detect(&image, &impossible).is_empty());
    }

    #[test]
    fn empty_image_is_ignored() {
        let image = DynamicImage::new_luma8(0, 0);
        assert!(
            SoftwareRectangleDetector::new()
                .detect(&image, &DetectionOptions::default())
                .is_empty()
        );
    }

    #[test]
    fn intersect_polar_lines_perpendicular() {
        let horizontal = PolarLine {
            r: 100.0,
            angle_in_degrees: 90,
        };
        let vertical = PolarLine {
            r: 50.0,
            angle_in_degrees: 0,
        };
        let (x, y) = intersect_polar_lines(&horizontal, &vertical).unwrap();
        assert!((x - 50.0).abs() < 0.5 && (y - 100.0).abs() < 0.5);

        let parallel = PolarLine {
            r: 80.0,
            angle_in_degrees: 0,
        };
        assert!(intersect_polar_lines(&vertical, &parallel).is_none());
    }

    #[test]
    fn classify_uses_normal_angle() {
        let lines = [
            PolarLine { r: 10.0, angle_in_degrees: 90 },
            PolarLine { r: 20.0, angle_in_degrees: 0 },
            PolarLine { r: 30.0, angle_in_degrees: 175 },
            PolarLine { r: 40.0, angle_in_degrees: 45 },
        ];
        let (horizontal, vertical) = classify_lines(&lines);
        assert_eq!(horizontal.len(), 1);
        assert_eq!(vertical.len(), 2);
    }

    #[test]
    fn shoelace_area_rectangle() {
        let corners = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)];
        assert!((shoelace_area(&corners) - 50.0).abs() < 1e-3);
    }
}
