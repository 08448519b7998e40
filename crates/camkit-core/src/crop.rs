// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop editor — holds one normalized crop rectangle and applies drag and
// per-corner resize gestures while keeping it inside the unit square and
// above the minimum crop size.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{MIN_CROP_SIZE, NormalizedPoint, NormalizedRect};

/// Crop handle, indexed the way the overlay lays them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Where this handle sits on `rect`.
    pub fn position(self, rect: &NormalizedRect) -> NormalizedPoint {
        match self {
            Self::TopLeft => NormalizedPoint::new(rect.min_x(), rect.min_y()),
            Self::TopRight => NormalizedPoint::new(rect.max_x(), rect.min_y()),
            Self::BottomLeft => NormalizedPoint::new(rect.min_x(), rect.max_y()),
            Self::BottomRight => NormalizedPoint::new(rect.max_x(), rect.max_y()),
        }
    }
}

impl TryFrom<u8> for Corner {
    type Error = u8;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::TopLeft),
            1 => Ok(Self::TopRight),
            2 => Ok(Self::BottomLeft),
            3 => Ok(Self::BottomRight),
            other => Err(other),
        }
    }
}

/// Stateful crop geometry engine.
///
/// The editor owns a single rect in normalized coordinates. Two gestures
/// mutate it: whole-rect translation (relative to a snapshot taken when the
/// drag began) and independent corner resizing. After every call the rect
/// satisfies `0 <= x`, `0 <= y`, `x + width <= 1`, `y + height <= 1` and both
/// extents are at least `MIN_CROP_SIZE`.
#[derive(Debug, Clone)]
pub struct CropEditor {
    current: NormalizedRect,
    drag_baseline: Option<NormalizedRect>,
    default_rect: NormalizedRect,
}

impl CropEditor {
    pub fn new(default_rect: NormalizedRect) -> Self {
        let default_rect = sanitize(default_rect);
        Self {
            current: default_rect,
            drag_baseline: None,
            default_rect,
        }
    }

    pub fn rect(&self) -> NormalizedRect {
        self.current
    }

    pub fn default_rect(&self) -> NormalizedRect {
        self.default_rect
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_baseline.is_some()
    }

    /// Move the whole rect by `delta` (normalized) relative to where it was
    /// when the current drag began. Size never changes. A non-finite delta
    /// is ignored.
    pub fn translate(&mut self, delta: NormalizedPoint) {
        if !delta.x.is_finite() || !delta.y.is_finite() {
            debug!(?delta, "Ignoring non-finite crop drag");
            return;
        }
        let base = *self.drag_baseline.get_or_insert(self.current);
        let x = (base.x + delta.x).clamp(0.0, 1.0 - base.width);
        let y = (base.y + delta.y).clamp(0.0, 1.0 - base.height);
        self.current = NormalizedRect::new(x, y, base.width, base.height);
    }

    /// Finish a drag gesture.
    pub fn end_translate(&mut self) {
        self.drag_baseline = None;
    }

    /// Drag one corner handle to `point` (normalized). Only the two edges that
    /// meet at the corner move; the opposite edges stay put. A moving edge is
    /// held inside [0, 1] and at least `MIN_CROP_SIZE` away from its fixed
    /// opposite edge, so dragging past the opposite side pins the rect at the
    /// minimum size instead of inverting it.
    pub fn resize_corner(&mut self, corner: Corner, point: NormalizedPoint) {
        let rect = self.current;
        let (min_x, max_x) = (rect.min_x(), rect.max_x());
        let (min_y, max_y) = (rect.min_y(), rect.max_y());

        let (left, right) = match corner {
            Corner::TopLeft | Corner::BottomLeft => (leading_edge(point.x, max_x), max_x),
            Corner::TopRight | Corner::BottomRight => (min_x, trailing_edge(point.x, min_x)),
        };
        let (top, bottom) = match corner {
            Corner::TopLeft | Corner::TopRight => (leading_edge(point.y, max_y), max_y),
            Corner::BottomLeft | Corner::BottomRight => (min_y, trailing_edge(point.y, min_y)),
        };

        self.current = NormalizedRect::from_edges(left, top, right, bottom);
        debug!(?corner, rect = ?self.current, "Crop corner adjusted");
    }

    /// Restore the default rect.
    pub fn reset(&mut self) {
        self.reset_to(self.default_rect);
    }

    /// Replace the rect unconditionally, sanitized so the invariants hold.
    pub fn reset_to(&mut self, rect: NormalizedRect) {
        self.current = sanitize(rect);
        self.drag_baseline = None;
    }
}

/// Left or top edge: not below 0, not within `MIN_CROP_SIZE` of the far edge.
fn leading_edge(target: f64, fixed_far: f64) -> f64 {
    target.min(fixed_far - MIN_CROP_SIZE).max(0.0)
}

/// Right or bottom edge: not above 1, not within `MIN_CROP_SIZE` of the near
/// edge.
fn trailing_edge(target: f64, fixed_near: f64) -> f64 {
    target.min(1.0).max(fixed_near + MIN_CROP_SIZE)
}

/// Standardize, grow to the minimum size, and shift inside the unit square.
fn sanitize(rect: NormalizedRect) -> NormalizedRect {
    let rect = rect.standardized();
    let width = rect.width.clamp(MIN_CROP_SIZE, 1.0);
    let height = rect.height.clamp(MIN_CROP_SIZE, 1.0);
    let x = rect.x.clamp(0.0, 1.0 - width);
    let y = rect.y.clamp(0.0, 1.0 - height);
    NormalizedRect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn editor() -> CropEditor {
        CropEditor::new(NormalizedRect::new(0.1, 0.2, 0.8, 0.6))
    }

    fn assert_invariants(rect: NormalizedRect) {
        assert!(
            rect.is_within_unit(MIN_CROP_SIZE, EPS),
            "rect violates invariants: {rect:?}"
        );
    }

    #[test]
    fn corner_index_round_trips() {
        for corner in Corner::ALL {
            assert_eq!(Corner::try_from(corner as u8), Ok(corner));
        }
        assert_eq!(Corner::try_from(4), Err(4));
    }

    #[test]
    fn translate_is_relative_to_drag_start() {
        let mut editor = editor();
        editor.translate(NormalizedPoint::new(0.05, 0.0));
        editor.translate(NormalizedPoint::new(0.05, 0.1));
        let rect = editor.rect();
        assert!((rect.x - 0.15).abs() < EPS);
        assert!((rect.y - 0.3).abs() < EPS);
        assert!(editor.is_dragging());

        editor.end_translate();
        editor.translate(NormalizedPoint::new(-0.05, 0.0));
        assert!((editor.rect().x - 0.1).abs() < EPS);
    }

    #[test]
    fn non_finite_drag_leaves_rect_alone() {
        let mut editor = editor();
        let before = editor.rect();
        editor.translate(NormalizedPoint::new(f64::NAN, 0.1));
        editor.translate(NormalizedPoint::new(0.0, f64::INFINITY));
        editor.translate(NormalizedPoint::new(f64::NEG_INFINITY, f64::NAN));
        assert_eq!(editor.rect(), before);
        assert!(!editor.is_dragging());

        editor.translate(NormalizedPoint::new(0.05, 0.0));
        assert!((editor.rect().x - (before.x + 0.05)).abs() < EPS);
    }

    #[test]
    fn translate_clamps_inside_unit_square() {
        let mut editor = editor();
        editor.translate(NormalizedPoint::new(5.0, -5.0));
        let rect = editor.rect();
        assert!((rect.x - 0.2).abs() < EPS);
        assert!(rect.y.abs() < EPS);
        assert!((rect.width - 0.8).abs() < EPS);
        assert!((rect.height - 0.6).abs() < EPS);
        assert_invariants(rect);
    }

    #[test]
    fn top_left_moves_only_its_edges() {
        let mut editor = editor();
        editor.resize_corner(Corner::TopLeft, NormalizedPoint::new(0.3, 0.4));
        let rect = editor.rect();
        assert!((rect.x - 0.3).abs() < EPS);
        assert!((rect.y - 0.4).abs() < EPS);
        assert!((rect.max_x() - 0.9).abs() < EPS);
        assert!((rect.max_y() - 0.8).abs() < EPS);
    }

    #[test]
    fn bottom_right_clamps_to_unit_square() {
        let mut editor = editor();
        editor.resize_corner(Corner::BottomRight, NormalizedPoint::new(1.4, 1.2));
        let rect = editor.rect();
        assert!((rect.max_x() - 1.0).abs() < EPS);
        assert!((rect.max_y() - 1.0).abs() < EPS);
        assert!((rect.x - 0.1).abs() < EPS);
        assert!((rect.y - 0.2).abs() < EPS);
    }

    #[test]
    fn dragging_past_opposite_edge_pins_minimum_size() {
        let mut editor = editor();
        editor.resize_corner(Corner::TopRight, NormalizedPoint::new(0.0, 1.0));
        let rect = editor.rect();
        assert!((rect.x - 0.1).abs() < EPS);
        assert!((rect.width - MIN_CROP_SIZE).abs() < EPS);
        assert!((rect.max_y() - 0.8).abs() < EPS);
        assert!((rect.height - MIN_CROP_SIZE).abs() < EPS);
        assert_invariants(rect);
    }

    #[test]
    fn corner_drag_sequences_never_shrink_below_minimum() {
        let mut editor = editor();
        let targets = [
            (-3.0, -3.0),
            (2.0, 2.0),
            (0.5, 0.5),
            (0.0, 1.0),
            (1.0, 0.0),
            (0.95, 0.95),
            (0.02, 0.98),
            (0.5, -0.5),
            (0.999, 0.001),
        ];
        for round in 0..5 {
            for (i, &(x, y)) in targets.iter().enumerate() {
                let corner = Corner::ALL[(i + round) % 4];
                editor.resize_corner(corner, NormalizedPoint::new(x, y));
                assert_invariants(editor.rect());
                editor.translate(NormalizedPoint::new(x - 0.5, y - 0.5));
                assert_invariants(editor.rect());
                editor.end_translate();
            }
        }
    }

    #[test]
    fn reset_restores_default_and_sanitizes() {
        let mut editor = editor();
        editor.resize_corner(Corner::BottomLeft, NormalizedPoint::new(0.5, 0.3));
        editor.reset();
        assert_eq!(editor.rect(), NormalizedRect::new(0.1, 0.2, 0.8, 0.6));

        editor.reset_to(NormalizedRect::new(0.95, 0.5, -0.01, 0.9));
        assert_invariants(editor.rect());
    }
}
