// THEORY:
// `DetectionBox` is the externally visible unit of the whole engine: an
// axis-aligned rectangle in source-image pixels, a class label and a confidence.
// The shape filter produces them, the box merger grows and de-duplicates them, and
// the rendering side draws them. Its serialized form is the wire contract
// `{x, y, w, h, label, confidence}`.
//
// Every box keeps `w > 0` and `h > 0`, which is what keeps `iou` free of a zero
// denominator.

use serde::{Deserialize, Serialize};

/// Label given to every box produced by the grid heuristic.
pub const POTHOLE_LABEL: &str = "Pothole";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub label: String,
    pub confidence: f64,
}

impl DetectionBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64, label: impl Into<String>, confidence: f64) -> Self {
        debug_assert!(w > 0.0 && h > 0.0, "detection boxes must have positive size");
        Self {
            x,
            y,
            w,
            h,
            label: label.into(),
            confidence,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Intersection-over-union with `other`, in [0, 1]. Disjoint boxes score 0.
    pub fn iou(&self, other: &DetectionBox) -> f64 {
        let x_a = self.x.max(other.x);
        let y_a = self.y.max(other.y);
        let x_b = self.right().min(other.right());
        let y_b = self.bottom().min(other.bottom());

        let inter_area = (x_b - x_a).max(0.0) * (y_b - y_a).max(0.0);
        inter_area / (self.area() + other.area() - inter_area)
    }

    /// Grows this box to the smallest rectangle covering both boxes.
    /// Label and confidence stay those of `self`.
    pub fn union_with(&mut self, other: &DetectionBox) {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = self.right().max(other.right());
        let max_y = self.bottom().max(other.bottom());

        self.x = min_x;
        self.y = min_y;
        self.w = max_x - min_x;
        self.h = max_y - min_y;
    }

    /// The caption drawn next to the box, e.g. `"POTHOLE 92%"`.
    pub fn overlay_label(&self) -> String {
        format!(
            "{} {}%",
            self.label.to_uppercase(),
            (self.confidence * 100.0).round() as i64
        )
    }
}

/// Dashboard figures for one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub count: usize,
    /// `None` when nothing was detected.
    pub mean_confidence: Option<f64>,
}

impl DetectionSummary {
    pub fn from_boxes(boxes: &[DetectionBox]) -> Self {
        let mean_confidence = if boxes.is_empty() {
            None
        } else {
            Some(boxes.iter().map(|b| b.confidence).sum::<f64>() / boxes.len() as f64)
        };
        Self {
            count: boxes.len(),
            mean_confidence,
        }
    }
}
