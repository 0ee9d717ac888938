// THEORY:
// The `ShapeFilter` decides which blobs look like potholes. Noise, lane markings,
// shadows of poles and sparse texture all produce blobs too; three cheap geometric
// tests reject most of them:
// 1.  **Size**: the blob must hold more than `min_size / GRID_SIZE` cells.
// 2.  **Aspect ratio**: strictly between `min_aspect_ratio` and `max_aspect_ratio`,
//     which drops long thin strips such as cracks and painted lines.
// 3.  **Solidity**: the cells must cover more than `min_solidity` of their bounding
//     rectangle, which drops sprawling, noise-like regions.
//
// The limits are empirical. They live in `ShapeLimits` with the historical values
// as defaults so they can be tuned without touching the filter.
//
// The confidence attached to an accepted blob is not a probability: the heuristic
// has no model to ask. It comes from a `ConfidenceScorer`, which defaults to a
// uniform draw in [0.85, 0.95) for display and can be swapped for a deterministic
// scorer.

use crate::core_modules::detection_box::{DetectionBox, POTHOLE_LABEL};
use crate::core_modules::occupancy_grid::GRID_SIZE;
use crate::core_modules::smart_blob::Blob;
use crate::error::{DetectorError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lower end of the confidence range reported for heuristic detections.
pub const CONFIDENCE_FLOOR: f64 = 0.85;
/// Width of the confidence range; scores stay below `FLOOR + SPAN`.
pub const CONFIDENCE_SPAN: f64 = 0.1;

/// Tunable acceptance limits for blobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeLimits {
    /// Exclusive lower bound on width / height.
    pub min_aspect_ratio: f64,
    /// Exclusive upper bound on width / height.
    pub max_aspect_ratio: f64,
    /// Exclusive lower bound on blob area / bounding area.
    pub min_solidity: f64,
    /// Share of dark pixels a tile needs before its cell counts as occupied.
    pub dark_cell_fraction: f64,
}

impl Default for ShapeLimits {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 3.0,
            min_solidity: 0.4,
            dark_cell_fraction: 0.4,
        }
    }
}

impl ShapeLimits {
    /// Rejects limits no blob could meaningfully be tested against.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_aspect_ratio > 0.0) {
            return Err(DetectorError::InvalidParameter {
                name: "min_aspect_ratio",
                value: self.min_aspect_ratio,
                range: "(0, max_aspect_ratio)",
            });
        }
        if !(self.max_aspect_ratio > self.min_aspect_ratio) {
            return Err(DetectorError::InvalidParameter {
                name: "max_aspect_ratio",
                value: self.max_aspect_ratio,
                range: "(min_aspect_ratio, inf)",
            });
        }
        if !(0.0..1.0).contains(&self.min_solidity) {
            return Err(DetectorError::InvalidParameter {
                name: "min_solidity",
                value: self.min_solidity,
                range: "[0, 1)",
            });
        }
        if !(0.0..1.0).contains(&self.dark_cell_fraction) {
            return Err(DetectorError::InvalidParameter {
                name: "dark_cell_fraction",
                value: self.dark_cell_fraction,
                range: "[0, 1)",
            });
        }
        Ok(())
    }
}

/// Produces the confidence attached to an accepted blob.
pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, blob: &Blob) -> f64;
}

/// Uniform random confidence in `[0.85, 0.95)`. Display only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedConfidence;

impl ConfidenceScorer for SimulatedConfidence {
    fn score(&self, _blob: &Blob) -> f64 {
        rand::rng().random_range(CONFIDENCE_FLOOR..CONFIDENCE_FLOOR + CONFIDENCE_SPAN)
    }
}

/// Deterministic confidence in `[0.85, 0.95)` that rises with solidity.
#[derive(Debug, Clone, Copy)]
pub struct SolidityConfidence {
    /// Solidity mapped to the bottom of the range.
    pub min_solidity: f64,
}

impl Default for SolidityConfidence {
    fn default() -> Self {
        Self {
            min_solidity: ShapeLimits::default().min_solidity,
        }
    }
}

impl ConfidenceScorer for SolidityConfidence {
    fn score(&self, blob: &Blob) -> f64 {
        let span = (1.0 - self.min_solidity).max(f64::EPSILON);
        let normalized = ((blob.solidity() - self.min_solidity) / span).clamp(0.0, 1.0);
        // 0.999 keeps a perfectly solid blob under the exclusive upper bound.
        CONFIDENCE_FLOOR + CONFIDENCE_SPAN * 0.999 * normalized
    }
}

/// The same confidence for every blob.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f64);

impl ConfidenceScorer for FixedConfidence {
    fn score(&self, _blob: &Blob) -> f64 {
        self.0
    }
}

/// Accepts or rejects blobs against a set of `ShapeLimits`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeFilter {
    pub limits: ShapeLimits,
}

impl ShapeFilter {
    pub fn new(limits: ShapeLimits) -> Self {
        Self { limits }
    }

    /// Whether `blob` passes the size, aspect ratio and solidity tests.
    /// `min_size` is in pixels.
    pub fn accepts(&self, blob: &Blob, min_size: f64) -> bool {
        let aspect_ratio = blob.aspect_ratio();
        blob.cell_count as f64 > min_size / GRID_SIZE as f64
            && aspect_ratio > self.limits.min_aspect_ratio
            && aspect_ratio < self.limits.max_aspect_ratio
            && blob.solidity() > self.limits.min_solidity
    }

    /// Turns an accepted blob into a candidate box, or `None` when rejected.
    pub fn evaluate(
        &self,
        blob: &Blob,
        min_size: f64,
        scorer: &dyn ConfidenceScorer,
    ) -> Option<DetectionBox> {
        if !self.accepts(blob, min_size) {
            return None;
        }

        Some(DetectionBox::new(
            blob.pixel_x(),
            blob.pixel_y(),
            blob.pixel_width(),
            blob.pixel_height(),
            POTHOLE_LABEL,
            scorer.score(blob),
        ))
    }
}
