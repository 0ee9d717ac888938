// THEORY:
// The `pipeline` module is the top-level API for the detector. It wires the
// stages into a single pass and hides them behind two entry points:
//
// - `detect`: the pure grid heuristic. Pixel buffer in, merged boxes out. All
//   tunables arrive as arguments; nothing is read from shared state.
// - `PotholeDetector`: owns a configuration, a confidence scorer and, optionally,
//   a loaded `ModelBackend`, and dispatches each call to whichever backend is
//   active. Loading a model switches to it; a failing model never takes the
//   heuristic path down with it.
//
// Data flows one way through the heuristic:
//   PixelBuffer -> OccupancyGrid -> Vec<Blob> -> candidate boxes -> merged boxes

use crate::backend::ModelBackend;
use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::box_merger::{DEFAULT_IOU_THRESHOLD, merge_boxes};
use crate::core_modules::grid_manager::GridManager;
use crate::core_modules::pixel::pixel::PixelBuffer;
use crate::core_modules::shape_filter::{ConfidenceScorer, ShapeFilter, SimulatedConfidence};
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};

// Re-export key data structures for the public API.
pub use crate::core_modules::detection_box::{DetectionBox, DetectionSummary};
pub use crate::core_modules::shape_filter::ShapeLimits;

/// The two user-facing tunables of the heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// 0-100; maps linearly to the luminance cutoff `sensitivity * 2.55`.
    pub sensitivity: f64,
    /// 10-100 pixels; blobs need more than `min_size / 10` cells.
    pub min_size: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            sensitivity: 45.0,
            min_size: 20.0,
        }
    }
}

impl DetectionParams {
    pub fn new(sensitivity: f64, min_size: f64) -> Self {
        Self {
            sensitivity,
            min_size,
        }
    }

    /// Rejects values outside the ranges the tunables are defined for.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.sensitivity) {
            return Err(DetectorError::InvalidParameter {
                name: "sensitivity",
                value: self.sensitivity,
                range: "[0, 100]",
            });
        }
        if !(10.0..=100.0).contains(&self.min_size) {
            return Err(DetectorError::InvalidParameter {
                name: "min_size",
                value: self.min_size,
                range: "[10, 100]",
            });
        }
        Ok(())
    }
}

/// Full detector configuration. Every field falls back to its default when absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub params: DetectionParams,
    pub limits: ShapeLimits,
    /// IoU above which candidate boxes are unioned.
    pub iou_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            params: DetectionParams::default(),
            limits: ShapeLimits::default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        self.limits.validate()?;
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectorError::InvalidParameter {
                name: "iou_threshold",
                value: self.iou_threshold,
                range: "[0, 1]",
            });
        }
        Ok(())
    }
}

/// Runs one heuristic pass over `buffer`.
///
/// The returned boxes are de-duplicated but carry no ordering guarantee.
pub fn detect(
    buffer: &PixelBuffer<'_>,
    params: &DetectionParams,
    limits: &ShapeLimits,
    iou_threshold: f64,
    scorer: &dyn ConfidenceScorer,
) -> Vec<DetectionBox> {
    // Stage 1: Thresholding
    let grid = GridManager::new(limits.dark_cell_fraction).build_occupancy(buffer, params.sensitivity);

    // Stage 2: Connected-component labeling
    let blobs = blob_detector::find_blobs(&grid);

    // Stage 3: Geometric filtering
    let filter = ShapeFilter::new(*limits);
    let candidates: Vec<DetectionBox> = blobs
        .iter()
        .filter_map(|blob| filter.evaluate(blob, params.min_size, scorer))
        .collect();

    // Stage 4: Overlap merging
    let candidate_count = candidates.len();
    let merged = merge_boxes(candidates, iou_threshold);

    log::debug!(
        "{} dark cells, {} blobs, {} candidates, {} detections",
        grid.occupied_count(),
        blobs.len(),
        candidate_count,
        merged.len()
    );
    merged
}

/// Which backend answers `PotholeDetector::detect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Heuristic,
    Model,
}

/// The stateful front door: configuration, scorer and the active backend.
pub struct PotholeDetector {
    config: DetectorConfig,
    scorer: Box<dyn ConfidenceScorer>,
    model: Option<ModelBackend>,
    mode: BackendMode,
}

impl PotholeDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer: Box::new(SimulatedConfidence),
            model: None,
            mode: BackendMode::Heuristic,
        })
    }

    /// Replaces the confidence scorer used by the heuristic.
    pub fn with_scorer(mut self, scorer: impl ConfidenceScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn update_params(&mut self, params: DetectionParams) -> Result<()> {
        params.validate()?;
        self.config.params = params;
        Ok(())
    }

    /// Installs a model backend and makes it the active one.
    pub fn load_model(&mut self, model: ModelBackend) {
        log::info!("model backend loaded; switching from {:?}", self.mode);
        self.model = Some(model);
        self.mode = BackendMode::Model;
    }

    /// Drops the model backend and returns to the heuristic.
    pub fn unload_model(&mut self) -> Option<ModelBackend> {
        self.mode = BackendMode::Heuristic;
        self.model.take()
    }

    pub fn set_mode(&mut self, mode: BackendMode) -> Result<()> {
        if mode == BackendMode::Model && self.model.is_none() {
            return Err(DetectorError::ModelNotLoaded);
        }
        if mode != self.mode {
            log::info!("backend mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
        Ok(())
    }

    /// Runs one pass with the active backend.
    pub fn detect(&mut self, buffer: &PixelBuffer<'_>) -> Result<Vec<DetectionBox>> {
        match self.mode {
            BackendMode::Heuristic => Ok(detect(
                buffer,
                &self.config.params,
                &self.config.limits,
                self.config.iou_threshold,
                self.scorer.as_ref(),
            )),
            BackendMode::Model => {
                let model = self.model.as_mut().ok_or(DetectorError::ModelNotLoaded)?;
                model.detect(buffer).inspect_err(|e| {
                    log::warn!("model backend failed: {}", e);
                })
            }
        }
    }
}

impl std::fmt::Debug for PotholeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PotholeDetector")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
