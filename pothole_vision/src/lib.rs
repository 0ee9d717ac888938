// THEORY:
// This file is the main entry point for the `pothole_vision` library crate. It
// defines the public API that front ends (like `visual_tester`) build on.
//
// The primary goal is to export `detect`, `PotholeDetector` and the async
// `DetectionService`, along with the data they exchange (`PixelBuffer`,
// `DetectionParams`, `DetectionBox`), as the high-level interface for the engine.
// The stage implementations in `core_modules` stay public for callers that want
// to inspect intermediate results such as the occupancy grid or raw blobs.

pub mod backend;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod service;

pub use core_modules::pixel::pixel::PixelBuffer;
pub use core_modules::shape_filter::{
    ConfidenceScorer, FixedConfidence, SimulatedConfidence, SolidityConfidence,
};
pub use error::{DetectorError, Result};
pub use pipeline::{
    BackendMode, DetectionBox, DetectionParams, DetectionSummary, DetectorConfig, PotholeDetector,
    ShapeLimits, detect,
};
pub use service::{DetectionOutcome, DetectionService, OwnedFrame};
