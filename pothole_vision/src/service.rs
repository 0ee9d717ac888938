// THEORY:
// Callers that poll a camera or re-run on every slider change cannot afford to
// block their async runtime on a detection pass, and they only care about the
// answer to the *latest* request. The `DetectionService` handles both:
//
// 1.  The detector sits behind a `tokio::sync::Mutex`; each pass runs on the
//     blocking pool with an owned guard, so the runtime threads stay free.
// 2.  Every call takes a generation number. When a pass finishes after a newer
//     call has started, its result is reported as `Superseded` instead of
//     `Completed`, and the caller can drop it.

use crate::backend::ModelBackend;
use crate::core_modules::pixel::pixel::{CHANNELS, PixelBuffer};
use crate::error::{DetectorError, Result};
use crate::pipeline::{BackendMode, DetectionBox, DetectionParams, DetectorConfig, PotholeDetector};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// An RGBA frame that owns its bytes, so it can move onto the blocking pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OwnedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(DetectorError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    pub fn as_buffer(&self) -> Result<PixelBuffer<'_>> {
        PixelBuffer::new(&self.data, self.width, self.height)
    }
}

/// The result of one service call.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// The latest request; these boxes describe the current frame.
    Completed(Vec<DetectionBox>),
    /// A newer request started while this one ran.
    Superseded(Vec<DetectionBox>),
}

impl DetectionOutcome {
    /// The boxes, but only if they are still current.
    pub fn current(self) -> Option<Vec<DetectionBox>> {
        match self {
            DetectionOutcome::Completed(boxes) => Some(boxes),
            DetectionOutcome::Superseded(_) => None,
        }
    }

    pub fn boxes(&self) -> &[DetectionBox] {
        match self {
            DetectionOutcome::Completed(boxes) | DetectionOutcome::Superseded(boxes) => boxes,
        }
    }
}

/// A cloneable async handle to one shared `PotholeDetector`.
#[derive(Clone, Debug)]
pub struct DetectionService {
    detector: Arc<Mutex<PotholeDetector>>,
    generation: Arc<AtomicU64>,
}

impl DetectionService {
    pub fn new(detector: PotholeDetector) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_config(config: DetectorConfig) -> Result<Self> {
        Ok(Self::new(PotholeDetector::new(config)?))
    }

    pub async fn detect(&self, frame: OwnedFrame) -> Result<DetectionOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut detector = self.detector.clone().lock_owned().await;

        let boxes = tokio::task::spawn_blocking(move || {
            let buffer = frame.as_buffer()?;
            detector.detect(&buffer)
        })
        .await
        .map_err(|e| DetectorError::TaskJoin(e.to_string()))??;

        let latest = self.generation.load(Ordering::SeqCst);
        if latest != generation {
            log::debug!("detection {} superseded by {}", generation, latest);
            return Ok(DetectionOutcome::Superseded(boxes));
        }
        Ok(DetectionOutcome::Completed(boxes))
    }

    pub async fn update_params(&self, params: DetectionParams) -> Result<()> {
        self.detector.lock().await.update_params(params)
    }

    pub async fn load_model(&self, model: ModelBackend) {
        self.detector.lock().await.load_model(model);
    }

    pub async fn unload_model(&self) -> Option<ModelBackend> {
        self.detector.lock().await.unload_model()
    }

    pub async fn set_mode(&self, mode: BackendMode) -> Result<()> {
        self.detector.lock().await.set_mode(mode)
    }

    pub async fn mode(&self) -> BackendMode {
        self.detector.lock().await.mode()
    }

    pub async fn config(&self) -> DetectorConfig {
        *self.detector.lock().await.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::decode::YoloV8Decoder;
    use crate::backend::engine::ModelOutput;
    use crate::backend::test_support::CannedEngine;
    use crate::core_modules::shape_filter::FixedConfidence;

    fn square_frame() -> OwnedFrame {
        let mut image = image::RgbaImage::from_pixel(100, 100, image::Rgba([255, 255, 255, 255]));
        for y in 20..60 {
            for x in 20..60 {
                image.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        OwnedFrame::from_rgba_image(image)
    }

    fn service() -> DetectionService {
        let detector = PotholeDetector::new(DetectorConfig::default())
            .expect("valid config")
            .with_scorer(FixedConfidence(0.9));
        DetectionService::new(detector)
    }

    #[tokio::test]
    async fn single_request_completes() {
        let outcome = service().detect(square_frame()).await.expect("detects");
        let boxes = outcome.current().expect("latest request");
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x, boxes[0].w), (20.0, 40.0));
    }

    #[tokio::test]
    async fn older_request_is_superseded() {
        let service = service();
        let (first, second) = tokio::join!(service.detect(square_frame()), service.detect(square_frame()));

        let first = first.expect("detects");
        assert!(matches!(first, DetectionOutcome::Superseded(_)));
        assert_eq!(first.boxes().len(), 1);
        assert!(matches!(second.expect("detects"), DetectionOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn malformed_frames_are_rejected() {
        assert!(matches!(
            OwnedFrame::new(vec![0; 10], 2, 2),
            Err(DetectorError::BufferSize { expected: 16, actual: 10 })
        ));

        let bad = OwnedFrame {
            data: vec![0; 3],
            width: 1,
            height: 1,
        };
        assert!(service().detect(bad).await.is_err());
    }

    #[tokio::test]
    async fn settings_are_forwarded() {
        let service = service();
        assert!(service.update_params(DetectionParams::new(120.0, 20.0)).await.is_err());
        service
            .update_params(DetectionParams::new(60.0, 30.0))
            .await
            .expect("in range");
        assert_eq!(service.config().await.params.min_size, 30.0);

        assert!(service.set_mode(BackendMode::Model).await.is_err());
        let output = ModelOutput::new(vec![1, 5, 0], Vec::new()).expect("consistent");
        service
            .load_model(ModelBackend::new(CannedEngine::new(output), YoloV8Decoder::default()).with_input_size(32))
            .await;
        assert_eq!(service.mode().await, BackendMode::Model);

        let outcome = service.detect(square_frame()).await.expect("model runs");
        assert!(outcome.boxes().is_empty());

        assert!(service.unload_model().await.is_some());
        assert_eq!(service.mode().await, BackendMode::Heuristic);
    }
}
