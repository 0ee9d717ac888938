// THEORY:
// The alternate backend swaps the darkness heuristic for a neural network. It
// accepts the same `PixelBuffer` the heuristic does and returns the same
// `DetectionBox` shape, so the caller never needs to know which one ran.
//
// A pass has three swappable parts:
// 1.  **Preprocess** (`tensor`): resample to a square input and lay the channels
//     out as a normalized NCHW float tensor.
// 2.  **Inference** (`engine`): an `InferenceEngine` runs the tensor and hands back
//     the raw output. ONNX Runtime is the stock engine (feature `onnx`).
// 3.  **Decode** (`decode`): an `OutputDecoder` built for the model's output
//     contract maps the raw tensor back to image-space boxes.

pub mod decode;
pub mod engine;
pub mod tensor;

use crate::core_modules::detection_box::DetectionBox;
use crate::core_modules::pixel::pixel::PixelBuffer;
use crate::error::Result;
use decode::{DecodeContext, OutputDecoder};
use engine::InferenceEngine;
use tensor::MODEL_INPUT_SIZE;

/// A loaded network plus the decoder for its output layout.
pub struct ModelBackend {
    engine: Box<dyn InferenceEngine>,
    decoder: Box<dyn OutputDecoder>,
    input_size: u32,
}

impl ModelBackend {
    pub fn new(engine: impl InferenceEngine + 'static, decoder: impl OutputDecoder + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            decoder: Box::new(decoder),
            input_size: MODEL_INPUT_SIZE,
        }
    }

    /// Overrides the square input side (640 by default).
    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    /// Loads an ONNX model artifact from disk.
    #[cfg(feature = "onnx")]
    pub fn from_onnx_file(
        path: impl AsRef<std::path::Path>,
        decoder: impl OutputDecoder + 'static,
    ) -> Result<Self> {
        Ok(Self::new(engine::OrtEngine::from_file(path)?, decoder))
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Runs one inference pass over `buffer`. An empty image yields no boxes.
    pub fn detect(&mut self, buffer: &PixelBuffer<'_>) -> Result<Vec<DetectionBox>> {
        if buffer.is_empty() {
            return Ok(Vec::new());
        }

        let input = tensor::preprocess(buffer, self.input_size)?;
        let output = self.engine.run(input)?;
        log::debug!("model output shape {:?}", output.shape);

        let context = DecodeContext {
            image_width: buffer.width(),
            image_height: buffer.height(),
            input_size: self.input_size,
        };
        self.decoder.decode(&output, &context)
    }
}

impl std::fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend")
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::engine::{InferenceEngine, ModelOutput};
    use crate::error::{DetectorError, Result};
    use ndarray::Array4;
    use std::sync::{Arc, Mutex};

    /// Returns a canned output and records the shape of every input it sees.
    pub struct CannedEngine {
        pub output: ModelOutput,
        pub seen_shapes: Arc<Mutex<Vec<Vec<usize>>>>,
    }

    impl CannedEngine {
        pub fn new(output: ModelOutput) -> Self {
            Self {
                output,
                seen_shapes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl InferenceEngine for CannedEngine {
        fn run(&mut self, input: Array4<f32>) -> Result<ModelOutput> {
            self.seen_shapes
                .lock()
                .map_err(|e| DetectorError::Inference(e.to_string()))?
                .push(input.shape().to_vec());
            Ok(self.output.clone())
        }
    }

    /// Always fails, like a runtime that lost its device.
    pub struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn run(&mut self, _input: Array4<f32>) -> Result<ModelOutput> {
            Err(DetectorError::Inference("device lost".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::decode::{UnsupportedDecoder, YoloV8Decoder};
    use super::engine::ModelOutput;
    use super::test_support::{CannedEngine, FailingEngine};
    use super::*;
    use crate::error::DetectorError;

    fn one_box_output() -> ModelOutput {
        // One proposal centred in a 64x64 input.
        ModelOutput::new(vec![1, 5, 1], vec![32.0, 32.0, 16.0, 16.0, 0.8]).expect("consistent")
    }

    #[test]
    fn runs_preprocess_engine_and_decoder() {
        let engine = CannedEngine::new(one_box_output());
        let seen = engine.seen_shapes.clone();
        let mut backend = ModelBackend::new(engine, YoloV8Decoder::default()).with_input_size(64);

        let data = vec![128u8; 128 * 32 * 4];
        let buffer = PixelBuffer::new(&data, 128, 32).expect("valid buffer");
        let boxes = backend.detect(&buffer).expect("detects");

        assert_eq!(seen.lock().expect("not poisoned").as_slice(), &[vec![1usize, 3, 64, 64]]);
        assert_eq!(boxes.len(), 1);
        // x scales by 2, y by 0.5.
        assert!((boxes[0].x - 48.0).abs() < 1e-3);
        assert!((boxes[0].w - 32.0).abs() < 1e-3);
        assert!((boxes[0].y - 12.0).abs() < 1e-3);
        assert!((boxes[0].h - 8.0).abs() < 1e-3);
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn missing_model_file_is_a_load_error() {
        let result = ModelBackend::from_onnx_file("does/not/exist.onnx", YoloV8Decoder::default());
        assert!(matches!(result, Err(DetectorError::ModelLoad(_))));
    }

    #[test]
    fn empty_image_skips_inference() {
        let mut backend = ModelBackend::new(FailingEngine, YoloV8Decoder::default());
        let buffer = PixelBuffer::new(&[], 0, 0).expect("valid buffer");
        assert!(backend.detect(&buffer).expect("no inference needed").is_empty());
    }

    #[test]
    fn engine_and_decoder_failures_surface() {
        let data = vec![0u8; 4 * 4 * 4];
        let buffer = PixelBuffer::new(&data, 4, 4).expect("valid buffer");

        let mut failing = ModelBackend::new(FailingEngine, YoloV8Decoder::default());
        assert!(matches!(failing.detect(&buffer), Err(DetectorError::Inference(_))));

        let mut unsupported =
            ModelBackend::new(CannedEngine::new(one_box_output()), UnsupportedDecoder).with_input_size(8);
        assert!(matches!(
            unsupported.detect(&buffer),
            Err(DetectorError::DecodeUnsupported)
        ));
    }
}
