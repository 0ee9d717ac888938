// The seam between the detector and whatever actually runs the network. The
// detector only needs "tensor in, flat tensor out"; the ONNX Runtime engine lives
// behind the `onnx` cargo feature so the heuristic path carries no native runtime.

use crate::error::{DetectorError, Result};
use ndarray::Array4;

/// A raw output tensor: its dimensions and its row-major contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ModelOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(DetectorError::Decode(format!(
                "output shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }
}

/// Runs a loaded network on one NCHW input tensor.
pub trait InferenceEngine: Send {
    fn run(&mut self, input: Array4<f32>) -> Result<ModelOutput>;
}

#[cfg(feature = "onnx")]
pub use self::onnx::OrtEngine;

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;

    /// An ONNX Runtime session fed through its first declared input.
    pub struct OrtEngine {
        session: Session,
        input_name: String,
    }

    impl OrtEngine {
        /// Builds a session from an in-memory model artifact.
        pub fn from_bytes(model: &[u8]) -> Result<Self> {
            let session = Session::builder()
                .and_then(|builder| builder.commit_from_memory(model))
                .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| DetectorError::ModelLoad("model declares no inputs".to_string()))?;

            log::info!("loaded ONNX model with input `{}`", input_name);
            Ok(Self {
                session,
                input_name,
            })
        }

        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let bytes = std::fs::read(path.as_ref()).map_err(|e| {
                DetectorError::ModelLoad(format!("{}: {}", path.as_ref().display(), e))
            })?;
            Self::from_bytes(&bytes)
        }
    }

    impl InferenceEngine for OrtEngine {
        fn run(&mut self, input: Array4<f32>) -> Result<ModelOutput> {
            let (n, c, h, w) = input.dim();
            let (data, _) = input.into_raw_vec_and_offset();
            let tensor = Tensor::from_array(([n, c, h, w], data.into_boxed_slice()))
                .map_err(|e| DetectorError::Inference(e.to_string()))?;

            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => tensor])
                .map_err(|e| DetectorError::Inference(e.to_string()))?;

            let (shape, values) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::Inference(e.to_string()))?;

            ModelOutput::new(shape.iter().map(|&d| d as usize).collect(), values.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_shape_must_match_data() {
        assert!(ModelOutput::new(vec![1, 2, 3], vec![0.0; 6]).is_ok());
        assert!(matches!(
            ModelOutput::new(vec![1, 2, 3], vec![0.0; 5]),
            Err(DetectorError::Decode(_))
        ));
    }
}
