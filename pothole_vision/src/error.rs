// THEORY:
// Every fallible operation in the engine reports through `DetectorError`. The
// heuristic path itself never fails once it has a valid `PixelBuffer`; errors come
// from the edges: malformed input buffers, rejected tunables, and the alternate
// tensor backend (model loading, inference, output decoding).

/// Errors surfaced by the detection engine.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("pixel buffer holds {actual} bytes, expected {expected} for the given dimensions")]
    BufferSize { expected: usize, actual: usize },
    #[error("invalid parameter `{name}`: {value} is outside {range}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        range: &'static str,
    },
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("model backend selected but no model is loaded")]
    ModelNotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to decode model output: {0}")]
    Decode(String),
    #[error("no output decoder is available for this model")]
    DecodeUnsupported,
    #[error("detection task did not complete: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
