// Converts a caller's pixel buffer into the square, planar float tensor that
// detection networks expect: stretch-resample to `size x size`, scale channels to
// [0, 1], and lay them out as NCHW `[1, 3, size, size]` (all red, then all green,
// then all blue). Alpha is dropped.

use crate::core_modules::pixel::pixel::PixelBuffer;
use crate::error::{DetectorError, Result};
use image::imageops::{self, FilterType};
use ndarray::Array4;

/// Side length of the square model input.
pub const MODEL_INPUT_SIZE: u32 = 640;

pub fn preprocess(buffer: &PixelBuffer<'_>, size: u32) -> Result<Array4<f32>> {
    if buffer.is_empty() || size == 0 {
        return Err(DetectorError::InvalidParameter {
            name: "image dimensions",
            value: 0.0,
            range: "at least 1x1",
        });
    }

    let source = image::RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
        .ok_or(DetectorError::BufferSize {
            expected: buffer.width() as usize * buffer.height() as usize * 4,
            actual: buffer.as_bytes().len(),
        })?;

    let resized = if source.dimensions() == (size, size) {
        source
    } else {
        imageops::resize(&source, size, size, FilterType::Triangle)
    };

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }

    Ok(tensor)
}
