// THEORY:
// The `Pixel` module is the most fundamental unit of the detector. A `Pixel` is a
// "dumb" data container for one RGBA sample plus the single heuristic the
// thresholder needs: an unweighted brightness mean of the three color channels.
// Alpha is carried but never read.
//
// `PixelBuffer` is the borrowed, read-only view of a whole decoded image that the
// caller hands to the pipeline. It never copies the bytes; stages ask it for
// individual pixels by coordinate.

pub mod pixel {
    use crate::error::{DetectorError, Result};

    pub type Byte = u8;
    pub type Channel = Byte;
    pub type Luminance = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha channel value (0-255). Ignored by every heuristic.
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Brightness as the plain mean of R, G and B (0.0-255.0).
        pub fn luminance(&self) -> Luminance {
            (self.red as f64 + self.green as f64 + self.blue as f64) / 3.0
        }
    }

    /// Read-only view over a row-major RGBA8 image, origin top-left.
    #[derive(Debug, Clone, Copy)]
    pub struct PixelBuffer<'a> {
        data: &'a [Byte],
        width: u32,
        height: u32,
    }

    impl<'a> PixelBuffer<'a> {
        /// Wraps `data`, which must hold exactly `width * height` RGBA pixels.
        pub fn new(data: &'a [Byte], width: u32, height: u32) -> Result<Self> {
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

        pub fn from_rgba_image(image: &'a image::RgbaImage) -> Self {
            Self {
                data: image.as_raw(),
                width: image.width(),
                height: image.height(),
            }
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn is_empty(&self) -> bool {
            self.width == 0 || self.height == 0
        }

        pub fn as_bytes(&self) -> &'a [Byte] {
            self.data
        }

        /// The pixel at `(x, y)`. Callers stay within bounds.
        pub fn pixel(&self, x: u32, y: u32) -> Pixel {
            let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
            Pixel::new(
                self.data[index],
                self.data[index + 1],
                self.data[index + 2],
                self.data[index + 3],
            )
        }
    }
}
