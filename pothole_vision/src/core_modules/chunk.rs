// THEORY:
// The `Chunk` module represents one tile of the coarse grid: the pixels of a
// `GRID_SIZE x GRID_SIZE` block of the source image. Pooling pixels this way moves
// the rest of the pipeline from millions of pixels to a few thousand cells, and a
// single stray dark pixel cannot mark a cell on its own.
//
// Like `Pixel`, `Chunk` is a "dumb" data container. It holds only the in-bounds
// pixels of its tile (edge tiles are smaller) and knows how to summarize them
// against a brightness cutoff. It knows nothing about its neighbors.

pub mod chunk {
    use crate::core_modules::pixel::pixel::{Luminance, Pixel};

    /// A "dumb" data container representing a rectangular block of pixels.
    #[derive(Debug, Clone)]
    pub struct Chunk {
        /// The width of the chunk in pixels (in-bounds part only).
        pub width: u32,
        /// The height of the chunk in pixels (in-bounds part only).
        pub height: u32,
        /// A flattened vector containing all the `Pixel` data within this chunk.
        pub pixels: Vec<Pixel>,
    }

    impl Chunk {
        pub fn new(width: u32, height: u32, pixels: Vec<Pixel>) -> Self {
            debug_assert_eq!(pixels.len(), (width * height) as usize);
            Self {
                width,
                height,
                pixels,
            }
        }

        /// Number of pixels strictly darker than `threshold`.
        pub fn dark_pixel_count(&self, threshold: Luminance) -> usize {
            self.pixels
                .iter()
                .filter(|pixel| pixel.luminance() < threshold)
                .count()
        }

        /// Whether dark pixels make up more than `fraction` of the sampled pixels.
        /// An empty chunk is never dark.
        pub fn is_dark(&self, threshold: Luminance, fraction: f64) -> bool {
            let total = self.pixels.len();
            if total == 0 {
                return false;
            }
            self.dark_pixel_count(threshold) as f64 > total as f64 * fraction
        }
    }
}
