// THEORY:
// The `GridManager` is the thresholding stage of the detector. It slices a raw
// RGBA frame into `GRID_SIZE x GRID_SIZE` `Chunk`s and collapses each one into a
// single boolean: is this tile mostly dark? The result is the `OccupancyGrid`, the
// only thing the spatial grouping layer (`blob_detector`) ever sees.
//
// Key principles:
// 1.  **Data Transformation**: It owns the slicing math that maps pixel
//     coordinates to cell coordinates. Edge tiles that hang past the image border
//     keep only their in-bounds pixels, and the darkness fraction is measured
//     against that smaller denominator.
// 2.  **Independence**: Every cell is computed from its own tile alone, so the
//     order in which tiles are visited cannot change the result.
// 3.  **Stateless**: Nothing survives between frames. A fresh grid is allocated for
//     every pass, so overlapping passes never share working memory.

use crate::core_modules::chunk::chunk::Chunk;
use crate::core_modules::occupancy_grid::{GRID_SIZE, OccupancyGrid};
use crate::core_modules::pixel::pixel::{Luminance, PixelBuffer};

/// Maps the 0-100 sensitivity slider onto an 8-bit luminance cutoff.
pub fn luminance_threshold(sensitivity: f64) -> Luminance {
    sensitivity * 2.55
}

/// Builds occupancy grids from pixel buffers.
#[derive(Debug, Clone, Copy)]
pub struct GridManager {
    /// Share of a tile's pixels that must be dark for the cell to be occupied.
    dark_cell_fraction: f64,
}

impl GridManager {
    pub fn new(dark_cell_fraction: f64) -> Self {
        Self { dark_cell_fraction }
    }

    /// Slices out the in-bounds pixels of the tile at grid cell `(gx, gy)`.
    pub fn extract_chunk(buffer: &PixelBuffer<'_>, gx: u32, gy: u32) -> Chunk {
        let start_x = gx * GRID_SIZE;
        let start_y = gy * GRID_SIZE;
        let end_x = (start_x + GRID_SIZE).min(buffer.width());
        let end_y = (start_y + GRID_SIZE).min(buffer.height());
        let chunk_width = end_x.saturating_sub(start_x);
        let chunk_height = end_y.saturating_sub(start_y);

        let mut pixels = Vec::with_capacity((chunk_width * chunk_height) as usize);
        for y in start_y..end_y {
            for x in start_x..end_x {
                pixels.push(buffer.pixel(x, y));
            }
        }

        Chunk::new(chunk_width, chunk_height, pixels)
    }

    /// Thresholds every tile of `buffer` at the cutoff derived from `sensitivity`.
    pub fn build_occupancy(&self, buffer: &PixelBuffer<'_>, sensitivity: f64) -> OccupancyGrid {
        let mut grid = OccupancyGrid::for_image(buffer.width(), buffer.height());
        let threshold = luminance_threshold(sensitivity);

        for gy in 0..grid.height() {
            for gx in 0..grid.width() {
                let chunk = Self::extract_chunk(buffer, gx, gy);
                if chunk.is_dark(threshold, self.dark_cell_fraction) {
                    grid.set_occupied(gx, gy, true);
                }
            }
        }

        log::trace!(
            "occupancy grid {}x{}: {} of {} cells dark at cutoff {:.1}",
            grid.width(),
            grid.height(),
            grid.occupied_count(),
            grid.width() * grid.height(),
            threshold
        );
        grid
    }
}

impl Default for GridManager {
    fn default() -> Self {
        Self::new(0.4)
    }
}
