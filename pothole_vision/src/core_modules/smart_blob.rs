// THEORY:
// A `Blob` is one 4-connected group of occupied grid cells, found by the
// `blob_detector` and judged by the `shape_filter`. It is a "dumb" data container:
// inclusive cell bounds plus the number of cells in the group. Everything the
// filter needs (pixel extent, aspect ratio, solidity) is derived from those five
// numbers on demand.
//
// Blobs exist only between labeling and filtering within a single pass.

use crate::core_modules::occupancy_grid::GRID_SIZE;

/// A cell coordinate on the occupancy grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub x: u32,
    pub y: u32,
}

/// A connected set of occupied cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Index of this blob within the current pass. Not persistent.
    pub id: u64,
    /// Top-left cell of the bounding rectangle (inclusive).
    pub min: GridPoint,
    /// Bottom-right cell of the bounding rectangle (inclusive).
    pub max: GridPoint,
    /// Number of occupied cells in the component.
    pub cell_count: usize,
}

impl Blob {
    pub fn pixel_x(&self) -> f64 {
        (self.min.x * GRID_SIZE) as f64
    }

    pub fn pixel_y(&self) -> f64 {
        (self.min.y * GRID_SIZE) as f64
    }

    pub fn pixel_width(&self) -> f64 {
        ((self.max.x - self.min.x + 1) * GRID_SIZE) as f64
    }

    pub fn pixel_height(&self) -> f64 {
        ((self.max.y - self.min.y + 1) * GRID_SIZE) as f64
    }

    pub fn bounding_area(&self) -> f64 {
        self.pixel_width() * self.pixel_height()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.pixel_width() / self.pixel_height()
    }

    /// Area actually covered by the blob's cells, in pixels.
    pub fn blob_area(&self) -> f64 {
        self.cell_count as f64 * (GRID_SIZE * GRID_SIZE) as f64
    }

    /// Fraction of the bounding rectangle covered by the blob (0.0-1.0].
    pub fn solidity(&self) -> f64 {
        self.blob_area() / self.bounding_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_geometry_uses_cell_extent() {
        // An L of 3 cells inside a 2x2 cell box.
        let blob = Blob {
            id: 0,
            min: GridPoint { x: 2, y: 3 },
            max: GridPoint { x: 3, y: 4 },
            cell_count: 3,
        };
        assert_eq!(blob.pixel_x(), 20.0);
        assert_eq!(blob.pixel_y(), 30.0);
        assert_eq!(blob.pixel_width(), 20.0);
        assert_eq!(blob.pixel_height(), 20.0);
        assert_eq!(blob.aspect_ratio(), 1.0);
        assert_eq!(blob.blob_area(), 300.0);
        assert!((blob.solidity() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_cell_is_fully_solid() {
        let point = GridPoint { x: 7, y: 1 };
        let blob = Blob {
            id: 0,
            min: point,
            max: point,
            cell_count: 1,
        };
        assert_eq!(blob.solidity(), 1.0);
        assert_eq!(blob.bounding_area(), 100.0);
    }
}
