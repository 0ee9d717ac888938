// THEORY:
// The `BlobDetector` is the engine of the spatial grouping layer. It runs a plain
// binary connected-component labeling over the `OccupancyGrid`: every occupied,
// unvisited cell found in raster order seeds a new blob, which then grows
// breadth-first through its up/down/left/right neighbors.
//
// Algorithm steps:
// 1.  **Seeding**: Scan rows top to bottom, cells left to right. The first occupied
//     cell not yet claimed by a blob starts a new one.
// 2.  **Region Growing**: A FIFO queue expands the blob through 4-connected
//     occupied neighbors. Cells are marked visited when they are enqueued, so no
//     cell is ever queued twice.
// 3.  **Data Aggregation**: While the queue drains, the running min/max cell
//     coordinates and the cell count are accumulated into a `Blob`.
// 4.  **Stateless Utility**: `find_blobs` keeps no memory between calls. Given the
//     same grid it always returns the same blobs in the same order.

use crate::core_modules::occupancy_grid::{OccupancyGrid, VisitedGrid};
use crate::core_modules::smart_blob::{Blob, GridPoint};

pub mod blob_detector {
    use super::*;
    use std::collections::VecDeque;

    /// Labels every 4-connected component of occupied cells in `grid`.
    pub fn find_blobs(grid: &OccupancyGrid) -> Vec<Blob> {
        let mut visited = VisitedGrid::matching(grid);
        let mut blobs: Vec<Blob> = Vec::new();
        let mut blob_id_counter = 0;

        for gy in 0..grid.height() {
            for gx in 0..grid.width() {
                if !grid.is_occupied(gx, gy) || visited.is_visited(gx, gy) {
                    continue;
                }

                let seed = GridPoint { x: gx, y: gy };
                blobs.push(grow_blob_from_seed(seed, grid, &mut visited, blob_id_counter));
                blob_id_counter += 1;
            }
        }

        blobs
    }

    /// Performs a breadth-first search to collect the component containing `seed`.
    fn grow_blob_from_seed(
        seed: GridPoint,
        grid: &OccupancyGrid,
        visited: &mut VisitedGrid,
        blob_id: u64,
    ) -> Blob {
        let mut queue: VecDeque<GridPoint> = VecDeque::from([seed]);
        visited.mark(seed.x, seed.y);

        let mut min = seed;
        let mut max = seed;
        let mut cell_count = 0usize;

        let grid_width = grid.width() as i64;
        let grid_height = grid.height() as i64;

        while let Some(current) = queue.pop_front() {
            cell_count += 1;
            min.x = min.x.min(current.x);
            min.y = min.y.min(current.y);
            max.x = max.x.max(current.x);
            max.y = max.y.max(current.y);

            // Check all 4 direct neighbors (not diagonals).
            for (dx, dy) in [(1i64, 0i64), (-1, 0), (0, 1), (0, -1)] {
                let nx = current.x as i64 + dx;
                let ny = current.y as i64 + dy;
                if nx < 0 || nx >= grid_width || ny < 0 || ny >= grid_height {
                    continue;
                }

                let (nx, ny) = (nx as u32, ny as u32);
                if grid.is_occupied(nx, ny) && !visited.is_visited(nx, ny) {
                    visited.mark(nx, ny);
                    queue.push_back(GridPoint { x: nx, y: ny });
                }
            }
        }

        Blob {
            id: blob_id,
            min,
            max,
            cell_count,
        }
    }
}
