// The coarse boolean grids shared by the thresholder and the blob detector.
// Both are row-major, one entry per `GRID_SIZE x GRID_SIZE` tile, and live for a
// single detection pass.

/// Edge length of a grid cell in pixels.
pub const GRID_SIZE: u32 = 10;

/// Number of cells needed to cover `pixels` pixels (ceil division).
pub fn cells_for(pixels: u32) -> u32 {
    pixels.div_ceil(GRID_SIZE)
}

/// `true` cells are "dark enough" tiles of the source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// An all-unoccupied grid of `width x height` cells.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// The grid covering an image of the given pixel dimensions.
    pub fn for_image(image_width: u32, image_height: u32) -> Self {
        Self::new(cells_for(image_width), cells_for(image_height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, gx: u32, gy: u32) -> usize {
        gy as usize * self.width as usize + gx as usize
    }

    pub fn is_occupied(&self, gx: u32, gy: u32) -> bool {
        gx < self.width && gy < self.height && self.cells[self.index(gx, gy)]
    }

    pub fn set_occupied(&mut self, gx: u32, gy: u32, occupied: bool) {
        let index = self.index(gx, gy);
        self.cells[index] = occupied;
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    /// Builds a grid from rows of `'#'` (occupied) and any other char (free).
    /// Handy for tests and debugging dumps.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as u32;
        let mut grid = Self::new(width, height);
        for (gy, row) in rows.iter().enumerate() {
            for (gx, ch) in row.chars().enumerate() {
                grid.set_occupied(gx as u32, gy as u32, ch == '#');
            }
        }
        grid
    }
}

/// Tracks which cells the labeler has already assigned to a blob.
#[derive(Debug, Clone)]
pub struct VisitedGrid {
    width: u32,
    visited: Vec<bool>,
}

impl VisitedGrid {
    /// A cleared grid with the same shape as `grid`.
    pub fn matching(grid: &OccupancyGrid) -> Self {
        Self {
            width: grid.width(),
            visited: vec![false; grid.width() as usize * grid.height() as usize],
        }
    }

    pub fn is_visited(&self, gx: u32, gy: u32) -> bool {
        self.visited[gy as usize * self.width as usize + gx as usize]
    }

    pub fn mark(&mut self, gx: u32, gy: u32) {
        self.visited[gy as usize * self.width as usize + gx as usize] = true;
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|&&cell| cell).count()
    }
}
