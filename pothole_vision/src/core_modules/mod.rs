pub mod blob_detector;
pub mod box_merger;
pub mod chunk;
pub mod detection_box;
pub mod grid_manager;
pub mod occupancy_grid;
pub mod pixel;
pub mod shape_filter;
pub mod smart_blob;
