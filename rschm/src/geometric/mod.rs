pub mod extent;
pub mod grid;
pub mod lidar;
pub mod surface;
