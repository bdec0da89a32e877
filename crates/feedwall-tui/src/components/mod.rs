pub mod header;
pub mod landing;
pub mod station_grid;
