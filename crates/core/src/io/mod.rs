//! I/O operations for reading and writing geospatial data

mod geojson;
mod native;

pub use geojson::{geojson_to_bytes, write_geojson};
pub use native::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
