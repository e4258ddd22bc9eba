//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod mask;
mod neighborhood;

pub use element::{DataType, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use mask::Mask;
pub use neighborhood::Neighborhood;
