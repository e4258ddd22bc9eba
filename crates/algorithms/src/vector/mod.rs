//! Raster-to-vector conversion and vector measurements
//!
//! - Polygonize: trace connected mask regions into polygons with holes
//! - Area: unsigned polygon area in CRS units

mod measurements;
mod polygonize;

pub use measurements::{area, total_area};
pub use polygonize::{polygonize, trace_regions, Polygonize, TracedRegion};
