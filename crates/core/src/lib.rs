//! # geodiff Core
//!
//! Core types, traits and I/O for the geodiff change detection tool.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `Mask`: Boolean grid sharing the raster's georeferencing
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `FeatureCollection`: Polygon features tagged with a CRS
//! - GeoTIFF and GeoJSON I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, ErrorKind, Result};
pub use raster::{GeoTransform, Mask, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::raster::{GeoTransform, Mask, Raster, RasterElement};
    pub use crate::vector::{Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Core trait for the algorithms that make up the change detection pipeline.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
