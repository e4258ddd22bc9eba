//! Boolean mask sharing a raster's georeferencing

use crate::crs::CRS;
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D grid of booleans.
///
/// Masks carry the transform and CRS of the raster they were derived from,
/// so they can be written back out or vectorized without extra metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Array2<bool>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl Mask {
    /// All-false mask with the default transform and no CRS
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), false))
    }

    /// Wrap an existing boolean array
    pub fn from_array(data: Array2<bool>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Build a mask from `raster` by testing every cell with `predicate`
    pub fn from_raster<T, F>(raster: &Raster<T>, predicate: F) -> Self
    where
        T: RasterElement,
        F: Fn(T) -> bool,
    {
        Self {
            data: raster.data().mapv(predicate),
            transform: *raster.transform(),
            crs: raster.crs().cloned(),
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Value at (row, col); out-of-range cells read as false
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data.get((row, col)).copied().unwrap_or(false)
    }

    /// Set value at (row, col); out-of-range writes are ignored
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if let Some(cell) = self.data.get_mut((row, col)) {
            *cell = value;
        }
    }

    /// Number of true cells
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Whether no cell is set
    pub fn is_clear(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Read-only view of the cells
    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<bool> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Scale to an 8-bit raster: true cells become `on_value`, false cells 0
    pub fn to_raster(&self, on_value: u8) -> Raster<u8> {
        let mut raster = Raster::from_array(self.data.mapv(|v| if v { on_value } else { 0 }));
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster
    }
}
