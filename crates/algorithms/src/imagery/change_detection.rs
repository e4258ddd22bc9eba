//! Change detection between two co-registered rasters
//!
//! - Pair validation: shape, geotransform and CRS must agree
//! - Absolute difference surface
//! - Linear rescaling of the difference to 8-bit intensities

use ndarray::Array2;
use crate::maybe_rayon::*;
use geodiff_core::raster::Raster;
use geodiff_core::{Error, Result, CRS};
use tracing::warn;

/// Relative tolerance when comparing the geotransforms of an input pair
pub const TRANSFORM_TOLERANCE: f64 = 1e-9;

/// What to do when the difference surface has zero dynamic range
/// (identical inputs, or a constant offset everywhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegeneratePolicy {
    /// Produce an all-zero intensity grid, i.e. "no change"
    #[default]
    ZeroFill,
    /// Fail with [`Error::DegenerateInput`]
    Fail,
}

/// Check that `before` and `after` describe the same pixel grid.
///
/// Fails with `SizeMismatch`, `TransformMismatch` or `CrsMismatch`
/// (all of kind `GeometryMismatch`).
pub fn validate_pair(before: &Raster<f64>, after: &Raster<f64>) -> Result<()> {
    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: after.rows(),
            ac: after.cols(),
        });
    }

    if !CRS::compatible(before.crs(), after.crs()) {
        let name = |crs: Option<&CRS>| crs.map_or_else(|| "none".to_string(), |c| c.to_string());
        return Err(Error::CrsMismatch(name(before.crs()), name(after.crs())));
    }

    if let Some(field) = before
        .transform()
        .first_difference(after.transform(), TRANSFORM_TOLERANCE)
    {
        return Err(Error::TransformMismatch(format!(
            "{} differs: {:?} vs {:?}",
            field,
            before.transform().to_gdal(),
            after.transform().to_gdal()
        )));
    }

    Ok(())
}

/// Per-pixel absolute difference `|after - before|`.
///
/// Cells where either input is nodata become NaN. The output carries the
/// `before` raster's transform and CRS, with NaN as nodata.
pub fn absolute_difference(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows, ec: cols, ar: after.rows(), ac: after.cols(),
        });
    }

    let diff_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut diffs = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };

                if before.is_nodata(b) || after.is_nodata(a) {
                    diffs.push(f64::NAN);
                } else {
                    diffs.push((a - b).abs());
                }
            }
            diffs
        })
        .collect();

    let mut diff_raster = before.with_same_meta::<f64>(rows, cols);
    diff_raster.set_nodata(Some(f64::NAN));
    *diff_raster.data_mut() = Array2::from_shape_vec((rows, cols), diff_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(diff_raster)
}

/// Rescale a difference surface to `[0, 255]`.
///
/// `round(255 * (v - min) / (max - min))`, clamped, with min/max taken over
/// valid cells. Nodata cells map to 0. A surface without dynamic range is
/// handled according to `policy`.
pub fn normalize_difference(diff: &Raster<f64>, policy: DegeneratePolicy) -> Result<Raster<u8>> {
    let stats = diff.statistics();

    let (min, max) = match (stats.min, stats.max) {
        (Some(min), Some(max)) if max > min => (min, max),
        _ => {
            return match policy {
                DegeneratePolicy::ZeroFill => {
                    warn!("difference surface has no dynamic range; reporting no change");
                    Ok(diff.map(|_| 0u8))
                }
                DegeneratePolicy::Fail => Err(Error::DegenerateInput(format!(
                    "difference surface has no dynamic range ({} valid cells, min {:?}, max {:?})",
                    stats.valid_count, stats.min, stats.max
                ))),
            };
        }
    };

    let range = max - min;
    Ok(diff.map(|v| {
        if v.is_nan() {
            0
        } else {
            (255.0 * (v - min) / range).round().clamp(0.0, 255.0) as u8
        }
    }))
}
