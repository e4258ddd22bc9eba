//! End-to-end change detection between two co-registered rasters
//!
//! load -> validate -> difference -> normalize -> Otsu threshold
//! -> remove small objects -> fill small holes -> polygonize -> write

use std::path::{Path, PathBuf};

use geodiff_core::io::{geojson_to_bytes, read_geotiff, write_geotiff_to_buffer};
use geodiff_core::raster::Raster;
use geodiff_core::vector::FeatureCollection;
use geodiff_core::{Algorithm, Error, GeoTransform, Result, CRS};
use tracing::{debug, info, warn};

use crate::imagery::{absolute_difference, normalize_difference, threshold_mask, validate_pair, DegeneratePolicy, OtsuResult};
use crate::morphology::{clean_mask, CleanParams};
use crate::vector::{polygonize, total_area};

/// File name of the 8-bit change mask
pub const MASK_FILENAME: &str = "changes_mask.tif";
/// File name of the change polygon layer
pub const POLYGONS_FILENAME: &str = "changes_polygons.geojson";

/// Value written to changed cells of the output mask
pub const MASK_ON_VALUE: u8 = 255;

/// Grid description shared by both inputs and every output
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl RunMetadata {
    pub fn from_raster(raster: &Raster<f64>) -> Self {
        Self {
            rows: raster.rows(),
            cols: raster.cols(),
            transform: *raster.transform(),
            crs: raster.crs().cloned(),
        }
    }
}

/// A validated before/after pair
#[derive(Debug, Clone)]
pub struct LoadedPair {
    pub before: Raster<f64>,
    pub after: Raster<f64>,
    pub metadata: RunMetadata,
}

/// Read both rasters and check that they share shape, geotransform and CRS
pub fn load_pair(before_path: &Path, after_path: &Path) -> Result<LoadedPair> {
    let before: Raster<f64> = read_geotiff(before_path)?;
    let after: Raster<f64> = read_geotiff(after_path)?;
    validate_pair(&before, &after)?;

    let metadata = RunMetadata::from_raster(&before);
    debug!(
        "loaded pair {}x{}, crs {}",
        metadata.rows,
        metadata.cols,
        metadata.crs.as_ref().map_or_else(|| "none".to_string(), |c| c.to_string())
    );

    Ok(LoadedPair { before, after, metadata })
}

/// Parameters for a change detection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeDetectionParams {
    /// Mask cleaning (object/hole sizes and connectivity)
    pub clean: CleanParams,
    /// Handling of a difference surface without dynamic range
    pub degenerate_policy: DegeneratePolicy,
}

/// Pixel counts at each pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChangeStats {
    pub total_pixels: usize,
    /// Pixels above the Otsu threshold
    pub thresholded_pixels: usize,
    pub removed_pixels: usize,
    pub filled_pixels: usize,
    /// Changed pixels in the final mask
    pub changed_pixels: usize,
    pub region_count: usize,
    /// Summed polygon area in CRS units squared
    pub changed_area: f64,
}

/// In-memory result of a change detection run
#[derive(Debug, Clone)]
pub struct ChangeDetection {
    pub threshold: OtsuResult,
    pub stats: ChangeStats,
    /// Final mask, 255 = changed, 0 = unchanged
    pub mask: Raster<u8>,
    pub polygons: FeatureCollection,
    pub metadata: RunMetadata,
}

/// Run every in-memory stage on a raster pair.
///
/// The pair is validated first, so this is safe to call on rasters that
/// did not come through [`load_pair`].
pub fn detect_changes(
    before: &Raster<f64>,
    after: &Raster<f64>,
    params: &ChangeDetectionParams,
) -> Result<ChangeDetection> {
    validate_pair(before, after)?;
    let metadata = RunMetadata::from_raster(before);
    let total_pixels = metadata.rows * metadata.cols;

    let diff = absolute_difference(before, after)?;
    let intensity = normalize_difference(&diff, params.degenerate_policy)?;

    let (mut mask, threshold) = threshold_mask(&intensity);
    let thresholded_pixels = mask.count();
    info!(
        "Otsu threshold {} (between-class variance {:.2}), {} of {} pixels above",
        threshold.threshold, threshold.variance, thresholded_pixels, total_pixels
    );

    let summary = clean_mask(&mut mask, &params.clean);
    let changed_pixels = mask.count();
    info!(
        "cleaning ({} connectivity): removed {} px in objects < {}, filled {} px in holes < {}",
        params.clean.connectivity,
        summary.pixels_removed,
        params.clean.min_object_size,
        summary.pixels_filled,
        params.clean.hole_area_threshold
    );

    let polygons = polygonize(&mask, params.clean.connectivity)?;
    let changed_area = total_area(&polygons);
    info!(
        "{} change region(s), {} px, area {:.3}",
        polygons.len(),
        changed_pixels,
        changed_area
    );

    Ok(ChangeDetection {
        threshold,
        stats: ChangeStats {
            total_pixels,
            thresholded_pixels,
            removed_pixels: summary.pixels_removed,
            filled_pixels: summary.pixels_filled,
            changed_pixels,
            region_count: polygons.len(),
            changed_area,
        },
        mask: mask.to_raster(MASK_ON_VALUE),
        polygons,
        metadata,
    })
}

/// Locations of the two output artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub mask: PathBuf,
    pub polygons: PathBuf,
}

impl OutputPaths {
    /// Standard artifact names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            mask: dir.join(MASK_FILENAME),
            polygons: dir.join(POLYGONS_FILENAME),
        }
    }

    /// Artifacts that already exist and would be overwritten
    pub fn existing(&self) -> Vec<&Path> {
        [self.mask.as_path(), self.polygons.as_path()]
            .into_iter()
            .filter(|p| p.exists())
            .collect()
    }
}

/// Write the mask GeoTIFF and the polygon GeoJSON into `dir`.
///
/// Both artifacts are encoded before anything touches the disk. If the
/// write fails, whatever was written is removed, so a failed call leaves
/// neither file. Existing files are overwritten.
pub fn write_outputs(detection: &ChangeDetection, dir: &Path) -> Result<OutputPaths> {
    let paths = OutputPaths::in_dir(dir);

    let mask_bytes = write_geotiff_to_buffer(&detection.mask)
        .map_err(|e| Error::output_write(&paths.mask, e))?;
    let polygon_bytes = geojson_to_bytes(&detection.polygons)
        .map_err(|e| Error::output_write(&paths.polygons, e))?;

    write_artifact(&paths.mask, &mask_bytes)?;
    if let Err(e) = write_artifact(&paths.polygons, &polygon_bytes) {
        discard(&paths.mask);
        return Err(e);
    }

    debug!(
        "wrote {} ({} bytes) and {} ({} bytes)",
        paths.mask.display(),
        mask_bytes.len(),
        paths.polygons.display(),
        polygon_bytes.len()
    );
    Ok(paths)
}

/// Write one artifact; a failed write removes whatever part of it landed
fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| {
        discard(path);
        Error::output_write(path, Error::Io(e))
    })
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}

/// Summary of a completed file-to-file run
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub threshold: OtsuResult,
    pub stats: ChangeStats,
    pub metadata: RunMetadata,
    pub outputs: OutputPaths,
}

/// Load, detect and write in one call
pub fn run(
    before_path: &Path,
    after_path: &Path,
    output_dir: &Path,
    params: &ChangeDetectionParams,
) -> Result<ChangeReport> {
    let pair = load_pair(before_path, after_path)?;
    let detection = detect_changes(&pair.before, &pair.after, params)?;
    let outputs = write_outputs(&detection, output_dir)?;

    Ok(ChangeReport {
        threshold: detection.threshold,
        stats: detection.stats,
        metadata: detection.metadata,
        outputs,
    })
}

/// Change detection over a (before, after) raster pair
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector;

impl Algorithm for ChangeDetector {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = ChangeDetection;
    type Params = ChangeDetectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ChangeDetector"
    }

    fn description(&self) -> &'static str {
        "Otsu-thresholded absolute difference, cleaned and vectorized"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (before, after) = input;
        detect_changes(&before, &after, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::Connectivity;
    use geodiff_core::vector::AttributeValue;

    fn make_pair(rows: usize, cols: usize) -> (Raster<f64>, Raster<f64>) {
        let mut before = Raster::filled(rows, cols, 100.0);
        before.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        before.set_crs(Some(CRS::from_epsg(32633)));
        let after = before.clone();
        (before, after)
    }

    fn small_params() -> ChangeDetectionParams {
        ChangeDetectionParams {
            clean: CleanParams {
                min_object_size: 5,
                hole_area_threshold: 3,
                connectivity: Connectivity::Four,
            },
            degenerate_policy: DegeneratePolicy::ZeroFill,
        }
    }

    #[test]
    fn test_detect_square() {
        let (before, mut after) = make_pair(40, 40);
        for r in 10..30 {
            for c in 5..25 {
                after.set(r, c, 180.0).unwrap();
            }
        }

        let result = detect_changes(&before, &after, &small_params()).unwrap();
        assert_eq!(result.stats.region_count, 1);
        assert_eq!(result.stats.changed_pixels, 400);
        assert_eq!(result.mask.shape(), (40, 40));
        assert_eq!(result.mask.get(15, 15).unwrap(), 255);
        assert_eq!(result.mask.get(0, 0).unwrap(), 0);
        assert_eq!(result.mask.transform(), before.transform());
        assert_eq!(result.polygons.crs, Some(CRS::from_epsg(32633)));

        let f = &result.polygons.features[0];
        assert_eq!(f.get_property("pixel_count"), Some(&AttributeValue::Int(400)));
        assert!((result.stats.changed_area - 400.0 * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_speckle_removed() {
        let (before, mut after) = make_pair(20, 20);
        for r in 2..8 {
            for c in 2..8 {
                after.set(r, c, 160.0).unwrap();
            }
        }
        after.set(15, 15, 160.0).unwrap();

        let result = detect_changes(&before, &after, &small_params()).unwrap();
        assert_eq!(result.stats.thresholded_pixels, 37);
        assert_eq!(result.stats.removed_pixels, 1);
        assert_eq!(result.stats.region_count, 1);
    }

    #[test]
    fn test_degenerate_policies() {
        let (before, after) = make_pair(10, 10);

        let result = detect_changes(&before, &after, &small_params()).unwrap();
        assert_eq!(result.stats.changed_pixels, 0);
        assert!(result.polygons.is_empty());
        assert!(result.mask.data().iter().all(|&v| v == 0));

        let params = ChangeDetectionParams {
            degenerate_policy: DegeneratePolicy::Fail,
            ..small_params()
        };
        let err = detect_changes(&before, &after, &params).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn test_mismatch_rejected() {
        let (before, _) = make_pair(10, 10);
        let (_, after) = make_pair(10, 12);
        let err = detect_changes(&before, &after, &small_params()).unwrap_err();
        assert!(err.is_geometry_mismatch());
    }

    #[test]
    fn test_output_paths() {
        let paths = OutputPaths::in_dir(Path::new("/data/out"));
        assert_eq!(paths.mask, Path::new("/data/out/changes_mask.tif"));
        assert_eq!(paths.polygons, Path::new("/data/out/changes_polygons.geojson"));
    }

    #[test]
    fn test_algorithm_trait() {
        let (before, mut after) = make_pair(12, 12);
        for r in 3..9 {
            for c in 3..9 {
                after.set(r, c, 50.0).unwrap();
            }
        }
        let detector = ChangeDetector;
        assert_eq!(detector.name(), "ChangeDetector");
        let result = detector.execute((before, after), small_params()).unwrap();
        assert_eq!(result.stats.changed_pixels, 36);
    }
}
