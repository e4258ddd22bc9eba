//! # geodiff Algorithms
//!
//! Change detection between two co-registered single-band rasters.
//!
//! ## Stages
//!
//! - **imagery**: pair validation, absolute difference, 8-bit rescaling, Otsu threshold
//! - **morphology**: connected components, small-object removal, small-hole filling
//! - **vector**: mask polygonization and area measurement
//! - **pipeline**: the stages chained together, plus GeoTIFF/GeoJSON output

pub mod imagery;
pub mod morphology;
pub mod pipeline;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        absolute_difference, normalize_difference, otsu_threshold, threshold_mask,
        validate_pair, DegeneratePolicy, Otsu, OtsuResult,
    };
    pub use crate::morphology::{
        clean_mask, fill_small_holes, label_components, remove_small_objects,
        CleanMask, CleanParams, Connectivity,
    };
    pub use crate::pipeline::{
        detect_changes, load_pair, run, write_outputs, ChangeDetection, ChangeDetectionParams,
        ChangeDetector, ChangeReport, ChangeStats, OutputPaths, RunMetadata,
        MASK_FILENAME, POLYGONS_FILENAME,
    };
    pub use crate::vector::{polygonize, total_area, Polygonize};
    pub use geodiff_core::prelude::*;
}
