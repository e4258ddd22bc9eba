//! Imagery change analysis
//!
//! - Pair validation and absolute difference between two acquisitions
//! - Rescaling of the difference to 8-bit intensities
//! - Otsu automatic thresholding

mod change_detection;
mod threshold;

pub use change_detection::{
    absolute_difference, normalize_difference, validate_pair, DegeneratePolicy,
    TRANSFORM_TOLERANCE,
};
pub use threshold::{
    histogram, otsu_from_histogram, otsu_threshold, threshold_mask, Otsu, OtsuResult,
};
