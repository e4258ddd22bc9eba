//! Noise cleaning for binary change masks
//!
//! Small true regions are treated as speckle and cleared; small enclosed
//! false regions are treated as gaps inside a changed area and filled.

use ndarray::Zip;
use geodiff_core::{Algorithm, Error, Mask, Result};

use super::{label_components, Connectivity};

/// Parameters for mask cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanParams {
    /// True regions with fewer pixels than this are removed
    pub min_object_size: usize,
    /// Enclosed false regions with fewer pixels than this are filled
    pub hole_area_threshold: usize,
    /// Neighbour rule for both passes
    pub connectivity: Connectivity,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            min_object_size: 500,
            hole_area_threshold: 250,
            connectivity: Connectivity::Four,
        }
    }
}

impl CleanParams {
    /// Build parameters from possibly negative user input
    pub fn try_new(
        min_object_size: i64,
        hole_area_threshold: i64,
        connectivity: Connectivity,
    ) -> Result<Self> {
        Ok(Self {
            min_object_size: non_negative("min_object_size", min_object_size)?,
            hole_area_threshold: non_negative("hole_area_threshold", hole_area_threshold)?,
            connectivity,
        })
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: "must be a non-negative pixel count".to_string(),
    })
}

/// Pixel counts changed by a cleaning run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Pixels cleared by small-object removal
    pub pixels_removed: usize,
    /// Pixels set by hole filling
    pub pixels_filled: usize,
}

/// Clear every true region with fewer than `min_size` pixels.
///
/// Returns the number of pixels cleared. `min_size` of 0 or 1 never
/// removes anything.
pub fn remove_small_objects(mask: &mut Mask, min_size: usize, connectivity: Connectivity) -> usize {
    if min_size <= 1 {
        return 0;
    }

    let comps = label_components(mask, true, connectivity);
    let small: Vec<bool> = std::iter::once(false)
        .chain(comps.regions().iter().map(|r| r.pixel_count < min_size))
        .collect();

    let mut removed = 0;
    Zip::from(mask.data_mut())
        .and(comps.labels())
        .for_each(|cell, &label| {
            if label != 0 && small[label as usize] {
                *cell = false;
                removed += 1;
            }
        });
    removed
}

/// Set every enclosed false region with fewer than `area_threshold` pixels.
///
/// Only regions that do not touch the grid border are holes; a false region
/// open to the edge is background regardless of its size.
/// Returns the number of pixels filled.
pub fn fill_small_holes(mask: &mut Mask, area_threshold: usize, connectivity: Connectivity) -> usize {
    if area_threshold <= 1 {
        return 0;
    }

    let comps = label_components(mask, false, connectivity);
    let fill: Vec<bool> = std::iter::once(false)
        .chain(
            comps
                .regions()
                .iter()
                .map(|r| !r.touches_border && r.pixel_count < area_threshold),
        )
        .collect();

    let mut filled = 0;
    Zip::from(mask.data_mut())
        .and(comps.labels())
        .for_each(|cell, &label| {
            if label != 0 && fill[label as usize] {
                *cell = true;
                filled += 1;
            }
        });
    filled
}

/// Small-object removal followed by small-hole filling
pub fn clean_mask(mask: &mut Mask, params: &CleanParams) -> CleanSummary {
    let pixels_removed = remove_small_objects(mask, params.min_object_size, params.connectivity);
    let pixels_filled = fill_small_holes(mask, params.hole_area_threshold, params.connectivity);
    CleanSummary {
        pixels_removed,
        pixels_filled,
    }
}

/// Mask cleaning algorithm
#[derive(Debug, Clone, Default)]
pub struct CleanMask;

impl Algorithm for CleanMask {
    type Input = Mask;
    type Output = (Mask, CleanSummary);
    type Params = CleanParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CleanMask"
    }

    fn description(&self) -> &'static str {
        "Remove small objects and fill small enclosed holes in a binary mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let mut mask = input;
        let summary = clean_mask(&mut mask, &params);
        Ok((mask, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn make_mask(rows: usize, cols: usize, boxes: &[(usize, usize, usize, usize)]) -> Mask {
        let mut mask = Mask::new(rows, cols);
        for &(r0, c0, r1, c1) in boxes {
            for r in r0..r1 {
                for c in c0..c1 {
                    mask.set(r, c, true);
                }
            }
        }
        mask
    }

    #[test]
    fn test_remove_small_objects() {
        // 3x3 speck and 6x6 block
        let mut mask = make_mask(20, 20, &[(1, 1, 4, 4), (10, 10, 16, 16)]);
        let removed = remove_small_objects(&mut mask, 10, Connectivity::Four);
        assert_eq!(removed, 9);
        assert_eq!(mask.count(), 36);
        assert!(!mask.get(2, 2));
        assert!(mask.get(12, 12));
    }

    #[test]
    fn test_remove_keeps_exact_size() {
        let mut mask = make_mask(10, 10, &[(2, 2, 5, 5)]);
        assert_eq!(remove_small_objects(&mut mask, 9, Connectivity::Four), 0);
        assert_eq!(mask.count(), 9);
    }

    #[test]
    fn test_connectivity_changes_object_size() {
        // Two 2x2 blocks touching only at a corner
        let mut four = make_mask(6, 6, &[(0, 0, 2, 2), (2, 2, 4, 4)]);
        let mut eight = four.clone();
        remove_small_objects(&mut four, 5, Connectivity::Four);
        remove_small_objects(&mut eight, 5, Connectivity::Eight);
        assert!(four.is_clear());
        assert_eq!(eight.count(), 8);
    }

    #[test]
    fn test_fill_small_holes() {
        // 5x5 block with a 3x3 hole
        let mut mask = make_mask(10, 10, &[(2, 2, 7, 7)]);
        for r in 3..6 {
            for c in 3..6 {
                mask.set(r, c, false);
            }
        }
        let filled = fill_small_holes(&mut mask, 10, Connectivity::Four);
        assert_eq!(filled, 9);
        assert_eq!(mask.count(), 25);
    }

    #[test]
    fn test_hole_at_threshold_kept() {
        let mut mask = make_mask(10, 10, &[(2, 2, 7, 7)]);
        for r in 3..6 {
            for c in 3..6 {
                mask.set(r, c, false);
            }
        }
        assert_eq!(fill_small_holes(&mut mask, 9, Connectivity::Four), 0);
        assert_eq!(mask.count(), 16);
    }

    #[test]
    fn test_border_background_never_filled() {
        let mut mask = Mask::from_array(Array2::from_elem((4, 4), true));
        mask.set(0, 0, false);
        assert_eq!(fill_small_holes(&mut mask, 100, Connectivity::Four), 0);
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn test_clean_bounds() {
        let original = make_mask(30, 30, &[(1, 1, 3, 3), (5, 5, 25, 25)]);
        let mut mask = original.clone();
        mask.set(15, 15, false);

        let after_remove = {
            let mut m = mask.clone();
            remove_small_objects(&mut m, 10, Connectivity::Four);
            m
        };
        Zip::from(after_remove.data()).and(mask.data()).for_each(|&a, &b| assert!(!a || b));

        let summary = clean_mask(&mut mask, &CleanParams {
            min_object_size: 10,
            hole_area_threshold: 5,
            connectivity: Connectivity::Four,
        });
        assert_eq!(summary.pixels_removed, 4);
        assert_eq!(summary.pixels_filled, 1);
        Zip::from(after_remove.data()).and(mask.data()).for_each(|&a, &b| assert!(!a || b));
        assert_eq!(mask.count(), 400);
    }

    #[test]
    fn test_try_new_rejects_negative() {
        let err = CleanParams::try_new(-1, 250, Connectivity::Four).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "min_object_size", .. }));
        let err = CleanParams::try_new(500, -5, Connectivity::Four).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "hole_area_threshold", .. }));
        let ok = CleanParams::try_new(0, 0, Connectivity::Eight).unwrap();
        assert_eq!(ok.min_object_size, 0);
    }

    #[test]
    fn test_defaults() {
        let p = CleanParams::default();
        assert_eq!(p.min_object_size, 500);
        assert_eq!(p.hole_area_threshold, 250);
        assert_eq!(p.connectivity, Connectivity::Four);
    }
}
