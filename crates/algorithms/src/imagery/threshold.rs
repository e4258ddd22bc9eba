//! Otsu's automatic threshold on 8-bit intensity grids

use geodiff_core::raster::Raster;
use geodiff_core::{Algorithm, Error, Mask, Result};

const NUM_BINS: usize = 256;

/// Result of Otsu's threshold computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtsuResult {
    /// Chosen threshold; pixels strictly above it are "changed"
    pub threshold: u8,
    /// Between-class variance at the threshold (0 for a single-valued grid)
    pub variance: f64,
    /// Fraction of pixels at or below the threshold
    pub below_ratio: f64,
}

/// 256-bin histogram of an 8-bit raster (every cell counts)
pub fn histogram(raster: &Raster<u8>) -> [u64; NUM_BINS] {
    let mut hist = [0u64; NUM_BINS];
    for &v in raster.data().iter() {
        hist[v as usize] += 1;
    }
    hist
}

/// Otsu's method over a 256-bin histogram.
///
/// Scans `t` in `0..=254` and keeps the smallest `t` maximising the
/// between-class variance `w0 * w1 * (mu0 - mu1)^2`, skipping splits where
/// either class is empty. A histogram with a single occupied bin yields
/// that bin as the threshold, so nothing lies strictly above it.
pub fn otsu_from_histogram(hist: &[u64; NUM_BINS]) -> OtsuResult {
    let total: u64 = hist.iter().sum();

    let occupied: Vec<usize> = (0..NUM_BINS).filter(|&i| hist[i] > 0).collect();
    if occupied.len() < 2 {
        return OtsuResult {
            threshold: occupied.first().map_or(0, |&i| i as u8),
            variance: 0.0,
            below_ratio: 1.0,
        };
    }

    let total_f = total as f64;
    let global_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut count_below = 0u64;
    let mut sum_below = 0.0f64;
    let mut best: Option<(usize, f64)> = None;

    for t in 0..NUM_BINS - 1 {
        count_below += hist[t];
        sum_below += t as f64 * hist[t] as f64;

        let count_above = total - count_below;
        if count_below == 0 || count_above == 0 {
            continue;
        }

        let w0 = count_below as f64 / total_f;
        let w1 = count_above as f64 / total_f;
        let mu0 = sum_below / count_below as f64;
        let mu1 = (global_sum - sum_below) / count_above as f64;

        let variance = w0 * w1 * (mu0 - mu1) * (mu0 - mu1);
        if best.map_or(true, |(_, v)| variance > v) {
            best = Some((t, variance));
        }
    }

    let (t, variance) = best.unwrap_or((occupied[0], 0.0));
    let below: u64 = hist[..=t].iter().sum();

    OtsuResult {
        threshold: t as u8,
        variance,
        below_ratio: below as f64 / total_f,
    }
}

/// Otsu threshold of an 8-bit intensity raster
pub fn otsu_threshold(raster: &Raster<u8>) -> OtsuResult {
    otsu_from_histogram(&histogram(raster))
}

/// Binary mask of cells strictly greater than the Otsu threshold
pub fn threshold_mask(raster: &Raster<u8>) -> (Mask, OtsuResult) {
    let otsu = otsu_threshold(raster);
    let t = otsu.threshold;
    (Mask::from_raster(raster, |v| v > t), otsu)
}

/// Otsu thresholding algorithm
#[derive(Debug, Clone, Default)]
pub struct Otsu;

impl Algorithm for Otsu {
    type Input = Raster<u8>;
    type Output = (Mask, OtsuResult);
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Otsu"
    }

    fn description(&self) -> &'static str {
        "Automatic binary threshold maximising between-class variance"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        Ok(threshold_mask(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raster_from(values: &[u8], rows: usize, cols: usize) -> Raster<u8> {
        Raster::from_vec(values.to_vec(), rows, cols).unwrap()
    }

    #[test]
    fn test_bimodal_split() {
        let mut values = vec![10u8; 50];
        values.extend(std::iter::repeat(200u8).take(50));
        let r = raster_from(&values, 10, 10);

        let otsu = otsu_threshold(&r);
        // Any t in [10, 199] separates the classes; the smallest is kept
        assert_eq!(otsu.threshold, 10);
        assert_relative_eq!(otsu.below_ratio, 0.5);
        assert_relative_eq!(otsu.variance, 0.25 * 190.0 * 190.0, epsilon = 1e-9);

        let (mask, _) = threshold_mask(&r);
        assert_eq!(mask.count(), 50);
    }

    #[test]
    fn test_single_valued_histogram() {
        let r = raster_from(&[77u8; 16], 4, 4);
        let (mask, otsu) = threshold_mask(&r);
        assert_eq!(otsu.threshold, 77);
        assert_eq!(otsu.variance, 0.0);
        assert!(mask.is_clear());
    }

    #[test]
    fn test_all_zero_grid() {
        let r: Raster<u8> = Raster::new(5, 5);
        let (mask, otsu) = threshold_mask(&r);
        assert_eq!(otsu.threshold, 0);
        assert!(mask.is_clear());
    }

    #[test]
    fn test_all_max_grid() {
        let r = raster_from(&[255u8; 9], 3, 3);
        let (mask, otsu) = threshold_mask(&r);
        assert_eq!(otsu.threshold, 255);
        assert!(mask.is_clear());
    }

    #[test]
    fn test_three_levels() {
        // Dominant background with two bright populations
        let mut values = vec![0u8; 80];
        values.extend(std::iter::repeat(128u8).take(10));
        values.extend(std::iter::repeat(255u8).take(10));
        let r = raster_from(&values, 10, 10);

        let otsu = otsu_threshold(&r);
        assert!(otsu.threshold < 128);
        let (mask, _) = threshold_mask(&r);
        assert_eq!(mask.count(), 20);
    }

    #[test]
    fn test_algorithm_trait() {
        let r = raster_from(&[0, 0, 255, 255], 2, 2);
        let (mask, otsu) = Otsu.execute_default(r).unwrap();
        assert_eq!(otsu.threshold, 0);
        assert_eq!(mask.count(), 2);
    }
}
