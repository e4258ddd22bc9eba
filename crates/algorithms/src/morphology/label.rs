//! Connected-component labelling of binary masks

use ndarray::Array2;
use geodiff_core::raster::Neighborhood;
use geodiff_core::Mask;

use super::Connectivity;

/// One connected region of equal-valued pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Label in the component grid (1-based)
    pub label: u32,
    /// Number of pixels in the region
    pub pixel_count: usize,
    /// Whether any pixel lies on the outer row/column of the grid
    pub touches_border: bool,
    /// First pixel of the region in raster-scan order, as (row, col)
    pub first_pixel: (usize, usize),
}

/// Labelled connected components of a mask.
///
/// Regions are numbered in raster-scan order of their first pixel.
/// Label 0 marks pixels that did not have the labelled value.
#[derive(Debug, Clone)]
pub struct Components {
    labels: Array2<u32>,
    regions: Vec<Region>,
    connectivity: Connectivity,
}

impl Components {
    /// Label grid, same shape as the mask
    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    /// Regions ordered by label
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region with the given label
    pub fn region(&self, label: u32) -> Option<&Region> {
        (label as usize).checked_sub(1).and_then(|i| self.regions.get(i))
    }

    /// Label at (row, col), or `None` for unlabelled or out-of-range cells
    pub fn label_at(&self, row: usize, col: usize) -> Option<u32> {
        self.labels.get((row, col)).copied().filter(|&l| l != 0)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Label every connected region of pixels equal to `value`.
///
/// Uses an explicit stack so large regions cannot overflow the call stack.
pub fn label_components(mask: &Mask, value: bool, connectivity: Connectivity) -> Components {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let offsets = connectivity.offsets();

    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if data[(row, col)] != value || labels[(row, col)] != 0 {
                continue;
            }

            let label = regions.len() as u32 + 1;
            let mut region = Region {
                label,
                pixel_count: 0,
                touches_border: false,
                first_pixel: (row, col),
            };

            labels[(row, col)] = label;
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                region.pixel_count += 1;
                if r == 0 || c == 0 || r + 1 == rows || c + 1 == cols {
                    region.touches_border = true;
                }

                for &offset in &offsets {
                    let Some((nr, nc)) = Neighborhood::step(r, c, offset, rows, cols) else {
                        continue;
                    };
                    if data[(nr, nc)] == value && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = label;
                        stack.push((nr, nc));
                    }
                }
            }

            regions.push(region);
        }
    }

    Components {
        labels,
        regions,
        connectivity,
    }
}
