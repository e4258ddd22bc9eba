//! Neighborhood patterns for raster analysis

/// Defines a neighborhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 3x3 neighborhood (8 neighbors + center)
    Queen3x3,
    /// 3x3 without corners (4 neighbors + center)
    Rook3x3,
}

impl Neighborhood {
    /// Check if a relative position is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Queen3x3 => dr.abs() <= 1 && dc.abs() <= 1,
            Neighborhood::Rook3x3 => (dr.abs() <= 1 && dc == 0) || (dr == 0 && dc.abs() <= 1),
        }
    }

    /// Relative positions in this neighborhood, row-major, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let mut offsets = Vec::new();

        for dr in -1..=1 {
            for dc in -1..=1 {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }

        offsets
    }

    /// Get offsets excluding the center cell
    pub fn offsets_no_center(&self) -> Vec<(isize, isize)> {
        self.offsets()
            .into_iter()
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .collect()
    }

    /// Neighbor of (row, col) at offset (dr, dc), if it lies inside a
    /// `rows` x `cols` grid
    pub fn step(
        row: usize,
        col: usize,
        (dr, dc): (isize, isize),
        rows: usize,
        cols: usize,
    ) -> Option<(usize, usize)> {
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        (r < rows && c < cols).then_some((r, c))
    }
}
