//! Pixel connectivity rules for region labelling and tracing

use geodiff_core::raster::Neighborhood;
use std::fmt;

/// Which neighbours make two pixels part of the same region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge-sharing neighbours only (N, S, E, W)
    #[default]
    Four,
    /// Edge- and corner-sharing neighbours
    Eight,
}

impl Connectivity {
    /// The 3x3 neighbourhood this connectivity corresponds to
    pub fn neighborhood(&self) -> Neighborhood {
        match self {
            Connectivity::Four => Neighborhood::Rook3x3,
            Connectivity::Eight => Neighborhood::Queen3x3,
        }
    }

    /// (dr, dc) offsets of the connected neighbours, center excluded
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        self.neighborhood().offsets_no_center()
    }

    /// Short lowercase name, as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Connectivity::Four => "four",
            Connectivity::Eight => "eight",
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
