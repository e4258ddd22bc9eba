//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identified by its EPSG code
///
/// GeoTIFF inputs carry their CRS as GeoKeys, which resolve to an EPSG
/// code. User-defined systems have no code and are read as no CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether the EPSG code falls in the geographic (lat/lon) block.
    ///
    /// EPSG reserves 4000-4999 for geographic 2D systems; everything else
    /// we write is tagged as projected.
    pub fn is_geographic(&self) -> bool {
        (4000..5000).contains(&self.epsg)
    }

    /// Compare two optional CRS values the way the input validator needs:
    /// both absent is compatible, exactly one absent is not.
    pub fn compatible(a: Option<&CRS>, b: Option<&CRS>) -> bool {
        a == b
    }

    /// OGC URN used by the GeoJSON `crs` member, e.g. `urn:ogc:def:crs:EPSG::32633`
    pub fn ogc_urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}
