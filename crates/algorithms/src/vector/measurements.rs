//! Geometric measurements on change polygons

use geo::{Area as GeoArea, Geometry};
use geodiff_core::vector::FeatureCollection;

/// Calculate the area of a geometry.
///
/// Returns unsigned area in CRS units squared (square degrees for a
/// geographic CRS). Holes are subtracted; non-areal geometries give 0.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        _ => 0.0,
    }
}

/// Summed area of every feature geometry in a collection
pub fn total_area(collection: &FeatureCollection) -> f64 {
    collection
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(area)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use geodiff_core::vector::Feature;

    fn square(size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (size, 0.0), (size, size), (0.0, size), (0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_area_square() {
        let a = area(&Geometry::Polygon(square(10.0)));
        assert!((a - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_with_hole() {
        let poly = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (2.0, 2.0), (2.0, 8.0), (8.0, 8.0), (8.0, 2.0), (2.0, 2.0),
            ])],
        );
        assert!((area(&Geometry::Polygon(poly)) - 64.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_non_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(area(&line), 0.0);
    }

    #[test]
    fn test_total_area() {
        let mut fc = FeatureCollection::new(None);
        fc.push(Feature::new(Geometry::Polygon(square(2.0))));
        fc.push(Feature::new(Geometry::Polygon(square(3.0))));
        assert!((total_area(&fc) - 13.0).abs() < 1e-10);
    }
}
