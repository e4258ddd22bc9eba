//! GeoJSON output for feature collections
//!
//! Polygons are written as RFC 7946 geometries. When the collection's CRS
//! has an EPSG code, the legacy named `crs` member is added so desktop GIS
//! tools place projected coordinates correctly.

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct GeoJsonCollection {
    #[serde(rename = "type")]
    type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    crs: Option<NamedCrs>,
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrs {
    #[serde(rename = "type")]
    type_: String,
    properties: NamedCrsProperties,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCrsProperties {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeoJsonFeature {
    #[serde(rename = "type")]
    type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    properties: BTreeMap<String, AttributeValue>,
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeoJsonGeometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

fn ring_coords(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_coords(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_coords)
        .collect()
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn convert_geometry(geometry: &Geometry<f64>) -> Result<GeoJsonGeometry> {
    match geometry {
        Geometry::Polygon(p) => Ok(GeoJsonGeometry::Polygon(polygon_coords(p))),
        Geometry::MultiPolygon(mp) => Ok(GeoJsonGeometry::MultiPolygon(
            mp.0.iter().map(polygon_coords).collect(),
        )),
        other => Err(Error::UnsupportedDataType(format!(
            "GeoJSON writer handles polygons only, got {}",
            geometry_name(other)
        ))),
    }
}

fn convert_feature(feature: &Feature) -> Result<GeoJsonFeature> {
    Ok(GeoJsonFeature {
        type_: "Feature".to_string(),
        id: feature.id.clone(),
        properties: feature.properties.clone(),
        geometry: feature.geometry.as_ref().map(convert_geometry).transpose()?,
    })
}

/// Serialize a feature collection to GeoJSON bytes (pretty-printed)
pub fn geojson_to_bytes(collection: &FeatureCollection) -> Result<Vec<u8>> {
    let crs = collection
        .crs
        .as_ref()
        .map(|crs| crs.ogc_urn())
        .map(|name| NamedCrs {
            type_: "name".to_string(),
            properties: NamedCrsProperties { name },
        });

    let doc = GeoJsonCollection {
        type_: "FeatureCollection".to_string(),
        crs,
        features: collection
            .iter()
            .map(convert_feature)
            .collect::<Result<Vec<_>>>()?,
    };

    let mut bytes = serde_json::to_vec_pretty(&doc)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write a feature collection as a GeoJSON file, overwriting any existing file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let bytes = geojson_to_bytes(collection)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use geo_types::{line_string, point};

    fn unit_square() -> Polygon<f64> {
        Polygon::new(
            line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ],
            vec![],
        )
    }

    #[test]
    fn test_polygon_collection_json() {
        let mut fc = FeatureCollection::new(Some(CRS::from_epsg(32633)));
        let mut feature = Feature::new(Geometry::Polygon(unit_square())).with_id("0");
        feature.set_property("pixel_count", AttributeValue::Int(1));
        fc.push(feature);

        let bytes = geojson_to_bytes(&fc).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32633");
        let feature = &value["features"][0];
        assert_eq!(feature["id"], "0");
        assert_eq!(feature["properties"]["pixel_count"], 1);
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_empty_collection_without_crs() {
        let fc = FeatureCollection::new(None);
        let value: serde_json::Value =
            serde_json::from_slice(&geojson_to_bytes(&fc).unwrap()).unwrap();
        assert!(value.get("crs").is_none());
        assert_eq!(value["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_point_rejected() {
        let mut fc = FeatureCollection::new(None);
        fc.push(Feature::new(Geometry::Point(point!(x: 0.0, y: 0.0))));
        assert!(matches!(
            geojson_to_bytes(&fc),
            Err(Error::UnsupportedDataType(_))
        ));
    }
}
