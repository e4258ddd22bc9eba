//! Native GeoTIFF reading/writing built on the `tiff` crate
//!
//! Georeferencing is carried through the GeoTIFF tags:
//! - ModelPixelScale + ModelTiepoint (north-up grids) or ModelTransformation
//! - GeoKeyDirectory (EPSG code of the projected or geographic CRS)
//! - GDAL_NODATA (read only)

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;

// GeoKeyDirectory key ids
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read a single-band GeoTIFF file into a Raster
///
/// Samples of any integer or float type are cast to `T` on read. A path
/// that exists but cannot be opened or decoded is reported as
/// [`Error::InputUnreadable`].
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let unreadable = |reason: String| Error::InputUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    decode_geotiff(file).map_err(|e| unreadable(e.to_string()))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(context: &'static str) -> impl Fn(tiff::TiffError) -> Error {
    move |e| Error::Other(format!("{}: {}", context, e))
}

macro_rules! cast_samples {
    ($buf:expr) => {
        $buf.iter()
            .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    };
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    match decoder.colortype().map_err(tiff_err("Cannot read color type"))? {
        ColorType::Gray(_) => {}
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "expected a single-band raster, found {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok());

    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_samples!(buf),
        DecodingResult::U16(buf) => cast_samples!(buf),
        DecodingResult::U32(buf) => cast_samples!(buf),
        DecodingResult::U64(buf) => cast_samples!(buf),
        DecodingResult::I8(buf) => cast_samples!(buf),
        DecodingResult::I16(buf) => cast_samples!(buf),
        DecodingResult::I32(buf) => cast_samples!(buf),
        DecodingResult::I64(buf) => cast_samples!(buf),
        DecodingResult::F32(buf) => cast_samples!(buf),
        DecodingResult::F64(buf) => cast_samples!(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = transform {
        raster.set_transform(transform);
    }
    raster.set_crs(crs);
    raster.set_nodata(nodata.and_then(num_traits::cast));

    Ok(raster)
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, or from the
/// ModelTransformation matrix
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let t = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if t.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: t[3],
        origin_y: t[7],
        pixel_width: t[0],
        pixel_height: t[5],
        row_rotation: t[1],
        col_rotation: t[4],
    })
}

/// EPSG code from the GeoKeyDirectory
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_geokeys(&keys)
}

/// Parse `[version, revision, minor, count, (id, location, count, value)*]`,
/// returning the projected CRS if present, else the geographic one.
fn parse_geokeys(keys: &[u16]) -> Option<CRS> {
    if keys.len() < 4 {
        return None;
    }
    let num_keys = keys[3] as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(num_keys) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        // Non-zero location means the value lives in another tag
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match id {
            PROJECTED_CS_TYPE => projected = Some(value),
            GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    projected.or(geographic).map(|code| CRS::from_epsg(code as u32))
}

/// GeoKeyDirectory describing `crs`; a bare model/raster type header when
/// no EPSG code is available
fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs
        .and_then(|c| u16::try_from(c.epsg()).ok());
    let geographic = crs.is_some_and(|c| c.is_geographic());

    let mut entries: Vec<[u16; 4]> = vec![
        // ModelTypeProjected = 1, ModelTypeGeographic = 2
        [GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }],
        // RasterPixelIsArea
        [GT_RASTER_TYPE, 0, 1, 1],
    ];
    if let Some(code) = code {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    for entry in entries {
        keys.extend_from_slice(&entry);
    }
    keys
}

/// Write a Raster to a GeoTIFF file
///
/// `u8` rasters are written as 8-bit grayscale; every other type is
/// written as 32-bit float. Existing files are overwritten.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

macro_rules! write_geo_tags {
    ($image:expr, $raster:expr) => {{
        let gt = $raster.transform();
        let directory = $image.encoder();
        if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
            let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            directory
                .write_tag(Tag::ModelPixelScaleTag, &scale[..])
                .map_err(tiff_err("Cannot write scale tag"))?;
            directory
                .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
                .map_err(tiff_err("Cannot write tiepoint tag"))?;
        } else {
            let matrix = [
                gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
                gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            directory
                .write_tag(Tag::ModelTransformationTag, &matrix[..])
                .map_err(tiff_err("Cannot write transformation tag"))?;
        }
        let geokeys = build_geokeys($raster.crs());
        directory
            .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
            .map_err(tiff_err("Cannot write geokey tag"))?;
    }};
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    match T::data_type() {
        DataType::UInt8 => {
            let data: Vec<u8> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(0))
                .collect();
            let mut image = encoder
                .new_image::<Gray8>(cols as u32, rows as u32)
                .map_err(tiff_err("Cannot create TIFF image"))?;
            write_geo_tags!(image, raster);
            image
                .write_data(&data)
                .map_err(tiff_err("Cannot write image data"))?;
        }
        _ => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            let mut image = encoder
                .new_image::<Gray32Float>(cols as u32, rows as u32)
                .map_err(tiff_err("Cannot create TIFF image"))?;
            write_geo_tags!(image, raster);
            image
                .write_data(&data)
                .map_err(tiff_err("Cannot write image data"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_raster() -> Raster<f64> {
        let mut raster: Raster<f64> = Raster::new(8, 6);
        for r in 0..8 {
            for c in 0..6 {
                raster.set(r, c, (r * 6 + c) as f64 * 0.5).unwrap();
            }
        }
        raster.set_transform(GeoTransform::new(500_000.0, 4_100_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32633)));
        raster
    }

    #[test]
    fn test_buffer_roundtrip_f64() {
        let raster = sample_raster();
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(loaded.shape(), (8, 6));
        assert_relative_eq!(loaded.get(7, 5).unwrap(), 23.5, epsilon = 1e-6);
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.crs(), Some(&CRS::from_epsg(32633)));
    }

    #[test]
    fn test_buffer_roundtrip_u8_widened() {
        let mut raster: Raster<u8> = Raster::new(4, 4);
        raster.set(1, 2, 255).unwrap();
        raster.set_crs(Some(CRS::wgs84()));
        let bytes = write_geotiff_to_buffer(&raster).unwrap();

        let as_u8: Raster<u8> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(as_u8.get(1, 2).unwrap(), 255);
        assert_eq!(as_u8.crs(), Some(&CRS::wgs84()));

        let as_f64: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_relative_eq!(as_f64.get(1, 2).unwrap(), 255.0);
    }

    #[test]
    fn test_rotated_transform_roundtrip() {
        let mut raster = sample_raster();
        let mut gt = *raster.transform();
        gt.row_rotation = 0.5;
        gt.col_rotation = -0.25;
        raster.set_transform(gt);

        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(loaded.transform(), &gt);
    }

    #[test]
    fn test_missing_file() {
        let err = read_geotiff::<f64, _>("/definitely/not/here.tif").unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn test_garbage_file_is_unreadable() {
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        std::fs::write(tmp.path(), b"not a tiff").unwrap();
        let err = read_geotiff::<f64, _>(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::InputUnreadable { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::InputNotFound);
    }

    #[test]
    fn test_file_roundtrip() {
        let raster = sample_raster();
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path()).unwrap();
        let loaded: Raster<f64> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(loaded.shape(), raster.shape());
    }

    #[test]
    fn test_geokeys_roundtrip() {
        let keys = build_geokeys(Some(&CRS::from_epsg(32633)));
        assert_eq!(keys[3], 3);
        assert_eq!(parse_geokeys(&keys), Some(CRS::from_epsg(32633)));

        let keys = build_geokeys(Some(&CRS::from_epsg(4326)));
        assert_eq!(parse_geokeys(&keys), Some(CRS::from_epsg(4326)));

        let keys = build_geokeys(None);
        assert_eq!(keys[3], 2);
        assert_eq!(parse_geokeys(&keys), None);
    }
}
