//! GeoTIFF reading/writing with the `tiff` crate
//!
//! Georeferencing is carried by the ModelPixelScale / ModelTiepoint tags,
//! the CRS by an EPSG entry in the GeoKey directory and the no-data value by
//! the GDAL_NODATA ascii tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Sample format used when encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    /// 32-bit IEEE float, for evidence and likelihood surfaces
    #[default]
    Float32,
    /// Unsigned byte, for classification masks
    UInt8,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample: SampleType,
}

impl GeoTiffOptions {
    pub fn mask() -> Self {
        Self {
            sample: SampleType::UInt8,
        }
    }
}

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    decode_geotiff(Cursor::new(bytes)).map_err(|reason| Error::format(path, reason))
}

/// Read a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data)).map_err(|reason| Error::format("<buffer>", reason))
}

fn cast_samples<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> std::result::Result<Raster<T>, String>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| format!("TIFF decode error: {e}"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| format!("cannot read dimensions: {e}"))?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder
        .read_image()
        .map_err(|e| format!("cannot read image data: {e}"))?
    {
        DecodingResult::F32(buf) => cast_samples(buf),
        DecodingResult::F64(buf) => cast_samples(buf),
        DecodingResult::U8(buf) => cast_samples(buf),
        DecodingResult::U16(buf) => cast_samples(buf),
        DecodingResult::U32(buf) => cast_samples(buf),
        DecodingResult::I8(buf) => cast_samples(buf),
        DecodingResult::I16(buf) => cast_samples(buf),
        DecodingResult::I32(buf) => cast_samples(buf),
        _ => return Err("unsupported TIFF sample format".to_string()),
    };

    if data.len() != rows * cols {
        return Err(format!(
            "expected {} samples for {rows}x{cols}, found {} (multi-band?)",
            rows * cols,
            data.len()
        ));
    }

    let mut raster = Raster::from_vec(data, rows, cols).map_err(|e| e.to_string())?;
    raster.set_transform(read_geotransform(&mut decoder)?);
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> std::result::Result<GeoTransform, String> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|_| "missing ModelPixelScale tag".to_string())?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|_| "missing ModelTiepoint tag".to_string())?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err("malformed georeferencing tags".to_string());
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .ok()?;
    // Header [version, revision, minor, count], then [key, location, count, value]
    keys.get(4..)?
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0 && entry[3] != USER_DEFINED && entry[3] != 0)
        .find(|entry| entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

fn read_nodata<T: RasterElement, R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<T> {
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    let value: f64 = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok()?;
    num_traits::cast(value)
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = write_geotiff_to_buffer(raster, options)?;
    std::fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

/// Encode a Raster as an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let options = options.unwrap_or_default();
    let mut buf = Vec::new();
    let cursor = Cursor::new(&mut buf);

    match options.sample {
        SampleType::Float32 => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            let nodata = raster.nodata().and_then(|v| v.to_f64());
            encode::<Gray32Float, _, _>(raster, &data, nodata, cursor)?;
        }
        SampleType::UInt8 => {
            let data: Vec<u8> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(u8::MAX))
                .collect();
            let nodata = raster.nodata().and_then(|v| v.to_f64());
            encode::<Gray8, _, _>(raster, &data, nodata, cursor)?;
        }
    }

    Ok(buf)
}

fn encode<C, T, W>(raster: &Raster<T>, data: &[C::Inner], nodata: Option<f64>, writer: W) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{what}: {e}"));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("cannot write tiepoint tag", e))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| tiff_err("cannot write geokey tag", e))?;

    if let Some(nd) = nodata {
        let text = if nd.is_nan() { "nan".to_string() } else { nd.to_string() };
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), text.as_str())
            .map_err(|e| tiff_err("cannot write nodata tag", e))?;
    }

    image
        .write_data(data)
        .map_err(|e| tiff_err("cannot write image data", e))
}

/// GeoKey directory: model type, raster-is-area and, when known, the EPSG code
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok());
    let geographic = crs.is_some_and(CRS::is_geographic);
    let model_type = if geographic { 2 } else { 1 };

    let mut keys = vec![1, 1, 0, 2, GT_MODEL_TYPE_KEY, 0, 1, model_type, GT_RASTER_TYPE_KEY, 0, 1, 1];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Raster<f32> {
        let mut r = Raster::from_vec((0..12).map(|v| v as f32 * 0.5).collect(), 3, 4).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32612)));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn test_float_roundtrip_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slope.tif");
        let raster = sample();
        write_geotiff(&raster, &path, None).unwrap();

        let back: Raster<f32> = read_geotiff(&path).unwrap();
        assert_eq!(back.shape(), (3, 4));
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32612));
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_relative_eq!(back.transform().origin_y, 4_600_000.0);
        assert_relative_eq!(back.get(2, 3).unwrap(), 5.5);
    }

    #[test]
    fn test_mask_roundtrip() {
        let mut mask: Raster<u8> = Raster::from_vec(vec![0, 1, 1, 0], 2, 2).unwrap();
        mask.set_crs(Some(CRS::wgs84()));
        let bytes = write_geotiff_to_buffer(&mask, Some(GeoTiffOptions::mask())).unwrap();
        let back: Raster<u8> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.data(), mask.data());
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_geotiff::<f32, _>("/nonexistent/hand.tif").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_garbage_is_format_error() {
        let err = read_geotiff_from_buffer::<f32>(b"not a tiff").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}

