//! GeoTIFF georeferencing: key directory and model tags
//!
//! Reading extracts the declared EPSG code and the pixel-to-world
//! transform from an IFD. Writing produces the minimal key directory and
//! model tags for an output raster in a known EPSG system.

use log::{debug, warn};

use crate::coordinate::crs::{Crs, CrsKind};
use crate::coordinate::geotransform::GeoTransform;
use crate::tiff::constants::{geo_keys, model_type, raster_type, tags};
use crate::tiff::ifd::{IFDEntry, TagValue, IFD};

/// CRS as declared in the key directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredCrs {
    /// ProjectedCSType or GeographicType carries an EPSG code
    Epsg(u32),
    /// Keys describe a system without an authority code
    UserDefined,
    /// Model type is geocentric; carries the GeographicType code, or
    /// the user-defined marker when there is none
    Geocentric(u32),
}

/// A single GeoKey entry
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKeyEntry {
    pub key_id: u16,
    pub location: u16,
    pub count: u16,
    pub value_offset: u16,
}

/// Georeferencing found in an IFD
#[derive(Debug, Clone, Default)]
pub struct GeoReference {
    pub model_type: Option<u16>,
    pub raster_type: Option<u16>,
    pub declared_crs: Option<DeclaredCrs>,
    pub citation: Option<String>,
    pub transform: Option<GeoTransform>,
}

impl GeoReference {
    /// Extracts georeferencing from the tags of an IFD
    ///
    /// Missing or malformed GeoTIFF tags produce empty fields rather than
    /// errors; a raster without georeferencing is still a raster.
    pub fn from_ifd(ifd: &IFD) -> Self {
        let mut reference = GeoReference::default();

        if let Some(directory) = ifd.get_unsigned_vec(tags::GEO_KEY_DIRECTORY_TAG) {
            let entries = parse_key_directory(&directory);
            let ascii_params = ifd.get_ascii(tags::GEO_ASCII_PARAMS_TAG).unwrap_or("");

            for entry in &entries {
                match entry.key_id {
                    geo_keys::MODEL_TYPE => reference.model_type = short_value(entry),
                    geo_keys::RASTER_TYPE => reference.raster_type = short_value(entry),
                    geo_keys::CITATION => reference.citation = ascii_value(entry, ascii_params),
                    _ => {}
                }
            }

            let code_of = |key: u16| entries.iter().find(|e| e.key_id == key).and_then(short_value);
            reference.declared_crs = if reference.model_type == Some(model_type::GEOCENTRIC) {
                let code = code_of(geo_keys::GEOGRAPHIC_TYPE).unwrap_or(geo_keys::USER_DEFINED);
                Some(DeclaredCrs::Geocentric(code as u32))
            } else {
                code_of(geo_keys::PROJECTED_CS_TYPE)
                    .or_else(|| code_of(geo_keys::GEOGRAPHIC_TYPE))
                    .map(|code| match code {
                        geo_keys::USER_DEFINED => DeclaredCrs::UserDefined,
                        code => DeclaredCrs::Epsg(code as u32),
                    })
            };

            if reference.declared_crs.is_none() && reference.model_type.is_some() {
                // Model type without a code means the system is spelled out in parameters
                reference.declared_crs = Some(DeclaredCrs::UserDefined);
            }
        }

        reference.transform = read_transform(ifd, reference.raster_type);
        debug!(
            "GeoReference: crs={:?}, model={:?}, transform={:?}",
            reference.declared_crs, reference.model_type, reference.transform
        );
        reference
    }
}

/// Splits a GeoKeyDirectory value array into its entries
pub fn parse_key_directory(directory: &[u64]) -> Vec<GeoKeyEntry> {
    if directory.len() < 4 {
        warn!("GeoKeyDirectory too short ({} values)", directory.len());
        return Vec::new();
    }

    let declared = directory[3] as usize;
    let available = (directory.len() - 4) / 4;
    if declared > available {
        warn!("GeoKeyDirectory declares {} keys but holds {}", declared, available);
    }

    directory[4..]
        .chunks_exact(4)
        .take(declared.min(available))
        .map(|chunk| GeoKeyEntry {
            key_id: chunk[0] as u16,
            location: chunk[1] as u16,
            count: chunk[2] as u16,
            value_offset: chunk[3] as u16,
        })
        .collect()
}

fn short_value(entry: &GeoKeyEntry) -> Option<u16> {
    (entry.location == 0).then_some(entry.value_offset)
}

fn ascii_value(entry: &GeoKeyEntry, params: &str) -> Option<String> {
    if entry.location != tags::GEO_ASCII_PARAMS_TAG {
        return None;
    }
    let start = entry.value_offset as usize;
    let end = (start + entry.count as usize).min(params.len());
    params
        .get(start..end)
        .map(|s| s.trim_end_matches(['|', '\0']).to_string())
}

/// Builds the pixel-to-world transform from the model tags
fn read_transform(ifd: &IFD, raster_type: Option<u16>) -> Option<GeoTransform> {
    let transform = if let Some(m) = ifd
        .get_f64_vec(tags::MODEL_TRANSFORMATION_TAG)
        .filter(|m| m.len() >= 16)
    {
        GeoTransform::from_coefficients([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        let tiepoint = ifd.get_f64_vec(tags::MODEL_TIEPOINT_TAG).filter(|t| t.len() >= 6)?;
        let scale = ifd.get_f64_vec(tags::MODEL_PIXEL_SCALE_TAG).filter(|s| s.len() >= 2)?;
        if tiepoint.len() > 6 {
            debug!("Using first of {} tiepoints", tiepoint.len() / 6);
        }

        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (scale[0], scale[1]);
        GeoTransform::north_up(x - i * sx, y + j * sy, sx, -sy)
    };

    if raster_type == Some(raster_type::PIXEL_IS_POINT) {
        // Tiepoints address pixel centres; shift to the outer edge
        let (corner_x, corner_y) = transform.apply(-0.5, -0.5);
        return Some(GeoTransform {
            origin_x: corner_x,
            origin_y: corner_y,
            ..transform
        });
    }
    Some(transform)
}

/// Key directory declaring `crs` with pixel-is-area rasters
pub fn key_directory_for(crs: &Crs) -> Vec<u16> {
    let [version, revision, minor] = geo_keys::DIRECTORY_VERSION;
    let (model, code_key) = match crs.kind() {
        CrsKind::Geographic => (model_type::GEOGRAPHIC, geo_keys::GEOGRAPHIC_TYPE),
        _ => (model_type::PROJECTED, geo_keys::PROJECTED_CS_TYPE),
    };
    let code = u16::try_from(crs.epsg()).unwrap_or(geo_keys::USER_DEFINED);

    vec![
        version, revision, minor, 3,
        geo_keys::MODEL_TYPE, 0, 1, model,
        geo_keys::RASTER_TYPE, 0, 1, raster_type::PIXEL_IS_AREA,
        code_key, 0, 1, code,
    ]
}

/// Model tags (scale and tiepoint, or a full matrix) for a transform
pub fn model_entries(transform: &GeoTransform) -> Vec<IFDEntry> {
    if transform.is_north_up() {
        vec![
            IFDEntry::new(
                tags::MODEL_PIXEL_SCALE_TAG,
                TagValue::Float(vec![transform.pixel_width, -transform.pixel_height, 0.0]),
            ),
            IFDEntry::new(
                tags::MODEL_TIEPOINT_TAG,
                TagValue::Float(vec![0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0]),
            ),
        ]
    } else {
        let t = transform;
        vec![IFDEntry::new(
            tags::MODEL_TRANSFORMATION_TAG,
            TagValue::Float(vec![
                t.pixel_width, t.row_rotation, 0.0, t.origin_x,
                t.col_rotation, t.pixel_height, 0.0, t.origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ]),
        )]
    }
}
