//! Image File Directory (IFD) structures and methods
//!
//! An IFD is a collection of tag entries describing one image in a TIFF
//! file. The reader resolves every entry's values when the directory is
//! parsed, so lookups never have to go back to the file. The writer builds
//! entries from the same `TagValue` representation.

use std::collections::HashMap;
use std::fmt;

use crate::tiff::constants::{field_types, tags};

/// Decoded values of a single tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// BYTE, SBYTE and UNDEFINED values
    Bytes(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    /// SSHORT, SLONG and SLONG8 values
    Signed(Vec<i64>),
    /// RATIONAL and SRATIONAL values as numerator/denominator pairs
    Rational(Vec<(i64, i64)>),
    /// FLOAT and DOUBLE values
    Float(Vec<f64>),
}

impl TagValue {
    /// Number of values held
    pub fn count(&self) -> usize {
        match self {
            TagValue::Bytes(v) => v.len(),
            // Written with a trailing NUL
            TagValue::Ascii(s) => s.len() + 1,
            TagValue::Short(v) => v.len(),
            TagValue::Long(v) => v.len(),
            TagValue::Long8(v) => v.len(),
            TagValue::Signed(v) => v.len(),
            TagValue::Rational(v) => v.len(),
            TagValue::Float(v) => v.len(),
        }
    }

    /// Field type used when this value is written
    pub fn field_type(&self) -> u16 {
        match self {
            TagValue::Bytes(_) => field_types::BYTE,
            TagValue::Ascii(_) => field_types::ASCII,
            TagValue::Short(_) => field_types::SHORT,
            TagValue::Long(_) => field_types::LONG,
            TagValue::Long8(_) => field_types::LONG8,
            TagValue::Signed(_) => field_types::SLONG,
            TagValue::Rational(_) => field_types::RATIONAL,
            TagValue::Float(_) => field_types::DOUBLE,
        }
    }

    /// Values as unsigned integers, for any integral variant
    ///
    /// Negative signed values are rejected rather than wrapped.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Bytes(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Short(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long8(v) => Some(v.clone()),
            TagValue::Signed(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect(),
            _ => None,
        }
    }

    /// Values as floating point, for any numeric variant
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Float(v) => Some(v.clone()),
            TagValue::Rational(v) => Some(
                v.iter()
                    .map(|&(n, d)| if d == 0 { f64::NAN } else { n as f64 / d as f64 })
                    .collect(),
            ),
            TagValue::Signed(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => self
                .as_u64_vec()
                .map(|values| values.into_iter().map(|x| x as f64).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Short human-readable rendering, truncated for long arrays
    pub fn summary(&self) -> String {
        const SHOWN: usize = 6;
        fn list<T: fmt::Display>(values: &[T]) -> String {
            let head: Vec<String> = values.iter().take(SHOWN).map(|v| v.to_string()).collect();
            if values.len() > SHOWN {
                format!("[{}, ... ({} values)]", head.join(", "), values.len())
            } else {
                format!("[{}]", head.join(", "))
            }
        }

        match self {
            TagValue::Bytes(v) => list(v),
            TagValue::Ascii(s) => format!("\"{}\"", s),
            TagValue::Short(v) => list(v),
            TagValue::Long(v) => list(v),
            TagValue::Long8(v) => list(v),
            TagValue::Signed(v) => list(v),
            TagValue::Rational(v) => {
                let rendered: Vec<String> = v.iter().map(|(n, d)| format!("{}/{}", n, d)).collect();
                list(&rendered)
            }
            TagValue::Float(v) => list(v),
        }
    }
}

/// Represents an entry in an Image File Directory (IFD)
#[derive(Debug, Clone, PartialEq)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type as stored in the file
    pub field_type: u16,
    /// Decoded values
    pub value: TagValue,
}

impl IFDEntry {
    /// Creates an entry whose field type follows from the value
    pub fn new(tag: u16, value: TagValue) -> Self {
        IFDEntry {
            tag,
            field_type: value.field_type(),
            value,
        }
    }

    /// Creates an entry that keeps the field type read from a file
    pub fn with_field_type(tag: u16, field_type: u16, value: TagValue) -> Self {
        IFDEntry { tag, field_type, value }
    }

    /// Number of values in this entry
    pub fn count(&self) -> usize {
        self.value.count()
    }
}

/// Represents an Image File Directory (IFD) in a TIFF file
#[derive(Debug, Clone)]
pub struct IFD {
    /// Entries in this IFD, in file order
    pub entries: Vec<IFDEntry>,
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Index into `entries` by tag
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new empty IFD
    pub fn new(number: usize, offset: u64) -> Self {
        IFD {
            entries: Vec::new(),
            number,
            offset,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry, replacing an earlier entry with the same tag
    pub fn add_entry(&mut self, entry: IFDEntry) {
        match self.tag_map.get(&entry.tag) {
            Some(&index) => self.entries[index] = entry,
            None => {
                self.tag_map.insert(entry.tag, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn has_tag(&self, tag: u16) -> bool {
        self.tag_map.contains_key(&tag)
    }

    /// Gets an IFD entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).map(|&index| &self.entries[index])
    }

    /// First value of an integral tag
    pub fn get_unsigned(&self, tag: u16) -> Option<u64> {
        self.get_unsigned_vec(tag)?.first().copied()
    }

    /// All values of an integral tag
    pub fn get_unsigned_vec(&self, tag: u16) -> Option<Vec<u64>> {
        self.get_entry(tag)?.value.as_u64_vec()
    }

    /// All values of a numeric tag as floating point
    pub fn get_f64_vec(&self, tag: u16) -> Option<Vec<f64>> {
        self.get_entry(tag)?.value.as_f64_vec()
    }

    pub fn get_ascii(&self, tag: u16) -> Option<&str> {
        self.get_entry(tag)?.value.as_str()
    }

    /// Gets the dimensions of the image described by this IFD
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.get_unsigned(tags::IMAGE_WIDTH)?;
        let height = self.get_unsigned(tags::IMAGE_LENGTH)?;
        Some((width, height))
    }

    /// Returns number of samples per pixel (default 1 if not specified)
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.get_unsigned(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Whether this directory is flagged as a reduced-resolution overview
    pub fn is_overview(&self) -> bool {
        self.get_unsigned(tags::NEW_SUBFILE_TYPE)
            .map(|flags| flags & 1 == 1)
            .unwrap_or(false)
    }

    /// Entries ordered by ascending tag, as TIFF requires on disk
    pub fn sorted_entries(&self) -> Vec<&IFDEntry> {
        let mut entries: Vec<&IFDEntry> = self.entries.iter().collect();
        entries.sort_by_key(|entry| entry.tag);
        entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for IFD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IFD #{} (offset: {})", self.number, self.offset)?;
        writeln!(f, "  Number of entries: {}", self.entries.len())?;

        if let Some((width, height)) = self.get_dimensions() {
            writeln!(f, "  Dimensions: {}x{}", width, height)?;
        }
        writeln!(f, "  Samples per pixel: {}", self.get_samples_per_pixel())?;

        writeln!(f, "  Tags:")?;
        for entry in self.sorted_entries() {
            writeln!(
                f,
                "    {} ({}): {}",
                entry.tag,
                tag_name(entry.tag),
                entry.value.summary()
            )?;
        }

        Ok(())
    }
}

/// Human-readable name of a tag, for reports and log messages
pub fn tag_name(tag: u16) -> &'static str {
    match tag {
        tags::NEW_SUBFILE_TYPE => "NewSubfileType",
        tags::IMAGE_WIDTH => "ImageWidth",
        tags::IMAGE_LENGTH => "ImageLength",
        tags::BITS_PER_SAMPLE => "BitsPerSample",
        tags::COMPRESSION => "Compression",
        tags::PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        tags::STRIP_OFFSETS => "StripOffsets",
        tags::SAMPLES_PER_PIXEL => "SamplesPerPixel",
        tags::ROWS_PER_STRIP => "RowsPerStrip",
        tags::STRIP_BYTE_COUNTS => "StripByteCounts",
        tags::PLANAR_CONFIGURATION => "PlanarConfiguration",
        tags::SOFTWARE => "Software",
        tags::PREDICTOR => "Predictor",
        tags::TILE_WIDTH => "TileWidth",
        tags::TILE_LENGTH => "TileLength",
        tags::TILE_OFFSETS => "TileOffsets",
        tags::TILE_BYTE_COUNTS => "TileByteCounts",
        tags::EXTRA_SAMPLES => "ExtraSamples",
        tags::SAMPLE_FORMAT => "SampleFormat",
        tags::YCBCR_SUBSAMPLING => "YCbCrSubSampling",
        tags::MODEL_PIXEL_SCALE_TAG => "ModelPixelScaleTag",
        tags::MODEL_TIEPOINT_TAG => "ModelTiepointTag",
        tags::MODEL_TRANSFORMATION_TAG => "ModelTransformationTag",
        tags::GEO_KEY_DIRECTORY_TAG => "GeoKeyDirectoryTag",
        tags::GEO_DOUBLE_PARAMS_TAG => "GeoDoubleParamsTag",
        tags::GEO_ASCII_PARAMS_TAG => "GeoAsciiParamsTag",
        tags::GDAL_NODATA => "GDAL_NODATA",
        _ => "Unknown",
    }
}
