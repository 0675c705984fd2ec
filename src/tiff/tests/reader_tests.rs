//! Tests for directory reading and band decoding

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Cursor;

use super::test_utils::GeoTiffFixture;
use crate::error::FormatError;
use crate::io::byte_order::ByteOrder;
use crate::tiff::constants::tags;
use crate::tiff::decoder::{BandDecoder, PixelType, SampleLayout};
use crate::tiff::geo_keys::{DeclaredCrs, GeoReference};
use crate::tiff::reader::TiffReader;

fn read(bytes: Vec<u8>) -> Result<crate::tiff::TIFF, FormatError> {
    TiffReader::new().read(&mut Cursor::new(bytes))
}

fn decode_band(fixture: &GeoTiffFixture, band: usize) -> Vec<f32> {
    let bytes = fixture.build();
    let tiff = read(bytes.clone()).unwrap();
    let layout = SampleLayout::from_ifd(tiff.main_ifd().unwrap()).unwrap();
    let decoder = BandDecoder::new(&layout, tiff.byte_order).unwrap();
    decoder.read_band(&mut Cursor::new(bytes), band).unwrap()
}

#[test]
fn test_read_minimal_bigtiff() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"II");
    buffer.write_u16::<LittleEndian>(43).unwrap();
    buffer.write_u16::<LittleEndian>(8).unwrap();
    buffer.write_u16::<LittleEndian>(0).unwrap();
    buffer.write_u64::<LittleEndian>(16).unwrap();
    buffer.write_u64::<LittleEndian>(2).unwrap();
    for (tag, value) in [(256u16, 1024u64), (257, 768)] {
        buffer.write_u16::<LittleEndian>(tag).unwrap();
        buffer.write_u16::<LittleEndian>(4).unwrap();
        buffer.write_u64::<LittleEndian>(1).unwrap();
        buffer.write_u64::<LittleEndian>(value).unwrap();
    }
    buffer.write_u64::<LittleEndian>(0).unwrap();

    let tiff = read(buffer).unwrap();
    assert!(tiff.is_big_tiff);
    assert_eq!(tiff.main_ifd().unwrap().get_dimensions(), Some((1024, 768)));
}

#[test]
fn test_garbage_is_not_a_raster() {
    assert!(matches!(read(b"%PDF-1.7 not a tiff".to_vec()), Err(FormatError::NotARaster(_))));
    assert!(matches!(read(b"II".to_vec()), Err(FormatError::NotARaster(_))));
}

#[test]
fn test_wrong_version_is_not_a_raster() {
    let mut buffer = b"II".to_vec();
    buffer.write_u16::<LittleEndian>(44).unwrap();
    buffer.write_u32::<LittleEndian>(8).unwrap();
    assert!(matches!(read(buffer), Err(FormatError::NotARaster(_))));
}

#[test]
fn test_first_ifd_beyond_end() {
    let mut buffer = b"II".to_vec();
    buffer.write_u16::<LittleEndian>(42).unwrap();
    buffer.write_u32::<LittleEndian>(4096).unwrap();
    assert!(matches!(read(buffer), Err(FormatError::NotARaster(_))));
}

#[test]
fn test_external_values_are_resolved() {
    let fixture = GeoTiffFixture::new(4, 3, 3).epsg(2180).geotransform(500000.0, 300000.0, 10.0, 10.0);
    let tiff = read(fixture.build()).unwrap();
    let ifd = tiff.main_ifd().unwrap();

    assert_eq!(ifd.get_unsigned_vec(tags::BITS_PER_SAMPLE), Some(vec![8, 8, 8]));
    assert_eq!(
        ifd.get_f64_vec(tags::MODEL_TIEPOINT_TAG),
        Some(vec![0.0, 0.0, 0.0, 500000.0, 300000.0, 0.0])
    );
    assert_eq!(GeoReference::from_ifd(ifd).declared_crs, Some(DeclaredCrs::Epsg(2180)));
}

#[test]
fn test_big_endian_values() {
    let fixture = GeoTiffFixture::new(5, 2, 1)
        .pixel_type(PixelType::U16)
        .big_endian()
        .fill(|_, x, y| (x * 1000 + y) as f64);
    let tiff = read(fixture.build()).unwrap();
    assert_eq!(tiff.byte_order, ByteOrder::BigEndian);

    let band = decode_band(&fixture, 0);
    assert_eq!(band[0], 0.0);
    assert_eq!(band[4], 4000.0);
    assert_eq!(band[5 + 3], 3001.0);
}

#[test]
fn test_chunky_bands_are_separated() {
    let fixture = GeoTiffFixture::new(3, 2, 3).fill(|band, x, y| (band * 100) as f64 + (y * 3 + x) as f64);
    for band in 0..3 {
        let values = decode_band(&fixture, band);
        let expected: Vec<f32> = (0..6).map(|i| (band * 100 + i) as f32).collect();
        assert_eq!(values, expected);
    }
}

#[test]
fn test_planar_tiled_deflate_float() {
    let fixture = GeoTiffFixture::new(20, 13, 3)
        .pixel_type(PixelType::F32)
        .planar()
        .tiled(16)
        .deflate()
        .fill(|band, x, y| band as f64 * 0.5 + x as f64 - y as f64 * 0.25);

    let values = decode_band(&fixture, 2);
    assert_eq!(values.len(), 20 * 13);
    assert_eq!(values[0], 1.0);
    assert_eq!(values[12 * 20 + 19], (1.0 + 19.0 - 3.0) as f32);
}

#[test]
fn test_signed_samples() {
    let fixture = GeoTiffFixture::new(2, 1, 1)
        .pixel_type(PixelType::I16)
        .fill(|_, x, _| if x == 0 { -32768.0 } else { 1234.0 });
    assert_eq!(decode_band(&fixture, 0), vec![-32768.0, 1234.0]);
}

#[test]
fn test_band_out_of_range() {
    let fixture = GeoTiffFixture::new(2, 2, 1);
    let bytes = fixture.build();
    let tiff = read(bytes.clone()).unwrap();
    let layout = SampleLayout::from_ifd(tiff.main_ifd().unwrap()).unwrap();
    let decoder = BandDecoder::new(&layout, tiff.byte_order).unwrap();
    assert!(decoder.read_band(&mut Cursor::new(bytes), 1).is_err());
}
