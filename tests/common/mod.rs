//! Shared helpers for integration tests

use byteorder::{LittleEndian, WriteBytesExt};
use std::path::Path;

/// Writes an uncompressed, single-strip, little-endian GeoTIFF
///
/// `geo` is `(epsg, origin_x, origin_y, pixel_size)`; `None` writes a
/// plain TIFF without georeferencing.
pub fn write_geotiff(path: &Path, width: u32, height: u32, bands: u16, geo: Option<(u16, f64, f64, f64)>) {
    let pixels: Vec<u8> = (0..width * height * bands as u32).map(|i| (i % 256) as u8).collect();

    // (tag, type, count, inline value or external bytes)
    let mut entries: Vec<(u16, u16, u32, Vec<u8>)> = vec![
        (256, 4, 1, u32_bytes(&[width])),
        (257, 4, 1, u32_bytes(&[height])),
        (258, 3, bands as u32, u16_bytes(&vec![8; bands as usize])),
        (259, 3, 1, u16_bytes(&[1])),
        (262, 3, 1, u16_bytes(&[if bands == 3 { 2 } else { 1 }])),
        (273, 4, 1, Vec::new()),
        (277, 3, 1, u16_bytes(&[bands])),
        (278, 4, 1, u32_bytes(&[height])),
        (279, 4, 1, u32_bytes(&[pixels.len() as u32])),
        (284, 3, 1, u16_bytes(&[1])),
    ];
    if let Some((epsg, origin_x, origin_y, size)) = geo {
        let (model, key) = if (4000..5000).contains(&epsg) { (2, 2048) } else { (1, 3072) };
        entries.push((33550, 12, 3, f64_bytes(&[size, size, 0.0])));
        entries.push((33922, 12, 6, f64_bytes(&[0.0, 0.0, 0.0, origin_x, origin_y, 0.0])));
        entries.push((
            34735,
            3,
            16,
            u16_bytes(&[1, 1, 0, 3, 1024, 0, 1, model, 1025, 0, 1, 1, key, 0, 1, epsg]),
        ));
    }

    let ifd_size = 2 + 12 * entries.len() as u32 + 4;
    let mut external_offset = 8 + ifd_size;
    let external_total: u32 = entries.iter().filter(|e| e.3.len() > 4).map(|e| e.3.len() as u32).sum();
    let strip_offset = external_offset + external_total;

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.write_u16::<LittleEndian>(42).unwrap();
    out.write_u32::<LittleEndian>(8).unwrap();
    out.write_u16::<LittleEndian>(entries.len() as u16).unwrap();

    let mut external = Vec::new();
    for (tag, field_type, count, bytes) in &entries {
        out.write_u16::<LittleEndian>(*tag).unwrap();
        out.write_u16::<LittleEndian>(*field_type).unwrap();
        out.write_u32::<LittleEndian>(*count).unwrap();
        if *tag == 273 {
            out.write_u32::<LittleEndian>(strip_offset).unwrap();
        } else if bytes.len() > 4 {
            out.write_u32::<LittleEndian>(external_offset).unwrap();
            external_offset += bytes.len() as u32;
            external.extend_from_slice(bytes);
        } else {
            let mut inline = bytes.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        }
    }
    out.write_u32::<LittleEndian>(0).unwrap();
    out.extend_from_slice(&external);
    out.extend_from_slice(&pixels);

    std::fs::write(path, out).unwrap();
}

fn u16_bytes(values: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    values.iter().for_each(|&v| out.write_u16::<LittleEndian>(v).unwrap());
    out
}

fn u32_bytes(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    values.iter().for_each(|&v| out.write_u32::<LittleEndian>(v).unwrap());
    out
}

fn f64_bytes(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::new();
    values.iter().for_each(|&v| out.write_f64::<LittleEndian>(v).unwrap());
    out
}
