//! Handler for TIFF LZW compressed data
//!
//! TIFF LZW packs codes MSB-first, starts at 9 bits and widens one code
//! early (at 511, 1023 and 2047 table entries).

use super::handler::CompressionHandler;
use crate::error::{FormatError, FormatResult};
use crate::tiff::constants::compression;

const CLEAR_CODE: usize = 256;
const END_OF_INFORMATION: usize = 257;
const FIRST_FREE_CODE: usize = 258;
const MIN_CODE_WIDTH: u32 = 9;
const MAX_CODE_WIDTH: u32 = 12;

/// LZW compression handler (compression code 5)
pub struct LzwHandler;

/// MSB-first bit reader over a byte slice
struct BitReader<'a> {
    data: &'a [u8],
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_position: 0 }
    }

    fn read(&mut self, width: u32) -> Option<usize> {
        if self.bit_position + width as usize > self.data.len() * 8 {
            return None;
        }

        let mut value = 0usize;
        for _ in 0..width {
            let byte = self.data[self.bit_position / 8];
            let bit = (byte >> (7 - self.bit_position % 8)) & 1;
            value = (value << 1) | bit as usize;
            self.bit_position += 1;
        }
        Some(value)
    }
}

impl CompressionHandler for LzwHandler {
    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>> {
        let mut table: Vec<Vec<u8>> = Vec::with_capacity(1 << MAX_CODE_WIDTH);
        let reset = |table: &mut Vec<Vec<u8>>| {
            table.clear();
            table.extend((0..=255u8).map(|b| vec![b]));
            // Placeholders for the clear and end codes
            table.push(Vec::new());
            table.push(Vec::new());
        };
        reset(&mut table);

        let mut reader = BitReader::new(data);
        let mut output = Vec::with_capacity(data.len() * 2);
        let mut width = MIN_CODE_WIDTH;
        let mut previous: Option<Vec<u8>> = None;

        while let Some(code) = reader.read(width) {
            if code == CLEAR_CODE {
                reset(&mut table);
                width = MIN_CODE_WIDTH;
                previous = None;
                continue;
            }
            if code == END_OF_INFORMATION {
                break;
            }

            let entry = match (&previous, code) {
                (_, c) if c < CLEAR_CODE || (c >= FIRST_FREE_CODE && c < table.len()) => {
                    table[c].clone()
                }
                (Some(prev), c) if c == table.len() => {
                    let mut entry = prev.clone();
                    entry.push(prev[0]);
                    entry
                }
                _ => {
                    return Err(FormatError::NotARaster(format!(
                        "corrupt LZW stream: code {} with {} table entries",
                        code,
                        table.len()
                    )))
                }
            };

            output.extend_from_slice(&entry);
            if let Some(mut prev) = previous.take() {
                if table.len() < 1 << MAX_CODE_WIDTH {
                    prev.push(entry[0]);
                    table.push(prev);
                }
            }
            previous = Some(entry);

            if table.len() + 1 >= 1 << width && width < MAX_CODE_WIDTH {
                width += 1;
            }
        }

        Ok(output)
    }

    fn name(&self) -> &'static str {
        "LZW"
    }

    fn code(&self) -> u16 {
        compression::LZW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs fixed-width codes MSB-first
    fn pack(codes: &[(usize, u32)]) -> Vec<u8> {
        let mut bits = Vec::new();
        for &(code, width) in codes {
            for i in (0..width).rev() {
                bits.push(((code >> i) & 1) as u8);
            }
        }
        bits.chunks(8)
            .map(|chunk| chunk.iter().enumerate().fold(0u8, |acc, (i, &b)| acc | (b << (7 - i))))
            .collect()
    }

    #[test]
    fn test_literal_codes() {
        let stream = pack(&[(CLEAR_CODE, 9), (b'H' as usize, 9), (b'i' as usize, 9), (END_OF_INFORMATION, 9)]);
        assert_eq!(LzwHandler.decompress(&stream).unwrap(), b"Hi".to_vec());
    }

    #[test]
    fn test_code_defined_by_itself() {
        // 258 is used in the same step that defines it: "A" + "AA"
        let stream = pack(&[(CLEAR_CODE, 9), (b'A' as usize, 9), (258, 9), (END_OF_INFORMATION, 9)]);
        assert_eq!(LzwHandler.decompress(&stream).unwrap(), b"AAA".to_vec());
    }

    #[test]
    fn test_repeated_pair() {
        // A B then "AB" (258) then "BA" (259)
        let stream = pack(&[
            (CLEAR_CODE, 9),
            (b'A' as usize, 9),
            (b'B' as usize, 9),
            (258, 9),
            (259, 9),
            (END_OF_INFORMATION, 9),
        ]);
        assert_eq!(LzwHandler.decompress(&stream).unwrap(), b"ABABBA".to_vec());
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        let stream = pack(&[(CLEAR_CODE, 9), (b'A' as usize, 9), (400, 9)]);
        assert!(LzwHandler.decompress(&stream).is_err());
    }
}
