//! Parsed TIFF container

use crate::io::byte_order::ByteOrder;
use crate::tiff::ifd::IFD;

/// Every image directory of one file, plus the container properties
/// needed to interpret their values
#[derive(Debug, Clone)]
pub struct TIFF {
    pub ifds: Vec<IFD>,
    pub is_big_tiff: bool,
    pub byte_order: ByteOrder,
}

impl TIFF {
    pub fn new(is_big_tiff: bool, byte_order: ByteOrder) -> Self {
        TIFF {
            ifds: Vec::new(),
            is_big_tiff,
            byte_order,
        }
    }

    /// Full-resolution image directory
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.first()
    }

    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }

    /// Reduced-resolution directories following the main image
    pub fn overviews(&self) -> Vec<&IFD> {
        self.ifds.iter().skip(1).filter(|ifd| ifd.is_overview()).collect()
    }
}
