//! I/O primitives shared by the raster reader and writer
//!
//! This module provides the seekable reader abstraction and the byte
//! order strategies used to decode TIFF containers.

pub mod seekable;
pub mod byte_order;

pub use byte_order::{ByteOrder, ByteOrderHandler};
pub use seekable::{stream_len, SeekableReader};
