//! Tests for the TIFF container code

mod reader_tests;
