//! Utility modules for common functionality
//!
//! Logging, progress reporting and string helpers used throughout the
//! application.

pub mod logger;
pub mod progress;
pub mod string_utils;
