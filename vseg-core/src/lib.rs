//! VSEG Core Library
//!
//! This library provides the core data structures shared by the VSEG
//! segmentation pipeline: raw RGB frames and their HSV planes, closed frame
//! ranges, frame-to-timestamp conversion and the plain-text boundary files.

pub mod boundary_file;
pub mod frame;
pub mod range;

pub use boundary_file::{decode_ranges, encode_ranges, read_ranges, write_ranges, BoundaryKind};
pub use frame::{byte_len, rgb_to_hsv, Frame, HsvPlanes};
pub use range::{frame_to_ms, is_partition, FrameRange};

/// Result type for vseg-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for vseg-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame buffer of {actual} bytes does not match {width}x{height} RGB ({expected} bytes)")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid frame range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Missing boundary file: {0}")]
    MissingBoundaryFile(std::path::PathBuf),

    #[error("Malformed boundary file {path} at line {line}: {content:?}")]
    MalformedBoundaryLine {
        path: std::path::PathBuf,
        line: usize,
        content: String,
    },
}
