//! VSEG Hierarchy Library
//!
//! This library nests flat scene, shot and sub-shot boundaries into a
//! Scene → Shot → Sub-shot tree with millisecond timestamps, validating that
//! every level lies inside its parent.

pub mod builder;
pub mod hierarchy;

pub use builder::{assemble_from_dir, ContainmentReport, HierarchyBuilder};
pub use hierarchy::{FlatRanges, Hierarchy, SceneNode, ShotNode};

/// Result type for vseg-hierarchy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for vseg-hierarchy operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("VSEG core error: {0}")]
    Core(#[from] vseg_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),
}
