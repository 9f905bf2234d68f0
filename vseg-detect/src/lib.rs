//! VSEG Detection Library
//!
//! This library turns a sequence of raw frames into shot and scene boundaries:
//! per-frame HSV difference scores, an adaptive statistical cut detector, cut
//! merging, color-descriptor scene grouping and pluggable sub-shot refinement.

pub mod analysis;
pub mod config;
pub mod cut_detector;
pub mod cut_merger;
pub mod frame_score;
pub mod frame_source;
pub mod progress_tracker;
pub mod refiner;
pub mod scene_energy;
pub mod scene_source;
pub mod segmenter;
#[cfg(feature = "ffmpeg")]
pub mod video_reader;

pub use analysis::FrameAnalysis;
pub use config::{
    AdaptiveRatioConfig, CutDetectorConfig, MergeConfig, SceneEnergyConfig, SceneStrategy,
    SegmenterConfig, SubshotConfig, TrailingWindowPolicy,
};
pub use cut_detector::{AdaptiveCutDetector, CutThreshold};
pub use cut_merger::CutMerger;
pub use frame_score::FrameScores;
pub use frame_source::{FrameSource, MemorySource, RawRgbReader};
pub use refiner::{CommandRefiner, StatisticalRefiner, SubshotRefiner};
pub use scene_energy::{FrameDescriptor, SceneEnergyAggregator, SceneGroup};
pub use scene_source::{AdaptiveRatioSceneSource, EnergySceneSource, SceneSource};
pub use segmenter::{Segmentation, Segmenter};
#[cfg(feature = "ffmpeg")]
pub use video_reader::VideoFileSource;

/// Result type for vseg-detect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for vseg-detect operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("VSEG core error: {0}")]
    Core(#[from] vseg_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameDimensions {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Sub-shot refiner error: {0}")]
    Refiner(String),

    #[error("Invalid video file")]
    InvalidVideo,

    #[error("No video stream found")]
    NoVideoStream,
}
