//! Per-video statistics gathered by the first pass over the frames

use crate::frame_score::FrameScores;
use crate::scene_energy::FrameDescriptor;
use vseg_core::FrameRange;

/// Everything the later stages need from the first pass
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    /// Number of whole frames read
    pub frame_count: usize,
    /// Score of every frame against its predecessor
    pub scores: FrameScores,
    /// One color descriptor per frame
    pub descriptors: Vec<FrameDescriptor>,
}

impl FrameAnalysis {
    /// `[0, frame_count - 1]`, or `None` for an empty video
    pub fn bounds(&self) -> Option<FrameRange> {
        self.frame_count.checked_sub(1).map(|end| FrameRange { start: 0, end })
    }
}
