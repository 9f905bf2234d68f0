//! Closed frame intervals used for scenes, shots and sub-shots

use crate::{Error, Result};
use std::fmt;

/// A closed interval `[start, end]` of frame indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameRange {
    /// First frame of the interval
    pub start: usize,
    /// Last frame of the interval (inclusive)
    pub end: usize,
}

impl FrameRange {
    /// Creates a new range, rejecting `start > end`
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of frames in the range
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A closed range always holds at least one frame
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Checks whether `other` nests entirely inside this range
    pub fn contains(&self, other: &FrameRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Start timestamp in milliseconds at the given frame rate
    pub fn start_ms(&self, fps: f64) -> u64 {
        frame_to_ms(self.start, fps)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start, self.end)
    }
}

/// Converts a frame index to a millisecond timestamp: `round(frame / fps * 1000)`
pub fn frame_to_ms(frame: usize, fps: f64) -> u64 {
    (frame as f64 / fps * 1000.0).round() as u64
}

/// Checks that `ranges` are ordered, disjoint and cover `[start, end]` without gaps
pub fn is_partition(ranges: &[FrameRange], start: usize, end: usize) -> bool {
    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        return false;
    };
    if first.start != start || last.end != end {
        return false;
    }
    ranges
        .windows(2)
        .all(|pair| pair[0].start <= pair[0].end && pair[0].end + 1 == pair[1].start)
        && last.start <= last.end
}
