//! Frame-to-frame dissimilarity scores
//!
//! The score of frame `i` compares it with frame `i - 1` in HSV space: for
//! each channel the mean absolute per-pixel difference, then the plain average
//! of the three channel distances. Frame 0 has no score.

use rayon::prelude::*;
use vseg_core::{Frame, FrameRange, HsvPlanes};

/// Mean absolute difference between two equally sized 8-bit planes
pub fn channel_distance(a: &[u8], b: &[u8]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(&pa, &pb)| (pa as i32 - pb as i32).unsigned_abs() as u64)
        .sum();

    total as f64 / len as f64
}

/// Unweighted average of the hue, saturation and value channel distances
pub fn frame_distance(a: &HsvPlanes, b: &HsvPlanes) -> f64 {
    let total: f64 = a
        .channels()
        .iter()
        .zip(b.channels().iter())
        .map(|(ca, cb)| channel_distance(ca, cb))
        .sum();
    total / 3.0
}

/// Scores of one video; entry `i - 1` holds the score of frame `i`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameScores {
    scores: Vec<f64>,
}

impl FrameScores {
    pub fn new(scores: Vec<f64>) -> Self {
        Self { scores }
    }

    /// Score of `frame`, `None` for frame 0 or past the end
    pub fn get(&self, frame: usize) -> Option<f64> {
        frame.checked_sub(1).and_then(|i| self.scores.get(i).copied())
    }

    /// Number of defined scores (frame count minus one)
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Raw score values in frame order, starting with frame 1
    pub fn values(&self) -> &[f64] {
        &self.scores
    }

    /// `(frame, score)` pairs for the frames of `range` that compare against a
    /// predecessor inside the same range (i.e. `start + 1 ..= end`)
    pub fn within(&self, range: FrameRange) -> impl Iterator<Item = (usize, f64)> + '_ {
        (range.start + 1..=range.end).filter_map(move |frame| self.get(frame).map(|s| (frame, s)))
    }
}

/// Scores an in-memory frame sequence on the rayon pool.
///
/// Every frame is converted once; results are in frame order, identical to
/// scoring the frames one after another.
pub fn score_frames_parallel(frames: &[Frame]) -> FrameScores {
    let planes: Vec<HsvPlanes> = frames.par_iter().map(Frame::to_hsv).collect();
    FrameScores::new(
        planes
            .par_windows(2)
            .map(|pair| frame_distance(&pair[0], &pair[1]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(index: usize, shift: u8) -> Frame {
        let mut frame = Frame::filled(index, 8, 4, [0, 0, 0]);
        for (x, y, pixel) in frame.image.enumerate_pixels_mut() {
            let v = (x as u8 * 20).wrapping_add(y as u8 * 7).wrapping_add(shift);
            pixel.0 = [v, v.wrapping_mul(3), 255 - v];
        }
        frame
    }

    #[test]
    fn test_identical_frames_score_zero() {
        let a = Frame::filled(0, 16, 16, [120, 40, 200]).to_hsv();
        assert_eq!(frame_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = gradient_frame(0, 0).to_hsv();
        let b = gradient_frame(1, 90).to_hsv();
        assert_eq!(frame_distance(&a, &b), frame_distance(&b, &a));
        assert!(frame_distance(&a, &b) > 0.0);
    }

    #[test]
    fn test_black_to_white_distance() {
        // Black and white only differ in value: (0 + 0 + 255) / 3
        let black = Frame::filled(0, 4, 4, [0, 0, 0]).to_hsv();
        let white = Frame::filled(1, 4, 4, [255, 255, 255]).to_hsv();
        assert_eq!(frame_distance(&black, &white), 85.0);
    }

    #[test]
    fn test_no_unsigned_wraparound() {
        assert_eq!(channel_distance(&[0, 255], &[255, 0]), 255.0);
        assert_eq!(channel_distance(&[], &[]), 0.0);
    }

    #[test]
    fn test_first_frame_has_no_score() {
        let frames: Vec<Frame> = (0..4).map(|i| gradient_frame(i, i as u8 * 30)).collect();
        let scores = score_frames_parallel(&frames);

        assert_eq!(scores.len(), 3);
        assert_eq!(scores.get(0), None);
        assert!(scores.get(1).is_some());
        assert_eq!(scores.get(4), None);
        assert_eq!(scores.get(3), scores.values().last().copied());
    }

    #[test]
    fn test_degenerate_sequences() {
        assert!(score_frames_parallel(&[]).is_empty());
        assert!(score_frames_parallel(&[gradient_frame(0, 0)]).is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let frames: Vec<Frame> = (0..23).map(|i| gradient_frame(i, (i * 37 % 251) as u8)).collect();
        let sequential: Vec<f64> = frames
            .windows(2)
            .map(|pair| frame_distance(&pair[0].to_hsv(), &pair[1].to_hsv()))
            .collect();

        assert_eq!(score_frames_parallel(&frames), FrameScores::new(sequential));
    }

    #[test]
    fn test_within_range_skips_range_start() {
        let scores = FrameScores::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let range = FrameRange { start: 2, end: 4 };
        let inside: Vec<_> = scores.within(range).collect();
        assert_eq!(inside, vec![(3, 3.0), (4, 4.0)]);
    }
}
