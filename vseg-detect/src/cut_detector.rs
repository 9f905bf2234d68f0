//! Adaptive statistical cut detection
//!
//! A global threshold (`mean + k * stddev` over all frame scores) flags
//! candidate cuts. A candidate opens a confirmation window: the frame before
//! the trigger becomes the change reference and the following frames are
//! scored against it instead of against their own predecessor. The first
//! frame to arrive after the window is full closes it: the boundary frame is
//! picked from the first few running maxima of the window's distances.

use crate::config::{CutDetectorConfig, TrailingWindowPolicy};
use crate::frame_score::{frame_distance, FrameScores};
use tracing::debug;
use vseg_core::{Frame, HsvPlanes};

/// Global decision boundary derived from the score statistics of one video
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CutThreshold {
    pub mean: f64,
    pub std_dev: f64,
    pub multiplier: f64,
    /// `mean + multiplier * std_dev`
    pub value: f64,
}

impl CutThreshold {
    /// Population mean and standard deviation of `scores`.
    ///
    /// With fewer than two scores the deviation is taken as zero, so the
    /// threshold collapses to the mean (0 for no scores at all).
    pub fn from_scores(scores: &[f64], multiplier: f64) -> Self {
        let n = scores.len();
        let mean = if n == 0 {
            0.0
        } else {
            scores.iter().sum::<f64>() / n as f64
        };
        let std_dev = if n < 2 {
            0.0
        } else {
            let variance = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n as f64;
            variance.sqrt()
        };

        Self {
            mean,
            std_dev,
            multiplier,
            value: mean + multiplier * std_dev,
        }
    }
}

/// One entry of the confirmation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEntry {
    pub frame_index: usize,
    /// Trigger score for the first entry, distance to the change reference afterwards
    pub distance: f64,
}

enum DetectorState {
    Normal,
    Candidate {
        reference: HsvPlanes,
        window: Vec<WindowEntry>,
    },
}

/// Frame-by-frame cut detector.
///
/// Feed every frame in order with [`push`](Self::push), then call
/// [`finish`](Self::finish) to collect the cuts.
pub struct AdaptiveCutDetector {
    threshold: f64,
    window_size: usize,
    max_new_maxima: usize,
    trailing_window: TrailingWindowPolicy,
    state: DetectorState,
    previous: Option<HsvPlanes>,
    cuts: Vec<usize>,
}

impl AdaptiveCutDetector {
    pub fn new(config: &CutDetectorConfig, threshold: &CutThreshold) -> Self {
        Self {
            threshold: threshold.value,
            window_size: config.window_size.max(1),
            max_new_maxima: config.max_new_maxima.max(1),
            trailing_window: config.trailing_window,
            state: DetectorState::Normal,
            previous: None,
            cuts: Vec::new(),
        }
    }

    /// Advances the state machine by one frame.
    ///
    /// `score` is the frame's score against its predecessor (`None` for frame
    /// 0). A frame that arrives while the window is full closes the window and
    /// is not considered as a trigger itself. Returns the cut confirmed by this
    /// frame, if any.
    pub fn push(&mut self, frame_index: usize, planes: HsvPlanes, score: Option<f64>) -> Option<usize> {
        let window_full = matches!(
            &self.state,
            DetectorState::Candidate { window, .. } if window.len() >= self.window_size
        );
        if window_full {
            let confirmed = self.close_window();
            self.previous = Some(planes);
            return confirmed;
        }

        let trigger = match &mut self.state {
            DetectorState::Normal => score.filter(|&s| s > self.threshold),
            DetectorState::Candidate { reference, window } => {
                window.push(WindowEntry {
                    frame_index,
                    distance: frame_distance(&planes, reference),
                });
                None
            }
        };

        if let Some(score) = trigger {
            if let Some(reference) = self.previous.take() {
                debug!(frame = frame_index, score, threshold = self.threshold, "Cut candidate");
                let window = vec![WindowEntry {
                    frame_index,
                    distance: score,
                }];
                self.state = DetectorState::Candidate { reference, window };
            }
        }

        self.previous = Some(planes);
        None
    }

    /// Ends the walk and returns every confirmed cut in increasing order
    pub fn finish(mut self) -> Vec<usize> {
        let pending = match &self.state {
            DetectorState::Candidate { window, .. } => Some(window.len()),
            DetectorState::Normal => None,
        };

        if let Some(entries) = pending {
            match self.trailing_window {
                TrailingWindowPolicy::Discard => {
                    debug!(entries, "Discarding unfinished cut window at end of sequence");
                }
                TrailingWindowPolicy::EmitBest => {
                    self.close_window();
                }
            }
        }
        self.cuts
    }

    fn close_window(&mut self) -> Option<usize> {
        let state = std::mem::replace(&mut self.state, DetectorState::Normal);
        let DetectorState::Candidate { window, .. } = state else {
            return None;
        };

        let boundary = select_boundary(&window, self.max_new_maxima)?;
        if self.cuts.last().is_some_and(|&last| last >= boundary) {
            return None;
        }

        debug!(frame = boundary, entries = window.len(), "Cut confirmed");
        self.cuts.push(boundary);
        Some(boundary)
    }
}

/// Picks the boundary frame of a confirmation window.
///
/// Scanning in order, every entry strictly above the running maximum is a new
/// maximum; only the first `max_new_maxima` of them may become the selection,
/// so the result is the last of those (not necessarily the global maximum).
pub fn select_boundary(window: &[WindowEntry], max_new_maxima: usize) -> Option<usize> {
    let mut running_max = -1.0;
    let mut new_maxima = 0;
    let mut selected = None;

    for entry in window {
        if entry.distance > running_max {
            running_max = entry.distance;
            if new_maxima < max_new_maxima {
                selected = Some(entry.frame_index);
                new_maxima += 1;
            }
        }
    }

    selected
}

/// Runs the detector over an in-memory frame sequence with precomputed scores
pub fn detect_cuts(
    frames: &[Frame],
    scores: &FrameScores,
    config: &CutDetectorConfig,
    threshold: &CutThreshold,
) -> Vec<usize> {
    let mut detector = AdaptiveCutDetector::new(config, threshold);
    for (index, frame) in frames.iter().enumerate() {
        detector.push(index, frame.to_hsv(), scores.get(index));
    }
    detector.finish()
}
