//! Interchangeable strategies for grouping shots into scenes

use crate::analysis::FrameAnalysis;
use crate::config::{AdaptiveRatioConfig, SceneEnergyConfig, SceneStrategy, SegmenterConfig};
use crate::cut_merger::CutMerger;
use crate::frame_score::FrameScores;
use crate::scene_energy::SceneEnergyAggregator;
use tracing::debug;
use vseg_core::FrameRange;

/// Ratio reported when the neighbourhood of a frame is (almost) static
const MAX_ADAPTIVE_RATIO: f64 = 255.0;

/// Produces scene ranges for a segmented video.
///
/// Implementations return ordered, contiguous ranges that cover the same
/// frames as `shots`; an empty shot list yields no scenes.
pub trait SceneSource: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn detect_scenes(&self, analysis: &FrameAnalysis, shots: &[FrameRange]) -> Vec<FrameRange>;
}

/// Builds the scene source selected by `config.scene_strategy`
pub fn scene_source_for(config: &SegmenterConfig) -> Box<dyn SceneSource> {
    match config.scene_strategy {
        SceneStrategy::Energy => Box::new(EnergySceneSource::new(config.scene_energy.clone())),
        SceneStrategy::AdaptiveRatio => Box::new(AdaptiveRatioSceneSource::new(config.adaptive_ratio.clone())),
    }
}

/// Groups shots by the running mean of their descriptor energy
#[derive(Debug, Clone, Default)]
pub struct EnergySceneSource {
    aggregator: SceneEnergyAggregator,
}

impl EnergySceneSource {
    pub fn new(config: SceneEnergyConfig) -> Self {
        Self {
            aggregator: SceneEnergyAggregator::new(config),
        }
    }
}

impl SceneSource for EnergySceneSource {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn detect_scenes(&self, analysis: &FrameAnalysis, shots: &[FrameRange]) -> Vec<FrameRange> {
        self.aggregator
            .aggregate(&analysis.descriptors, shots)
            .into_iter()
            .map(|group| group.range)
            .collect()
    }
}

/// Starts a scene where a frame score spikes against its neighbourhood.
///
/// Scene starts are moved back to the start of the shot they fall into, so
/// scenes are always made of whole shots.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveRatioSceneSource {
    config: AdaptiveRatioConfig,
}

impl AdaptiveRatioSceneSource {
    pub fn new(config: AdaptiveRatioConfig) -> Self {
        Self { config }
    }
}

impl SceneSource for AdaptiveRatioSceneSource {
    fn name(&self) -> &'static str {
        "adaptive_ratio"
    }

    fn detect_scenes(&self, analysis: &FrameAnalysis, shots: &[FrameRange]) -> Vec<FrameRange> {
        let (Some(first), Some(last)) = (shots.first(), shots.last()) else {
            return Vec::new();
        };

        let cuts = adaptive_ratio_cuts(&analysis.scores, &self.config);
        let starts = snap_to_shot_starts(&cuts, shots);
        debug!(raw_cuts = cuts.len(), scene_starts = starts.len(), "Adaptive ratio scene cuts");

        CutMerger::new(0).merge(
            &starts,
            FrameRange {
                start: first.start,
                end: last.end,
            },
        )
    }
}

/// Frames whose score is at least `adaptive_threshold` times the average of
/// their neighbours' scores.
///
/// Only frames with a full neighbourhood on both sides are considered. A
/// frame also needs a score of at least `min_content_value` and must lie at
/// least `min_scene_len` frames after the previous cut (frame 0 counts as a
/// cut).
pub fn adaptive_ratio_cuts(scores: &FrameScores, config: &AdaptiveRatioConfig) -> Vec<usize> {
    let values = scores.values();
    let width = config.window_width.max(1);
    let mut cuts = Vec::new();
    let mut last_cut = 0usize;

    // values[i] is the score of frame i + 1
    for i in width..values.len().saturating_sub(width) {
        let score = values[i];
        let neighbours = values[i - width..i]
            .iter()
            .chain(&values[i + 1..=i + width])
            .sum::<f64>()
            / (2 * width) as f64;

        let ratio = if neighbours.abs() < 1e-5 {
            MAX_ADAPTIVE_RATIO
        } else {
            (score / neighbours).min(MAX_ADAPTIVE_RATIO)
        };

        let frame = i + 1;
        if ratio >= config.adaptive_threshold
            && score >= config.min_content_value
            && frame - last_cut >= config.min_scene_len
        {
            debug!(frame, score, ratio, "Adaptive ratio cut");
            cuts.push(frame);
            last_cut = frame;
        }
    }

    cuts
}

/// Replaces every cut with the start of the shot containing it.
///
/// Cuts that land in the first shot do not start a scene.
fn snap_to_shot_starts(cuts: &[usize], shots: &[FrameRange]) -> Vec<usize> {
    let mut starts: Vec<usize> = cuts
        .iter()
        .filter_map(|&cut| {
            let shot = shots.partition_point(|s| s.end < cut);
            shots.get(shot).map(|s| s.start)
        })
        .filter(|&start| start > shots[0].start)
        .collect();
    starts.dedup();
    starts
}
