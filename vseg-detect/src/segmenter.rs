//! End-to-end segmentation of one video
//!
//! Pass 1 streams the frames once to collect scores and descriptors. The cut
//! threshold depends on statistics over the whole video, so pass 2 rewinds the
//! source and drives the cut detector with the now known threshold. Only the
//! previous frame's HSV planes and the detector's change reference are held in
//! memory at any time.

use crate::analysis::FrameAnalysis;
use crate::config::SegmenterConfig;
use crate::cut_detector::{self, AdaptiveCutDetector, CutThreshold};
use crate::cut_merger::CutMerger;
use crate::frame_score::{frame_distance, score_frames_parallel, FrameScores};
use crate::frame_source::FrameSource;
use crate::progress_tracker::ProgressTracker;
use crate::refiner::{refine_shots, SubshotRefiner};
use crate::scene_energy::SceneEnergyAggregator;
use crate::scene_source::{scene_source_for, SceneSource};
use crate::{Error, Result};
use rayon::prelude::*;
use tracing::info;
use vseg_core::{Frame, FrameRange};

/// Frames between two progress log lines
const PROGRESS_INTERVAL: u64 = 500;

/// Result of segmenting one video
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub frame_count: usize,
    /// Global cut threshold computed in pass 1
    pub threshold: CutThreshold,
    /// Cuts confirmed by the detector, before merging
    pub cuts: Vec<usize>,
    pub shots: Vec<FrameRange>,
    pub scenes: Vec<FrameRange>,
    /// Sub-shots of the shots that qualified for refinement
    pub subshots: Vec<FrameRange>,
}

/// Segments videos into scenes, shots and sub-shots
pub struct Segmenter {
    config: SegmenterConfig,
    scene_source: Box<dyn SceneSource>,
    refiner: Option<Box<dyn SubshotRefiner>>,
}

impl Segmenter {
    /// Validates `config` and selects the scene source it names
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        let scene_source = scene_source_for(&config);
        Ok(Self {
            config,
            scene_source,
            refiner: None,
        })
    }

    /// Enables sub-shot refinement of long shots
    pub fn with_refiner(mut self, refiner: Box<dyn SubshotRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Runs both passes and every later stage
    pub fn run(&self, source: &mut dyn FrameSource) -> Result<Segmentation> {
        let analysis = self.analyze(source)?;
        let threshold = CutThreshold::from_scores(analysis.scores.values(), self.config.cut.threshold_multiplier);
        info!(
            frames = analysis.frame_count,
            mean = threshold.mean,
            std_dev = threshold.std_dev,
            threshold = threshold.value,
            "Computed cut threshold"
        );

        let cuts = self.detect_cuts(source, &analysis, &threshold)?;
        self.segment_analysis(&analysis, threshold, cuts)
    }

    /// Segments frames that are already decoded in memory.
    ///
    /// Scores and descriptors are computed on the rayon pool; the result is the
    /// same as [`run`](Self::run) over a [`MemorySource`](crate::MemorySource) of `frames`.
    pub fn run_frames(&self, frames: &[Frame]) -> Result<Segmentation> {
        for (index, frame) in frames.iter().enumerate() {
            self.check_dimensions(index, frame)?;
        }

        let aggregator = SceneEnergyAggregator::new(self.config.scene_energy.clone());
        let analysis = FrameAnalysis {
            frame_count: frames.len(),
            scores: score_frames_parallel(frames),
            descriptors: frames.par_iter().map(|frame| aggregator.describe(frame)).collect(),
        };

        let threshold = CutThreshold::from_scores(analysis.scores.values(), self.config.cut.threshold_multiplier);
        let cuts = cut_detector::detect_cuts(frames, &analysis.scores, &self.config.cut, &threshold);
        info!(frames = frames.len(), cuts = cuts.len(), threshold = threshold.value, "Detected cuts in memory");
        self.segment_analysis(&analysis, threshold, cuts)
    }

    /// Pass 1: scores and descriptors of every frame
    pub fn analyze(&self, source: &mut dyn FrameSource) -> Result<FrameAnalysis> {
        let aggregator = SceneEnergyAggregator::new(self.config.scene_energy.clone());
        let progress = ProgressTracker::new(
            "Analyzing frames",
            source.frame_count_hint().map(|n| n as u64),
            PROGRESS_INTERVAL,
        );

        let mut scores = Vec::new();
        let mut descriptors = Vec::new();
        let mut previous = None;
        let mut frame_count = 0;

        while let Some(frame) = source.next_frame()? {
            self.check_dimensions(frame_count, &frame)?;

            let planes = frame.to_hsv();
            if let Some(previous) = &previous {
                scores.push(frame_distance(previous, &planes));
            }
            descriptors.push(aggregator.describe(&frame));
            previous = Some(planes);

            frame_count += 1;
            progress.increment();
        }
        progress.finish();

        Ok(FrameAnalysis {
            frame_count,
            scores: FrameScores::new(scores),
            descriptors,
        })
    }

    /// Pass 2: rewinds `source` and confirms cuts against `threshold`
    pub fn detect_cuts(
        &self,
        source: &mut dyn FrameSource,
        analysis: &FrameAnalysis,
        threshold: &CutThreshold,
    ) -> Result<Vec<usize>> {
        source.rewind()?;
        let mut detector = AdaptiveCutDetector::new(&self.config.cut, threshold);
        let progress = ProgressTracker::new("Detecting cuts", Some(analysis.frame_count as u64), PROGRESS_INTERVAL);

        for index in 0..analysis.frame_count {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            self.check_dimensions(index, &frame)?;
            detector.push(index, frame.to_hsv(), analysis.scores.get(index));
            progress.increment();
        }
        progress.finish();

        let cuts = detector.finish();
        info!(cuts = cuts.len(), "Cut detection complete");
        Ok(cuts)
    }

    /// Merges cuts into shots, groups scenes and refines long shots
    pub fn segment_analysis(
        &self,
        analysis: &FrameAnalysis,
        threshold: CutThreshold,
        cuts: Vec<usize>,
    ) -> Result<Segmentation> {
        let Some(bounds) = analysis.bounds() else {
            info!("No frames, nothing to segment");
            return Ok(Segmentation {
                frame_count: 0,
                threshold,
                cuts,
                shots: Vec::new(),
                scenes: Vec::new(),
                subshots: Vec::new(),
            });
        };

        let shots = CutMerger::new(self.config.merge.min_gap).merge(&cuts, bounds);
        let scenes = self.scene_source.detect_scenes(analysis, &shots);
        let subshots = match &self.refiner {
            Some(refiner) => refine_shots(refiner.as_ref(), analysis, &shots, &self.config.subshot)?,
            None => Vec::new(),
        };

        info!(
            scene_source = self.scene_source.name(),
            shots = shots.len(),
            scenes = scenes.len(),
            subshots = subshots.len(),
            "Segmentation complete"
        );

        Ok(Segmentation {
            frame_count: analysis.frame_count,
            threshold,
            cuts,
            shots,
            scenes,
            subshots,
        })
    }

    fn check_dimensions(&self, index: usize, frame: &Frame) -> Result<()> {
        if frame.width() != self.config.width || frame.height() != self.config.height {
            return Err(Error::FrameDimensions {
                index,
                width: self.config.width,
                height: self.config.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneStrategy;
    use crate::frame_source::MemorySource;
    use vseg_core::is_partition;

    const W: u32 = 32;
    const H: u32 = 18;

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            width: W,
            height: H,
            ..SegmenterConfig::default()
        }
    }

    fn frames(len: usize, color_at: impl Fn(usize) -> [u8; 3]) -> Vec<Frame> {
        (0..len).map(|i| Frame::filled(i, W, H, color_at(i))).collect()
    }

    fn video(len: usize, color_at: impl Fn(usize) -> [u8; 3]) -> MemorySource {
        MemorySource::new(frames(len, color_at))
    }

    fn span(start: usize, end: usize) -> FrameRange {
        FrameRange { start, end }
    }

    struct HalfwayRefiner;

    impl SubshotRefiner for HalfwayRefiner {
        fn name(&self) -> &str {
            "halfway"
        }

        fn refine(&self, _analysis: &FrameAnalysis, shot: FrameRange) -> Result<Vec<usize>> {
            Ok(vec![shot.start + shot.len() / 2])
        }
    }

    #[test]
    fn test_three_shots_two_scenes() {
        let mut source = video(600, |i| match i {
            0..=199 => [0, 0, 0],
            200..=399 => [255, 0, 0],
            _ => [0, 0, 255],
        });

        let result = Segmenter::new(config()).unwrap().run(&mut source).unwrap();
        assert_eq!(result.frame_count, 600);
        assert_eq!(result.cuts, vec![200, 400]);
        assert_eq!(result.shots, vec![span(0, 199), span(200, 399), span(400, 599)]);
        assert_eq!(result.scenes, vec![span(0, 399), span(400, 599)]);
        assert!(result.subshots.is_empty());
        assert!(is_partition(&result.shots, 0, 599));
    }

    #[test]
    fn test_in_memory_run_matches_streaming_run() {
        let frames = frames(700, |i| match i {
            0..=249 => [0, 0, 0],
            250..=519 => [255, 0, 0],
            _ => [0, 0, 255],
        });
        let segmenter = Segmenter::new(config()).unwrap().with_refiner(Box::new(HalfwayRefiner));

        let in_memory = segmenter.run_frames(&frames).unwrap();
        let streamed = segmenter.run(&mut MemorySource::new(frames.clone())).unwrap();

        assert_eq!(in_memory.cuts, vec![250, 520]);
        assert_eq!(in_memory.cuts, streamed.cuts);
        assert_eq!(in_memory.shots, streamed.shots);
        assert_eq!(in_memory.scenes, streamed.scenes);
        assert_eq!(in_memory.subshots, streamed.subshots);
        assert_eq!(in_memory.subshots, vec![span(250, 384), span(385, 519)]);
        assert_eq!(in_memory.threshold, streamed.threshold);
    }

    #[test]
    fn test_in_memory_run_checks_frame_size() {
        let frames = vec![Frame::filled(0, W, H, [0, 0, 0]), Frame::filled(1, 8, 8, [0, 0, 0])];
        let result = Segmenter::new(config()).unwrap().run_frames(&frames);
        assert!(matches!(result, Err(Error::FrameDimensions { index: 1, .. })));
    }

    #[test]
    fn test_static_video_is_one_shot() {
        let mut source = video(90, |_| [40, 80, 120]);
        let result = Segmenter::new(config()).unwrap().run(&mut source).unwrap();
        assert!(result.cuts.is_empty());
        assert_eq!(result.shots, vec![span(0, 89)]);
        assert_eq!(result.scenes, vec![span(0, 89)]);
    }

    #[test]
    fn test_empty_and_single_frame_videos() {
        let segmenter = Segmenter::new(config()).unwrap();

        let empty = segmenter.run(&mut MemorySource::new(Vec::new())).unwrap();
        assert_eq!(empty.frame_count, 0);
        assert!(empty.shots.is_empty() && empty.scenes.is_empty() && empty.subshots.is_empty());

        let single = segmenter.run(&mut video(1, |_| [1, 2, 3])).unwrap();
        assert_eq!(single.shots, vec![span(0, 0)]);
        assert_eq!(single.scenes, vec![span(0, 0)]);
    }

    #[test]
    fn test_long_shots_are_refined() {
        let mut source = video(400, |i| if i < 100 { [0, 0, 0] } else { [255, 255, 255] });
        let segmenter = Segmenter::new(config()).unwrap().with_refiner(Box::new(HalfwayRefiner));

        let result = segmenter.run(&mut source).unwrap();
        assert_eq!(result.shots, vec![span(0, 99), span(100, 399)]);
        assert_eq!(result.subshots, vec![span(100, 249), span(250, 399)]);
    }

    #[test]
    fn test_adaptive_ratio_strategy_runs() {
        let mut cfg = config();
        cfg.scene_strategy = SceneStrategy::AdaptiveRatio;
        let mut source = video(120, |i| if i < 60 { [0, 0, 0] } else { [255, 255, 255] });

        let result = Segmenter::new(cfg).unwrap().run(&mut source).unwrap();
        assert_eq!(result.shots, vec![span(0, 59), span(60, 119)]);
        // min_scene_len of 300 frames keeps the whole clip in one scene
        assert_eq!(result.scenes, vec![span(0, 119)]);
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let mut source = MemorySource::new(vec![Frame::filled(0, 64, 36, [0, 0, 0])]);
        let result = Segmenter::new(config()).unwrap().run(&mut source);
        assert!(matches!(
            result,
            Err(Error::FrameDimensions {
                index: 0,
                actual_width: 64,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut cfg = config();
        cfg.fps = -1.0;
        assert!(matches!(Segmenter::new(cfg), Err(Error::InvalidConfig(_))));
    }
}
