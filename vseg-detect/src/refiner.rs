//! Sub-shot refinement of long shots
//!
//! A refiner proposes boundary frames inside one shot. Proposals are turned
//! into sub-shot ranges with the same merging rule as shots, using the shot's
//! own bounds, so the sub-shots of a shot always partition it.

use crate::analysis::FrameAnalysis;
use crate::config::SubshotConfig;
use crate::cut_detector::CutThreshold;
use crate::cut_merger::CutMerger;
use crate::{Error, Result};
use rayon::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};
use vseg_core::FrameRange;

/// Proposes sub-shot boundaries inside a shot
pub trait SubshotRefiner: Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Candidate boundary frames, expected to lie inside `shot`
    fn refine(&self, analysis: &FrameAnalysis, shot: FrameRange) -> Result<Vec<usize>>;
}

/// Delegates boundary detection to an external program.
///
/// The program is invoked as `<program> [args...] <video> <start> <end>` and
/// must print the candidate frame indices to stdout, separated by whitespace.
#[derive(Debug, Clone)]
pub struct CommandRefiner {
    program: PathBuf,
    args: Vec<String>,
    video: PathBuf,
}

impl CommandRefiner {
    pub fn new(program: impl Into<PathBuf>, video: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            video: video.into(),
        }
    }

    /// Extra arguments placed before the video path
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl SubshotRefiner for CommandRefiner {
    fn name(&self) -> &str {
        "command"
    }

    fn refine(&self, _analysis: &FrameAnalysis, shot: FrameRange) -> Result<Vec<usize>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.video)
            .arg(shot.start.to_string())
            .arg(shot.end.to_string())
            .output()
            .map_err(|e| Error::Refiner(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Refiner(format!(
                "{} exited with {} for shot {}: {}",
                self.program.display(),
                output.status,
                shot,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_frame_list(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses whitespace separated frame indices
pub fn parse_frame_list(text: &str) -> Result<Vec<usize>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<usize>()
                .map_err(|_| Error::Refiner(format!("unexpected refiner output token {:?}", token)))
        })
        .collect()
}

/// Re-runs the adaptive threshold on the scores inside the shot.
///
/// Returns every frame whose score exceeds the shot's own
/// `mean + multiplier * stddev`.
#[derive(Debug, Clone, Copy)]
pub struct StatisticalRefiner {
    threshold_multiplier: f64,
}

impl StatisticalRefiner {
    pub fn new(threshold_multiplier: f64) -> Self {
        Self { threshold_multiplier }
    }
}

impl Default for StatisticalRefiner {
    fn default() -> Self {
        Self::new(SubshotConfig::default().local_threshold_multiplier)
    }
}

impl SubshotRefiner for StatisticalRefiner {
    fn name(&self) -> &str {
        "statistical"
    }

    fn refine(&self, analysis: &FrameAnalysis, shot: FrameRange) -> Result<Vec<usize>> {
        let local: Vec<(usize, f64)> = analysis.scores.within(shot).collect();
        let values: Vec<f64> = local.iter().map(|&(_, s)| s).collect();
        let threshold = CutThreshold::from_scores(&values, self.threshold_multiplier);

        Ok(local
            .into_iter()
            .filter(|&(_, score)| score > threshold.value)
            .map(|(frame, _)| frame)
            .collect())
    }
}

/// Whether a shot is long enough to be refined
pub fn qualifies(shot: &FrameRange, min_shot_len: usize) -> bool {
    shot.end - shot.start >= min_shot_len
}

/// Refines every qualifying shot and returns the resulting sub-shot ranges in
/// frame order.
///
/// Shots are refined in parallel on the rayon pool. The first refiner error
/// aborts the whole run.
pub fn refine_shots(
    refiner: &dyn SubshotRefiner,
    analysis: &FrameAnalysis,
    shots: &[FrameRange],
    config: &SubshotConfig,
) -> Result<Vec<FrameRange>> {
    let eligible: Vec<FrameRange> = shots
        .iter()
        .filter(|shot| qualifies(shot, config.min_shot_len))
        .copied()
        .collect();
    if eligible.is_empty() {
        return Ok(Vec::new());
    }

    info!(refiner = refiner.name(), shots = eligible.len(), "Refining long shots");

    let merger = CutMerger::new(config.min_gap);
    let per_shot = eligible
        .par_iter()
        .map(|&shot| {
            let candidates = refiner.refine(analysis, shot)?;
            Ok(merger.merge(&inside_shot(candidates, shot), shot))
        })
        .collect::<Result<Vec<Vec<FrameRange>>>>()?;

    Ok(per_shot.into_iter().flatten().collect())
}

/// Drops candidates that cannot split `shot`
fn inside_shot(candidates: Vec<usize>, shot: FrameRange) -> Vec<usize> {
    candidates
        .into_iter()
        .filter(|&frame| {
            let inside = frame > shot.start && frame <= shot.end;
            if !inside && frame != shot.start {
                warn!(frame, shot = %shot, "Refiner proposed a boundary outside its shot, ignoring");
            } else if inside {
                debug!(frame, shot = %shot, "Sub-shot candidate");
            }
            inside
        })
        .collect()
}
