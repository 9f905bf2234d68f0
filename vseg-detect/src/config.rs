//! Segmentation configuration
//!
//! Every tuning constant of the pipeline lives here with its default value.
//! With the `serde` feature all structs deserialize from partial documents:
//! missing fields fall back to their defaults.

use crate::{Error, Result};

/// What the cut detector does with a confirmation window that is still open
/// when the frame sequence ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrailingWindowPolicy {
    /// Drop the unfinished window; no cut is emitted
    #[default]
    Discard,
    /// Apply the boundary selection rule to the partial window
    EmitBest,
}

/// Adaptive cut detector settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CutDetectorConfig {
    /// Threshold = mean + multiplier * stddev of all frame scores
    pub threshold_multiplier: f64,
    /// Number of entries in the confirmation window, including the trigger frame
    pub window_size: usize,
    /// How many running-maximum updates may move the selected boundary
    pub max_new_maxima: usize,
    pub trailing_window: TrailingWindowPolicy,
}

impl Default for CutDetectorConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: 2.5,
            window_size: 15,
            max_new_maxima: 5,
            trailing_window: TrailingWindowPolicy::Discard,
        }
    }
}

/// Cut merging settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeConfig {
    /// Cuts closer than this many frames to the previous kept cut are dropped
    pub min_gap: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { min_gap: 30 }
    }
}

/// Color-descriptor scene grouping settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SceneEnergyConfig {
    /// Sample points per row
    pub grid_width: u32,
    /// Sample points per column
    pub grid_height: u32,
    /// Number of discrete hue bins (at most 64 so codes fit in a byte)
    pub hue_bins: u8,
    /// Saturation above this counts as "high"
    pub saturation_cutoff: f64,
    /// Value above this counts as "high"
    pub value_cutoff: f64,
    /// Scene break when |energy - running mean| > average shot difference * multiplier
    pub threshold_multiplier: f64,
}

impl Default for SceneEnergyConfig {
    fn default() -> Self {
        Self {
            grid_width: 16,
            grid_height: 9,
            hue_bins: 7,
            saturation_cutoff: 0.65,
            value_cutoff: 0.7,
            threshold_multiplier: 1.0,
        }
    }
}

/// Settings of the adaptive-ratio scene source
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdaptiveRatioConfig {
    /// Minimum ratio of a frame's score to its neighbours' average score
    pub adaptive_threshold: f64,
    /// Neighbours considered on each side of a frame
    pub window_width: usize,
    /// Scores below this never start a scene
    pub min_content_value: f64,
    /// Minimum number of frames between two scene starts
    pub min_scene_len: usize,
}

impl Default for AdaptiveRatioConfig {
    fn default() -> Self {
        Self {
            adaptive_threshold: 8.0,
            window_width: 2,
            min_content_value: 15.0,
            min_scene_len: 300,
        }
    }
}

/// Which scene source groups shots into scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SceneStrategy {
    /// Per-shot descriptor energy with a running baseline
    #[default]
    Energy,
    /// Frame score spikes relative to their neighbourhood
    AdaptiveRatio,
}

/// Sub-shot refinement settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SubshotConfig {
    /// Shots are refined only when `end - start >= min_shot_len`
    pub min_shot_len: usize,
    /// Local threshold multiplier used by the statistical refiner
    pub local_threshold_multiplier: f64,
    /// Minimum distance between two sub-shot boundaries
    pub min_gap: usize,
}

impl Default for SubshotConfig {
    fn default() -> Self {
        Self {
            min_shot_len: 250,
            local_threshold_multiplier: 2.0,
            min_gap: 30,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmenterConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second, used for every timestamp
    pub fps: f64,
    pub cut: CutDetectorConfig,
    pub merge: MergeConfig,
    pub scene_strategy: SceneStrategy,
    pub scene_energy: SceneEnergyConfig,
    pub adaptive_ratio: AdaptiveRatioConfig,
    pub subshot: SubshotConfig,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 270,
            fps: 30.0,
            cut: CutDetectorConfig::default(),
            merge: MergeConfig::default(),
            scene_strategy: SceneStrategy::default(),
            scene_energy: SceneEnergyConfig::default(),
            adaptive_ratio: AdaptiveRatioConfig::default(),
            subshot: SubshotConfig::default(),
        }
    }
}

impl SegmenterConfig {
    /// Rejects values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.width == 0 || self.height == 0 {
            return invalid(format!("frame size {}x{} is empty", self.width, self.height));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return invalid(format!("frame rate must be positive, got {}", self.fps));
        }
        if !non_negative(self.cut.threshold_multiplier) {
            return invalid("cut threshold multiplier must be non-negative".into());
        }
        if self.cut.window_size == 0 {
            return invalid("cut window size must be at least 1".into());
        }
        if self.cut.max_new_maxima == 0 {
            return invalid("max new maxima must be at least 1".into());
        }

        let energy = &self.scene_energy;
        if energy.grid_width == 0 || energy.grid_height == 0 {
            return invalid("descriptor grid must have at least one point".into());
        }
        if energy.grid_width > self.width || energy.grid_height > self.height {
            return invalid(format!(
                "descriptor grid {}x{} is larger than the frame {}x{}",
                energy.grid_width, energy.grid_height, self.width, self.height
            ));
        }
        if energy.hue_bins == 0 || energy.hue_bins > 64 {
            return invalid(format!("hue bins must be within 1..=64, got {}", energy.hue_bins));
        }
        if !non_negative(energy.threshold_multiplier) {
            return invalid("scene threshold multiplier must be non-negative".into());
        }

        if !non_negative(self.adaptive_ratio.adaptive_threshold)
            || self.adaptive_ratio.adaptive_threshold == 0.0
        {
            return invalid("adaptive threshold must be positive".into());
        }
        if self.adaptive_ratio.window_width == 0 {
            return invalid("adaptive window width must be at least 1".into());
        }

        if !non_negative(self.subshot.local_threshold_multiplier) {
            return invalid("sub-shot threshold multiplier must be non-negative".into());
        }

        Ok(())
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
