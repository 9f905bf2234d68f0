//! Color-descriptor scene grouping
//!
//! Each frame is reduced to a coarse grid of color codes. A shot's energy is
//! the mean descriptor energy of its frames, and consecutive shots stay in the
//! same scene while their energy remains close to the scene's running mean.

use crate::config::SceneEnergyConfig;
use tracing::debug;
use vseg_core::{rgb_to_hsv, Frame, FrameRange};

/// Color codes sampled on a fixed grid of one frame.
///
/// Each code is `hue_bin * 4 + saturation_flag * 2 + value_flag`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub codes: Vec<u8>,
}

impl FrameDescriptor {
    /// Samples `frame` at `(i * width / grid_width, j * height / grid_height)`
    pub fn from_frame(frame: &Frame, config: &SceneEnergyConfig) -> Self {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Self::default();
        }

        let step_x = (width / config.grid_width.max(1)).max(1);
        let step_y = (height / config.grid_height.max(1)).max(1);
        let bins = config.hue_bins.max(1);

        let mut codes = Vec::with_capacity(config.grid_width as usize * config.grid_height as usize);
        for j in 0..config.grid_height {
            let y = (j * step_y).min(height - 1);
            for i in 0..config.grid_width {
                let x = (i * step_x).min(width - 1);
                let [r, g, b] = frame.image.get_pixel(x, y).0;
                let (h, s, v) = rgb_to_hsv(r, g, b);

                let hue_bin = ((h * bins as f64).floor() as u8).min(bins - 1);
                let saturation_flag = u8::from(s > config.saturation_cutoff);
                let value_flag = u8::from(v > config.value_cutoff);
                codes.push(hue_bin * 4 + saturation_flag * 2 + value_flag);
            }
        }

        Self { codes }
    }

    /// Sum of squared codes divided by the number of grid points
    pub fn energy(&self) -> f64 {
        if self.codes.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.codes.iter().map(|&c| c as u64 * c as u64).sum();
        sum as f64 / self.codes.len() as f64
    }
}

/// A contiguous run of shots forming one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneGroup {
    /// Index of the scene's first shot
    pub first_shot: usize,
    /// Number of shots in the scene
    pub shot_count: usize,
    /// Frames covered by the scene's shots
    pub range: FrameRange,
}

/// Mean descriptor energy per shot
pub fn shot_energies(descriptors: &[FrameDescriptor], shots: &[FrameRange]) -> Vec<f64> {
    shots
        .iter()
        .map(|shot| {
            let frames = descriptors
                .get(shot.start..=shot.end.min(descriptors.len().saturating_sub(1)))
                .unwrap_or(&[]);
            if frames.is_empty() {
                return 0.0;
            }
            frames.iter().map(FrameDescriptor::energy).sum::<f64>() / frames.len() as f64
        })
        .collect()
}

/// Mean absolute difference between consecutive shot energies, 0 with fewer than two shots
pub fn average_energy_difference(energies: &[f64]) -> f64 {
    if energies.len() < 2 {
        return 0.0;
    }
    let total: f64 = energies.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();
    total / (energies.len() - 1) as f64
}

/// Returns the shot indices that start a scene.
///
/// A shot opens a new scene when its energy differs from the current scene's
/// running mean by more than `threshold`.
pub fn group_scenes(energies: &[f64], threshold: f64) -> Vec<usize> {
    if energies.is_empty() {
        return Vec::new();
    }

    let (starts, _) = energies.iter().enumerate().skip(1).fold(
        (vec![0], (energies[0], 1usize)),
        |(mut starts, (mean, count)), (shot, &energy)| {
            if (energy - mean).abs() > threshold {
                debug!(shot, energy, running_mean = mean, threshold, "Scene break");
                starts.push(shot);
                (starts, (energy, 1))
            } else {
                let updated = (mean * count as f64 + energy) / (count + 1) as f64;
                (starts, (updated, count + 1))
            }
        },
    );
    starts
}

/// Groups shots into scenes from per-frame descriptors
#[derive(Debug, Clone, Default)]
pub struct SceneEnergyAggregator {
    config: SceneEnergyConfig,
}

impl SceneEnergyAggregator {
    pub fn new(config: SceneEnergyConfig) -> Self {
        Self { config }
    }

    /// Extracts the descriptor of one frame with this aggregator's grid
    pub fn describe(&self, frame: &Frame) -> FrameDescriptor {
        FrameDescriptor::from_frame(frame, &self.config)
    }

    /// Partitions `shots` into scenes
    pub fn aggregate(&self, descriptors: &[FrameDescriptor], shots: &[FrameRange]) -> Vec<SceneGroup> {
        let energies = shot_energies(descriptors, shots);
        let baseline = average_energy_difference(&energies);
        let starts = group_scenes(&energies, baseline * self.config.threshold_multiplier);

        debug!(
            shots = shots.len(),
            scenes = starts.len(),
            baseline,
            "Grouped shots by descriptor energy"
        );

        starts
            .iter()
            .enumerate()
            .map(|(i, &first_shot)| {
                let next = starts.get(i + 1).copied().unwrap_or(shots.len());
                SceneGroup {
                    first_shot,
                    shot_count: next - first_shot,
                    range: FrameRange {
                        start: shots[first_shot].start,
                        end: shots[next - 1].end,
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(frame_rgb: [u8; 3]) -> FrameDescriptor {
        let frame = Frame::filled(0, 32, 18, frame_rgb);
        FrameDescriptor::from_frame(&frame, &SceneEnergyConfig::default())
    }

    fn span(start: usize, end: usize) -> FrameRange {
        FrameRange { start, end }
    }

    #[test]
    fn test_descriptor_codes_for_solid_colors() {
        // red: hue bin 0, saturated, bright
        let red = descriptor([255, 0, 0]);
        assert_eq!(red.codes.len(), 144);
        assert!(red.codes.iter().all(|&c| c == 3));
        assert_eq!(red.energy(), 9.0);

        // blue: hue 2/3 falls in bin 4 of 7
        let blue = descriptor([0, 0, 255]);
        assert!(blue.codes.iter().all(|&c| c == 19));

        assert_eq!(descriptor([0, 0, 0]).energy(), 0.0);
        assert_eq!(descriptor([255, 255, 255]).energy(), 1.0);
    }

    #[test]
    fn test_descriptor_samples_grid_points() {
        // Left half red, right half black: 8 of 16 columns per row are red.
        let mut frame = Frame::filled(0, 32, 18, [0, 0, 0]);
        for (x, _, pixel) in frame.image.enumerate_pixels_mut() {
            if x < 16 {
                pixel.0 = [255, 0, 0];
            }
        }
        let d = FrameDescriptor::from_frame(&frame, &SceneEnergyConfig::default());
        assert_eq!(d.codes.iter().filter(|&&c| c == 3).count(), 8 * 9);
        assert_eq!(d.energy(), 4.5);
    }

    #[test]
    fn test_alternating_energies_form_one_scene() {
        // Consecutive differences are all 1, which never exceeds the baseline of 1
        let energies = [10.0, 11.0, 10.0, 11.0, 10.0, 11.0];
        let baseline = average_energy_difference(&energies);
        assert_eq!(baseline, 1.0);
        assert_eq!(group_scenes(&energies, baseline), vec![0]);
    }

    #[test]
    fn test_energy_jump_starts_new_scene() {
        let energies = [10.0, 11.0, 10.0, 11.0, 40.0, 40.0];
        let baseline = average_energy_difference(&energies);
        assert_eq!(baseline, 6.4);
        assert_eq!(group_scenes(&energies, baseline), vec![0, 4]);
    }

    #[test]
    fn test_identical_energies_form_one_scene() {
        let energies = [5.0; 8];
        assert_eq!(average_energy_difference(&energies), 0.0);
        assert_eq!(group_scenes(&energies, 0.0), vec![0]);
        assert!(group_scenes(&[], 0.0).is_empty());
    }

    #[test]
    fn test_aggregate_partitions_shots() {
        let shots = vec![span(0, 1), span(2, 3), span(4, 5)];
        let descriptors = vec![
            descriptor([0, 0, 0]),
            descriptor([0, 0, 0]),
            descriptor([0, 0, 0]),
            descriptor([0, 0, 0]),
            descriptor([0, 0, 255]),
            descriptor([0, 0, 255]),
        ];

        let scenes = SceneEnergyAggregator::default().aggregate(&descriptors, &shots);
        assert_eq!(
            scenes,
            vec![
                SceneGroup {
                    first_shot: 0,
                    shot_count: 2,
                    range: span(0, 3)
                },
                SceneGroup {
                    first_shot: 2,
                    shot_count: 1,
                    range: span(4, 5)
                },
            ]
        );
    }

    #[test]
    fn test_shot_energy_is_frame_mean() {
        let descriptors = vec![descriptor([255, 0, 0]), descriptor([0, 0, 0])];
        assert_eq!(shot_energies(&descriptors, &[span(0, 1)]), vec![4.5]);
    }
}
