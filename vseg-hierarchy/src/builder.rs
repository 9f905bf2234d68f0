//! Assembles flat boundary lists into a [`Hierarchy`]
//!
//! A shot belongs to the scene that contains it and a sub-shot to the shot
//! that contains it. Entries without a containing parent are reported and
//! dropped; parents are never widened to fit their children. When overlapping
//! parents both contain an entry, it goes to the earliest one and the overlap
//! is reported.

use crate::hierarchy::{Hierarchy, SceneNode, ShotNode};
use crate::{Error, Result};
use std::path::Path;
use tracing::{info, warn};
use vseg_core::{read_ranges, BoundaryKind, FrameRange};

/// Entries dropped or placed by a tie-break while building a hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentReport {
    /// Shots not contained in any scene
    pub orphan_shots: Vec<FrameRange>,
    /// Sub-shots not contained in any retained shot
    pub orphan_subshots: Vec<FrameRange>,
    /// Shots contained in more than one scene, kept in the earliest
    pub ambiguous_shots: Vec<FrameRange>,
    /// Sub-shots contained in more than one shot, kept in the earliest
    pub ambiguous_subshots: Vec<FrameRange>,
}

impl ContainmentReport {
    /// True when every entry had exactly one parent
    pub fn is_clean(&self) -> bool {
        self.orphan_shots.is_empty()
            && self.orphan_subshots.is_empty()
            && self.ambiguous_shots.is_empty()
            && self.ambiguous_subshots.is_empty()
    }
}

/// Builds hierarchies with timestamps at a fixed frame rate
#[derive(Debug, Clone, Copy)]
pub struct HierarchyBuilder {
    fps: f64,
}

impl HierarchyBuilder {
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(Error::InvalidFrameRate(fps));
        }
        Ok(Self { fps })
    }

    /// Nests `shots` into `scenes` and `subshots` into the retained shots
    pub fn build(
        &self,
        scenes: &[FrameRange],
        shots: &[FrameRange],
        subshots: &[FrameRange],
    ) -> (Hierarchy, ContainmentReport) {
        let mut report = ContainmentReport::default();

        let mut scenes = scenes.to_vec();
        scenes.sort();
        let mut nodes: Vec<SceneNode> = scenes
            .iter()
            .map(|&range| SceneNode {
                range,
                start_ms: range.start_ms(self.fps),
                shots: Vec::new(),
            })
            .collect();

        let mut shots = shots.to_vec();
        shots.sort();
        for shot in shots {
            let parents = containing_parents(&scenes, &shot);
            match parents.first() {
                Some(&scene) => {
                    if parents.len() > 1 {
                        warn!(shot = %shot, scenes = parents.len(), "Shot lies in overlapping scenes, keeping the first");
                        report.ambiguous_shots.push(shot);
                    }
                    nodes[scene].shots.push(ShotNode {
                        range: shot,
                        start_ms: shot.start_ms(self.fps),
                        subshots: Vec::new(),
                        subshot_starts_ms: Vec::new(),
                    });
                }
                None => {
                    warn!(shot = %shot, "Shot is not contained in any scene, dropping it");
                    report.orphan_shots.push(shot);
                }
            }
        }

        // (scene index, shot index) of every retained shot, in frame order
        let mut retained: Vec<(usize, usize)> = nodes
            .iter()
            .enumerate()
            .flat_map(|(s, node)| (0..node.shots.len()).map(move |i| (s, i)))
            .collect();
        retained.sort_by_key(|&(s, i)| nodes[s].shots[i].range);
        let retained_ranges: Vec<FrameRange> = retained
            .iter()
            .map(|&(s, i)| nodes[s].shots[i].range)
            .collect();

        let mut subshots = subshots.to_vec();
        subshots.sort();
        for subshot in subshots {
            let parents = containing_parents(&retained_ranges, &subshot);
            match parents.first() {
                Some(&parent) => {
                    if parents.len() > 1 {
                        warn!(subshot = %subshot, shots = parents.len(), "Sub-shot lies in overlapping shots, keeping the first");
                        report.ambiguous_subshots.push(subshot);
                    }
                    let (s, i) = retained[parent];
                    let shot = &mut nodes[s].shots[i];
                    shot.subshots.push(subshot);
                    shot.subshot_starts_ms.push(subshot.start_ms(self.fps));
                }
                None => {
                    warn!(subshot = %subshot, "Sub-shot is not contained in any shot, dropping it");
                    report.orphan_subshots.push(subshot);
                }
            }
        }

        let hierarchy = Hierarchy {
            fps: self.fps,
            scenes: nodes,
        };
        info!(
            scenes = hierarchy.scenes.len(),
            shots = hierarchy.shot_count(),
            subshots = hierarchy.subshot_count(),
            dropped = report.orphan_shots.len() + report.orphan_subshots.len(),
            ambiguous = report.ambiguous_shots.len() + report.ambiguous_subshots.len(),
            "Built hierarchy"
        );
        (hierarchy, report)
    }
}

/// Indices of the ranges in sorted `parents` that contain `child`, earliest first
fn containing_parents(parents: &[FrameRange], child: &FrameRange) -> Vec<usize> {
    let upper = parents.partition_point(|p| p.start <= child.start);
    parents[..upper]
        .iter()
        .enumerate()
        .filter(|(_, p)| p.contains(child))
        .map(|(index, _)| index)
        .collect()
}

/// Reads `scene.txt`, `shot.txt` and `subshot.txt` from `dir` and builds the hierarchy.
///
/// Any of the three files missing is an error.
pub fn assemble_from_dir(dir: &Path, fps: f64) -> Result<(Hierarchy, ContainmentReport)> {
    let builder = HierarchyBuilder::new(fps)?;
    let scenes = read_ranges(&BoundaryKind::Scene.path_in(dir))?;
    let shots = read_ranges(&BoundaryKind::Shot.path_in(dir))?;
    let subshots = read_ranges(&BoundaryKind::Subshot.path_in(dir))?;
    Ok(builder.build(&scenes, &shots, &subshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vseg_core::write_ranges;

    fn span(start: usize, end: usize) -> FrameRange {
        FrameRange { start, end }
    }

    #[test]
    fn test_nests_levels_with_timestamps() {
        let builder = HierarchyBuilder::new(30.0).unwrap();
        let (hierarchy, report) = builder.build(
            &[span(0, 89), span(90, 599)],
            &[span(0, 44), span(45, 89), span(90, 599)],
            &[span(90, 299), span(300, 599)],
        );

        assert!(report.is_clean());
        assert_eq!(hierarchy.scenes.len(), 2);
        assert_eq!(hierarchy.scenes[0].shots.len(), 2);
        assert_eq!(hierarchy.scenes[0].shots[1].start_ms, 1500);
        assert_eq!(hierarchy.scenes[1].start_ms, 3000);

        let long_shot = &hierarchy.scenes[1].shots[0];
        assert_eq!(long_shot.subshot_starts_ms, vec![3000, 10000]);
        assert!(hierarchy.scenes[0].shots[0].subshots.is_empty());
    }

    #[test]
    fn test_subshot_past_shot_end_is_dropped() {
        let builder = HierarchyBuilder::new(30.0).unwrap();
        let (hierarchy, report) = builder.build(
            &[span(0, 599)],
            &[span(0, 299), span(300, 599)],
            &[span(0, 149), span(150, 320)],
        );

        assert_eq!(report.orphan_subshots, vec![span(150, 320)]);
        assert_eq!(hierarchy.scenes[0].shots[0].subshots, vec![span(0, 149)]);
        // the parent shot keeps its own bounds
        assert_eq!(hierarchy.scenes[0].shots[0].range, span(0, 299));
    }

    #[test]
    fn test_shot_across_scenes_is_dropped() {
        let builder = HierarchyBuilder::new(25.0).unwrap();
        let (hierarchy, report) = builder.build(
            &[span(0, 99), span(100, 199)],
            &[span(0, 79), span(80, 119), span(120, 199)],
            &[span(80, 100)],
        );

        assert_eq!(report.orphan_shots, vec![span(80, 119)]);
        // its sub-shot has no retained parent left
        assert_eq!(report.orphan_subshots, vec![span(80, 100)]);
        assert_eq!(hierarchy.shot_count(), 2);
        assert_eq!(hierarchy.scenes[0].range, span(0, 99));
    }

    #[test]
    fn test_overlapping_parents_are_reported() {
        let builder = HierarchyBuilder::new(30.0).unwrap();
        let (hierarchy, report) = builder.build(
            &[span(0, 299), span(200, 599)],
            &[span(0, 199), span(200, 299), span(300, 599)],
            &[span(220, 260)],
        );

        assert!(!report.is_clean());
        assert!(report.orphan_shots.is_empty());
        assert_eq!(report.ambiguous_shots, vec![span(200, 299)]);
        assert!(report.ambiguous_subshots.is_empty());
        assert_eq!(hierarchy.scenes[0].shots.len(), 2);
        assert_eq!(hierarchy.scenes[0].shots[1].subshots, vec![span(220, 260)]);
        assert_eq!(hierarchy.scenes[1].shots.len(), 1);

        let (hierarchy, report) = builder.build(
            &[span(0, 599)],
            &[span(0, 299), span(100, 399)],
            &[span(150, 250)],
        );
        assert!(report.ambiguous_shots.is_empty());
        assert_eq!(report.ambiguous_subshots, vec![span(150, 250)]);
        assert_eq!(hierarchy.scenes[0].shots[0].subshots, vec![span(150, 250)]);
        assert!(hierarchy.scenes[0].shots[1].subshots.is_empty());
    }

    #[test]
    fn test_flat_ranges_round_trip() {
        let scenes = vec![span(0, 499), span(500, 999)];
        let shots = vec![span(0, 199), span(200, 499), span(500, 999)];
        let subshots = vec![span(500, 749), span(750, 999)];

        let (hierarchy, _) = HierarchyBuilder::new(30.0).unwrap().build(&scenes, &shots, &subshots);
        let flat = hierarchy.flat_ranges();
        assert_eq!(flat.scenes, scenes);
        assert_eq!(flat.shots, shots);
        assert_eq!(flat.subshots, subshots);
    }

    #[test]
    fn test_invalid_frame_rate() {
        assert!(matches!(HierarchyBuilder::new(0.0), Err(Error::InvalidFrameRate(_))));
        assert!(HierarchyBuilder::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_assemble_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_ranges(&dir.path().join("scene.txt"), &[span(0, 599)]).unwrap();
        write_ranges(&dir.path().join("shot.txt"), &[span(0, 299), span(300, 599)]).unwrap();
        write_ranges(&dir.path().join("subshot.txt"), &[span(0, 149), span(150, 299)]).unwrap();

        let (hierarchy, report) = assemble_from_dir(dir.path(), 30.0).unwrap();
        assert!(report.is_clean());
        assert_eq!(hierarchy.subshot_count(), 2);

        let out = tempfile::tempdir().unwrap();
        hierarchy.write_boundary_files(out.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.path().join("shot.txt")).unwrap(),
            "0 299\n300 599\n"
        );
    }

    #[test]
    fn test_missing_boundary_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_ranges(&dir.path().join("scene.txt"), &[span(0, 9)]).unwrap();
        write_ranges(&dir.path().join("shot.txt"), &[span(0, 9)]).unwrap();

        let result = assemble_from_dir(dir.path(), 30.0);
        assert!(matches!(
            result,
            Err(Error::Core(vseg_core::Error::MissingBoundaryFile(_)))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let (hierarchy, _) = HierarchyBuilder::new(30.0)
            .unwrap()
            .build(&[span(0, 599)], &[span(0, 599)], &[span(0, 299), span(300, 599)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarchy.json");
        hierarchy.write_json(&path).unwrap();
        assert_eq!(Hierarchy::read_json(&path).unwrap(), hierarchy);
    }
}
