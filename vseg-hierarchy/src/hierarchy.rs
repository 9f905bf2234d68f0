//! The nested Scene → Shot → Sub-shot structure

use crate::Result;
use std::path::Path;
use vseg_core::{write_ranges, BoundaryKind, FrameRange};

/// Segmentation of one video as a tree
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hierarchy {
    /// Frame rate used for every timestamp
    pub fps: f64,
    pub scenes: Vec<SceneNode>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneNode {
    pub range: FrameRange,
    pub start_ms: u64,
    pub shots: Vec<ShotNode>,
}

/// A shot and, if it was refined, its sub-shots
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShotNode {
    pub range: FrameRange,
    pub start_ms: u64,
    pub subshots: Vec<FrameRange>,
    pub subshot_starts_ms: Vec<u64>,
}

/// The three levels as flat, ordered interval lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRanges {
    pub scenes: Vec<FrameRange>,
    pub shots: Vec<FrameRange>,
    pub subshots: Vec<FrameRange>,
}

impl FlatRanges {
    /// Ranges of one level
    pub fn get(&self, kind: BoundaryKind) -> &[FrameRange] {
        match kind {
            BoundaryKind::Scene => &self.scenes,
            BoundaryKind::Shot => &self.shots,
            BoundaryKind::Subshot => &self.subshots,
        }
    }
}

impl Hierarchy {
    pub fn shot_count(&self) -> usize {
        self.scenes.iter().map(|scene| scene.shots.len()).sum()
    }

    pub fn subshot_count(&self) -> usize {
        self.shots().map(|shot| shot.subshots.len()).sum()
    }

    /// All shots in frame order
    pub fn shots(&self) -> impl Iterator<Item = &ShotNode> {
        self.scenes.iter().flat_map(|scene| scene.shots.iter())
    }

    pub fn flat_ranges(&self) -> FlatRanges {
        FlatRanges {
            scenes: self.scenes.iter().map(|scene| scene.range).collect(),
            shots: self.shots().map(|shot| shot.range).collect(),
            subshots: self.shots().flat_map(|shot| shot.subshots.iter().copied()).collect(),
        }
    }

    /// Writes `scene.txt`, `shot.txt` and `subshot.txt` into `dir`, replacing existing files
    pub fn write_boundary_files(&self, dir: &Path) -> Result<()> {
        let flat = self.flat_ranges();
        for kind in BoundaryKind::ALL {
            write_ranges(&kind.path_in(dir), flat.get(kind))?;
        }
        Ok(())
    }

    /// Writes the tree as pretty-printed JSON
    #[cfg(feature = "serde")]
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    }

    /// Reads a tree written by [`write_json`](Self::write_json)
    #[cfg(feature = "serde")]
    pub fn read_json(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
