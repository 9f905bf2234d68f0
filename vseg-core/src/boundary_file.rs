//! Plain-text boundary files: one `"<start> <end>"` interval per line

use crate::{Error, FrameRange, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// The three hierarchy levels that each get their own boundary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Scene,
    Shot,
    Subshot,
}

impl BoundaryKind {
    pub const ALL: [BoundaryKind; 3] = [BoundaryKind::Scene, BoundaryKind::Shot, BoundaryKind::Subshot];

    /// File name used for this level
    pub fn file_name(self) -> &'static str {
        match self {
            BoundaryKind::Scene => "scene.txt",
            BoundaryKind::Shot => "shot.txt",
            BoundaryKind::Subshot => "subshot.txt",
        }
    }

    /// Location of this level's file inside `dir`
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// Writes `ranges` to `path`, replacing any existing file
pub fn write_ranges(path: &Path, ranges: &[FrameRange]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_ranges(&mut writer, ranges)?;
    writer.flush()?;
    Ok(())
}

/// Serializes ranges in the boundary file format
pub fn encode_ranges<W: Write>(writer: &mut W, ranges: &[FrameRange]) -> Result<()> {
    for range in ranges {
        writeln!(writer, "{} {}", range.start, range.end)?;
    }
    Ok(())
}

/// Reads a boundary file. A missing file is reported as [`Error::MissingBoundaryFile`].
pub fn read_ranges(path: &Path) -> Result<Vec<FrameRange>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingBoundaryFile(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    decode_ranges(BufReader::new(file), path)
}

/// Parses boundary lines from any reader; `source` is only used in error messages.
///
/// Blank lines and surrounding whitespace are ignored.
pub fn decode_ranges<R: BufRead>(reader: R, source: &Path) -> Result<Vec<FrameRange>> {
    let mut ranges = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let malformed = || Error::MalformedBoundaryLine {
            path: source.to_path_buf(),
            line: idx + 1,
            content: line.clone(),
        };

        let mut fields = trimmed.split_whitespace();
        let (Some(start), Some(end), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(malformed());
        };
        let start: usize = start.parse().map_err(|_| malformed())?;
        let end: usize = end.parse().map_err(|_| malformed())?;
        let range = FrameRange::new(start, end).map_err(|_| malformed())?;

        ranges.push(range);
    }

    Ok(ranges)
}
