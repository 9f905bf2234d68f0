//! Sequential frame sources
//!
//! The pipeline reads the video twice (statistics first, then cut
//! confirmation), so every source must be able to rewind to its first frame.

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;
use vseg_core::{frame::byte_len, Frame};

/// A rewindable stream of equally sized RGB frames
pub trait FrameSource {
    /// Frame width and height in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Returns the next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Restarts the stream at frame 0
    fn rewind(&mut self) -> Result<()>;

    /// Total number of frames, when known up front
    fn frame_count_hint(&self) -> Option<usize> {
        None
    }

    /// Frame rate declared by the container, if any
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

/// Reader for headerless raw video: `width * height * 3` bytes per frame, RGB order
pub struct RawRgbReader<R> {
    reader: R,
    width: u32,
    height: u32,
    frame_len: usize,
    frame_count: Option<usize>,
    next_index: usize,
    truncation_reported: bool,
}

impl RawRgbReader<BufReader<File>> {
    /// Opens a `.rgb` file
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len() as usize;
        let mut reader = Self::new(BufReader::new(file), width, height)?;
        reader.frame_count = Some(total_bytes / reader.frame_len);
        Ok(reader)
    }
}

impl<R: Read + Seek> RawRgbReader<R> {
    /// Wraps any seekable byte stream
    pub fn new(reader: R, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(format!(
                "raw frame size {}x{} is empty",
                width, height
            )));
        }

        Ok(Self {
            reader,
            width,
            height,
            frame_len: byte_len(width, height),
            frame_count: None,
            next_index: 0,
            truncation_reported: false,
        })
    }

    /// Fills `buf` as far as the stream allows and returns the byte count read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek> FrameSource for RawRgbReader<R> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut data = vec![0u8; self.frame_len];
        let read = self.read_full(&mut data)?;

        if read == 0 {
            return Ok(None);
        }
        if read < self.frame_len {
            if !self.truncation_reported {
                warn!(
                    frames = self.next_index,
                    leftover_bytes = read,
                    frame_bytes = self.frame_len,
                    "Input is not a whole number of frames, truncating trailing partial frame"
                );
                self.truncation_reported = true;
            }
            return Ok(None);
        }

        let frame = Frame::from_raw(self.next_index, self.width, self.height, data)?;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.next_index = 0;
        Ok(())
    }

    fn frame_count_hint(&self) -> Option<usize> {
        self.frame_count
    }
}

/// Frames that are already decoded and held in memory
pub struct MemorySource {
    frames: Vec<Frame>,
    width: u32,
    height: u32,
    position: usize,
}

impl MemorySource {
    /// Wraps `frames`; the first frame defines the dimensions
    pub fn new(frames: Vec<Frame>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self {
            frames,
            width,
            height,
            position: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(frame) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let mut frame = frame.clone();
        frame.index = self.position;
        self.position += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_video(frames: &[[u8; 3]], width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for rgb in frames {
            for _ in 0..(width * height) {
                bytes.extend_from_slice(rgb);
            }
        }
        bytes
    }

    #[test]
    fn test_reads_whole_frames_in_order() {
        let bytes = raw_video(&[[1, 2, 3], [4, 5, 6]], 4, 2);
        let mut reader = RawRgbReader::new(Cursor::new(bytes), 4, 2).unwrap();

        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.image.get_pixel(3, 1).0, [1, 2, 3]);

        let second = reader.next_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.image.get_pixel(0, 0).0, [4, 5, 6]);

        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_truncates_partial_trailing_frame() {
        let mut bytes = raw_video(&[[9, 9, 9]; 3], 2, 2);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        let mut reader = RawRgbReader::new(Cursor::new(bytes), 2, 2).unwrap();

        let mut count = 0;
        while reader.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_rewind_restarts_at_first_frame() {
        let bytes = raw_video(&[[1, 1, 1], [2, 2, 2]], 1, 1);
        let mut reader = RawRgbReader::new(Cursor::new(bytes), 1, 1).unwrap();

        while reader.next_frame().unwrap().is_some() {}
        reader.rewind().unwrap();

        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(frame.image.get_pixel(0, 0).0, [1, 1, 1]);
    }

    #[test]
    fn test_rejects_empty_dimensions() {
        assert!(RawRgbReader::new(Cursor::new(Vec::new()), 0, 10).is_err());
    }

    #[test]
    fn test_open_reports_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.rgb");
        std::fs::write(&path, raw_video(&[[0, 0, 0]; 5], 3, 2)).unwrap();

        let reader = RawRgbReader::open(&path, 3, 2).unwrap();
        assert_eq!(reader.frame_count_hint(), Some(5));
        assert_eq!(reader.dimensions(), (3, 2));
    }

    #[test]
    fn test_memory_source_reindexes_frames() {
        let frames = vec![Frame::filled(7, 2, 2, [0, 0, 0]), Frame::filled(9, 2, 2, [1, 1, 1])];
        let mut source = MemorySource::new(frames);

        assert_eq!(source.next_frame().unwrap().unwrap().index, 0);
        assert_eq!(source.next_frame().unwrap().unwrap().index, 1);
        assert!(source.next_frame().unwrap().is_none());
        source.rewind().unwrap();
        assert_eq!(source.frame_count_hint(), Some(2));
        assert_eq!(source.frame_rate(), None);
    }
}
