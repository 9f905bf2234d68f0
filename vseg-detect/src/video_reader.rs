//! Encoded video input through FFmpeg

use crate::frame_source::FrameSource;
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use vseg_core::{frame::CHANNELS, Frame};

/// Decodes a video file to RGB24 frames, optionally rescaled to a fixed size
pub struct VideoFileSource {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    width: u32,
    height: u32,
    pending: VecDeque<Frame>,
    next_index: usize,
    finished: bool,
}

impl VideoFileSource {
    /// Opens a video at its native frame size
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_size(path, None)
    }

    /// Opens a video and rescales every frame to `width x height`
    pub fn open_scaled(path: &Path, width: u32, height: u32) -> Result<Self> {
        Self::open_with_size(path, Some((width, height)))
    }

    fn open_with_size(path: &Path, size: Option<(u32, u32)>) -> Result<Self> {
        ffmpeg::init()?;

        let input = ffmpeg::format::input(&path)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(Error::NoVideoStream)?;
        let stream_index = stream.index();

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;
        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(Error::InvalidVideo);
        }

        let (width, height) = size.unwrap_or((decoder.width(), decoder.height()));
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            scaler,
            width,
            height,
            pending: VecDeque::new(),
            next_index: 0,
            finished: false,
        })
    }

    /// Converts every frame the decoder has ready
    fn drain_decoder(&mut self) -> Result<()> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb = ffmpeg::frame::Video::empty();
            self.scaler.run(&decoded, &mut rgb)?;

            // Rows may be padded: copy `width * 3` bytes out of every `stride`
            let row_len = self.width as usize * CHANNELS;
            let stride = rgb.stride(0);
            let data = rgb.data(0);
            let mut buffer = Vec::with_capacity(row_len * self.height as usize);
            for row in 0..self.height as usize {
                let offset = row * stride;
                let line = data.get(offset..offset + row_len).ok_or(Error::InvalidVideo)?;
                buffer.extend_from_slice(line);
            }

            self.pending
                .push_back(Frame::from_raw(self.next_index, self.width, self.height, buffer)?);
            self.next_index += 1;
        }
        Ok(())
    }
}

impl FrameSource for VideoFileSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            let packet = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match packet {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder.send_packet(&packet)?;
                    self.drain_decoder()?;
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof()?;
                    self.drain_decoder()?;
                    self.finished = true;
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        let size = Some((self.width, self.height));
        *self = Self::open_with_size(&self.path.clone(), size)?;
        Ok(())
    }

    fn frame_count_hint(&self) -> Option<usize> {
        let frames = self.input.stream(self.stream_index)?.frames();
        (frames > 0).then_some(frames as usize)
    }

    /// Average frame rate of the video stream
    fn frame_rate(&self) -> Option<f64> {
        let rate = self.input.stream(self.stream_index)?.avg_frame_rate();
        (rate.numerator() > 0 && rate.denominator() > 0).then(|| f64::from(rate))
    }
}
