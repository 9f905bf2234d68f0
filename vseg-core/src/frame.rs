//! Raw RGB frames and their HSV channel planes

use crate::{Error, Result};
use image::{Rgb, RgbImage};

/// Number of bytes per pixel in a raw frame
pub const CHANNELS: usize = 3;

/// A single decoded video frame (8-bit RGB, no alpha)
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position of this frame in the video
    pub index: usize,
    /// Pixel data
    pub image: RgbImage,
}

impl Frame {
    /// Creates a frame from a headerless `width * height * 3` byte buffer
    pub fn from_raw(index: usize, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height);
        let actual = data.len();
        let image = RgbImage::from_raw(width, height, data).ok_or(Error::FrameSize {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self { index, image })
    }

    /// Creates a frame where every pixel has the same color
    pub fn filled(index: usize, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            index,
            image: RgbImage::from_pixel(width, height, Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Splits the frame into its hue, saturation and value planes
    pub fn to_hsv(&self) -> HsvPlanes {
        HsvPlanes::from_image(&self.image)
    }
}

/// Size in bytes of one raw frame
pub fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// The three perceptual channels of a frame, 8 bits each.
///
/// Hue is stored as degrees / 2 (0..180), saturation and value as 0..255.
#[derive(Debug, Clone, PartialEq)]
pub struct HsvPlanes {
    pub width: u32,
    pub height: u32,
    pub hue: Vec<u8>,
    pub saturation: Vec<u8>,
    pub value: Vec<u8>,
}

impl HsvPlanes {
    /// Converts an RGB image pixel by pixel
    pub fn from_image(image: &RgbImage) -> Self {
        let pixel_count = image.width() as usize * image.height() as usize;
        let mut hue = Vec::with_capacity(pixel_count);
        let mut saturation = Vec::with_capacity(pixel_count);
        let mut value = Vec::with_capacity(pixel_count);

        for pixel in image.pixels() {
            let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            hue.push(((h * 180.0).round() as u16 % 180) as u8);
            saturation.push((s * 255.0).round() as u8);
            value.push((v * 255.0).round() as u8);
        }

        Self {
            width: image.width(),
            height: image.height(),
            hue,
            saturation,
            value,
        }
    }

    /// The planes in hue, saturation, value order
    pub fn channels(&self) -> [&[u8]; 3] {
        [&self.hue, &self.saturation, &self.value]
    }
}

/// Converts an 8-bit RGB pixel to HSV with every component in `[0, 1)`/`[0, 1]`.
///
/// Hue wraps into `[0, 1)`; gray pixels get hue 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let delta = max - min;

    let v = max;
    if delta == 0.0 {
        return (0.0, 0.0, v);
    }
    let s = delta / max;

    let h = if max == r {
        (g - b) / delta
    } else if max == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };

    ((h / 6.0).rem_euclid(1.0), s, v)
}
