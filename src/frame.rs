//! Single-channel intensity frames.
//!
//! Frames arrive from the camera already cut to its region of interest and reduced
//! to one colour channel. Intensities keep the camera's native scale (0-255 for an
//! 8-bit channel); nothing here normalizes them.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, FinderError};

/// Raw pixel intensity.
pub type Intensity = u16;

/// Colour channel selected when fetching a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    /// First plane of an RGB buffer.
    Red,
    /// Second plane of an RGB buffer.
    #[default]
    Green,
    /// Third plane of an RGB buffer.
    Blue,
    /// Sensor without colour planes.
    Mono,
}

impl ColorChannel {
    /// Plane index within an interleaved RGB buffer (`Mono` reads plane 0).
    pub fn plane(self) -> usize {
        match self {
            ColorChannel::Red | ColorChannel::Mono => 0,
            ColorChannel::Green => 1,
            ColorChannel::Blue => 2,
        }
    }

    /// Lowercase name, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorChannel::Red => "red",
            ColorChannel::Green => "green",
            ColorChannel::Blue => "blue",
            ColorChannel::Mono => "mono",
        }
    }
}

/// Row-major single-channel image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Intensity>,
}

impl Frame {
    /// Wrap a row-major pixel buffer, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<Intensity>) -> AppResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| FinderError::InvalidFrame("frame pixel count overflows".into()))?;
        if pixels.len() != expected {
            return Err(FinderError::InvalidFrame(format!(
                "{}x{} frame needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform frame, mostly useful for tests and simulated scenes.
    pub fn filled(width: u32, height: u32, value: Intensity) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// Pull one plane out of an interleaved multi-channel buffer.
    pub fn from_interleaved(
        width: u32,
        height: u32,
        planes: usize,
        data: &[Intensity],
        channel: ColorChannel,
    ) -> AppResult<Self> {
        let plane = channel.plane();
        if plane >= planes {
            return Err(FinderError::InvalidFrame(format!(
                "channel '{}' not present in a {}-plane buffer",
                channel.as_str(),
                planes
            )));
        }
        let expected = width as usize * height as usize * planes;
        if data.len() != expected {
            return Err(FinderError::InvalidFrame(format!(
                "interleaved {}x{}x{} buffer needs {} values, got {}",
                width,
                height,
                planes,
                expected,
                data.len()
            )));
        }
        let pixels = data.iter().skip(plane).step_by(planes).copied().collect();
        Self::new(width, height, pixels)
    }

    /// Same dimensions, new pixel values.
    pub fn with_pixels(&self, pixels: Vec<Intensity>) -> AppResult<Frame> {
        Frame::new(self.width, self.height, pixels)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel values.
    pub fn pixels(&self) -> &[Intensity] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<Intensity> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Drop `margin` pixels from every border.
    ///
    /// The outermost rows and columns of the region of interest are unreliable and
    /// must not take part in any brightness measurement.
    pub fn crop_margin(&self, margin: u32) -> AppResult<Frame> {
        if margin == 0 {
            return Ok(self.clone());
        }
        let border = margin.checked_mul(2);
        let inner_w = border
            .and_then(|b| self.width.checked_sub(b))
            .filter(|w| *w > 0);
        let inner_h = border
            .and_then(|b| self.height.checked_sub(b))
            .filter(|h| *h > 0);
        let (Some(inner_w), Some(inner_h)) = (inner_w, inner_h) else {
            return Err(FinderError::InvalidFrame(format!(
                "edge margin {} leaves nothing of a {}x{} frame",
                margin, self.width, self.height
            )));
        };

        let stride = self.width as usize;
        let mut pixels = Vec::with_capacity(inner_w as usize * inner_h as usize);
        for row in margin..margin + inner_h {
            let start = row as usize * stride + margin as usize;
            pixels.extend_from_slice(&self.pixels[start..start + inner_w as usize]);
        }

        Ok(Frame {
            width: inner_w,
            height: inner_h,
            pixels,
        })
    }
}
