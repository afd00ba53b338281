//! Synthetic scenes rendered by [`MockCamera`](super::mock::MockCamera).
//!
//! A scene answers one question: what does the sensor see with the stage at `z`
//! and the shutter open for `exposure`? Intensities saturate at the 8-bit ceiling
//! like a real Mono8 readout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::frame::{Frame, Intensity};

/// Saturation level of the simulated 8-bit sensor.
pub const SENSOR_FULL_SCALE: Intensity = 255;

/// Renders the signal plane for a stage position and exposure.
pub trait Scene: Send + Sync {
    /// Signal plane seen with the stage at `z` and the shutter open for `exposure`.
    fn render(&self, z: f64, exposure: Duration) -> Frame;
}

impl<F> Scene for F
where
    F: Fn(f64, Duration) -> Frame + Send + Sync,
{
    fn render(&self, z: f64, exposure: Duration) -> Frame {
        self(z, exposure)
    }
}

fn saturate(value: f64) -> Intensity {
    value.round().clamp(0.0, f64::from(SENSOR_FULL_SCALE)) as Intensity
}

// =============================================================================
// SyntheticInterface - focus-dependent line pattern
// =============================================================================

/// Glass/resist boundary that shows a sharp line grating only when in focus.
///
/// Brightness is linear in exposure. The grating contrast falls off as a Gaussian
/// in `z - interface_z` with width `depth_of_field`. Noise is seeded from `z` and
/// the exposure, so capturing the same position twice gives the same frame.
#[derive(Debug, Clone)]
pub struct SyntheticInterface {
    /// Stage position at which the interface is in focus.
    pub interface_z: f64,
    /// Gaussian width of the focus response, in stage units.
    pub depth_of_field: f64,
    /// Frame size (before the camera's edge margin is removed).
    pub width: u32,
    /// Frame height (before the edge margin is removed).
    pub height: u32,
    /// Grating line brightness at focus, counts per millisecond of exposure.
    pub signal_per_ms: f64,
    /// Uniform background, counts per millisecond of exposure.
    pub background_per_ms: f64,
    /// Peak-to-peak uniform noise in counts.
    pub noise: f64,
    /// Grating period in pixels.
    pub period: u32,
    /// Base seed for the per-frame noise generator.
    pub seed: u64,
}

impl SyntheticInterface {
    /// Interface at `interface_z` with defaults that land near mid-scale at 10 ms.
    pub fn new(interface_z: f64) -> Self {
        Self {
            interface_z,
            depth_of_field: 60.0,
            width: 64,
            height: 48,
            signal_per_ms: 15.0,
            background_per_ms: 2.0,
            noise: 4.0,
            period: 4,
            seed: 0x5eed,
        }
    }

    /// Set the Gaussian width of the focus response.
    pub fn with_depth_of_field(mut self, depth_of_field: f64) -> Self {
        self.depth_of_field = depth_of_field;
        self
    }

    /// Set the in-focus line brightness per millisecond.
    pub fn with_signal(mut self, signal_per_ms: f64) -> Self {
        self.signal_per_ms = signal_per_ms;
        self
    }

    /// Set the peak-to-peak noise amplitude.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    fn focus(&self, z: f64) -> f64 {
        let dz = (z - self.interface_z) / self.depth_of_field.max(f64::EPSILON);
        (-0.5 * dz * dz).exp()
    }
}

impl Scene for SyntheticInterface {
    fn render(&self, z: f64, exposure: Duration) -> Frame {
        let ms = exposure.as_secs_f64() * 1e3;
        let focus = self.focus(z);
        let line = self.signal_per_ms * ms * focus;
        // defocused light smears into the gaps between lines
        let haze = 0.1 * self.signal_per_ms * ms * (1.0 - focus);
        let background = self.background_per_ms * ms + haze;

        let mut rng = StdRng::seed_from_u64(self.seed ^ z.to_bits() ^ exposure.as_nanos() as u64);
        let period = self.period.max(2);
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for _y in 0..self.height {
            for x in 0..self.width {
                let on_line = x % period == 0;
                let mut value = background + if on_line { line } else { 0.0 };
                if self.noise > 0.0 {
                    value += rng.gen_range(0.0..self.noise);
                }
                pixels.push(saturate(value));
            }
        }

        Frame::new(self.width, self.height, pixels)
            .unwrap_or_else(|_| Frame::filled(self.width, self.height, 0))
    }
}

// =============================================================================
// SliceStack - explicit frames at given positions
// =============================================================================

/// Pre-recorded frames keyed by stage position.
///
/// Frames are scaled linearly by `exposure / reference_exposure` and saturate at
/// full scale. Positions without a recorded frame render `background`.
#[derive(Debug, Clone)]
pub struct SliceStack {
    reference_exposure: Duration,
    tolerance: f64,
    slices: Vec<(f64, Frame)>,
    background: Frame,
}

impl SliceStack {
    /// Stack rendering `background` everywhere, recorded at `reference_exposure`.
    pub fn new(reference_exposure: Duration, background: Frame) -> Self {
        Self {
            reference_exposure,
            tolerance: 1e-6,
            slices: Vec::new(),
            background,
        }
    }

    /// Record the frame seen at stage position `z`.
    pub fn with_slice(mut self, z: f64, frame: Frame) -> Self {
        self.slices.push((z, frame));
        self
    }

    fn lookup(&self, z: f64) -> &Frame {
        self.slices
            .iter()
            .find(|(at, _)| (at - z).abs() <= self.tolerance)
            .map(|(_, frame)| frame)
            .unwrap_or(&self.background)
    }
}

impl Scene for SliceStack {
    fn render(&self, z: f64, exposure: Duration) -> Frame {
        let frame = self.lookup(z);
        if exposure == self.reference_exposure || self.reference_exposure.is_zero() {
            return frame.clone();
        }
        let gain = exposure.as_secs_f64() / self.reference_exposure.as_secs_f64();
        let pixels = frame
            .pixels()
            .iter()
            .map(|&v| saturate(f64::from(v) * gain))
            .collect();
        frame.with_pixels(pixels).unwrap_or_else(|_| frame.clone())
    }
}
