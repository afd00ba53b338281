//! Per-slice brightness reductions and the batch they are collected into.

use crate::frame::{Frame, Intensity};

/// Brightest pixel of a frame (0 for an empty frame).
pub fn max_brightness(frame: &Frame) -> Intensity {
    frame.pixels().iter().copied().max().unwrap_or(0)
}

/// Sum of every pixel value strictly greater than `threshold`.
pub fn above_threshold_sum(frame: &Frame, threshold: f64) -> u64 {
    frame
        .pixels()
        .iter()
        .filter(|&&value| f64::from(value) > threshold)
        .map(|&value| u64::from(value))
        .sum()
}

/// Batch-wide cutoff: `max(maxima) * thresh_factor`.
pub fn batch_threshold(maxima: &[Intensity], thresh_factor: f64) -> f64 {
    let peak = maxima.iter().copied().max().unwrap_or(0);
    f64::from(peak) * thresh_factor
}

/// One captured slice of a sweep.
#[derive(Debug, Clone)]
pub struct SliceSample {
    /// Offset relative to the sweep's start position.
    pub offset: f64,
    /// Absolute stage position the frame was taken at.
    pub position: f64,
    /// Edge-cropped single-channel frame.
    pub frame: Frame,
    /// Cached [`max_brightness`] of `frame`.
    pub max_brightness: Intensity,
}

impl SliceSample {
    /// Sample for `frame`, measuring its maximum once.
    pub fn new(offset: f64, position: f64, frame: Frame) -> Self {
        let max_brightness = max_brightness(&frame);
        Self {
            offset,
            position,
            frame,
            max_brightness,
        }
    }
}

/// All slices of one sweep, in plan order, plus where the sweep started.
#[derive(Debug, Clone)]
pub struct SweepBatch {
    /// Absolute stage position before the first move of the sweep.
    pub start_position: f64,
    samples: Vec<SliceSample>,
}

impl SweepBatch {
    /// Empty batch for a sweep that started at `start_position`.
    pub fn with_capacity(start_position: f64, capacity: usize) -> Self {
        Self {
            start_position,
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append the next slice in plan order.
    pub fn push(&mut self, sample: SliceSample) {
        self.samples.push(sample);
    }

    /// Samples in plan order.
    pub fn samples(&self) -> &[SliceSample] {
        &self.samples
    }

    /// Number of captured slices.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first capture.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-slice maxima in plan order.
    pub fn maxima(&self) -> Vec<Intensity> {
        self.samples.iter().map(|s| s.max_brightness).collect()
    }

    /// Relative offsets in plan order.
    pub fn offsets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.offset).collect()
    }

    /// Absolute positions in plan order.
    pub fn positions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.position).collect()
    }

    /// Above-threshold sums for every slice against one shared threshold.
    pub fn scores(&self, threshold: f64) -> Vec<u64> {
        self.samples
            .iter()
            .map(|s| above_threshold_sum(&s.frame, threshold))
            .collect()
    }
}
