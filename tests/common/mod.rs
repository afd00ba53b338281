//! Common test utilities for interface finder integration tests
//!
//! This module provides reusable test helpers for:
//! - Configurations that run quickly against the mock devices
//! - Scenes with a known interface position
//! - Position assertions with a tolerance

#![allow(dead_code)] // Not every test file uses every helper

use std::time::Duration;

use interface_finder::config::FinderConfig;
use interface_finder::frame::{Frame, Intensity};
use interface_finder::hardware::SliceStack;
use interface_finder::plan::PassSpec;

/// Background level of the stacks built here.
pub const BACKGROUND: Intensity = 2;

/// Default configuration with a 1 px edge margin, for the 6x6 frames of [`slice_stack`].
pub fn small_frame_config() -> FinderConfig {
    let mut config = FinderConfig::default();
    config.scan.edge_margin_px = 1;
    config
}

/// Default configuration with shorter passes.
pub fn quick_config(coarse: PassSpec, fine: PassSpec) -> FinderConfig {
    let mut config = FinderConfig::default();
    config.scan.coarse = coarse;
    config.scan.fine = fine;
    config.scan.settle = Duration::from_millis(10);
    config
}

/// Dark 6x6 frames everywhere except one uniformly bright slice at `z`.
///
/// Levels are recorded at 10 ms and scale with exposure.
pub fn slice_stack(z: f64, level: Intensity) -> SliceStack {
    SliceStack::new(Duration::from_millis(10), Frame::filled(6, 6, BACKGROUND))
        .with_slice(z, Frame::filled(6, 6, level))
}

/// Assert that a stage position is within `tolerance` of `expected`.
///
/// # Panics
/// Panics if `actual` is further than `tolerance` from `expected`.
pub fn assert_position_near(actual: f64, expected: f64, tolerance: f64, context: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{}: expected {:.3} ±{:.3}, got {:.3}",
        context,
        expected,
        tolerance,
        actual
    );
}
