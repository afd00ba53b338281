//! Capability traits for the two devices a scan talks to.
//!
//! Each trait is one narrow concern. Drivers implement what their hardware offers;
//! the scan controller only asks for [`Movable`] and [`Camera`]. Errors at this
//! boundary are plain `anyhow::Error`; the controller tags them with the operation
//! that failed.
//!
//! All methods take `&self`. Devices keep their own interior state, so one handle
//! can be shared between the controller and whoever set the device up.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::frame::{ColorChannel, Frame};

/// Single-axis positioner (the z piezo).
///
/// Positions are signed distances in the stage's native linear unit. No unit
/// conversion happens above this trait.
#[async_trait]
pub trait Movable: Send + Sync {
    /// Command an absolute move. Returns once the command is accepted; settling is
    /// the caller's business.
    async fn move_abs(&self, target: f64) -> Result<()>;

    /// Current absolute position.
    async fn position(&self) -> Result<f64>;
}

/// Camera exposure time control.
#[async_trait]
pub trait ExposureControl: Send + Sync {
    /// Exposure used by every following capture.
    async fn set_exposure(&self, exposure: Duration) -> Result<()>;
}

/// Software-triggered single frame acquisition.
#[async_trait]
pub trait Triggerable: Send + Sync {
    /// Start one exposure.
    async fn trigger(&self) -> Result<()>;

    /// Poll whether the triggered frame has been read out.
    async fn frame_ready(&self) -> Result<bool>;
}

/// Readout of the most recently completed frame.
#[async_trait]
pub trait FrameProducer: Send + Sync {
    /// Fetch the completed frame, cropped to the region of interest and reduced to
    /// `channel`.
    async fn fetch_frame(&self, channel: ColorChannel) -> Result<Frame>;
}

/// Everything a sweep needs from a camera.
pub trait Camera: ExposureControl + Triggerable + FrameProducer {}

impl<T: ExposureControl + Triggerable + FrameProducer> Camera for T {}
