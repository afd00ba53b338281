//! Mock Hardware Implementations
//!
//! Provides simulated hardware devices for testing without physical hardware.
//! All mock devices use async-safe operations (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `MockStage` - Simulated z-stage with optional travel time and fault injection
//! - `MockCamera` - Simulated camera that renders a [`Scene`] at the stage's position
//!
//! The camera reads the stage position through a shared handle, so a frame shows
//! whatever lies at the z the stage occupied when the camera was triggered.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::debug;

use crate::frame::{ColorChannel, Frame, Intensity};
use crate::hardware::capabilities::{ExposureControl, FrameProducer, Movable, Triggerable};
use crate::hardware::scene::Scene;

// =============================================================================
// MockStage - Simulated Motion Stage
// =============================================================================

/// Mock z-stage
///
/// Simulates a linear piezo with:
/// - Optional travel time (`with_speed`), instant by default
/// - A log of every commanded target, in order
/// - Fault injection: fail after N moves, or refuse to report position
///
/// # Example
///
/// ```rust,ignore
/// let stage = MockStage::at(500.0);
/// stage.move_abs(510.0).await?;
/// assert_eq!(stage.position().await?, 510.0);
/// ```
pub struct MockStage {
    position: Arc<RwLock<f64>>,
    moves: RwLock<Vec<f64>>,
    speed_per_sec: Option<f64>,
    fail_after_moves: Option<usize>,
    position_unavailable: bool,
}

impl MockStage {
    /// Create new mock stage at position 0.0
    pub fn new() -> Self {
        Self::at(0.0)
    }

    /// Create mock stage parked at `position`
    pub fn at(position: f64) -> Self {
        Self {
            position: Arc::new(RwLock::new(position)),
            moves: RwLock::new(Vec::new()),
            speed_per_sec: None,
            fail_after_moves: None,
            position_unavailable: false,
        }
    }

    /// Simulate travel time at `speed_per_sec` stage units per second
    pub fn with_speed(mut self, speed_per_sec: f64) -> Self {
        self.speed_per_sec = Some(speed_per_sec);
        self
    }

    /// Accept `moves` commands, then fail every later one
    pub fn failing_after(mut self, moves: usize) -> Self {
        self.fail_after_moves = Some(moves);
        self
    }

    /// Stage that never answers position queries
    pub fn without_position_readback(mut self) -> Self {
        self.position_unavailable = true;
        self
    }

    /// Shared position handle for devices that need to know where the stage is
    pub fn position_handle(&self) -> Arc<RwLock<f64>> {
        Arc::clone(&self.position)
    }

    /// Every target commanded so far
    pub async fn moves(&self) -> Vec<f64> {
        self.moves.read().await.clone()
    }
}

impl Default for MockStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Movable for MockStage {
    async fn move_abs(&self, target: f64) -> Result<()> {
        if !target.is_finite() {
            bail!("MockStage: refusing non-finite target {}", target);
        }
        let mut moves = self.moves.write().await;
        if let Some(limit) = self.fail_after_moves {
            if moves.len() >= limit {
                bail!("MockStage: controller stopped responding after {} moves", limit);
            }
        }
        moves.push(target);
        drop(moves);

        let current = *self.position.read().await;
        if let Some(speed) = self.speed_per_sec {
            let travel = Duration::from_secs_f64((target - current).abs() / speed);
            debug!(from = current, to = target, ?travel, "MockStage: moving");
            sleep(travel).await;
        }

        *self.position.write().await = target;
        debug!(position = target, "MockStage: reached target");
        Ok(())
    }

    async fn position(&self) -> Result<f64> {
        if self.position_unavailable {
            return Err(anyhow!("MockStage: no position readback"));
        }
        Ok(*self.position.read().await)
    }
}

// =============================================================================
// MockCamera - Simulated Camera
// =============================================================================

#[derive(Debug, Default)]
struct Capture {
    /// Stage position latched at trigger time
    z: Option<f64>,
    /// `frame_ready` polls left before the frame reports ready
    polls_remaining: u32,
}

/// Mock camera rendering a [`Scene`] at the stage position
///
/// Simulates a triggered colour camera with:
/// - Exposure-dependent brightness (delegated to the scene)
/// - Readout that completes after a configurable number of `frame_ready` polls
/// - The signal in one colour plane and a dim offset in the others
/// - A stall mode where frames never become ready
///
/// # Example
///
/// ```rust,ignore
/// let stage = MockStage::at(0.0);
/// let camera = MockCamera::new(stage.position_handle(), SyntheticInterface::new(250.0));
/// camera.trigger().await?;
/// while !camera.frame_ready().await? {}
/// let frame = camera.fetch_frame(ColorChannel::Green).await?;
/// ```
pub struct MockCamera {
    stage_position: Arc<RwLock<f64>>,
    scene: Arc<dyn Scene>,
    exposure: RwLock<Duration>,
    exposure_log: RwLock<Vec<Duration>>,
    capture: RwLock<Capture>,
    frame_count: RwLock<u32>,
    signal_channel: ColorChannel,
    crosstalk: Intensity,
    readout_polls: u32,
    stalled: bool,
}

impl MockCamera {
    /// Camera looking at `scene` through a stage whose position lives in `stage_position`
    pub fn new(stage_position: Arc<RwLock<f64>>, scene: impl Scene + 'static) -> Self {
        Self {
            stage_position,
            scene: Arc::new(scene),
            exposure: RwLock::new(Duration::from_millis(10)),
            exposure_log: RwLock::new(Vec::new()),
            capture: RwLock::new(Capture::default()),
            frame_count: RwLock::new(0),
            signal_channel: ColorChannel::Green,
            crosstalk: 3,
            readout_polls: 2,
            stalled: false,
        }
    }

    /// Put the scene in `channel` (default green)
    pub fn with_signal_channel(mut self, channel: ColorChannel) -> Self {
        self.signal_channel = channel;
        self
    }

    /// Number of not-ready polls before each frame completes
    pub fn with_readout_polls(mut self, polls: u32) -> Self {
        self.readout_polls = polls;
        self
    }

    /// Camera whose frames never finish reading out
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Total number of frames triggered
    pub async fn frame_count(&self) -> u32 {
        *self.frame_count.read().await
    }

    /// Exposure currently set
    pub async fn exposure(&self) -> Duration {
        *self.exposure.read().await
    }

    /// Every exposure written through `set_exposure`, in order
    pub async fn exposure_log(&self) -> Vec<Duration> {
        self.exposure_log.read().await.clone()
    }

    fn interleave(&self, signal: &Frame, channel_count: usize) -> Vec<Intensity> {
        let plane = self.signal_channel.plane();
        let mut data = Vec::with_capacity(signal.pixels().len() * channel_count);
        for &value in signal.pixels() {
            for p in 0..channel_count {
                data.push(if p == plane { value } else { self.crosstalk });
            }
        }
        data
    }
}

#[async_trait]
impl ExposureControl for MockCamera {
    async fn set_exposure(&self, exposure: Duration) -> Result<()> {
        if exposure.is_zero() {
            bail!("MockCamera: exposure must be positive");
        }
        *self.exposure.write().await = exposure;
        self.exposure_log.write().await.push(exposure);
        debug!(?exposure, "MockCamera: exposure set");
        Ok(())
    }
}

#[async_trait]
impl Triggerable for MockCamera {
    async fn trigger(&self) -> Result<()> {
        let z = *self.stage_position.read().await;
        let mut capture = self.capture.write().await;
        capture.z = Some(z);
        capture.polls_remaining = self.readout_polls;

        let mut count = self.frame_count.write().await;
        *count += 1;
        debug!(frame = *count, z, "MockCamera: triggered");
        Ok(())
    }

    async fn frame_ready(&self) -> Result<bool> {
        let mut capture = self.capture.write().await;
        if capture.z.is_none() {
            bail!("MockCamera: frame_ready polled without a trigger");
        }
        if self.stalled {
            return Ok(false);
        }
        if capture.polls_remaining == 0 {
            return Ok(true);
        }
        capture.polls_remaining -= 1;
        Ok(false)
    }
}

#[async_trait]
impl FrameProducer for MockCamera {
    async fn fetch_frame(&self, channel: ColorChannel) -> Result<Frame> {
        let z = {
            let mut capture = self.capture.write().await;
            if self.stalled || capture.polls_remaining > 0 {
                bail!("MockCamera: no completed frame to fetch");
            }
            capture
                .z
                .take()
                .ok_or_else(|| anyhow!("MockCamera: no completed frame to fetch"))?
        };

        let exposure = *self.exposure.read().await;
        let signal = self.scene.render(z, exposure);
        let data = self.interleave(&signal, 3);
        let frame = Frame::from_interleaved(signal.width(), signal.height(), 3, &data, channel)?;
        Ok(frame)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::scene::SliceStack;

    fn stack() -> SliceStack {
        SliceStack::new(Duration::from_millis(10), Frame::filled(4, 4, 5))
            .with_slice(10.0, Frame::filled(4, 4, 120))
    }

    async fn snap(camera: &MockCamera, channel: ColorChannel) -> Frame {
        camera.trigger().await.unwrap();
        while !camera.frame_ready().await.unwrap() {}
        camera.fetch_frame(channel).await.unwrap()
    }

    #[tokio::test]
    async fn test_mock_stage_absolute_move() {
        let stage = MockStage::new();

        // Initial position should be 0
        assert_eq!(stage.position().await.unwrap(), 0.0);

        stage.move_abs(10.0).await.unwrap();
        assert_eq!(stage.position().await.unwrap(), 10.0);

        stage.move_abs(-25.0).await.unwrap();
        assert_eq!(stage.position().await.unwrap(), -25.0);
        assert_eq!(stage.moves().await, vec![10.0, -25.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_stage_travel_time() {
        let stage = MockStage::new().with_speed(100.0);
        let start = tokio::time::Instant::now();

        stage.move_abs(50.0).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(510), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_mock_stage_fault_injection() {
        let stage = MockStage::new().failing_after(1);
        tokio_test::assert_ok!(stage.move_abs(1.0).await);
        tokio_test::assert_err!(stage.move_abs(2.0).await);
        assert_eq!(stage.position().await.unwrap(), 1.0);

        let mute = MockStage::new().without_position_readback();
        assert!(mute.position().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_camera_renders_stage_position() {
        let stage = MockStage::new();
        let camera = MockCamera::new(stage.position_handle(), stack());

        assert_eq!(snap(&camera, ColorChannel::Green).await.pixels()[0], 5);

        stage.move_abs(10.0).await.unwrap();
        assert_eq!(snap(&camera, ColorChannel::Green).await.pixels()[0], 120);
        assert_eq!(camera.frame_count().await, 2);
    }

    #[tokio::test]
    async fn test_mock_camera_channel_selection() {
        let stage = MockStage::at(10.0);
        let camera = MockCamera::new(stage.position_handle(), stack())
            .with_signal_channel(ColorChannel::Red);

        assert_eq!(snap(&camera, ColorChannel::Red).await.pixels()[0], 120);
        assert_eq!(snap(&camera, ColorChannel::Blue).await.pixels()[0], 3);
    }

    #[tokio::test]
    async fn test_mock_camera_exposure_scales_frame() {
        let stage = MockStage::at(10.0);
        let camera = MockCamera::new(stage.position_handle(), stack());

        camera.set_exposure(Duration::from_millis(5)).await.unwrap();
        assert_eq!(snap(&camera, ColorChannel::Green).await.pixels()[0], 60);
        assert_eq!(camera.exposure_log().await, vec![Duration::from_millis(5)]);
        assert!(camera.set_exposure(Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_camera_readout_lifecycle() {
        let stage = MockStage::new();
        let camera = MockCamera::new(stage.position_handle(), stack()).with_readout_polls(3);

        // Polling before any trigger is a protocol error
        assert!(camera.frame_ready().await.is_err());

        camera.trigger().await.unwrap();
        assert!(camera.fetch_frame(ColorChannel::Green).await.is_err());
        let mut polls = 0;
        while !camera.frame_ready().await.unwrap() {
            polls += 1;
        }
        assert_eq!(polls, 3);
        assert!(camera.fetch_frame(ColorChannel::Green).await.is_ok());

        // Frame is consumed by the fetch
        assert!(camera.fetch_frame(ColorChannel::Green).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_camera_stall() {
        let stage = MockStage::new();
        let camera = MockCamera::new(stage.position_handle(), stack()).stalled();

        camera.trigger().await.unwrap();
        for _ in 0..100 {
            assert!(!camera.frame_ready().await.unwrap());
        }
    }
}
