//! Device capabilities and their simulated implementations.

pub mod capabilities;
pub mod mock;
pub mod scene;

pub use capabilities::{Camera, ExposureControl, FrameProducer, Movable, Triggerable};
pub use mock::{MockCamera, MockStage};
pub use scene::{Scene, SliceStack, SyntheticInterface};
