//! Core library for the interface finder.
//!
//! Locates the glass/photoresist interface of a laser-writing sample by sweeping
//! a z stage through a camera's focus. A wide coarse pass is followed, at the
//! operator's request, by a narrow fine pass centred on the coarse estimate.
//!
//! The library is organised bottom-up:
//!
//! - [`frame`], [`evaluator`] and [`locator`] are pure per-frame and per-batch math.
//! - [`plan`] turns a range and step into slice offsets.
//! - [`exposure`] judges a batch and rescales the exposure.
//! - [`hardware`] holds the device capability traits and the simulated devices.
//! - [`scan`] runs one sweep; [`finder`] strings sweeps into the find routine.
//! - [`decision`] and [`diagnostics`] are the routine's two outward seams.
//! - [`config`] and [`error`] are shared by everything above.

pub mod config;
pub mod decision;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod exposure;
pub mod finder;
pub mod frame;
pub mod hardware;
pub mod locator;
pub mod plan;
pub mod scan;

pub use config::FinderConfig;
pub use decision::{ConsoleDecisions, Decision, DecisionSource, ScriptedDecisions};
pub use diagnostics::{DiagnosticsSink, MemoryDiagnostics, NullDiagnostics, PassKind, PassRecord};
pub use error::{AppResult, FinderError};
pub use finder::{FindPhase, FindReport, InterfaceFinder};
pub use frame::{ColorChannel, Frame, Intensity};
pub use locator::InterfaceEstimate;
pub use plan::{PassSpec, ScanPlan};
pub use scan::{ScanController, SweepOutcome};
