//! Per-pass diagnostics.
//!
//! Sinks are purely observational: nothing in the scan reads back what it
//! recorded. The in-memory collector keeps every record across repeated passes so
//! a session can be inspected (or serialized with `serde_json`) afterwards.

use serde::Serialize;
use std::time::Duration;

use crate::frame::Intensity;
use crate::locator::InterfaceEstimate;

/// Which sweep of the find routine produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Wide pass around the start position.
    Coarse,
    /// Narrow pass around the coarse estimate.
    Fine,
}

impl PassKind {
    /// Lowercase name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Coarse => "coarse",
            PassKind::Fine => "fine",
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one accepted sweep produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassRecord {
    /// Pass that produced the record.
    pub pass: PassKind,
    /// Sweeps run for this pass, including rejected ones.
    pub attempts: u32,
    /// Exposure the accepted batch was captured with.
    #[serde(with = "humantime_serde")]
    pub exposure: Duration,
    /// Per-slice brightness maxima.
    pub maxima: Vec<Intensity>,
    /// Per-pixel cutoff the scores were computed with.
    pub threshold: f64,
    /// Where the pass placed the interface.
    pub estimate: InterfaceEstimate,
}

/// Receives one record per completed pass.
pub trait DiagnosticsSink: Send {
    /// Called once after each accepted pass.
    fn record(&mut self, record: &PassRecord);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl DiagnosticsSink for NullDiagnostics {
    fn record(&mut self, _record: &PassRecord) {}
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MemoryDiagnostics {
    records: Vec<PassRecord>,
}

impl MemoryDiagnostics {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record so far, oldest first.
    pub fn records(&self) -> &[PassRecord] {
        &self.records
    }

    /// Records of one pass kind, oldest first.
    pub fn of_kind(&self, pass: PassKind) -> impl Iterator<Item = &PassRecord> {
        self.records.iter().filter(move |r| r.pass == pass)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first pass completes.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&mut self, record: &PassRecord) {
        self.records.push(record.clone());
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn record(&mut self, record: &PassRecord) {
        (**self).record(record);
    }
}
