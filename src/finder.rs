//! The find routine: coarse pass, operator review, optional fine pass.
//!
//! ```text
//!  CoarseScanning ──► CoarseAwaitingDecision ──Repeat──► CoarseScanning
//!                              │ Advance
//!                              ▼
//!  FineScanning ◄─Repeat─ FineAwaitingDecision
//!       └──────────────────────►┘
//!  Exit from either awaiting state ──► Done
//! ```
//!
//! Exposure retries happen inside a scanning state and never reach the decision
//! source. A repeated pass starts from wherever the previous pass left the stage,
//! i.e. centred on its estimate.

use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::FinderConfig;
use crate::decision::{Decision, DecisionSource};
use crate::diagnostics::{DiagnosticsSink, PassKind};
use crate::error::{AppResult, FinderError};
use crate::hardware::capabilities::{Camera, Movable};
use crate::locator::InterfaceEstimate;
use crate::plan::ScanPlan;
use crate::scan::ScanController;

/// Where the find routine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindPhase {
    /// Coarse sweep running, exposure retries included.
    CoarseScanning,
    /// Coarse estimate waiting for review.
    CoarseAwaitingDecision,
    /// Fine sweep running around the current position.
    FineScanning,
    /// Fine estimate waiting for review.
    FineAwaitingDecision,
    /// Routine finished.
    Done,
}

impl FindPhase {
    /// Label used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            FindPhase::CoarseScanning => "coarse scanning",
            FindPhase::CoarseAwaitingDecision => "awaiting coarse decision",
            FindPhase::FineScanning => "fine scanning",
            FindPhase::FineAwaitingDecision => "awaiting fine decision",
            FindPhase::Done => "done",
        }
    }

    /// Pass run in this phase, if it is a scanning or awaiting phase.
    pub fn pass(&self) -> Option<PassKind> {
        match self {
            FindPhase::CoarseScanning | FindPhase::CoarseAwaitingDecision => Some(PassKind::Coarse),
            FindPhase::FineScanning | FindPhase::FineAwaitingDecision => Some(PassKind::Fine),
            FindPhase::Done => None,
        }
    }

    /// Phase after a scanning phase produced an estimate.
    pub fn scanned(self) -> FindPhase {
        match self {
            FindPhase::CoarseScanning => FindPhase::CoarseAwaitingDecision,
            FindPhase::FineScanning => FindPhase::FineAwaitingDecision,
            other => other,
        }
    }

    /// Phase after the decision source answered.
    pub fn decide(self, decision: Decision) -> AppResult<FindPhase> {
        match (self, decision) {
            (FindPhase::CoarseAwaitingDecision, Decision::Repeat) => Ok(FindPhase::CoarseScanning),
            (FindPhase::CoarseAwaitingDecision, Decision::Advance) => Ok(FindPhase::FineScanning),
            (FindPhase::FineAwaitingDecision, Decision::Repeat) => Ok(FindPhase::FineScanning),
            (FindPhase::CoarseAwaitingDecision | FindPhase::FineAwaitingDecision, Decision::Exit) => {
                Ok(FindPhase::Done)
            }
            (phase, decision) => Err(FinderError::InvalidDecision {
                decision: decision.as_str(),
                phase: phase.as_str(),
            }),
        }
    }
}

/// Outcome of a whole find routine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindReport {
    /// Latest accepted coarse estimate.
    pub coarse: Option<InterfaceEstimate>,
    /// Latest accepted fine estimate.
    pub fine: Option<InterfaceEstimate>,
    /// Accepted coarse passes.
    pub coarse_passes: u32,
    /// Accepted fine passes.
    pub fine_passes: u32,
    /// Sweeps run in total, including exposure retries.
    pub sweeps: u32,
    /// Exposure in effect when the routine finished.
    #[serde(with = "humantime_serde")]
    pub final_exposure: Duration,
    /// Stage position when the routine finished.
    pub final_position: f64,
}

impl FindReport {
    /// The most refined estimate available.
    pub fn best(&self) -> Option<&InterfaceEstimate> {
        self.fine.as_ref().or(self.coarse.as_ref())
    }
}

/// Coarse-to-fine interface search over a stage and camera.
pub struct InterfaceFinder<'a> {
    controller: ScanController<'a>,
    coarse: ScanPlan,
    fine: ScanPlan,
}

impl<'a> InterfaceFinder<'a> {
    /// Build both plans from `config` and wire the devices.
    pub fn new(config: &FinderConfig, stage: &'a dyn Movable, camera: &'a dyn Camera) -> AppResult<Self> {
        Ok(Self {
            controller: ScanController::from_config(config, stage, camera),
            coarse: ScanPlan::new(config.scan.coarse)?,
            fine: ScanPlan::new(config.scan.fine)?,
        })
    }

    /// The sweep controller, for inspecting the run context.
    pub fn controller(&self) -> &ScanController<'a> {
        &self.controller
    }

    fn plan(&self, pass: PassKind) -> &ScanPlan {
        match pass {
            PassKind::Coarse => &self.coarse,
            PassKind::Fine => &self.fine,
        }
    }

    /// Run passes until the decision source says `Exit`.
    ///
    /// Device failures, frame timeouts and an unreachable exposure end the routine
    /// with an error; the stage is left wherever the failure happened.
    pub async fn run(
        &mut self,
        decisions: &mut dyn DecisionSource,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> AppResult<FindReport> {
        self.controller.apply_exposure().await?;

        let mut report = FindReport {
            coarse: None,
            fine: None,
            coarse_passes: 0,
            fine_passes: 0,
            sweeps: 0,
            final_exposure: self.controller.context().exposure.exposure,
            final_position: 0.0,
        };
        let mut phase = FindPhase::CoarseScanning;
        let mut latest: Option<InterfaceEstimate> = None;

        while phase != FindPhase::Done {
            match phase {
                FindPhase::CoarseScanning | FindPhase::FineScanning => {
                    let pass = phase.pass().unwrap_or(PassKind::Coarse);
                    let plan = self.plan(pass).clone();
                    let record = self.controller.locate_interface(&plan, pass).await?;
                    diagnostics.record(&record);

                    match pass {
                        PassKind::Coarse => {
                            report.coarse_passes += 1;
                            report.coarse = Some(record.estimate.clone());
                        }
                        PassKind::Fine => {
                            report.fine_passes += 1;
                            report.fine = Some(record.estimate.clone());
                        }
                    }
                    latest = Some(record.estimate);
                    phase = phase.scanned();
                }
                FindPhase::CoarseAwaitingDecision | FindPhase::FineAwaitingDecision => {
                    let pass = phase.pass().unwrap_or(PassKind::Coarse);
                    let estimate = latest.as_ref().ok_or_else(|| {
                        FinderError::DecisionSource("no estimate to review".to_string())
                    })?;
                    let decision = decisions.decide(pass, estimate).await?;
                    let next = phase.decide(decision)?;
                    info!(
                        from = phase.as_str(),
                        to = next.as_str(),
                        decision = decision.as_str(),
                        "phase transition"
                    );
                    phase = next;
                }
                FindPhase::Done => {}
            }
        }

        report.sweeps = self.controller.context().total_sweeps;
        report.final_exposure = self.controller.context().exposure.exposure;
        report.final_position = self.controller.stage_position().await?;
        Ok(report)
    }
}
