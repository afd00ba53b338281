//! Scan controller: one parameterized sweep shared by the coarse and fine passes.
//!
//! A sweep walks the stage through an anchored [`ScanPlan`], takes exactly one
//! frame per slice, and only then judges the batch. Stage moves and camera
//! triggers are awaited strictly in plan order:
//!
//! ```text
//! move(first) -> settle -> [capture(i) -> move(i+1) -> settle]* -> capture(last)
//! ```
//!
//! A batch whose brightness falls outside the exposure window is thrown away: the
//! exposure is rescaled, the stage returns to where the sweep started, and the
//! caller sweeps again. [`ScanController::locate_interface`] does that looping
//! with a retry budget.

use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::FinderConfig;
use crate::diagnostics::{PassKind, PassRecord};
use crate::error::{AppResult, FinderError};
use crate::evaluator::{batch_threshold, SliceSample, SweepBatch};
use crate::exposure::{self, ExposurePolicy, ExposureState, ExposureVerdict};
use crate::frame::{ColorChannel, Frame, Intensity};
use crate::hardware::capabilities::{Camera, Movable};
use crate::locator::InterfaceEstimate;
use crate::plan::ScanPlan;

/// Per-sweep knobs that do not change between passes.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// Fraction of the batch maximum used as the per-pixel cutoff.
    pub thresh_factor: f64,
    /// Pixels dropped from each border before measuring.
    pub edge_margin_px: u32,
    /// Wait after every stage move.
    pub settle: Duration,
    /// Colour plane fetched from the camera.
    pub channel: ColorChannel,
    /// Longest wait for a triggered frame.
    pub frame_timeout: Duration,
    /// Delay between readiness polls.
    pub poll_interval: Duration,
}

impl From<&FinderConfig> for SweepSettings {
    fn from(config: &FinderConfig) -> Self {
        Self {
            thresh_factor: config.scan.thresh_factor,
            edge_margin_px: config.scan.edge_margin_px,
            settle: config.scan.settle,
            channel: config.scan.channel,
            frame_timeout: config.timeouts.frame,
            poll_interval: config.timeouts.poll_interval,
        }
    }
}

/// State carried from one sweep attempt to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// The only state that survives a sweep: exposure and its brightness window.
    pub exposure: ExposureState,
    /// Gains and limits applied to rejected batches.
    pub policy: ExposurePolicy,
    /// Sweeps run in the current pass, rejected ones included.
    pub pass_attempts: u32,
    /// Sweeps run since the controller was created.
    pub total_sweeps: u32,
}

impl RunContext {
    /// Fresh context with no sweeps run.
    pub fn new(exposure: ExposureState, policy: ExposurePolicy) -> Self {
        Self {
            exposure,
            policy,
            pass_attempts: 0,
            total_sweeps: 0,
        }
    }
}

/// An accepted sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Where the sweep placed the interface.
    pub estimate: InterfaceEstimate,
    /// Per-slice brightness maxima.
    pub maxima: Vec<Intensity>,
    /// Per-pixel cutoff used for the scores.
    pub threshold: f64,
    /// Exposure the batch was captured with.
    pub exposure: Duration,
}

/// What one call to [`ScanController::run_sweep`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Batch accepted; the stage now sits on the estimate.
    Located(SweepResult),
    /// Batch rejected; exposure was rescaled and the stage is back at the start.
    Retry {
        /// Why the batch was rejected.
        verdict: ExposureVerdict,
        /// Brightest pixel of the rejected batch.
        last_max: Intensity,
        /// Exposure the next sweep will use.
        next_exposure: Duration,
    },
}

/// Drives the stage and camera through sweeps.
///
/// Devices are borrowed; the controller owns only the [`RunContext`].
pub struct ScanController<'a> {
    stage: &'a dyn Movable,
    camera: &'a dyn Camera,
    settings: SweepSettings,
    context: RunContext,
}

impl<'a> ScanController<'a> {
    /// Controller over borrowed devices with explicit settings and context.
    pub fn new(
        stage: &'a dyn Movable,
        camera: &'a dyn Camera,
        settings: SweepSettings,
        context: RunContext,
    ) -> Self {
        Self {
            stage,
            camera,
            settings,
            context,
        }
    }

    /// Controller with settings and exposure taken from `config`.
    pub fn from_config(
        config: &FinderConfig,
        stage: &'a dyn Movable,
        camera: &'a dyn Camera,
    ) -> Self {
        let context = RunContext::new(config.exposure.initial_state(), config.exposure.policy());
        Self::new(stage, camera, SweepSettings::from(config), context)
    }

    /// Exposure state and sweep counters.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Per-sweep settings.
    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// The stage being driven.
    pub fn stage(&self) -> &'a dyn Movable {
        self.stage
    }

    /// Push the current exposure to the camera.
    pub async fn apply_exposure(&self) -> AppResult<()> {
        self.camera
            .set_exposure(self.context.exposure.exposure)
            .await
            .map_err(|e| FinderError::device("camera exposure", e))
    }

    /// Current stage position.
    pub async fn stage_position(&self) -> AppResult<f64> {
        self.stage
            .position()
            .await
            .map_err(|e| FinderError::device("stage position", e))
    }

    async fn move_and_settle(&self, target: f64) -> AppResult<()> {
        self.stage
            .move_abs(target)
            .await
            .map_err(|e| FinderError::device("stage move", e))?;
        sleep(self.settings.settle).await;
        Ok(())
    }

    /// Trigger, wait (bounded) for readout, fetch, and strip the edge margin.
    async fn acquire(&self) -> AppResult<Frame> {
        self.camera
            .trigger()
            .await
            .map_err(|e| FinderError::device("camera trigger", e))?;

        let poll = async {
            loop {
                let ready = self
                    .camera
                    .frame_ready()
                    .await
                    .map_err(|e| FinderError::device("camera frame ready", e))?;
                if ready {
                    return Ok::<(), FinderError>(());
                }
                sleep(self.settings.poll_interval).await;
            }
        };
        timeout(self.settings.frame_timeout, poll)
            .await
            .map_err(|_| FinderError::Timeout {
                operation: "camera frame ready",
                waited: self.settings.frame_timeout,
            })??;

        let frame = self
            .camera
            .fetch_frame(self.settings.channel)
            .await
            .map_err(|e| FinderError::device("camera fetch", e))?;
        frame.crop_margin(self.settings.edge_margin_px)
    }

    /// Walk the anchored plan, one frame per slice.
    async fn capture_batch(&self, plan: &ScanPlan, start: f64) -> AppResult<SweepBatch> {
        let targets = plan.anchor(start);
        let mut batch = SweepBatch::with_capacity(start, plan.len());

        if let Some(&first) = targets.first() {
            self.move_and_settle(first).await?;
        }
        for (i, (&offset, &target)) in plan.offsets().iter().zip(&targets).enumerate() {
            let frame = self.acquire().await?;
            let sample = SliceSample::new(offset, target, frame);
            debug!(
                slice = i,
                offset,
                position = target,
                max = sample.max_brightness,
                "captured slice"
            );
            batch.push(sample);

            if let Some(&next) = targets.get(i + 1) {
                self.move_and_settle(next).await?;
            }
        }

        Ok(batch)
    }

    /// One sweep over `plan` starting from wherever the stage is now.
    pub async fn run_sweep(&mut self, plan: &ScanPlan) -> AppResult<SweepOutcome> {
        let start = self.stage_position().await?;
        self.context.pass_attempts += 1;
        self.context.total_sweeps += 1;
        let exposure_used = self.context.exposure.exposure;

        let batch = self.capture_batch(plan, start).await?;
        let maxima = batch.maxima();
        let last_max = maxima.iter().copied().max().unwrap_or(0);

        let verdict = exposure::evaluate(&maxima, &self.context.exposure);
        if verdict != ExposureVerdict::Ok {
            let next_exposure = self.context.exposure.adjust(
                verdict,
                &self.context.policy,
                self.context.pass_attempts,
                last_max,
            )?;
            warn!(
                verdict = verdict.as_str(),
                batch_max = last_max,
                ?exposure_used,
                ?next_exposure,
                "exposure out of range, repeating sweep"
            );
            self.apply_exposure().await?;
            self.move_and_settle(batch.start_position).await?;
            return Ok(SweepOutcome::Retry {
                verdict,
                last_max,
                next_exposure,
            });
        }

        let threshold = batch_threshold(&maxima, self.settings.thresh_factor);
        let scores = batch.scores(threshold);
        let estimate = InterfaceEstimate::from_scores(scores, &batch.offsets(), &batch.positions())
            .ok_or_else(|| FinderError::InvalidPlan("sweep captured no slices".to_string()))?;

        self.move_and_settle(estimate.position).await?;
        info!(
            offset = estimate.offset,
            position = estimate.position,
            batch_max = last_max,
            threshold,
            "interface located"
        );

        Ok(SweepOutcome::Located(SweepResult {
            estimate,
            maxima,
            threshold,
            exposure: exposure_used,
        }))
    }

    /// Sweep until a batch is accepted or the exposure budget runs out.
    pub async fn locate_interface(&mut self, plan: &ScanPlan, pass: PassKind) -> AppResult<PassRecord> {
        self.context.pass_attempts = 0;
        info!(
            %pass,
            slices = plan.len(),
            range = plan.spec().range,
            step = plan.spec().step,
            "starting pass"
        );

        loop {
            match self.run_sweep(plan).await? {
                SweepOutcome::Located(result) => {
                    return Ok(PassRecord {
                        pass,
                        attempts: self.context.pass_attempts,
                        exposure: result.exposure,
                        maxima: result.maxima,
                        threshold: result.threshold,
                        estimate: result.estimate,
                    });
                }
                SweepOutcome::Retry { last_max, .. } => {
                    if self.context.pass_attempts >= self.context.policy.max_attempts {
                        return Err(FinderError::ExposureUnreachable {
                            attempts: self.context.pass_attempts,
                            exposure: self.context.exposure.exposure,
                            last_max,
                        });
                    }
                }
            }
        }
    }
}
