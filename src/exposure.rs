//! Brightness-driven exposure regulation.
//!
//! [`evaluate`] is a pure verdict on a batch of per-slice maxima. Acting on the
//! verdict (scaling the exposure, pushing it to the camera, restarting the sweep)
//! is the scan controller's job; [`ExposureState::adjust`] does the arithmetic.

use serde::Serialize;
use std::time::Duration;

use crate::error::{AppResult, FinderError};
use crate::frame::Intensity;

/// Outcome of judging one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExposureVerdict {
    /// Batch maximum lies within `[min_brightness, max_brightness]`.
    Ok,
    /// Batch maximum below `min_brightness`.
    TooDim,
    /// Batch maximum above `max_brightness`.
    TooBright,
}

impl ExposureVerdict {
    /// Label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureVerdict::Ok => "ok",
            ExposureVerdict::TooDim => "too dim",
            ExposureVerdict::TooBright => "too bright",
        }
    }
}

/// Current exposure plus the brightness window a batch must land in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureState {
    /// Exposure currently applied to the camera.
    pub exposure: Duration,
    /// Lowest acceptable batch maximum.
    pub min_brightness: Intensity,
    /// Highest acceptable batch maximum.
    pub max_brightness: Intensity,
}

/// Judge a batch by its global maximum.
///
/// Both bounds are inclusive: a maximum equal to either bound is accepted. An
/// empty batch has maximum 0.
pub fn evaluate(maxima: &[Intensity], state: &ExposureState) -> ExposureVerdict {
    let peak = maxima.iter().copied().max().unwrap_or(0);
    if peak < state.min_brightness {
        ExposureVerdict::TooDim
    } else if peak > state.max_brightness {
        ExposureVerdict::TooBright
    } else {
        ExposureVerdict::Ok
    }
}

/// How the exposure reacts to a rejected batch and how often it may try.
#[derive(Clone, Debug, PartialEq)]
pub struct ExposurePolicy {
    /// Multiplier applied on a too-dim batch.
    pub dim_gain: f64,
    /// Multiplier applied on a too-bright batch.
    pub bright_gain: f64,
    /// Rejected batches allowed in one pass before giving up.
    pub max_attempts: u32,
    /// Shortest exposure the camera accepts.
    pub floor: Option<Duration>,
    /// Longest exposure the camera accepts.
    pub ceiling: Option<Duration>,
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self {
            dim_gain: 1.5,
            bright_gain: 0.5,
            max_attempts: 20,
            floor: None,
            ceiling: None,
        }
    }
}

impl ExposureState {
    /// Scale the exposure for a rejected batch and return the new value.
    ///
    /// `Ok` verdicts leave the state untouched. When the exposure is already pinned
    /// at the policy limit in the requested direction, no amount of retrying can
    /// help and `ExposureUnreachable` is returned immediately.
    pub fn adjust(
        &mut self,
        verdict: ExposureVerdict,
        policy: &ExposurePolicy,
        attempts: u32,
        last_max: Intensity,
    ) -> AppResult<Duration> {
        let (gain, limit) = match verdict {
            ExposureVerdict::Ok => return Ok(self.exposure),
            ExposureVerdict::TooDim => (policy.dim_gain, policy.ceiling),
            ExposureVerdict::TooBright => (policy.bright_gain, policy.floor),
        };

        let unreachable = || FinderError::ExposureUnreachable {
            attempts,
            exposure: self.exposure,
            last_max,
        };

        let pinned = match (verdict, limit) {
            (ExposureVerdict::TooDim, Some(ceiling)) => self.exposure >= ceiling,
            (ExposureVerdict::TooBright, Some(floor)) => self.exposure <= floor,
            _ => false,
        };
        if pinned {
            return Err(unreachable());
        }

        // a product too large for Duration can still be clamped to the ceiling
        let mut next = match Duration::try_from_secs_f64(self.exposure.as_secs_f64() * gain) {
            Ok(next) => next,
            Err(_) => match (verdict, policy.ceiling) {
                (ExposureVerdict::TooDim, Some(ceiling)) => ceiling,
                _ => return Err(unreachable()),
            },
        };
        if let Some(ceiling) = policy.ceiling {
            next = next.min(ceiling);
        }
        if let Some(floor) = policy.floor {
            next = next.max(floor);
        }
        if next.is_zero() {
            return Err(unreachable());
        }

        self.exposure = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = actual.abs_diff(expected);
        assert!(diff < Duration::from_micros(1), "{actual:?} != {expected:?}");
    }

    fn state() -> ExposureState {
        ExposureState {
            exposure: Duration::from_millis(10),
            min_brightness: 80,
            max_brightness: 200,
        }
    }

    #[test]
    fn verdict_depends_only_on_batch_peak() {
        let s = state();
        assert_eq!(evaluate(&[50], &s), ExposureVerdict::TooDim);
        assert_eq!(evaluate(&[250], &s), ExposureVerdict::TooBright);
        assert_eq!(evaluate(&[150], &s), ExposureVerdict::Ok);
        assert_eq!(evaluate(&[10, 150, 20], &s), ExposureVerdict::Ok);
        assert_eq!(evaluate(&[], &s), ExposureVerdict::TooDim);
    }

    #[test]
    fn bounds_are_inclusive() {
        let s = state();
        assert_eq!(evaluate(&[80], &s), ExposureVerdict::Ok);
        assert_eq!(evaluate(&[200], &s), ExposureVerdict::Ok);
        assert_eq!(evaluate(&[79], &s), ExposureVerdict::TooDim);
        assert_eq!(evaluate(&[201], &s), ExposureVerdict::TooBright);
    }

    #[test]
    fn adjust_scales_by_policy_gain() {
        let policy = ExposurePolicy::default();
        let mut s = state();

        let next = s.adjust(ExposureVerdict::TooDim, &policy, 1, 50).unwrap();
        assert_close(next, Duration::from_millis(15));

        let next = s.adjust(ExposureVerdict::TooBright, &policy, 2, 250).unwrap();
        assert_close(next, Duration::from_micros(7500));

        let unchanged = s.adjust(ExposureVerdict::Ok, &policy, 3, 150).unwrap();
        assert_eq!(unchanged, next);
    }

    #[test]
    fn adjust_clamps_to_limits() {
        let policy = ExposurePolicy {
            ceiling: Some(Duration::from_millis(12)),
            ..ExposurePolicy::default()
        };
        let mut s = state();

        let next = s.adjust(ExposureVerdict::TooDim, &policy, 1, 50).unwrap();
        assert_eq!(next, Duration::from_millis(12));

        let err = s.adjust(ExposureVerdict::TooDim, &policy, 2, 50).unwrap_err();
        assert!(matches!(
            err,
            FinderError::ExposureUnreachable { attempts: 2, .. }
        ));
        assert_eq!(s.exposure, Duration::from_millis(12));
    }

    #[test]
    fn floor_stops_darkening() {
        let policy = ExposurePolicy {
            floor: Some(Duration::from_millis(10)),
            ..ExposurePolicy::default()
        };
        let mut s = state();
        assert!(s.adjust(ExposureVerdict::TooBright, &policy, 1, 255).is_err());
    }

    #[test]
    fn overflowing_gain_is_unreachable() {
        let policy = ExposurePolicy {
            dim_gain: 1e30,
            ..ExposurePolicy::default()
        };
        let mut s = state();

        let err = s.adjust(ExposureVerdict::TooDim, &policy, 1, 12).unwrap_err();
        assert!(matches!(
            err,
            FinderError::ExposureUnreachable { attempts: 1, last_max: 12, .. }
        ));
        assert_eq!(s.exposure, Duration::from_millis(10));

        let capped = ExposurePolicy {
            ceiling: Some(Duration::from_millis(50)),
            ..policy
        };
        let next = s.adjust(ExposureVerdict::TooDim, &capped, 2, 12).unwrap();
        assert_eq!(next, Duration::from_millis(50));
    }
}
