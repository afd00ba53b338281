//! Scan plans: the ordered z-offsets a sweep visits.
//!
//! A plan is built from a symmetric `range` and a `step`, both in stage units.
//! Offsets are relative to wherever the stage sits when the sweep begins; the
//! sweep anchors them to absolute targets with [`ScanPlan::anchor`].

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, FinderError};

/// Relative tolerance when checking that `range` is a whole number of steps.
const STEP_TOLERANCE: f64 = 1e-9;

/// Most slices one pass may visit.
pub const MAX_SLICES: usize = 100_000;

/// Range and step of one pass (coarse or fine).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassSpec {
    /// Full sweep width, centred on the start position.
    pub range: f64,
    /// Distance between neighbouring slices.
    pub step: f64,
}

impl PassSpec {
    /// Construct a pass spec.
    pub fn new(range: f64, step: f64) -> Self {
        Self { range, step }
    }

    /// Number of slices `range / step + 1`, or an error if the pair is unusable.
    pub fn slice_count(&self) -> AppResult<usize> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(FinderError::InvalidPlan(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if !self.range.is_finite() || self.range < 0.0 {
            return Err(FinderError::InvalidPlan(format!(
                "range must be non-negative, got {}",
                self.range
            )));
        }

        let steps = self.range / self.step;
        if !steps.is_finite() || steps >= MAX_SLICES as f64 {
            return Err(FinderError::InvalidPlan(format!(
                "range {} with step {} exceeds {} slices",
                self.range, self.step, MAX_SLICES
            )));
        }
        let whole = steps.round();
        if (steps - whole).abs() > STEP_TOLERANCE * whole.max(1.0) {
            return Err(FinderError::InvalidPlan(format!(
                "range {} is not a whole multiple of step {}",
                self.range, self.step
            )));
        }

        (whole as usize)
            .checked_add(1)
            .filter(|count| *count <= MAX_SLICES)
            .ok_or_else(|| {
                FinderError::InvalidPlan(format!("more than {} slices", MAX_SLICES))
            })
    }
}

/// Ordered, symmetric list of z-offsets for one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    spec: PassSpec,
    offsets: Vec<f64>,
}

impl ScanPlan {
    /// Build the plan `-range/2, -range/2 + step, ..., +range/2`.
    ///
    /// Offsets are computed from the slice index rather than accumulated, so the
    /// last offset lands on `+range/2` without drift.
    pub fn new(spec: PassSpec) -> AppResult<Self> {
        let count = spec.slice_count()?;
        let half = spec.range / 2.0;
        let offsets = (0..count)
            .map(|i| {
                if i + 1 == count {
                    half
                } else {
                    -half + i as f64 * spec.step
                }
            })
            .collect();

        Ok(Self { spec, offsets })
    }

    /// The range/step pair this plan was built from.
    pub fn spec(&self) -> PassSpec {
        self.spec
    }

    /// Relative offsets in visiting order.
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Plans always hold at least one slice; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Absolute stage targets for a sweep starting at `start`.
    pub fn anchor(&self, start: f64) -> Vec<f64> {
        self.offsets.iter().map(|offset| start + offset).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_plan_matches_reference_scan() {
        let plan = ScanPlan::new(PassSpec::new(2000.0, 50.0)).unwrap();

        assert_eq!(plan.len(), 41);
        assert_eq!(plan.offsets()[0], -1000.0);
        assert_eq!(plan.offsets()[40], 1000.0);
        assert_eq!(plan.offsets()[25], 250.0);
    }

    #[test]
    fn offsets_are_symmetric_and_uniform() {
        for (range, step) in [(2000.0, 50.0), (200.0, 10.0), (3.0, 0.5), (0.9, 0.1)] {
            let plan = ScanPlan::new(PassSpec::new(range, step)).unwrap();
            let offsets = plan.offsets();

            assert_eq!(plan.len(), (range / step).round() as usize + 1);
            assert!((offsets[0] + range / 2.0).abs() < 1e-9);
            assert_eq!(*offsets.last().unwrap(), range / 2.0);
            for pair in offsets.windows(2) {
                assert!(pair[1] > pair[0]);
                assert!((pair[1] - pair[0] - step).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn zero_range_is_a_single_slice() {
        let plan = ScanPlan::new(PassSpec::new(0.0, 10.0)).unwrap();
        assert_eq!(plan.offsets(), &[0.0]);
    }

    #[test]
    fn anchor_adds_start_position() {
        let plan = ScanPlan::new(PassSpec::new(20.0, 10.0)).unwrap();
        assert_eq!(plan.anchor(100.0), vec![90.0, 100.0, 110.0]);
    }

    #[test]
    fn rejects_unusable_specs() {
        assert!(ScanPlan::new(PassSpec::new(100.0, 0.0)).is_err());
        assert!(ScanPlan::new(PassSpec::new(100.0, -5.0)).is_err());
        assert!(ScanPlan::new(PassSpec::new(-100.0, 5.0)).is_err());
        assert!(ScanPlan::new(PassSpec::new(100.0, 30.0)).is_err());
        assert!(ScanPlan::new(PassSpec::new(f64::NAN, 1.0)).is_err());
        // quotient overflows to infinity
        assert!(PassSpec::new(1e200, 1e-200).slice_count().is_err());
        assert!(ScanPlan::new(PassSpec::new(1e12, 1.0)).is_err());
        assert!(ScanPlan::new(PassSpec::new((MAX_SLICES - 1) as f64, 1.0)).is_ok());
        assert!(ScanPlan::new(PassSpec::new(MAX_SLICES as f64, 1.0)).is_err());
    }
}
