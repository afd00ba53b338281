//! Interface locator: turn per-slice scores into one z-position.

use serde::Serialize;

/// Index of the highest score; ties go to the first (most negative offset).
///
/// Returns `None` for an empty slice. A flat score vector silently yields 0.
pub fn locate<T: PartialOrd>(scores: &[T]) -> Option<usize> {
    let mut best: Option<(usize, &T)> = None;
    for (index, score) in scores.iter().enumerate() {
        // NaN-like scores never win
        if score.partial_cmp(score).is_none() {
            continue;
        }
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Where a sweep placed the interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceEstimate {
    /// Index into the plan that produced this estimate.
    pub index: usize,
    /// Offset relative to the sweep's start position (user-facing).
    pub offset: f64,
    /// Absolute stage position (hardware-facing).
    pub position: f64,
    /// Above-threshold sums the index was picked from.
    pub scores: Vec<u64>,
}

impl InterfaceEstimate {
    /// Pick the winning slice and read its coordinates from the two parallel arrays.
    ///
    /// `offsets` and `positions` must be indexed identically to `scores`.
    pub fn from_scores(scores: Vec<u64>, offsets: &[f64], positions: &[f64]) -> Option<Self> {
        let index = locate(&scores)?;
        Some(Self {
            index,
            offset: *offsets.get(index)?,
            position: *positions.get(index)?,
            scores,
        })
    }
}
