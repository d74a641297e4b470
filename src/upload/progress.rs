/*!
 * Simulated upload progress.
 *
 * The collaborator gives no byte-level feedback, so while a call is
 * outstanding the item's progress creeps toward a ceiling in random steps.
 * Only completion moves it past the ceiling.
 */

use rand::Rng;
use std::time::Duration;

/// Simulated progress stays strictly below this value
pub const PROGRESS_CEILING: f64 = 90.0;

/// Tuning for the per-item progress ticker
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSimulation {
    /// Time between two increments
    pub interval: Duration,
    /// Upper bound of one random increment
    pub max_step: f64,
}

impl Default for ProgressSimulation {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_step: 30.0,
        }
    }
}

impl ProgressSimulation {
    /// Draw a random increment and apply it to `current`
    pub fn next(&self, current: f64) -> Option<f64> {
        let step = if self.max_step.is_finite() && self.max_step > 0.0 {
            rand::rng().random_range(0.0..self.max_step)
        } else {
            0.0
        };
        advance(current, step)
    }
}

/// Apply `step` to `current` without reaching the ceiling.
///
/// A step that would land on or past the ceiling covers half the remaining
/// distance instead. Returns `None` when nothing would change.
pub fn advance(current: f64, step: f64) -> Option<f64> {
    if current >= PROGRESS_CEILING || step <= 0.0 {
        return None;
    }
    let mut next = current + step;
    if next >= PROGRESS_CEILING {
        next = current + (PROGRESS_CEILING - current) / 2.0;
    }
    // the halved gap eventually rounds onto the ceiling itself
    if next >= PROGRESS_CEILING || next <= current {
        return None;
    }
    Some(next)
}
