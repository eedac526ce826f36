//! SM-2 transition function.
//!
//! Computes the new memory state for a card given the learner's
//! quality-of-recall rating. The scheduler is stateless apart from its
//! immutable parameters and can be shared freely between callers.

use crate::state::{CardStatus, Rating, Sm2State};
use chrono::{DateTime, Duration, Utc};

/// Tunable parameters of the SM-2 variant.
///
/// Defaults match the classic SuperMemo 2 constants with the fixed
/// early-repetition intervals this engine uses. The `hard_multiplier`
/// (1.2) sits below the easiness-factor floor (1.3), so for any valid
/// state the interval growth ordering Easy > Good > Hard holds.
#[derive(Debug, Clone)]
pub struct Sm2Params {
    /// Lower bound of the easiness factor.
    pub min_easiness: f32,
    /// Upper bound of the easiness factor.
    pub max_easiness: f32,
    /// Subtracted from the easiness factor on Again.
    pub again_penalty: f32,
    /// Subtracted from the easiness factor on Hard.
    pub hard_penalty: f32,
    /// Added to the easiness factor on Easy.
    pub easy_bonus: f32,
    /// Fixed intervals in days for the first and second Hard repetition.
    pub hard_steps: [u32; 2],
    /// Fixed intervals in days for the first and second Good repetition.
    pub good_steps: [u32; 2],
    /// Fixed intervals in days for the first and second Easy repetition.
    pub easy_steps: [u32; 2],
    /// Interval multiplier for Hard past the second repetition.
    pub hard_multiplier: f32,
    /// Extra interval multiplier for Easy past the second repetition
    /// (applied on top of the easiness factor).
    pub easy_multiplier: f32,
}

impl Default for Sm2Params {
    fn default() -> Self {
        Self {
            min_easiness: 1.3,
            max_easiness: 3.0,
            again_penalty: 0.2,
            hard_penalty: 0.15,
            easy_bonus: 0.15,
            hard_steps: [1, 1],
            good_steps: [1, 6],
            easy_steps: [4, 10],
            hard_multiplier: 1.2,
            easy_multiplier: 1.3,
        }
    }
}

/// SM-2 scheduler.
///
/// Pure transition function over [`Sm2State`]: no I/O, no internal
/// clock, identical inputs always yield identical outputs.
pub struct Sm2Scheduler {
    params: Sm2Params,
}

impl Sm2Scheduler {
    /// Create a scheduler with the default SM-2 parameters.
    pub fn new() -> Self {
        Self {
            params: Sm2Params::default(),
        }
    }

    /// Create a scheduler with custom parameters.
    pub fn with_params(params: Sm2Params) -> Self {
        Self { params }
    }

    /// Get the scheduler parameters.
    pub fn params(&self) -> &Sm2Params {
        &self.params
    }

    /// Process a review and compute the next memory state.
    ///
    /// `now` is the reference timestamp supplied by the caller;
    /// `next_review` is set to `now` plus the new interval in days.
    ///
    /// All interval multiplications round with ceiling so the interval
    /// never shrinks on consecutive successful reviews.
    pub fn review(&self, state: &Sm2State, rating: Rating, now: DateTime<Utc>) -> Sm2State {
        let p = &self.params;
        let prev_reps = state.repetitions;

        let (easiness_factor, interval, repetitions, lapses, status) = match rating {
            Rating::Again => (
                (state.easiness_factor - p.again_penalty).max(p.min_easiness),
                0,
                0,
                state.lapses + 1,
                CardStatus::Relearning,
            ),
            Rating::Hard => {
                let ef = (state.easiness_factor - p.hard_penalty).max(p.min_easiness);
                let interval = match prev_reps {
                    0 => p.hard_steps[0],
                    1 => p.hard_steps[1],
                    _ => scale_interval(state.interval, p.hard_multiplier),
                };
                // A Hard on a lapsed or new card enters the ladder;
                // otherwise the status is unchanged.
                let status = if state.status.is_ladder_start() {
                    CardStatus::Learning
                } else {
                    state.status
                };
                let reps = if prev_reps >= 2 { prev_reps + 1 } else { 1 };
                (ef, interval, reps, state.lapses, status)
            }
            Rating::Good => {
                let ef = state.easiness_factor;
                let interval = match prev_reps {
                    0 => p.good_steps[0],
                    1 => p.good_steps[1],
                    _ => scale_interval(state.interval, ef),
                };
                let reps = prev_reps + 1;
                let status = if reps >= 2 {
                    CardStatus::Review
                } else {
                    CardStatus::Learning
                };
                (ef, interval, reps, state.lapses, status)
            }
            Rating::Easy => {
                let ef = (state.easiness_factor + p.easy_bonus).min(p.max_easiness);
                // The growth multiplier uses the updated easiness factor.
                let interval = match prev_reps {
                    0 => p.easy_steps[0],
                    1 => p.easy_steps[1],
                    _ => scale_interval(state.interval, ef * p.easy_multiplier),
                };
                (ef, interval, prev_reps + 1, state.lapses, CardStatus::Review)
            }
        };

        Sm2State {
            easiness_factor,
            interval,
            repetitions,
            lapses,
            status,
            next_review: now + Duration::days(interval as i64),
        }
    }
}

impl Default for Sm2Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiply an interval by a growth factor, rounding up.
fn scale_interval(interval: u32, factor: f32) -> u32 {
    (interval as f32 * factor).ceil() as u32
}
