//! rote-sm2 - SM-2 spaced-repetition scheduling.
//!
//! This crate provides the memory state types and the pure transition
//! function of the SM-2 variant used by rote. It performs no I/O and
//! reads no clock; the caller supplies the reference timestamp, which
//! keeps every transition deterministic and testable.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use rote_sm2::{Rating, Sm2Scheduler, Sm2State};
//!
//! let scheduler = Sm2Scheduler::new();
//! let now = Utc::now();
//!
//! let state = Sm2State::fresh(now);
//! let state = scheduler.review(&state, Rating::Good, now);
//!
//! assert_eq!(state.interval, 1);
//! ```

pub mod scheduler;
pub mod state;

// Re-export commonly used types
pub use scheduler::{Sm2Params, Sm2Scheduler};
pub use state::{CardStatus, Rating, Sm2State};
