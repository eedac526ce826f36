//! rote-core - Core library for rote.
//!
//! This crate provides the learning engine: session building over due
//! cards, atomic review recording through the SM-2 scheduler, progress
//! reset, review history, and learning statistics. Card content itself
//! comes from an external [`CardStore`] collaborator.
//!
//! # Example
//!
//! ```ignore
//! use rote_core::{Learning, LearningConfig, SessionQuery};
//! use chrono::Utc;
//!
//! let engine = Learning::new(LearningConfig::default(), card_store)?;
//!
//! // Build a session of due cards
//! let session = engine.start_session("learner-1", &SessionQuery::default(), Utc::now()).await?;
//!
//! // Record a review
//! let outcome = engine.submit_review("learner-1", &request, Utc::now()).await?;
//! ```

pub mod config;
pub mod error;
pub mod learning;
pub mod store;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::LearningConfig;
pub use error::{ErrorCode, LearnError, LearnResult};
pub use learning::Learning;
pub use store::ProgressStore;
pub use traits::CardStore;
pub use types::{
    CardContent, HistoryPage, HistoryQuery, LearningStats, Pagination, ReviewOutcome,
    ReviewRecord, ReviewRequest, Session, SessionCard, SessionQuery, StateSnapshot, StatusCounts,
};

// Re-export the scheduler crate's surface for convenience
pub use rote_sm2::{CardStatus, Rating, Sm2Params, Sm2Scheduler, Sm2State};
