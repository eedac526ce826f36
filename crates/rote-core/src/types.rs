//! Core types and DTOs for learning sessions, reviews, history, and stats.

use chrono::{DateTime, Utc};
use rote_sm2::{CardStatus, Sm2State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flashcard content supplied by the external card store.
///
/// The engine only reads this; card authoring and storage live outside
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardContent {
    /// Card ID.
    pub id: i64,
    /// Question side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Where the card came from (e.g. "manual", "ai-full", "ai-edited").
    pub source: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for building a learning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuery {
    /// Maximum number of cards in the session (1-100). Defaults to 20.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Only include cards with this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CardStatus>,
    /// Whether cards never reviewed are included. Defaults to true.
    #[serde(default = "default_include_new")]
    pub include_new: bool,
}

fn default_include_new() -> bool {
    true
}

impl Default for SessionQuery {
    fn default() -> Self {
        Self {
            limit: None,
            status: None,
            include_new: true,
        }
    }
}

/// One card in a learning session: content joined with scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCard {
    /// Card ID.
    pub id: i64,
    /// Question side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Card source.
    pub source: String,
    /// Card creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Card update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Current scheduling state.
    pub learning_state: Sm2State,
}

/// An ordered, size-limited batch of due cards.
///
/// The list is a point-in-time snapshot; consuming it mutates nothing.
/// An empty list means the learner is caught up, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Identifier for correlating client-side analytics.
    pub session_id: Uuid,
    /// Ordered cards: learning/relearning first, then review, most
    /// overdue first within each group.
    pub flashcards: Vec<SessionCard>,
    /// Count of all due cards, ignoring limit and new-card exclusion.
    pub total_due: u64,
    /// Count of due cards with status `new`.
    pub new_cards: u64,
    /// `total_due - new_cards`.
    pub review_cards: u64,
}

/// A review submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Card being reviewed.
    pub card_id: i64,
    /// Quality of recall (0=again, 1=hard, 2=good, 3=easy).
    pub rating: u8,
    /// How long the learner spent on the card, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_duration_ms: Option<u64>,
}

/// Scheduling state as reported back to the caller around a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub status: CardStatus,
    pub easiness_factor: f32,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review_date: DateTime<Utc>,
}

impl From<&Sm2State> for StateSnapshot {
    fn from(state: &Sm2State) -> Self {
        Self {
            status: state.status,
            easiness_factor: state.easiness_factor,
            interval: state.interval,
            repetitions: state.repetitions,
            next_review_date: state.next_review,
        }
    }
}

/// Result of submitting a review: before/after feedback for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// Card that was reviewed.
    pub flashcard_id: i64,
    /// State before the transition.
    pub previous_state: StateSnapshot,
    /// State after the transition.
    pub new_state: StateSnapshot,
    /// Whether the history append succeeded.
    pub review_recorded: bool,
}

/// One immutable review history entry.
///
/// Appended once per review, never mutated or deleted; resetting
/// progress leaves history untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Event ID.
    pub id: Uuid,
    /// Card that was reviewed.
    pub flashcard_id: i64,
    /// Rating given (0-3).
    pub rating: u8,
    /// How long the learner spent on the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_duration_ms: Option<u64>,
    /// Interval before the transition.
    pub previous_interval: u32,
    /// Interval after the transition.
    pub new_interval: u32,
    /// Easiness factor before the transition.
    pub previous_easiness_factor: f32,
    /// Easiness factor after the transition.
    pub new_easiness_factor: f32,
    /// When the review happened.
    pub reviewed_at: DateTime<Utc>,
}

/// Query parameters for the review history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Page number, starting at 1. Defaults to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size (1-100). Defaults to 50.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Only entries for this card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flashcard_id: Option<i64>,
    /// Only entries at or after this time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    /// Only entries at or before this time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// A page of review history, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub data: Vec<ReviewRecord>,
    pub pagination: Pagination,
}

/// Per-status card counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub new: u64,
    pub learning: u64,
    pub review: u64,
    pub relearning: u64,
}

/// Learning statistics for one learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStats {
    /// Cards with tracked learning state.
    pub total_flashcards: u64,
    /// Counts broken down by status.
    pub by_status: StatusCounts,
    /// Cards due within the current UTC day.
    pub due_today: u64,
    /// Cards due strictly before the start of the current UTC day.
    pub overdue: u64,
    /// Share of reviews rated Good or Easy, rounded to 2 decimals.
    pub retention_rate: f32,
    /// Lifetime review count.
    pub total_reviews: u64,
    /// Reviews recorded during the current UTC day.
    pub reviews_today: u64,
    /// Mean easiness factor, rounded to 2 decimals. 2.5 when no states.
    pub average_easiness_factor: f32,
    /// Consecutive UTC days (ending today or yesterday) with at least
    /// one review.
    pub streak_days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_query_defaults() {
        let query = SessionQuery::default();
        assert!(query.limit.is_none());
        assert!(query.status.is_none());
        assert!(query.include_new);
    }

    #[test]
    fn test_session_query_include_new_defaults_in_json() {
        let query: SessionQuery = serde_json::from_str(r#"{"limit": 10}"#).unwrap();
        assert!(query.include_new);
    }

    #[test]
    fn test_state_snapshot_from_sm2_state() {
        let now = Utc::now();
        let state = Sm2State::fresh(now);
        let snapshot = StateSnapshot::from(&state);

        assert_eq!(snapshot.status, CardStatus::New);
        assert_eq!(snapshot.easiness_factor, 2.5);
        assert_eq!(snapshot.interval, 0);
        assert_eq!(snapshot.next_review_date, now);
    }

    #[test]
    fn test_review_outcome_serializes_snake_case() {
        let now = Utc::now();
        let state = Sm2State::fresh(now);
        let outcome = ReviewOutcome {
            flashcard_id: 7,
            previous_state: StateSnapshot::from(&state),
            new_state: StateSnapshot::from(&state),
            review_recorded: true,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["flashcard_id"], 7);
        assert_eq!(json["previous_state"]["status"], "new");
        assert_eq!(json["review_recorded"], true);
    }
}
