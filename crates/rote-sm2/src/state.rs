//! SM-2 memory state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Learning status of a card in the SM-2 ladder.
///
/// Every card starts as `New` and climbs toward `Review` through
/// successful recalls. A failed recall (`Rating::Again`) drops the card
/// to `Relearning`, which restarts the ladder from the beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardStatus {
    /// Never reviewed.
    New,
    /// Partway up the learning ladder.
    Learning,
    /// Graduated; intervals grow with the easiness factor.
    Review,
    /// Lapsed; restarts the ladder like a new card.
    Relearning,
}

impl CardStatus {
    /// Whether this status sits at the start of the learning ladder.
    ///
    /// `New` and `Relearning` cards transition identically: a lapsed
    /// card restarts learning from scratch. Keeping the check in one
    /// place guarantees the two stay in sync.
    pub fn is_ladder_start(self) -> bool {
        matches!(self, CardStatus::New | CardStatus::Relearning)
    }
}

/// Quality-of-recall rating for a review (maps to wire values 0-3).
///
/// - Again (0): Complete failure to recall
/// - Hard (1): Successful but difficult recall
/// - Good (2): Normal successful recall
/// - Easy (3): Effortless recall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rating {
    /// Complete failure to recall.
    Again = 0,
    /// Successful but difficult recall.
    Hard = 1,
    /// Normal successful recall.
    Good = 2,
    /// Effortless recall.
    Easy = 3,
}

impl Rating {
    /// Convert to the wire value (u8).
    pub fn to_value(self) -> u8 {
        self as u8
    }

    /// Create from a wire value.
    ///
    /// Returns None for values outside 0-3.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Rating::Again),
            1 => Some(Rating::Hard),
            2 => Some(Rating::Good),
            3 => Some(Rating::Easy),
            _ => None,
        }
    }

}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.to_value()
    }
}

impl TryFrom<u8> for Rating {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::from_value(value).ok_or(())
    }
}

/// SM-2 memory state for one learner-card pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    /// Easiness factor: multiplier controlling interval growth, clamped to [1.3, 3.0].
    pub easiness_factor: f32,
    /// Days until the next review. 0 means due immediately.
    pub interval: u32,
    /// Consecutive non-failing reviews since the last lapse or reset.
    pub repetitions: u32,
    /// Lifetime count of Again ratings.
    pub lapses: u32,
    /// Position in the learning ladder.
    pub status: CardStatus,
    /// The card is due when this timestamp is at or before now.
    pub next_review: DateTime<Utc>,
}

impl Sm2State {
    /// Create the state of a never-reviewed card, due immediately.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            easiness_factor: 2.5,
            interval: 0,
            repetitions: 0,
            lapses: 0,
            status: CardStatus::New,
            next_review: now,
        }
    }

    /// Whether the card is due for review at the given time.
    ///
    /// Uses an inclusive comparison so zero-interval cards reappear in
    /// the same session fetch.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_fresh_state_defaults() {
        let now = Utc::now();
        let state = Sm2State::fresh(now);

        assert_eq!(state.easiness_factor, 2.5);
        assert_eq!(state.interval, 0);
        assert_eq!(state.repetitions, 0);
        assert_eq!(state.lapses, 0);
        assert_eq!(state.status, CardStatus::New);
        assert_eq!(state.next_review, now);
    }

    #[test]
    fn test_fresh_state_is_due_immediately() {
        let now = Utc::now();
        let state = Sm2State::fresh(now);

        // Inclusive comparison: due at exactly next_review
        assert!(state.is_due(now));
        assert!(!state.is_due(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_ladder_start_statuses() {
        assert!(CardStatus::New.is_ladder_start());
        assert!(CardStatus::Relearning.is_ladder_start());
        assert!(!CardStatus::Learning.is_ladder_start());
        assert!(!CardStatus::Review.is_ladder_start());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            CardStatus::New,
            CardStatus::Learning,
            CardStatus::Review,
            CardStatus::Relearning,
        ] {
            let text = status.to_string();
            assert_eq!(CardStatus::from_str(&text).unwrap(), status);
        }
        assert_eq!(CardStatus::Relearning.to_string(), "relearning");
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&CardStatus::Relearning).unwrap();
        assert_eq!(json, "\"relearning\"");
    }

    #[test]
    fn test_rating_to_value() {
        assert_eq!(Rating::Again.to_value(), 0);
        assert_eq!(Rating::Hard.to_value(), 1);
        assert_eq!(Rating::Good.to_value(), 2);
        assert_eq!(Rating::Easy.to_value(), 3);
    }

    #[test]
    fn test_rating_from_value() {
        assert_eq!(Rating::from_value(0), Some(Rating::Again));
        assert_eq!(Rating::from_value(1), Some(Rating::Hard));
        assert_eq!(Rating::from_value(2), Some(Rating::Good));
        assert_eq!(Rating::from_value(3), Some(Rating::Easy));
        assert_eq!(Rating::from_value(4), None);
        assert_eq!(Rating::from_value(255), None);
    }
}
