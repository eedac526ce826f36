//! Learning engine facade.
//!
//! Ties the pure SM-2 scheduler, the progress store, and the external
//! card store together: builds review sessions, records reviews, resets
//! progress, and serves history and statistics.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use rote_sm2::Sm2Scheduler;

use crate::config::LearningConfig;
use crate::error::LearnResult;
use crate::store::ProgressStore;
use crate::traits::CardStore;
use crate::types::{
    HistoryPage, HistoryQuery, LearningStats, Pagination, ReviewOutcome, ReviewRequest, Session,
    SessionCard, SessionQuery, StateSnapshot,
};
use crate::validation;

/// Spaced-repetition learning engine.
///
/// All methods take the reference timestamp from the caller; the engine
/// reads no wall clock, which keeps session and review outcomes
/// reproducible in tests.
pub struct Learning {
    config: LearningConfig,
    scheduler: Sm2Scheduler,
    store: ProgressStore,
    cards: Arc<dyn CardStore>,
}

impl Learning {
    /// Create a learning engine backed by the database in `config`.
    pub fn new(config: LearningConfig, cards: Arc<dyn CardStore>) -> LearnResult<Self> {
        debug!(path = %config.db_path.display(), "Opening progress store");
        let store = ProgressStore::new(&config.db_path)?;
        Ok(Self::with_store(config, store, cards))
    }

    /// Create a learning engine over an existing progress store.
    pub fn with_store(
        config: LearningConfig,
        store: ProgressStore,
        cards: Arc<dyn CardStore>,
    ) -> Self {
        Self {
            config,
            scheduler: Sm2Scheduler::new(),
            store,
            cards,
        }
    }

    /// Start tracking a card for a learner.
    ///
    /// Called by the card-management collaborator when a card is
    /// created. Returns false if the card was already tracked.
    pub async fn track_card(
        &self,
        learner_id: &str,
        card_id: i64,
        now: DateTime<Utc>,
    ) -> LearnResult<bool> {
        self.store.track_card(learner_id, card_id, now)
    }

    /// Stop tracking a card. Review history is kept.
    pub async fn untrack_card(&self, learner_id: &str, card_id: i64) -> LearnResult<bool> {
        self.store.untrack_card(learner_id, card_id)
    }

    /// Build a review session: an ordered snapshot of due cards.
    ///
    /// Learning and relearning cards are prioritized ahead of review
    /// cards, ties broken by most overdue first. Cards whose content the
    /// card store no longer knows are skipped. An empty session means
    /// the learner is caught up.
    pub async fn start_session(
        &self,
        learner_id: &str,
        query: &SessionQuery,
        now: DateTime<Utc>,
    ) -> LearnResult<Session> {
        let limit = validation::validate_session_query(query, self.config.default_session_limit)?;

        let due = self
            .store
            .due_states(learner_id, now, query.status, query.include_new, limit)?;
        let (total_due, new_cards) = self.store.due_counts(learner_id, now)?;

        let card_ids: Vec<i64> = due.iter().map(|(id, _)| *id).collect();
        let contents = self.cards.get_cards(learner_id, &card_ids).await?;

        // Join content onto the due ordering, dropping cards the store
        // no longer knows.
        let mut flashcards = Vec::with_capacity(due.len());
        for (card_id, state) in due {
            if let Some(content) = contents.iter().find(|c| c.id == card_id) {
                flashcards.push(SessionCard {
                    id: content.id,
                    front: content.front.clone(),
                    back: content.back.clone(),
                    source: content.source.clone(),
                    created_at: content.created_at,
                    updated_at: content.updated_at,
                    learning_state: state,
                });
            } else {
                debug!(card_id, "Skipping due card with no content");
            }
        }

        let session = Session {
            session_id: Uuid::new_v4(),
            flashcards,
            total_due,
            new_cards,
            review_cards: total_due - new_cards,
        };

        info!(
            learner_id,
            session_id = %session.session_id,
            cards = session.flashcards.len(),
            total_due,
            "Assembled learning session"
        );

        Ok(session)
    }

    /// Record a review: apply the SM-2 transition and append history.
    ///
    /// The state read, transition, update, and history append happen in
    /// one store transaction, so two concurrent submissions for the same
    /// card serialize and each delta builds on the other's output. On a
    /// `Conflict` the caller can retry the whole call, since nothing is
    /// written until the transaction commits.
    pub async fn submit_review(
        &self,
        learner_id: &str,
        request: &ReviewRequest,
        now: DateTime<Utc>,
    ) -> LearnResult<ReviewOutcome> {
        let rating = validation::validate_review_request(request)?;

        let (previous, new_state) = self.store.record_review(
            learner_id,
            request.card_id,
            request.rating,
            request.review_duration_ms,
            now,
            |prev| self.scheduler.review(prev, rating, now),
        )?;

        info!(
            learner_id,
            card_id = request.card_id,
            rating = request.rating,
            interval = new_state.interval,
            status = %new_state.status,
            "Recorded review"
        );

        Ok(ReviewOutcome {
            flashcard_id: request.card_id,
            previous_state: StateSnapshot::from(&previous),
            new_state: StateSnapshot::from(&new_state),
            review_recorded: true,
        })
    }

    /// Reset all of a learner's cards to fresh-card state.
    ///
    /// Review history is untouched. Returns the number of states
    /// rewritten; running it twice leaves the same end state.
    pub async fn reset_progress(&self, learner_id: &str, now: DateTime<Utc>) -> LearnResult<u64> {
        let reset_count = self.store.reset_progress(learner_id, now)?;
        info!(learner_id, reset_count, "Reset learning progress");
        Ok(reset_count)
    }

    /// Fetch a page of review history, most recent first.
    pub async fn review_history(
        &self,
        learner_id: &str,
        query: &HistoryQuery,
    ) -> LearnResult<HistoryPage> {
        let (page, limit) =
            validation::validate_history_query(query, self.config.default_history_limit)?;

        let (data, total) = self.store.history(
            learner_id,
            query.flashcard_id,
            query.from_date,
            query.to_date,
            page,
            limit,
        )?;

        Ok(HistoryPage {
            data,
            pagination: Pagination { page, limit, total },
        })
    }

    /// Compute learning statistics for a learner.
    pub async fn stats(&self, learner_id: &str, now: DateTime<Utc>) -> LearnResult<LearningStats> {
        let day_start = start_of_day(now);
        let day_end = day_start + Duration::days(1) - Duration::milliseconds(1);

        let total_flashcards = self.store.count_states(learner_id)?;
        let by_status = self.store.status_counts(learner_id)?;
        let due_today = self.store.count_due_between(learner_id, day_start, day_end)?;
        let overdue = self.store.count_due_before(learner_id, day_start)?;

        let (total_reviews, successful_reviews) = self.store.review_counts(learner_id)?;
        let retention_rate = if total_reviews > 0 {
            round2(successful_reviews as f32 / total_reviews as f32)
        } else {
            0.0
        };

        let reviews_today = self.store.count_reviews_since(learner_id, day_start)?;
        let average_easiness_factor = round2(self.store.average_easiness(learner_id)?.unwrap_or(2.5));
        let streak_days = streak(&self.store.review_days(learner_id)?, now.date_naive());

        Ok(LearningStats {
            total_flashcards,
            by_status,
            due_today,
            overdue,
            retention_rate,
            total_reviews,
            reviews_today,
            average_easiness_factor,
            streak_days,
        })
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Count consecutive review days ending today or yesterday.
///
/// `days` must be distinct dates in descending order.
fn streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let Some(&latest) = days.first() else {
        return 0;
    };
    // A streak broken before yesterday is over
    if (today - latest).num_days() > 1 {
        return 0;
    }

    let mut count = 1u32;
    let mut previous = latest;
    for &day in &days[1..] {
        if (previous - day).num_days() == 1 {
            count += 1;
            previous = day;
        } else {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockCardStore;
    use crate::types::CardContent;
    use chrono::TimeZone;
    use rote_sm2::CardStatus;

    fn card(id: i64, now: DateTime<Utc>) -> CardContent {
        CardContent {
            id,
            front: format!("front {}", id),
            back: format!("back {}", id),
            source: "manual".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn engine_with_cards(known_cards: Vec<i64>) -> Learning {
        let mut cards = MockCardStore::new();
        cards.expect_get_cards().returning(move |_, ids| {
            let now = Utc::now();
            Ok(ids
                .iter()
                .filter(|id| known_cards.contains(id))
                .map(|id| card(*id, now))
                .collect())
        });

        Learning::with_store(
            LearningConfig::default(),
            ProgressStore::in_memory().unwrap(),
            Arc::new(cards),
        )
    }

    #[tokio::test]
    async fn test_empty_session_is_not_an_error() {
        let engine = engine_with_cards(vec![]);
        let now = Utc::now();

        let session = engine
            .start_session("learner", &SessionQuery::default(), now)
            .await
            .unwrap();

        assert!(session.flashcards.is_empty());
        assert_eq!(session.total_due, 0);
        assert_eq!(session.new_cards, 0);
        assert_eq!(session.review_cards, 0);
    }

    #[tokio::test]
    async fn test_session_skips_cards_without_content() {
        let engine = engine_with_cards(vec![1]);
        let now = Utc::now();

        engine.track_card("learner", 1, now).await.unwrap();
        engine.track_card("learner", 2, now).await.unwrap();

        let session = engine
            .start_session("learner", &SessionQuery::default(), now)
            .await
            .unwrap();

        // Card 2 has no content and is dropped, but still counts as due
        assert_eq!(session.flashcards.len(), 1);
        assert_eq!(session.flashcards[0].id, 1);
        assert_eq!(session.total_due, 2);
    }

    #[tokio::test]
    async fn test_session_rejects_out_of_range_limit() {
        let engine = engine_with_cards(vec![]);
        let query = SessionQuery {
            limit: Some(101),
            ..Default::default()
        };

        let err = engine
            .start_session("learner", &query, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::LearnError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_submit_review_returns_before_and_after() {
        let engine = engine_with_cards(vec![1]);
        let now = Utc::now();

        engine.track_card("learner", 1, now).await.unwrap();

        let request = ReviewRequest {
            card_id: 1,
            rating: 2,
            review_duration_ms: Some(4200),
        };
        let outcome = engine.submit_review("learner", &request, now).await.unwrap();

        assert!(outcome.review_recorded);
        assert_eq!(outcome.previous_state.status, CardStatus::New);
        assert_eq!(outcome.previous_state.interval, 0);
        assert_eq!(outcome.new_state.status, CardStatus::Learning);
        assert_eq!(outcome.new_state.interval, 1);
        assert_eq!(outcome.new_state.repetitions, 1);
    }

    #[tokio::test]
    async fn test_submit_review_unknown_card_is_not_found() {
        let engine = engine_with_cards(vec![]);
        let request = ReviewRequest {
            card_id: 99,
            rating: 2,
            review_duration_ms: None,
        };

        let err = engine
            .submit_review("learner", &request, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::LearnError::NotFound { .. }));

        // No history row was written
        let history = engine
            .review_history("learner", &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_submit_review_invalid_rating_rejected_before_lookup() {
        let engine = engine_with_cards(vec![]);
        let request = ReviewRequest {
            card_id: 1,
            rating: 7,
            review_duration_ms: None,
        };

        let err = engine
            .submit_review("learner", &request, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::LearnError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_reviewed_card_reappears_when_due_again() {
        let engine = engine_with_cards(vec![1]);
        let now = Utc::now();

        engine.track_card("learner", 1, now).await.unwrap();

        // Again keeps the interval at zero, so the card is due in the
        // same session fetch
        let request = ReviewRequest {
            card_id: 1,
            rating: 0,
            review_duration_ms: None,
        };
        engine.submit_review("learner", &request, now).await.unwrap();

        let session = engine
            .start_session("learner", &SessionQuery::default(), now)
            .await
            .unwrap();
        assert_eq!(session.flashcards.len(), 1);
        assert_eq!(
            session.flashcards[0].learning_state.status,
            CardStatus::Relearning
        );
    }

    #[tokio::test]
    async fn test_reset_progress_counts_and_idempotence() {
        let engine = engine_with_cards(vec![1, 2]);
        let now = Utc::now();

        engine.track_card("learner", 1, now).await.unwrap();
        engine.track_card("learner", 2, now).await.unwrap();
        let request = ReviewRequest {
            card_id: 1,
            rating: 3,
            review_duration_ms: None,
        };
        engine.submit_review("learner", &request, now).await.unwrap();

        assert_eq!(engine.reset_progress("learner", now).await.unwrap(), 2);
        assert_eq!(engine.reset_progress("learner", now).await.unwrap(), 2);

        let stats = engine.stats("learner", now).await.unwrap();
        assert_eq!(stats.by_status.new, 2);
        assert_eq!(stats.total_reviews, 1);
    }

    #[tokio::test]
    async fn test_stats_arithmetic() {
        let engine = engine_with_cards(vec![1, 2, 3]);
        let now = Utc::now();

        for card_id in 1..=3 {
            engine.track_card("learner", card_id, now).await.unwrap();
        }

        // Ratings: good, again, easy -> 2 of 3 successful
        for (card_id, rating) in [(1i64, 2u8), (2, 0), (3, 3)] {
            let request = ReviewRequest {
                card_id,
                rating,
                review_duration_ms: None,
            };
            engine.submit_review("learner", &request, now).await.unwrap();
        }

        let stats = engine.stats("learner", now).await.unwrap();
        assert_eq!(stats.total_flashcards, 3);
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.reviews_today, 3);
        assert_eq!(stats.retention_rate, 0.67);
        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.by_status.learning, 1);
        assert_eq!(stats.by_status.relearning, 1);
        assert_eq!(stats.by_status.review, 1);
    }

    #[tokio::test]
    async fn test_stats_empty_learner_defaults() {
        let engine = engine_with_cards(vec![]);
        let stats = engine.stats("learner", Utc::now()).await.unwrap();

        assert_eq!(stats.total_flashcards, 0);
        assert_eq!(stats.retention_rate, 0.0);
        assert_eq!(stats.average_easiness_factor, 2.5);
        assert_eq!(stats.streak_days, 0);
    }

    #[test]
    fn test_streak_counting() {
        let today = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap().date_naive();
        let d = |offset: i64| today - Duration::days(offset);

        assert_eq!(streak(&[], today), 0);
        assert_eq!(streak(&[d(0)], today), 1);
        assert_eq!(streak(&[d(0), d(1), d(2)], today), 3);
        // A streak may end yesterday and still count
        assert_eq!(streak(&[d(1), d(2)], today), 2);
        // Gap before yesterday means no current streak
        assert_eq!(streak(&[d(2), d(3)], today), 0);
        // Gap inside the run stops the count
        assert_eq!(streak(&[d(0), d(1), d(3)], today), 2);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(2.499), 2.5);
    }
}
