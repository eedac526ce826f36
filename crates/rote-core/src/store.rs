//! SQLite-backed progress store.
//!
//! Persists per-learner-per-card SM-2 states and the append-only review
//! history. The state update and history append of a review are applied
//! in a single transaction so the two can never diverge.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use rote_sm2::{CardStatus, Rating, Sm2State};

use crate::error::{LearnError, LearnResult};
use crate::types::{ReviewRecord, StatusCounts};

/// SQLite-backed store for learning states and review history.
///
/// A single connection behind a mutex serializes all writers, so the
/// read-modify-write of one review never sees a stale state from a
/// concurrent submission. Cross-process writers that hit SQLite
/// busy/locked errors surface as retryable `Conflict`s.
pub struct ProgressStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProgressStore {
    /// Create a new progress store with the given database path.
    ///
    /// Creates the database file and schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> LearnResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory progress store (useful for testing).
    pub fn in_memory() -> LearnResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> LearnResult<()> {
        let conn = self.lock_conn()?;

        conn.execute_batch(
            "
            -- SM-2 states, one row per learner-card pair
            CREATE TABLE IF NOT EXISTS learning_states (
                learner_id TEXT NOT NULL,
                card_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                easiness_factor REAL NOT NULL DEFAULT 2.5,
                interval INTEGER NOT NULL DEFAULT 0,
                repetitions INTEGER NOT NULL DEFAULT 0,
                lapses INTEGER NOT NULL DEFAULT 0,
                next_review TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (learner_id, card_id)
            );

            CREATE INDEX IF NOT EXISTS idx_learning_states_due
                ON learning_states(learner_id, next_review);
            CREATE INDEX IF NOT EXISTS idx_learning_states_status
                ON learning_states(learner_id, status);

            -- Append-only review log; never updated or deleted
            CREATE TABLE IF NOT EXISTS review_history (
                id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                card_id INTEGER NOT NULL,
                rating INTEGER NOT NULL,
                review_duration_ms INTEGER,
                previous_interval INTEGER NOT NULL,
                new_interval INTEGER NOT NULL,
                previous_easiness_factor REAL NOT NULL,
                new_easiness_factor REAL NOT NULL,
                reviewed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_review_history_learner
                ON review_history(learner_id, reviewed_at);
            CREATE INDEX IF NOT EXISTS idx_review_history_card
                ON review_history(learner_id, card_id);
            ",
        )?;

        Ok(())
    }

    fn lock_conn(&self) -> LearnResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LearnError::database(e.to_string()))
    }

    /// Create a fresh learning state for a card.
    ///
    /// Called by the card-management collaborator at card creation.
    /// Returns false if the pair is already tracked (the existing state
    /// is left untouched).
    pub fn track_card(
        &self,
        learner_id: &str,
        card_id: i64,
        now: DateTime<Utc>,
    ) -> LearnResult<bool> {
        let conn = self.lock_conn()?;
        let state = Sm2State::fresh(now);

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO learning_states
             (learner_id, card_id, status, easiness_factor, interval, repetitions, lapses,
              next_review, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                learner_id,
                card_id,
                state.status.to_string(),
                state.easiness_factor,
                state.interval,
                state.repetitions,
                state.lapses,
                state.next_review.to_rfc3339(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Remove the learning state for a card.
    ///
    /// Called when the card itself is deleted. Review history is kept.
    pub fn untrack_card(&self, learner_id: &str, card_id: i64) -> LearnResult<bool> {
        let conn = self.lock_conn()?;

        let deleted = conn.execute(
            "DELETE FROM learning_states WHERE learner_id = ? AND card_id = ?",
            params![learner_id, card_id],
        )?;

        Ok(deleted > 0)
    }

    /// Get the learning state for a card.
    ///
    /// Returns None if the pair is not tracked.
    pub fn get_state(&self, learner_id: &str, card_id: i64) -> LearnResult<Option<Sm2State>> {
        let conn = self.lock_conn()?;

        let result = conn
            .query_row(
                "SELECT status, easiness_factor, interval, repetitions, lapses, next_review
                 FROM learning_states WHERE learner_id = ? AND card_id = ?",
                params![learner_id, card_id],
                row_to_state,
            )
            .optional()?;

        Ok(result)
    }

    /// Get all due states for a learner, ordered for a session.
    ///
    /// Due means `next_review <= now` (inclusive, so zero-interval cards
    /// reappear immediately). Learning and relearning cards come first,
    /// then review, then new; ties break by ascending `next_review` so
    /// the most overdue cards lead.
    pub fn due_states(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        status: Option<CardStatus>,
        include_new: bool,
        limit: u32,
    ) -> LearnResult<Vec<(i64, Sm2State)>> {
        let conn = self.lock_conn()?;
        let now_str = now.to_rfc3339();

        let mut sql = String::from(
            "SELECT card_id, status, easiness_factor, interval, repetitions, lapses, next_review
             FROM learning_states
             WHERE learner_id = ? AND next_review <= ?",
        );
        let status_str = status.map(|s| s.to_string());
        let limit = limit as i64;
        let mut sql_params: Vec<&dyn rusqlite::ToSql> = vec![&learner_id, &now_str];

        if let Some(ref s) = status_str {
            sql.push_str(" AND status = ?");
            sql_params.push(s);
        }
        if !include_new {
            sql.push_str(" AND status != 'new'");
        }

        sql.push_str(
            " ORDER BY CASE
                 WHEN status IN ('learning', 'relearning') THEN 0
                 WHEN status = 'review' THEN 1
                 ELSE 2
               END,
               next_review ASC
             LIMIT ?",
        );
        sql_params.push(&limit);

        let mut stmt = conn.prepare(&sql)?;
        let states = stmt
            .query_map(&sql_params[..], |row| {
                let card_id: i64 = row.get(0)?;
                let state = columns_to_state(row, 1)?;
                Ok((card_id, state))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(states)
    }

    /// Count due cards: total and those still in status `new`.
    ///
    /// Ignores session limit and new-card exclusion; used for session
    /// reporting.
    pub fn due_counts(&self, learner_id: &str, now: DateTime<Utc>) -> LearnResult<(u64, u64)> {
        let conn = self.lock_conn()?;
        let now_str = now.to_rfc3339();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_states
             WHERE learner_id = ? AND next_review <= ?",
            params![learner_id, now_str],
            |row| row.get(0),
        )?;

        let new_cards: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_states
             WHERE learner_id = ? AND next_review <= ? AND status = 'new'",
            params![learner_id, now_str],
            |row| row.get(0),
        )?;

        Ok((total as u64, new_cards as u64))
    }

    /// Load a state, apply a transition, and persist the outcome.
    ///
    /// The read, the state update, and the history append all run under
    /// the connection lock in one immediate transaction, so a concurrent
    /// submission for the same card can never compute its delta from a
    /// stale prior state. Everything becomes visible together or not at
    /// all. Fails with `NotFound` if the pair is not tracked.
    pub fn record_review<F>(
        &self,
        learner_id: &str,
        card_id: i64,
        rating: u8,
        review_duration_ms: Option<u64>,
        reviewed_at: DateTime<Utc>,
        transition: F,
    ) -> LearnResult<(Sm2State, Sm2State)>
    where
        F: FnOnce(&Sm2State) -> Sm2State,
    {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = tx
            .query_row(
                "SELECT status, easiness_factor, interval, repetitions, lapses, next_review
                 FROM learning_states WHERE learner_id = ? AND card_id = ?",
                params![learner_id, card_id],
                row_to_state,
            )
            .optional()?
            .ok_or_else(|| LearnError::state_not_found(learner_id, card_id))?;

        let new_state = transition(&previous);

        tx.execute(
            "UPDATE learning_states
             SET status = ?, easiness_factor = ?, interval = ?, repetitions = ?, lapses = ?,
                 next_review = ?, updated_at = ?
             WHERE learner_id = ? AND card_id = ?",
            params![
                new_state.status.to_string(),
                new_state.easiness_factor,
                new_state.interval,
                new_state.repetitions,
                new_state.lapses,
                new_state.next_review.to_rfc3339(),
                reviewed_at.to_rfc3339(),
                learner_id,
                card_id,
            ],
        )?;

        tx.execute(
            "INSERT INTO review_history
             (id, learner_id, card_id, rating, review_duration_ms,
              previous_interval, new_interval,
              previous_easiness_factor, new_easiness_factor, reviewed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                Uuid::new_v4().to_string(),
                learner_id,
                card_id,
                rating,
                review_duration_ms,
                previous.interval,
                new_state.interval,
                previous.easiness_factor,
                new_state.easiness_factor,
                reviewed_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok((previous, new_state))
    }

    /// Reset every learning state of a learner to fresh-card defaults.
    ///
    /// One batch update; review history is untouched. Returns the number
    /// of rows written, which makes the operation idempotent (a second
    /// run rewrites the same rows to the same values).
    pub fn reset_progress(&self, learner_id: &str, now: DateTime<Utc>) -> LearnResult<u64> {
        let conn = self.lock_conn()?;
        let fresh = Sm2State::fresh(now);

        let reset = conn.execute(
            "UPDATE learning_states
             SET status = ?, easiness_factor = ?, interval = ?, repetitions = ?, lapses = ?,
                 next_review = ?, updated_at = ?
             WHERE learner_id = ?",
            params![
                fresh.status.to_string(),
                fresh.easiness_factor,
                fresh.interval,
                fresh.repetitions,
                fresh.lapses,
                fresh.next_review.to_rfc3339(),
                now.to_rfc3339(),
                learner_id,
            ],
        )?;

        Ok(reset as u64)
    }

    /// Fetch a page of review history, most recent first.
    ///
    /// Returns the page rows and the total count under the same filters.
    pub fn history(
        &self,
        learner_id: &str,
        card_id: Option<i64>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: u32,
        limit: u32,
    ) -> LearnResult<(Vec<ReviewRecord>, u64)> {
        let conn = self.lock_conn()?;

        let mut filter = String::from("WHERE learner_id = ?");
        let from_str = from.map(|t| t.to_rfc3339());
        let to_str = to.map(|t| t.to_rfc3339());
        let mut sql_params: Vec<&dyn rusqlite::ToSql> = vec![&learner_id];

        if let Some(ref id) = card_id {
            filter.push_str(" AND card_id = ?");
            sql_params.push(id);
        }
        if let Some(ref t) = from_str {
            filter.push_str(" AND reviewed_at >= ?");
            sql_params.push(t);
        }
        if let Some(ref t) = to_str {
            filter.push_str(" AND reviewed_at <= ?");
            sql_params.push(t);
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM review_history {}", filter),
            &sql_params[..],
            |row| row.get(0),
        )?;

        let offset = (page as i64 - 1) * limit as i64;
        let limit = limit as i64;
        sql_params.push(&limit);
        sql_params.push(&offset);

        let mut stmt = conn.prepare(&format!(
            "SELECT id, card_id, rating, review_duration_ms,
                    previous_interval, new_interval,
                    previous_easiness_factor, new_easiness_factor, reviewed_at
             FROM review_history {}
             ORDER BY reviewed_at DESC
             LIMIT ? OFFSET ?",
            filter
        ))?;

        let records = stmt
            .query_map(&sql_params[..], |row| {
                let id_str: String = row.get(0)?;
                let reviewed_at_str: String = row.get(8)?;

                Ok(ReviewRecord {
                    id: Uuid::parse_str(&id_str).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    flashcard_id: row.get(1)?,
                    rating: row.get(2)?,
                    review_duration_ms: row.get(3)?,
                    previous_interval: row.get(4)?,
                    new_interval: row.get(5)?,
                    previous_easiness_factor: row.get(6)?,
                    new_easiness_factor: row.get(7)?,
                    reviewed_at: parse_timestamp(8, &reviewed_at_str)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((records, total as u64))
    }

    /// Count all tracked states for a learner.
    pub fn count_states(&self, learner_id: &str) -> LearnResult<u64> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_states WHERE learner_id = ?",
            params![learner_id],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Count tracked states broken down by status.
    pub fn status_counts(&self, learner_id: &str) -> LearnResult<StatusCounts> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM learning_states
             WHERE learner_id = ? GROUP BY status",
        )?;

        let mut counts = StatusCounts::default();
        let rows = stmt.query_map(params![learner_id], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        for row in rows {
            let (status, count) = row?;
            match CardStatus::from_str(&status) {
                Ok(CardStatus::New) => counts.new = count as u64,
                Ok(CardStatus::Learning) => counts.learning = count as u64,
                Ok(CardStatus::Review) => counts.review = count as u64,
                Ok(CardStatus::Relearning) => counts.relearning = count as u64,
                Err(_) => {}
            }
        }

        Ok(counts)
    }

    /// Count states due within an inclusive time range.
    pub fn count_due_between(
        &self,
        learner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LearnResult<u64> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_states
             WHERE learner_id = ? AND next_review >= ? AND next_review <= ?",
            params![learner_id, start.to_rfc3339(), end.to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Count states due strictly before a point in time.
    pub fn count_due_before(&self, learner_id: &str, cutoff: DateTime<Utc>) -> LearnResult<u64> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_states
             WHERE learner_id = ? AND next_review < ?",
            params![learner_id, cutoff.to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Count lifetime reviews and those rated Good or better.
    pub fn review_counts(&self, learner_id: &str) -> LearnResult<(u64, u64)> {
        let conn = self.lock_conn()?;

        let (total, successful): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(rating >= ?), 0) FROM review_history
             WHERE learner_id = ?",
            params![Rating::Good.to_value(), learner_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok((total as u64, successful as u64))
    }

    /// Count reviews recorded at or after a point in time.
    pub fn count_reviews_since(&self, learner_id: &str, since: DateTime<Utc>) -> LearnResult<u64> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM review_history
             WHERE learner_id = ? AND reviewed_at >= ?",
            params![learner_id, since.to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Mean easiness factor across all tracked states.
    ///
    /// Returns None when the learner has no states.
    pub fn average_easiness(&self, learner_id: &str) -> LearnResult<Option<f32>> {
        let conn = self.lock_conn()?;

        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(easiness_factor) FROM learning_states WHERE learner_id = ?",
            params![learner_id],
            |row| row.get(0),
        )?;

        Ok(avg.map(|a| a as f32))
    }

    /// Distinct UTC days with at least one review, most recent first.
    pub fn review_days(&self, learner_id: &str) -> LearnResult<Vec<NaiveDate>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT date(reviewed_at) FROM review_history
             WHERE learner_id = ? ORDER BY 1 DESC",
        )?;

        let days = stmt
            .query_map(params![learner_id], |row| {
                let day: String = row.get(0)?;
                Ok(day)
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|day| NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok())
            .collect();

        Ok(days)
    }
}

/// Parse an RFC 3339 column, reporting corruption instead of guessing.
fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sm2State> {
    columns_to_state(row, 0)
}

fn columns_to_state(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Sm2State> {
    let status_str: String = row.get(offset)?;
    let next_review_str: String = row.get(offset + 5)?;

    Ok(Sm2State {
        status: CardStatus::from_str(&status_str).unwrap_or(CardStatus::New),
        easiness_factor: row.get(offset + 1)?,
        interval: row.get(offset + 2)?,
        repetitions: row.get(offset + 3)?,
        lapses: row.get(offset + 4)?,
        next_review: parse_timestamp(offset + 5, &next_review_str)?,
    })
}
