//! External collaborator traits.

use async_trait::async_trait;

use crate::error::LearnResult;
use crate::types::CardContent;

/// Read-only access to flashcard content.
///
/// Card authoring, editing, and deletion live outside the core; the
/// engine only references cards by ID and joins their content into
/// session output. Implementations are expected to silently omit cards
/// they no longer know about.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Fetch content for the given cards of a learner.
    ///
    /// Returns only the cards the store knows; missing IDs are skipped,
    /// not an error.
    async fn get_cards(&self, learner_id: &str, card_ids: &[i64]) -> LearnResult<Vec<CardContent>>;
}
