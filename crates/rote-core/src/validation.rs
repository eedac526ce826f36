//! Request validation.
//!
//! Every request is validated before any state is read or mutated, with
//! field-level detail on rejection.

use rote_sm2::Rating;

use crate::error::{ErrorCode, LearnError, LearnResult};
use crate::types::{HistoryQuery, ReviewRequest, SessionQuery};

/// Hard cap on session and history page sizes.
pub const MAX_LIMIT: u32 = 100;

/// Validate a session query and resolve the effective limit.
pub fn validate_session_query(query: &SessionQuery, default_limit: u32) -> LearnResult<u32> {
    let limit = query.limit.unwrap_or(default_limit);
    if limit < 1 || limit > MAX_LIMIT {
        return Err(LearnError::validation_field(
            format!("limit must be between 1 and {}", MAX_LIMIT),
            ErrorCode::ValInvalidLimit,
            "limit",
            format!("got {}", limit),
        ));
    }
    Ok(limit)
}

/// Validate a review request and convert the rating to its typed form.
pub fn validate_review_request(request: &ReviewRequest) -> LearnResult<Rating> {
    let rating = Rating::from_value(request.rating).ok_or_else(|| {
        LearnError::validation_field(
            "rating must be between 0 and 3 (0=again, 1=hard, 2=good, 3=easy)",
            ErrorCode::ValInvalidRating,
            "rating",
            format!("got {}", request.rating),
        )
    })?;

    if let Some(duration) = request.review_duration_ms {
        if duration == 0 {
            return Err(LearnError::validation_field(
                "review_duration_ms must be positive",
                ErrorCode::ValInvalidDuration,
                "review_duration_ms",
                "got 0",
            ));
        }
    }

    Ok(rating)
}

/// Validate a history query and resolve the effective page and limit.
pub fn validate_history_query(query: &HistoryQuery, default_limit: u32) -> LearnResult<(u32, u32)> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(LearnError::validation_field(
            "page must be at least 1",
            ErrorCode::ValInvalidPage,
            "page",
            format!("got {}", page),
        ));
    }

    let limit = query.limit.unwrap_or(default_limit);
    if limit < 1 || limit > MAX_LIMIT {
        return Err(LearnError::validation_field(
            format!("limit must be between 1 and {}", MAX_LIMIT),
            ErrorCode::ValInvalidLimit,
            "limit",
            format!("got {}", limit),
        ));
    }

    if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
        if from > to {
            return Err(LearnError::validation_field(
                "from_date must not be after to_date",
                ErrorCode::ValInvalidDateRange,
                "from_date",
                format!("{} > {}", from.to_rfc3339(), to.to_rfc3339()),
            ));
        }
    }

    Ok((page, limit))
}
