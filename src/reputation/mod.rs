// Reputation: running toxicity aggregates, the manners score derived from
// them, and where each user ranks against everyone else.

pub mod calculator;
pub mod rank;
pub mod store;

use serde::Serialize;

use crate::error::{ModerationError, Result};
use calculator::{grade_band, reputation, round2, Grade};
use rank::percentile_of;
use store::{RankPosition, ScoreStore};

/// Everything shown on a user's karma card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KarmaCard {
    pub user_id: String,
    pub message_count: u64,
    /// Manners score rounded to two decimals.
    pub reputation: f64,
    pub grade: Grade,
    pub position: Option<RankPosition>,
    pub percentile: Option<f64>,
}

/// Build the karma card for a user, or `None` if they have no record yet.
pub async fn karma(store: &ScoreStore, user_id: &str) -> Result<Option<KarmaCard>> {
    let Some(aggregate) = store.get_aggregate(user_id).await? else {
        return Ok(None);
    };

    let score = match reputation(&aggregate) {
        Ok(score) => score,
        Err(ModerationError::DivisionUndefined) => return Ok(None),
        Err(e) => return Err(e),
    };

    // Grade what is displayed, so the letter never disagrees with the number
    let shown = round2(score);
    let position = store.rank_of(user_id).await?;
    Ok(Some(KarmaCard {
        user_id: user_id.to_string(),
        message_count: aggregate.message_count,
        reputation: shown,
        grade: grade_band(shown),
        percentile: position.and_then(|p| percentile_of(p.rank, p.total)),
        position,
    }))
}
