// RankQuery: percentile and leaderboard reads over the ranking index.

use serde::Serialize;

use super::calculator::{grade_band, round2, Grade};
use super::store::ScoreStore;
use crate::error::Result;

/// `round(rank / total * 100, 2)`. Lower is better: the top user of `T`
/// sits at `100 / T`.
pub fn percentile_of(rank: u64, total: u64) -> Option<f64> {
    if rank == 0 || total == 0 {
        return None;
    }
    Some(round2(rank as f64 / total as f64 * 100.0))
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: String,
    pub reputation: f64,
    pub grade: Grade,
}

#[derive(Clone)]
pub struct RankQuery {
    store: ScoreStore,
}

impl RankQuery {
    pub fn new(store: ScoreStore) -> Self {
        Self { store }
    }

    /// The user's percentile, or `None` when they have no ranking entry.
    /// Callers must show `None` as "no data", never as rank 0.
    pub async fn percentile(&self, user_id: &str) -> Result<Option<f64>> {
        let position = self.store.rank_of(user_id).await?;
        Ok(position.and_then(|p| percentile_of(p.rank, p.total)))
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let top = self.store.top(limit).await?;
        Ok(top
            .into_iter()
            .map(|r| {
                let shown = round2(r.reputation);
                LeaderboardEntry {
                    rank: r.rank,
                    grade: grade_band(shown),
                    reputation: shown,
                    user_id: r.user_id,
                }
            })
            .collect())
    }
}
