// ScoreStore: per-user aggregates plus the global ranking index.
//
// Thin domain layer over the Database trait. It owns the rule that every
// aggregate change is followed by a ranking write, and the backfill that
// reconciles the ranking index with the aggregates whenever a ranking write
// was missed (an index that predates the aggregates, or retries exhausted).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::calculator::reputation;
use crate::db::models::{RankedUser, UserAggregate};
use crate::db::Database;
use crate::error::Result;

/// Where a user sits in the ranking index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankPosition {
    /// 1-based, highest reputation first.
    pub rank: u64,
    /// Number of users in the index.
    pub total: u64,
}

/// What the ranking backfill did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// Every ranked aggregate already had a current entry; nothing was written.
    Consistent,
    /// This many missing or stale entries were rewritten.
    Repaired(usize),
}

/// Two stored reputations closer than this are the same value.
const RANKING_EPSILON: f64 = 1e-9;

#[derive(Clone)]
pub struct ScoreStore {
    db: Arc<dyn Database>,
}

impl ScoreStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Fold one toxicity observation into the user's aggregate.
    ///
    /// The increment is a single atomic statement at the storage layer, so
    /// concurrent writers (even across processes) never lose an update.
    pub async fn record_observation(&self, user_id: &str, toxicity: f64) -> Result<UserAggregate> {
        let aggregate = self.db.increment_aggregate(user_id, toxicity).await?;
        debug!(
            user_id,
            toxicity,
            sum = aggregate.toxicity_sum,
            count = aggregate.message_count,
            "Recorded observation"
        );
        Ok(aggregate)
    }

    pub async fn get_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        Ok(self.db.get_aggregate(user_id).await?)
    }

    /// Write the user's current reputation into the ranking index.
    pub async fn update_ranking(&self, user_id: &str, reputation: f64) -> Result<()> {
        self.db.upsert_ranking(user_id, reputation).await?;
        Ok(())
    }

    pub async fn rank_of(&self, user_id: &str) -> Result<Option<RankPosition>> {
        let position = self.db.ranking_position(user_id).await?;
        Ok(position.map(|(rank, total)| RankPosition { rank, total }))
    }

    /// The first `limit` users of the ranking index.
    pub async fn top(&self, limit: u32) -> Result<Vec<RankedUser>> {
        Ok(self.db.top_ranked(limit).await?)
    }

    /// Bring the ranking index in line with the aggregates.
    ///
    /// Every aggregate whose ranking entry is missing, or holds a reputation
    /// other than the one the aggregate yields, is upserted. A consistent
    /// index is left untouched, so this is safe to call on every startup.
    pub async fn backfill_ranking(&self) -> Result<BackfillOutcome> {
        let ranked: HashMap<String, f64> = self.db.all_rankings().await?.into_iter().collect();
        let aggregates = self.db.all_aggregates().await?;

        let mut repaired = 0;
        for (user_id, aggregate) in &aggregates {
            // Rows with no messages have no reputation to rank by
            let Ok(score) = reputation(aggregate) else {
                continue;
            };
            let current = ranked
                .get(user_id)
                .is_some_and(|stored| (stored - score).abs() <= RANKING_EPSILON);
            if current {
                continue;
            }
            self.db.upsert_ranking(user_id, score).await?;
            repaired += 1;
        }

        if repaired == 0 {
            debug!(users = aggregates.len(), "Ranking index consistent with aggregates");
            return Ok(BackfillOutcome::Consistent);
        }
        info!(users = repaired, "Repaired ranking index from aggregates");
        Ok(BackfillOutcome::Repaired(repaired))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::open_sqlite_in_memory;

    fn store() -> (ScoreStore, Arc<dyn Database>) {
        let db = open_sqlite_in_memory().unwrap();
        (ScoreStore::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_record_observation_sums_sequence() {
        let (store, _) = store();
        let scores = [12.5, 80.0, 0.0, 33.3];
        let mut last = UserAggregate::default();
        for t in scores {
            last = store.record_observation("u", t).await.unwrap();
        }
        assert_eq!(last.message_count, 4);
        assert!((last.toxicity_sum - scores.iter().sum::<f64>()).abs() < 1e-9);
        assert_eq!(store.get_aggregate("u").await.unwrap(), Some(last));
    }

    #[tokio::test]
    async fn test_rank_of_unknown_user_is_none() {
        let (store, _) = store();
        assert_eq!(store.rank_of("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backfill_populates_empty_index() {
        let (store, db) = store();
        db.increment_aggregate("a", 10.0).await.unwrap();
        db.increment_aggregate("b", 60.0).await.unwrap();

        let first = store.backfill_ranking().await.unwrap();
        assert_eq!(first, BackfillOutcome::Repaired(2));
        assert_eq!(
            store.rank_of("a").await.unwrap(),
            Some(RankPosition { rank: 1, total: 2 })
        );

        let second = store.backfill_ranking().await.unwrap();
        assert_eq!(second, BackfillOutcome::Consistent);
        assert_eq!(db.ranking_len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_backfill_adds_user_missing_from_nonempty_index() {
        let (store, db) = store();
        db.increment_aggregate("a", 10.0).await.unwrap();
        store.backfill_ranking().await.unwrap();

        // Aggregate committed but its ranking write never happened
        db.increment_aggregate("c", 0.0).await.unwrap();
        assert_eq!(store.rank_of("c").await.unwrap(), None);

        assert_eq!(
            store.backfill_ranking().await.unwrap(),
            BackfillOutcome::Repaired(1)
        );
        assert_eq!(
            store.rank_of("c").await.unwrap(),
            Some(RankPosition { rank: 1, total: 2 })
        );
        assert_eq!(
            store.backfill_ranking().await.unwrap(),
            BackfillOutcome::Consistent
        );
    }

    #[tokio::test]
    async fn test_backfill_rewrites_stale_entry() {
        let (store, db) = store();
        db.increment_aggregate("a", 10.0).await.unwrap();
        db.increment_aggregate("b", 20.0).await.unwrap();
        store.backfill_ranking().await.unwrap();

        // "a" gets much worse without its ranking entry following
        db.increment_aggregate("a", 90.0).await.unwrap();
        assert_eq!(
            store.rank_of("a").await.unwrap(),
            Some(RankPosition { rank: 1, total: 2 })
        );

        assert_eq!(
            store.backfill_ranking().await.unwrap(),
            BackfillOutcome::Repaired(1)
        );
        assert_eq!(
            store.rank_of("a").await.unwrap(),
            Some(RankPosition { rank: 2, total: 2 })
        );
        let top = store.top(1).await.unwrap();
        assert_eq!(top[0].user_id, "b");
        assert!((top[0].reputation - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_backfill_on_empty_store() {
        let (store, _) = store();
        assert_eq!(
            store.backfill_ranking().await.unwrap(),
            BackfillOutcome::Consistent
        );
    }
}
