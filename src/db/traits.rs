// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite), PgDatabase (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.
//
// The shape is a counter store plus a sorted set: per-user aggregates are
// bumped with a single atomic statement, and the ranking table answers
// rank-by-key and cardinality. Policy columns are typed at this boundary so
// nothing above it ever parses a threshold out of a string.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{PolicyRow, RankedUser, StoredPolicy, UserAggregate};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Cheap round trip to prove the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- User aggregates ---

    /// Atomically add one observation to a user's aggregate, creating it at
    /// (0, 0) first if needed, and return the updated totals.
    async fn increment_aggregate(&self, user_id: &str, toxicity: f64) -> Result<UserAggregate>;

    /// Look up a user's aggregate without side effects.
    async fn get_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>>;

    /// Every stored aggregate. Used by the ranking backfill and migrations.
    async fn all_aggregates(&self) -> Result<Vec<(String, UserAggregate)>>;

    /// Overwrite an aggregate verbatim. Only used when copying between backends.
    async fn put_aggregate(&self, user_id: &str, aggregate: &UserAggregate) -> Result<()>;

    /// Number of users with an aggregate.
    async fn aggregate_count(&self) -> Result<u64>;

    // --- Ranking index ---

    /// Insert or replace a user's reputation in the ranking index.
    async fn upsert_ranking(&self, user_id: &str, reputation: f64) -> Result<()>;

    /// 1-based rank (highest reputation first, ties by user id) and the
    /// index cardinality, or `None` if the user has no ranking entry.
    async fn ranking_position(&self, user_id: &str) -> Result<Option<(u64, u64)>>;

    /// Number of entries in the ranking index.
    async fn ranking_len(&self) -> Result<u64>;

    /// Every ranking entry as `(user_id, reputation)`, in no particular order.
    async fn all_rankings(&self) -> Result<Vec<(String, f64)>>;

    /// The first `limit` entries of the ranking index.
    async fn top_ranked(&self, limit: u32) -> Result<Vec<RankedUser>>;

    // --- Community policy ---

    /// Stored policy columns for a community (all `None` if never configured).
    async fn get_policy(&self, community_id: &str) -> Result<StoredPolicy>;

    /// Every configured community. Used when copying between backends.
    async fn all_policies(&self) -> Result<Vec<PolicyRow>>;

    async fn set_delete_threshold(&self, community_id: &str, value: u8) -> Result<()>;

    async fn set_react_threshold(&self, community_id: &str, value: u8) -> Result<()>;

    async fn set_log_channel(&self, community_id: &str, channel_id: &str) -> Result<()>;

    async fn clear_log_channel(&self, community_id: &str) -> Result<()>;

    /// Number of communities with at least one stored policy value.
    async fn policy_count(&self) -> Result<u64>;
}
