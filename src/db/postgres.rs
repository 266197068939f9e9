// PgDatabase: PostgreSQL backend implementing the Database trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Key differences from SQLite:
// - TIMESTAMPTZ instead of TEXT for timestamps
// - SMALLINT thresholds, DOUBLE PRECISION sums and reputations
// - $1/$2 parameter syntax (handled by sqlx)

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::Postgres;

use super::models::{PolicyRow, RankedUser, StoredPolicy, UserAggregate};
use super::traits::Database;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Holds a session-level advisory lock on a dedicated connection so two
    /// bot instances starting together don't apply the same migration twice.
    /// The unlock always runs, even if a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "MANNERLY" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x4D414E4E45524C59_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [(
                1,
                include_str!("../../migrations/postgres/0001_initial.sql"),
            )];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // Schema change and version row commit together
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    sqlx_core::query::query("INSERT INTO schema_version (version) VALUES ($1)")
                        .bind(version)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn threshold_from_column(value: Option<i16>) -> Option<u8> {
    value.and_then(|v| u8::try_from(v).ok())
}

#[async_trait]
impl Database for PgDatabase {
    async fn ping(&self) -> Result<()> {
        sqlx_core::query::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("PostgreSQL ping failed")?;
        Ok(())
    }

    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn increment_aggregate(&self, user_id: &str, toxicity: f64) -> Result<UserAggregate> {
        let row = sqlx_core::query::query(
            "INSERT INTO user_aggregates (user_id, toxicity_sum, message_count, updated_at)
             VALUES ($1, $2, 1, NOW())
             ON CONFLICT(user_id) DO UPDATE SET
                toxicity_sum = user_aggregates.toxicity_sum + EXCLUDED.toxicity_sum,
                message_count = user_aggregates.message_count + 1,
                updated_at = NOW()
             RETURNING toxicity_sum, message_count",
        )
        .bind(user_id)
        .bind(toxicity)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to record observation for {user_id}"))?;

        Ok(UserAggregate {
            toxicity_sum: row.get::<f64, _>(0),
            message_count: row.get::<i64, _>(1) as u64,
        })
    }

    async fn get_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        let row = sqlx_core::query::query(
            "SELECT toxicity_sum, message_count FROM user_aggregates WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserAggregate {
            toxicity_sum: r.get::<f64, _>(0),
            message_count: r.get::<i64, _>(1) as u64,
        }))
    }

    async fn all_aggregates(&self) -> Result<Vec<(String, UserAggregate)>> {
        let rows = sqlx_core::query::query(
            "SELECT user_id, toxicity_sum, message_count FROM user_aggregates ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get::<String, _>(0),
                    UserAggregate {
                        toxicity_sum: r.get::<f64, _>(1),
                        message_count: r.get::<i64, _>(2) as u64,
                    },
                )
            })
            .collect())
    }

    async fn put_aggregate(&self, user_id: &str, aggregate: &UserAggregate) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO user_aggregates (user_id, toxicity_sum, message_count, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT(user_id) DO UPDATE SET
                toxicity_sum = $2,
                message_count = $3,
                updated_at = NOW()",
        )
        .bind(user_id)
        .bind(aggregate.toxicity_sum)
        .bind(i64::try_from(aggregate.message_count).context("message_count exceeds i64 range")?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn aggregate_count(&self) -> Result<u64> {
        let row = sqlx_core::query::query("SELECT COUNT(*)::bigint FROM user_aggregates")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn upsert_ranking(&self, user_id: &str, reputation: f64) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO reputation_ranking (user_id, reputation) VALUES ($1, $2)
             ON CONFLICT(user_id) DO UPDATE SET reputation = $2",
        )
        .bind(user_id)
        .bind(reputation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ranking_position(&self, user_id: &str) -> Result<Option<(u64, u64)>> {
        let row = sqlx_core::query::query(
            "SELECT
                (SELECT COUNT(*) FROM reputation_ranking o
                 WHERE o.reputation > r.reputation
                    OR (o.reputation = r.reputation
                        AND o.user_id COLLATE \"C\" < r.user_id COLLATE \"C\"))::bigint + 1,
                (SELECT COUNT(*) FROM reputation_ranking)::bigint
             FROM reputation_ranking r
             WHERE r.user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| (r.get::<i64, _>(0) as u64, r.get::<i64, _>(1) as u64)))
    }

    async fn ranking_len(&self) -> Result<u64> {
        let row = sqlx_core::query::query("SELECT COUNT(*)::bigint FROM reputation_ranking")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn all_rankings(&self) -> Result<Vec<(String, f64)>> {
        let rows = sqlx_core::query::query("SELECT user_id, reputation FROM reputation_ranking")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<f64, _>(1)))
            .collect())
    }

    async fn top_ranked(&self, limit: u32) -> Result<Vec<RankedUser>> {
        let rows = sqlx_core::query::query(
            "SELECT user_id, reputation FROM reputation_ranking
             ORDER BY reputation DESC, user_id COLLATE \"C\" ASC
             LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, r)| RankedUser {
                user_id: r.get::<String, _>(0),
                reputation: r.get::<f64, _>(1),
                rank: i as u64 + 1,
            })
            .collect())
    }

    async fn get_policy(&self, community_id: &str) -> Result<StoredPolicy> {
        let row = sqlx_core::query::query(
            "SELECT delete_threshold, react_threshold, log_channel
             FROM community_policies WHERE community_id = $1",
        )
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| StoredPolicy {
                delete_threshold: threshold_from_column(r.get(0)),
                react_threshold: threshold_from_column(r.get(1)),
                log_channel: r.get(2),
            })
            .unwrap_or_default())
    }

    async fn all_policies(&self) -> Result<Vec<PolicyRow>> {
        let rows = sqlx_core::query::query(
            "SELECT community_id, delete_threshold, react_threshold, log_channel
             FROM community_policies ORDER BY community_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PolicyRow {
                community_id: r.get(0),
                policy: StoredPolicy {
                    delete_threshold: threshold_from_column(r.get(1)),
                    react_threshold: threshold_from_column(r.get(2)),
                    log_channel: r.get(3),
                },
            })
            .collect())
    }

    async fn set_delete_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO community_policies (community_id, delete_threshold, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(community_id) DO UPDATE SET
                delete_threshold = $2,
                updated_at = NOW()",
        )
        .bind(community_id)
        .bind(i16::from(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_react_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO community_policies (community_id, react_threshold, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(community_id) DO UPDATE SET
                react_threshold = $2,
                updated_at = NOW()",
        )
        .bind(community_id)
        .bind(i16::from(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_log_channel(&self, community_id: &str, channel_id: &str) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO community_policies (community_id, log_channel, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(community_id) DO UPDATE SET
                log_channel = $2,
                updated_at = NOW()",
        )
        .bind(community_id)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_log_channel(&self, community_id: &str) -> Result<()> {
        sqlx_core::query::query(
            "UPDATE community_policies SET log_channel = NULL, updated_at = NOW()
             WHERE community_id = $1",
        )
        .bind(community_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn policy_count(&self) -> Result<u64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM community_policies
             WHERE delete_threshold IS NOT NULL
                OR react_threshold IS NOT NULL
                OR log_channel IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0) as u64)
    }
}
