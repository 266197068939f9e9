// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{PolicyRow, RankedUser, StoredPolicy, UserAggregate};

// --- User aggregates ---

/// Add one observation to a user's aggregate in a single statement.
///
/// The increment happens inside SQLite, so two processes sharing the file
/// can't lose an update the way a read-then-write would.
pub fn increment_aggregate(conn: &Connection, user_id: &str, toxicity: f64) -> Result<UserAggregate> {
    let (toxicity_sum, message_count): (f64, i64) = conn
        .query_row(
            "INSERT INTO user_aggregates (user_id, toxicity_sum, message_count, updated_at)
             VALUES (?1, ?2, 1, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET
                toxicity_sum = toxicity_sum + ?2,
                message_count = message_count + 1,
                updated_at = datetime('now')
             RETURNING toxicity_sum, message_count",
            params![user_id, toxicity],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .with_context(|| format!("Failed to record observation for {user_id}"))?;

    Ok(UserAggregate {
        toxicity_sum,
        message_count: message_count as u64,
    })
}

/// Look up a user's aggregate.
pub fn get_aggregate(conn: &Connection, user_id: &str) -> Result<Option<UserAggregate>> {
    let mut stmt = conn
        .prepare("SELECT toxicity_sum, message_count FROM user_aggregates WHERE user_id = ?1")?;
    let result = stmt
        .query_row(params![user_id], |row| {
            Ok(UserAggregate {
                toxicity_sum: row.get(0)?,
                message_count: row.get::<_, i64>(1)? as u64,
            })
        })
        .optional()?;
    Ok(result)
}

/// Load every aggregate, ordered by user id.
pub fn all_aggregates(conn: &Connection) -> Result<Vec<(String, UserAggregate)>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, toxicity_sum, message_count FROM user_aggregates ORDER BY user_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            UserAggregate {
                toxicity_sum: row.get(1)?,
                message_count: row.get::<_, i64>(2)? as u64,
            },
        ))
    })?;

    let mut aggregates = Vec::new();
    for row in rows {
        aggregates.push(row?);
    }
    Ok(aggregates)
}

/// Overwrite an aggregate verbatim (backend-to-backend copies only).
pub fn put_aggregate(conn: &Connection, user_id: &str, aggregate: &UserAggregate) -> Result<()> {
    conn.execute(
        "INSERT INTO user_aggregates (user_id, toxicity_sum, message_count, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
            toxicity_sum = ?2,
            message_count = ?3,
            updated_at = datetime('now')",
        params![
            user_id,
            aggregate.toxicity_sum,
            aggregate.message_count as i64
        ],
    )?;
    Ok(())
}

pub fn aggregate_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_aggregates", [], |row| row.get(0))?;
    Ok(count as u64)
}

// --- Ranking index ---

/// Insert or replace a user's reputation in the ranking index.
pub fn upsert_ranking(conn: &Connection, user_id: &str, reputation: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO reputation_ranking (user_id, reputation) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET reputation = ?2",
        params![user_id, reputation],
    )?;
    Ok(())
}

/// 1-based rank and cardinality for a user.
///
/// Rank counts everyone strictly ahead: higher reputation, or equal
/// reputation with a smaller user id.
pub fn ranking_position(conn: &Connection, user_id: &str) -> Result<Option<(u64, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT
            (SELECT COUNT(*) FROM reputation_ranking o
             WHERE o.reputation > r.reputation
                OR (o.reputation = r.reputation AND o.user_id < r.user_id)) + 1,
            (SELECT COUNT(*) FROM reputation_ranking)
         FROM reputation_ranking r
         WHERE r.user_id = ?1",
    )?;
    let result = stmt
        .query_row(params![user_id], |row| {
            Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
        })
        .optional()?;
    Ok(result)
}

pub fn ranking_len(conn: &Connection) -> Result<u64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM reputation_ranking", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn all_rankings(conn: &Connection) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare("SELECT user_id, reputation FROM reputation_ranking")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// The head of the ranking index, best reputation first.
pub fn top_ranked(conn: &Connection, limit: u32) -> Result<Vec<RankedUser>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, reputation FROM reputation_ranking
         ORDER BY reputation DESC, user_id ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut ranked = Vec::new();
    for (i, row) in rows.enumerate() {
        let (user_id, reputation) = row?;
        ranked.push(RankedUser {
            user_id,
            reputation,
            rank: i as u64 + 1,
        });
    }
    Ok(ranked)
}

// --- Community policy ---

/// Load the stored policy columns for a community.
pub fn get_policy(conn: &Connection, community_id: &str) -> Result<StoredPolicy> {
    let mut stmt = conn.prepare(
        "SELECT delete_threshold, react_threshold, log_channel
         FROM community_policies WHERE community_id = ?1",
    )?;
    let result = stmt
        .query_row(params![community_id], |row| {
            Ok(StoredPolicy {
                delete_threshold: row.get(0)?,
                react_threshold: row.get(1)?,
                log_channel: row.get(2)?,
            })
        })
        .optional()?;
    Ok(result.unwrap_or_default())
}

/// Load every configured community, ordered by id.
pub fn all_policies(conn: &Connection) -> Result<Vec<PolicyRow>> {
    let mut stmt = conn.prepare(
        "SELECT community_id, delete_threshold, react_threshold, log_channel
         FROM community_policies ORDER BY community_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PolicyRow {
            community_id: row.get(0)?,
            policy: StoredPolicy {
                delete_threshold: row.get(1)?,
                react_threshold: row.get(2)?,
                log_channel: row.get(3)?,
            },
        })
    })?;

    let mut policies = Vec::new();
    for row in rows {
        policies.push(row?);
    }
    Ok(policies)
}

pub fn set_delete_threshold(conn: &Connection, community_id: &str, value: u8) -> Result<()> {
    conn.execute(
        "INSERT INTO community_policies (community_id, delete_threshold, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(community_id) DO UPDATE SET
            delete_threshold = ?2,
            updated_at = datetime('now')",
        params![community_id, value],
    )?;
    Ok(())
}

pub fn set_react_threshold(conn: &Connection, community_id: &str, value: u8) -> Result<()> {
    conn.execute(
        "INSERT INTO community_policies (community_id, react_threshold, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(community_id) DO UPDATE SET
            react_threshold = ?2,
            updated_at = datetime('now')",
        params![community_id, value],
    )?;
    Ok(())
}

pub fn set_log_channel(conn: &Connection, community_id: &str, channel_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO community_policies (community_id, log_channel, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(community_id) DO UPDATE SET
            log_channel = ?2,
            updated_at = datetime('now')",
        params![community_id, channel_id],
    )?;
    Ok(())
}

pub fn clear_log_channel(conn: &Connection, community_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE community_policies SET log_channel = NULL, updated_at = datetime('now')
         WHERE community_id = ?1",
        params![community_id],
    )?;
    Ok(())
}

pub fn policy_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM community_policies
         WHERE delete_threshold IS NOT NULL
            OR react_threshold IS NOT NULL
            OR log_channel IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
