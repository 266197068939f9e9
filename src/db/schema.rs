// Database schema: table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent, so it is safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Running toxicity totals, one row per user
        CREATE TABLE IF NOT EXISTS user_aggregates (
            user_id TEXT PRIMARY KEY,
            toxicity_sum REAL NOT NULL DEFAULT 0,     -- sum of 0-100 scores
            message_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Global ranking index: latest reputation per user
        CREATE TABLE IF NOT EXISTS reputation_ranking (
            user_id TEXT PRIMARY KEY,
            reputation REAL NOT NULL
        );

        -- Per-community thresholds. NULL = never set (use default), 0 = disabled
        CREATE TABLE IF NOT EXISTS community_policies (
            community_id TEXT PRIMARY KEY,
            delete_threshold INTEGER CHECK (delete_threshold BETWEEN 0 AND 100),
            react_threshold INTEGER CHECK (react_threshold BETWEEN 0 AND 100),
            log_channel TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Rank lookups walk reputation descending, ties by user id
        CREATE INDEX IF NOT EXISTS idx_ranking_order
            ON reputation_ranking(reputation DESC, user_id ASC);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the number of user-created tables in the database.
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
