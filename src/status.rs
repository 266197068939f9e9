// System status display: storage backend, table count, and how much
// reputation and policy data has accumulated.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;

/// Row counts gathered for the status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub tables: i64,
    pub users: u64,
    pub ranked: u64,
    pub communities: u64,
}

/// Read every count in one pass.
pub async fn collect(db: &Arc<dyn Database>) -> Result<StatusCounts> {
    Ok(StatusCounts {
        tables: db.table_count().await?,
        users: db.aggregate_count().await?,
        ranked: db.ranking_len().await?,
        communities: db.policy_count().await?,
    })
}

/// Display system status to the terminal.
///
/// `db_display` is either the SQLite file path or a redacted Postgres URL.
pub async fn show(db: &Arc<dyn Database>, db_display: &str, is_file: bool) -> Result<()> {
    if is_file {
        let file_size = std::fs::metadata(Path::new(db_display))
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "unknown".to_string());
        println!("Database: {} ({})", db_display, file_size);
    } else {
        println!("Database: {}", db_display);
    }

    let counts = collect(db).await?;
    println!("Tables: {}", counts.tables);
    println!("Users with a record: {}", counts.users);
    println!("Users ranked: {}", counts.ranked);
    if counts.ranked < counts.users {
        println!("  Ranking is behind; run `mannerly backfill` or restart the feed");
    }
    println!("Communities with custom policy: {}", counts.communities);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
