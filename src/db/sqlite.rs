// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{PolicyRow, RankedUser, StoredPolicy, UserAggregate};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn increment_aggregate(&self, user_id: &str, toxicity: f64) -> Result<UserAggregate> {
        let conn = self.conn.lock().await;
        super::queries::increment_aggregate(&conn, user_id, toxicity)
    }

    async fn get_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        let conn = self.conn.lock().await;
        super::queries::get_aggregate(&conn, user_id)
    }

    async fn all_aggregates(&self) -> Result<Vec<(String, UserAggregate)>> {
        let conn = self.conn.lock().await;
        super::queries::all_aggregates(&conn)
    }

    async fn put_aggregate(&self, user_id: &str, aggregate: &UserAggregate) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::put_aggregate(&conn, user_id, aggregate)
    }

    async fn aggregate_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        super::queries::aggregate_count(&conn)
    }

    async fn upsert_ranking(&self, user_id: &str, reputation: f64) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_ranking(&conn, user_id, reputation)
    }

    async fn ranking_position(&self, user_id: &str) -> Result<Option<(u64, u64)>> {
        let conn = self.conn.lock().await;
        super::queries::ranking_position(&conn, user_id)
    }

    async fn ranking_len(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        super::queries::ranking_len(&conn)
    }

    async fn all_rankings(&self) -> Result<Vec<(String, f64)>> {
        let conn = self.conn.lock().await;
        super::queries::all_rankings(&conn)
    }

    async fn top_ranked(&self, limit: u32) -> Result<Vec<RankedUser>> {
        let conn = self.conn.lock().await;
        super::queries::top_ranked(&conn, limit)
    }

    async fn get_policy(&self, community_id: &str) -> Result<StoredPolicy> {
        let conn = self.conn.lock().await;
        super::queries::get_policy(&conn, community_id)
    }

    async fn all_policies(&self) -> Result<Vec<PolicyRow>> {
        let conn = self.conn.lock().await;
        super::queries::all_policies(&conn)
    }

    async fn set_delete_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_delete_threshold(&conn, community_id, value)
    }

    async fn set_react_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_react_threshold(&conn, community_id, value)
    }

    async fn set_log_channel(&self, community_id: &str, channel_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_log_channel(&conn, community_id, channel_id)
    }

    async fn clear_log_channel(&self, community_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::clear_log_channel(&conn, community_id)
    }

    async fn policy_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        super::queries::policy_count(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn)
    }

    #[tokio::test]
    async fn test_trait_ping_and_tables() {
        let db = test_db().await;
        db.ping().await.unwrap();
        assert_eq!(db.table_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_trait_aggregate_roundtrip() {
        let db = test_db().await;
        assert!(db.get_aggregate("u").await.unwrap().is_none());
        db.increment_aggregate("u", 30.0).await.unwrap();
        let agg = db.increment_aggregate("u", 10.0).await.unwrap();
        assert_eq!(agg.message_count, 2);
        assert!((agg.toxicity_sum - 40.0).abs() < 1e-9);
        assert_eq!(db.aggregate_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_trait_policy_roundtrip() {
        let db = test_db().await;
        db.set_react_threshold("g", 40).await.unwrap();
        let policy = db.get_policy("g").await.unwrap();
        assert_eq!(policy.react_threshold, Some(40));
        assert_eq!(policy.delete_threshold, None);
    }
}
