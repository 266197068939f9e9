// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use serde::{Deserialize, Serialize};

/// Running toxicity total for one user.
///
/// Created lazily on the first scored message and only ever grows.
/// `message_count == 0` implies `toxicity_sum == 0`, not the reverse:
/// a user whose every message scored 0 has a zero sum and a positive count.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserAggregate {
    pub toxicity_sum: f64,
    pub message_count: u64,
}

/// One row of the ranking index, as returned by leaderboard queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: String,
    pub reputation: f64,
    /// 1-based, highest reputation first.
    pub rank: u64,
}

/// Per-community policy columns exactly as stored.
///
/// `None` means the administrator never set the value and the documented
/// default applies. A stored `Some(0)` is a deliberate "disabled".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredPolicy {
    pub delete_threshold: Option<u8>,
    pub react_threshold: Option<u8>,
    pub log_channel: Option<String>,
}

/// Full policy row, used when copying data between backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRow {
    pub community_id: String,
    pub policy: StoredPolicy,
}
