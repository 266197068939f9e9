// Engine input and output types.
//
// A ScoredMessage goes in, exactly one Action comes out. Actions carry
// everything a chat-platform adapter needs to carry them out, so the
// engine never talks to the platform itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound message after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMessage {
    pub author_id: String,
    pub community_id: String,
    pub channel_id: String,
    pub message_id: String,
    /// 0-100, or `None` when the classifier failed.
    pub toxicity: Option<f64>,
    /// Original text, kept only for the moderation log.
    pub raw_text: String,
}

/// The reply posted in the channel after a deletion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// User to mention.
    pub mention_user_id: String,
    pub text: String,
    /// How long the platform should keep the notice up, if it can expire it.
    pub expires_after_secs: Option<u64>,
}

/// Record of a deletion, posted to the community's log channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub destination_channel_id: String,
    pub author_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub toxicity: f64,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// What to do with a message. Exactly one per ScoredMessage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Remove the message, notify the author, and log it if a log channel is set.
    Delete {
        notification: Notification,
        log_entry: Option<LogEntry>,
    },
    /// Leave the message up but mark it with a reaction.
    React,
    /// Nothing to do.
    None,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Delete { .. } => "delete",
            Action::React => "react",
            Action::None => "none",
        }
    }
}

/// Emoji used for the "over the reaction threshold" marker.
pub const REACTION_EMOJI: &str = "🙁";

/// Seconds the deletion notice stays up.
pub const NOTIFICATION_TTL_SECS: u64 = 5;

/// Text of the deletion notice.
pub fn deletion_notice(toxicity: f64) -> String {
    format!("This message was removed because it was rated `{toxicity:.2}%` negative.")
}
