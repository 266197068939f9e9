// ThresholdPolicy: per-community delete/react cutoffs and the log channel.
//
// Thresholds are whole percentages. A stored 0 disables the action; an unset
// value falls back to the default. Values are validated once, when a
// `Threshold` is constructed, and stored typed so reads never re-parse.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::db::Database;
use crate::error::{ModerationError, Result};

/// A validated 0..=100 cutoff. 0 means "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Threshold(u8);

pub const DEFAULT_DELETE_THRESHOLD: Threshold = Threshold(70);
pub const DEFAULT_REACT_THRESHOLD: Threshold = Threshold(50);

impl Threshold {
    pub const DISABLED: Threshold = Threshold(0);

    pub fn new(value: i64) -> Result<Self> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Threshold(v)),
            _ => Err(ModerationError::InvalidThreshold {
                input: value.to_string(),
            }),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_disabled(self) -> bool {
        self.0 == 0
    }

    /// Thresholds are exclusive: a score exactly on the line does not fire.
    pub fn is_exceeded_by(self, toxicity: f64) -> bool {
        !self.is_disabled() && toxicity > f64::from(self.0)
    }

    /// Read a threshold from stored column data. Anything out of range is
    /// treated as unset rather than trusted.
    fn from_stored(value: Option<u8>) -> Option<Self> {
        value.filter(|v| *v <= 100).map(Threshold)
    }
}

impl FromStr for Threshold {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('%');
        let value: i64 = trimmed
            .parse()
            .map_err(|_| ModerationError::InvalidThreshold {
                input: s.to_string(),
            })?;
        Threshold::new(value).map_err(|_| ModerationError::InvalidThreshold {
            input: s.to_string(),
        })
    }
}

impl TryFrom<i64> for Threshold {
    type Error = ModerationError;

    fn try_from(value: i64) -> Result<Self> {
        Threshold::new(value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disabled() {
            write!(f, "disabled")
        } else {
            write!(f, "{}%", self.0)
        }
    }
}

/// A threshold together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveThreshold {
    pub threshold: Threshold,
    /// True when the community never set it and the default applies.
    pub is_default: bool,
}

/// The full, resolved policy for one community.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySnapshot {
    pub community_id: String,
    pub delete: EffectiveThreshold,
    pub react: EffectiveThreshold,
    pub log_channel: Option<String>,
}

#[derive(Clone)]
pub struct ThresholdPolicy {
    db: Arc<dyn Database>,
}

impl ThresholdPolicy {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get_delete_threshold(&self, community_id: &str) -> Result<Threshold> {
        let stored = self.db.get_policy(community_id).await?;
        Ok(Threshold::from_stored(stored.delete_threshold).unwrap_or(DEFAULT_DELETE_THRESHOLD))
    }

    pub async fn get_react_threshold(&self, community_id: &str) -> Result<Threshold> {
        let stored = self.db.get_policy(community_id).await?;
        Ok(Threshold::from_stored(stored.react_threshold).unwrap_or(DEFAULT_REACT_THRESHOLD))
    }

    pub async fn get_log_destination(&self, community_id: &str) -> Result<Option<String>> {
        Ok(self.db.get_policy(community_id).await?.log_channel)
    }

    /// Persist a new delete threshold. Takes effect on the next message.
    pub async fn set_delete_threshold(&self, community_id: &str, value: Threshold) -> Result<()> {
        self.db.set_delete_threshold(community_id, value.value()).await?;
        info!(community_id, threshold = %value, "Delete threshold updated");
        Ok(())
    }

    /// Persist a new reaction threshold. Takes effect on the next message.
    pub async fn set_react_threshold(&self, community_id: &str, value: Threshold) -> Result<()> {
        self.db.set_react_threshold(community_id, value.value()).await?;
        info!(community_id, threshold = %value, "Reaction threshold updated");
        Ok(())
    }

    pub async fn set_log_destination(&self, community_id: &str, channel_id: &str) -> Result<()> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(ModerationError::InvalidChannel {
                input: channel_id.to_string(),
            });
        }
        self.db.set_log_channel(community_id, channel_id).await?;
        info!(community_id, channel_id, "Log channel updated");
        Ok(())
    }

    pub async fn clear_log_destination(&self, community_id: &str) -> Result<()> {
        self.db.clear_log_channel(community_id).await?;
        info!(community_id, "Log channel cleared");
        Ok(())
    }

    /// Resolve every setting for display in one read.
    pub async fn snapshot(&self, community_id: &str) -> Result<PolicySnapshot> {
        let stored = self.db.get_policy(community_id).await?;
        let resolve = |value: Option<u8>, default: Threshold| match Threshold::from_stored(value) {
            Some(threshold) => EffectiveThreshold {
                threshold,
                is_default: false,
            },
            None => EffectiveThreshold {
                threshold: default,
                is_default: true,
            },
        };
        Ok(PolicySnapshot {
            community_id: community_id.to_string(),
            delete: resolve(stored.delete_threshold, DEFAULT_DELETE_THRESHOLD),
            react: resolve(stored.react_threshold, DEFAULT_REACT_THRESHOLD),
            log_channel: stored.log_channel,
        })
    }
}
