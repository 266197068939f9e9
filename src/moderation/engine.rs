// ModerationEngine: turns one scored message into one action.
//
// Order per message:
//   1. no score            -> None, nothing written
//   2. record observation, then write the new reputation to the ranking
//   3. over the delete threshold -> Delete (react is never considered)
//   4. over the react threshold  -> React
//   5. otherwise                 -> None
//
// Thresholds are read fresh for every message, so an admin change applies
// to the next message evaluated after it is written.
//
// Recording is at-least-once. A connection lost after the increment commits
// surfaces as StorageUnavailable and is retried, counting the message twice.
// SQLite cannot fail that way; on Postgres the window is the commit
// acknowledgement. If the ranking write exhausts its retries the aggregate
// stays committed and `ScoreStore::backfill_ranking` repairs the entry.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::action::{deletion_notice, Action, LogEntry, Notification, ScoredMessage, NOTIFICATION_TTL_SECS};
use super::policy::ThresholdPolicy;
use super::retry::RetryPolicy;
use crate::db::Database;
use crate::error::Result;
use crate::reputation::calculator::reputation;
use crate::reputation::store::ScoreStore;

#[derive(Clone)]
pub struct ModerationEngine {
    scores: ScoreStore,
    policy: ThresholdPolicy,
    retry: RetryPolicy,
}

impl ModerationEngine {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            scores: ScoreStore::new(db.clone()),
            policy: ThresholdPolicy::new(db),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn scores(&self) -> &ScoreStore {
        &self.scores
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Decide what to do with one message, updating the author's record.
    pub async fn evaluate(&self, message: &ScoredMessage) -> Result<Action> {
        let Some(toxicity) = message.toxicity else {
            debug!(
                message_id = %message.message_id,
                "No toxicity score, leaving message unmoderated"
            );
            return Ok(Action::None);
        };

        if !(0.0..=100.0).contains(&toxicity) {
            warn!(
                message_id = %message.message_id,
                toxicity,
                "Toxicity score outside 0-100, treating as unscored"
            );
            return Ok(Action::None);
        }

        let author = message.author_id.as_str();
        let community = message.community_id.as_str();
        let scores = &self.scores;
        let policy = &self.policy;

        // Not idempotent: see the at-least-once note above
        let aggregate = self
            .retry
            .run("record_observation", move || {
                scores.record_observation(author, toxicity)
            })
            .await?;

        // The ranking must see the aggregate we just wrote, never an older one
        let score = reputation(&aggregate)?;
        self.retry
            .run("update_ranking", move || scores.update_ranking(author, score))
            .await?;

        let delete_threshold = self
            .retry
            .run("get_delete_threshold", move || {
                policy.get_delete_threshold(community)
            })
            .await?;

        if delete_threshold.is_exceeded_by(toxicity) {
            let destination = self
                .retry
                .run("get_log_destination", move || {
                    policy.get_log_destination(community)
                })
                .await?;

            let log_entry = destination.map(|destination_channel_id| LogEntry {
                destination_channel_id,
                author_id: message.author_id.clone(),
                channel_id: message.channel_id.clone(),
                message_id: message.message_id.clone(),
                toxicity,
                text: message.raw_text.clone(),
                recorded_at: Utc::now(),
            });

            info!(
                author_id = author,
                community_id = community,
                message_id = %message.message_id,
                toxicity,
                threshold = %delete_threshold,
                logged = log_entry.is_some(),
                "Deleting message"
            );

            return Ok(Action::Delete {
                notification: Notification {
                    mention_user_id: message.author_id.clone(),
                    text: deletion_notice(toxicity),
                    expires_after_secs: Some(NOTIFICATION_TTL_SECS),
                },
                log_entry,
            });
        }

        let react_threshold = self
            .retry
            .run("get_react_threshold", move || {
                policy.get_react_threshold(community)
            })
            .await?;

        if react_threshold.is_exceeded_by(toxicity) {
            info!(
                author_id = author,
                community_id = community,
                message_id = %message.message_id,
                toxicity,
                threshold = %react_threshold,
                "Reacting to message"
            );
            return Ok(Action::React);
        }

        debug!(
            message_id = %message.message_id,
            toxicity,
            "Message under thresholds"
        );
        Ok(Action::None)
    }
}
