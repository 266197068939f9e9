// Inbound event feed: the consumer loop that drives moderation.
//
// Events arrive as JSON lines, one chat message each. They are handled
// strictly one at a time: classify, decide, hand the action to the sink,
// then read the next line. No two messages ever interleave inside the
// engine's read-modify-write sequence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use crate::moderation::sink::ActionSink;
use crate::moderation::{Action, ModerationEngine, ScoredMessage};
use crate::toxicity::{score_or_skip, ToxicityScorer};

/// One message as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub author_id: String,
    pub community_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub text: String,
    #[serde(default)]
    pub is_bot_author: bool,
}

impl ChatEvent {
    /// Attach a classifier result to this event.
    pub fn scored(&self, toxicity: Option<f64>) -> ScoredMessage {
        ScoredMessage {
            author_id: self.author_id.clone(),
            community_id: self.community_id.clone(),
            channel_id: self.channel_id.clone(),
            message_id: self.message_id.clone(),
            toxicity,
            raw_text: self.text.clone(),
        }
    }
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Bot-authored; never reached the engine.
    FromBot,
    /// The engine produced `action`. `scored` is false when the classifier failed.
    Decided { action: Action, scored: bool },
}

/// Running totals for one pass over the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub received: u64,
    pub malformed: u64,
    pub from_bots: u64,
    pub unscored: u64,
    pub deleted: u64,
    pub reacted: u64,
    pub ignored: u64,
    pub failed: u64,
}

impl FeedStats {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::FromBot => self.from_bots += 1,
            EventOutcome::Decided { action, scored } => {
                if !scored {
                    self.unscored += 1;
                }
                match action {
                    Action::Delete { .. } => self.deleted += 1,
                    Action::React => self.reacted += 1,
                    Action::None => self.ignored += 1,
                }
            }
        }
    }
}

/// Classify, decide and dispatch a single event.
pub async fn handle_event(
    event: &ChatEvent,
    scorer: &dyn ToxicityScorer,
    engine: &ModerationEngine,
    sink: &dyn ActionSink,
) -> Result<EventOutcome> {
    if event.is_bot_author {
        debug!(message_id = %event.message_id, "Ignoring bot-authored message");
        return Ok(EventOutcome::FromBot);
    }

    let result = score_or_skip(scorer, &event.text).await;
    let scored = result.is_some();
    let message = event.scored(result.map(|r| r.toxicity));

    let action = engine
        .evaluate(&message)
        .await
        .with_context(|| format!("Failed to moderate message {}", event.message_id))?;

    sink.apply(event, &action)
        .await
        .with_context(|| format!("Failed to dispatch {} action", action.kind()))?;

    Ok(EventOutcome::Decided { action, scored })
}

/// Consume JSON-lines events until EOF.
///
/// Malformed lines and per-message failures are logged and skipped; only a
/// failure to read the input itself ends the loop with an error.
pub async fn run<R>(
    reader: R,
    scorer: &dyn ToxicityScorer,
    engine: &ModerationEngine,
    sink: &dyn ActionSink,
) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read event feed")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.received += 1;

        let event: ChatEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping malformed event");
                stats.malformed += 1;
                continue;
            }
        };

        match handle_event(&event, scorer, engine, sink).await {
            Ok(outcome) => stats.record(&outcome),
            Err(e) => {
                let detail = format!("{e:#}");
                error!(message_id = %event.message_id, error = %detail, "Event failed");
                stats.failed += 1;
            }
        }
    }

    info!(
        received = stats.received,
        deleted = stats.deleted,
        reacted = stats.reacted,
        unscored = stats.unscored,
        failed = stats.failed,
        "Event feed drained"
    );
    Ok(stats)
}
