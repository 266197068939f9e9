// ActionSink: where decided actions go.
//
// The engine only decides. A sink hands the decision to whatever actually
// talks to the chat platform: a terminal for dry runs, or a JSON-lines
// stream a platform adapter process reads from.

use std::io::Write;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::action::{Action, REACTION_EMOJI};
use crate::feed::ChatEvent;

#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Carry out (or forward) the action decided for `event`.
    async fn apply(&self, event: &ChatEvent, action: &Action) -> Result<()>;
}

/// Prints each decision in color. Useful for dry runs against a recorded feed.
pub struct TerminalSink {
    /// Also print messages that needed no action.
    pub show_none: bool,
}

#[async_trait]
impl ActionSink for TerminalSink {
    async fn apply(&self, event: &ChatEvent, action: &Action) -> Result<()> {
        if matches!(action, Action::None) && !self.show_none {
            return Ok(());
        }
        crate::output::terminal::display_action(event, action);
        Ok(())
    }
}

/// One line of JSON output per decision.
#[derive(Serialize)]
struct SinkRecord<'a> {
    community_id: &'a str,
    channel_id: &'a str,
    message_id: &'a str,
    author_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    emoji: Option<&'static str>,
    #[serde(flatten)]
    action: &'a Action,
}

/// Writes every decision as a JSON object on its own line.
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

/// Serialize one decision to a JSON line (no trailing newline).
pub fn encode_record(event: &ChatEvent, action: &Action) -> Result<String> {
    let record = SinkRecord {
        community_id: &event.community_id,
        channel_id: &event.channel_id,
        message_id: &event.message_id,
        author_id: &event.author_id,
        emoji: matches!(action, Action::React).then_some(REACTION_EMOJI),
        action,
    };
    Ok(serde_json::to_string(&record)?)
}

#[async_trait]
impl ActionSink for JsonLinesSink {
    async fn apply(&self, event: &ChatEvent, action: &Action) -> Result<()> {
        let line = encode_record(event, action)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON sink writer poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
