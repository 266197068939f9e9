// Moderation: per-community thresholds and the decision engine that applies
// them to each scored message.

pub mod action;
pub mod engine;
pub mod policy;
pub mod retry;
pub mod sink;

pub use action::{Action, ScoredMessage};
pub use engine::ModerationEngine;
pub use policy::{Threshold, ThresholdPolicy};
