// Toxicity scorer trait: the classifier seam.
//
// The moderation core only needs "text in, 0-100 score out, or failure".
// PerspectiveScorer is the production implementation; tests plug in
// fixed or failing scorers behind the same trait.

use anyhow::Result;
use async_trait::async_trait;

/// The result of scoring a single piece of text for toxicity.
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityResult {
    /// Percentage from 0.0 (benign) to 100.0 (very toxic), two decimals.
    pub toxicity: f64,
    /// Language the provider detected, if it reported one.
    pub detected_language: Option<String>,
}

/// Trait for scoring text toxicity. Implementations must be async because
/// providers are HTTP APIs.
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Score a single text for toxicity.
    async fn score_text(&self, text: &str) -> Result<ToxicityResult>;
}

/// Score `text`, folding any failure into `None`.
///
/// Classifier failures are never retried and never surfaced to users; the
/// message just goes unmoderated.
pub async fn score_or_skip(scorer: &dyn ToxicityScorer, text: &str) -> Option<ToxicityResult> {
    if text.trim().is_empty() {
        return None;
    }
    match scorer.score_text(text).await {
        Ok(result) => Some(result),
        Err(e) => {
            let err = crate::error::ModerationError::ClassifierUnavailable(format!("{e:#}"));
            tracing::warn!(error = %err, "Skipping message");
            None
        }
    }
}
