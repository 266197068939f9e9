// Google Perspective API implementation.
//
// Perspective analyzes comment text and returns a TOXICITY probability in
// 0..1. We scale it to a 0-100 percentage rounded to two decimals, which is
// the unit every threshold and aggregate in this crate uses.
//
// API docs: https://developers.perspectiveapi.com/s/about-the-api-methods

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::traits::{ToxicityResult, ToxicityScorer};
use crate::output::truncate_chars;

pub const DEFAULT_ENDPOINT: &str = "https://commentanalyzer.googleapis.com/v1alpha1";

/// Perspective API toxicity scorer.
pub struct PerspectiveScorer {
    client: Client,
    api_key: String,
    endpoint: String,
    rate_limiter: RateLimiter,
}

impl PerspectiveScorer {
    /// Create a scorer allowing `requests_per_second` calls.
    pub fn new(api_key: String, requests_per_second: f64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            rate_limiter: RateLimiter::new(requests_per_second),
        })
    }

    /// Point the scorer at a different base URL (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ToxicityScorer for PerspectiveScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        // Respect rate limits before making the call
        self.rate_limiter.acquire().await;

        let url = format!("{}/comments:analyze", self.endpoint);
        let request = build_request(text);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to call Perspective API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Perspective API returned {}: {}", status, body);
        }

        let body: PerspectiveResponse = response
            .json()
            .await
            .context("Failed to parse Perspective API response")?;

        let result = interpret_response(&body)?;

        debug!(
            toxicity = result.toxicity,
            language = ?result.detected_language,
            text_preview = %truncate_chars(text, 50),
            "Scored text"
        );

        Ok(result)
    }
}

/// Request body asking for the TOXICITY attribute only.
pub fn build_request(text: &str) -> PerspectiveRequest {
    let mut requested_attributes = HashMap::new();
    requested_attributes.insert("TOXICITY".to_string(), AttributeConfig {});
    PerspectiveRequest {
        comment: Comment {
            text: text.to_string(),
        },
        requested_attributes,
    }
}

/// Turn a decoded response into a 0-100 score.
///
/// A response without a TOXICITY summary, or with a value outside 0..1, is
/// malformed and reported as an error.
pub fn interpret_response(body: &PerspectiveResponse) -> Result<ToxicityResult> {
    let value = body
        .attribute_scores
        .get("TOXICITY")
        .map(|score| score.summary_score.value)
        .context("Perspective response has no TOXICITY summary score")?;

    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("Perspective TOXICITY value {value} is outside 0..1");
    }

    Ok(ToxicityResult {
        toxicity: (value * 100.0 * 100.0).round() / 100.0,
        detected_language: body.detected_languages.first().cloned(),
    })
}

// --- Perspective API request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveRequest {
    comment: Comment,
    requested_attributes: HashMap<String, AttributeConfig>,
}

#[derive(Debug, Serialize)]
struct Comment {
    text: String,
}

#[derive(Debug, Serialize)]
struct AttributeConfig {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveResponse {
    #[serde(default)]
    attribute_scores: HashMap<String, AttributeScore>,
    #[serde(default)]
    detected_languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Debug, Deserialize)]
struct SummaryScore {
    value: f64,
}
