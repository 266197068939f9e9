// Toxicity scoring: trait-based abstraction over the external classifier.
//
// The ToxicityScorer trait defines the interface. PerspectiveScorer
// implements it using Google's Perspective API, so a different provider can
// be swapped in without touching the moderation core.

pub mod perspective;
pub mod rate_limiter;
pub mod traits;

pub use traits::{score_or_skip, ToxicityResult, ToxicityScorer};
