// Mannerly: toxicity moderation and manners reputation for chat communities
//
// This is the library root. Each module corresponds to a major subsystem:
// storage, the reputation model, the per-message moderation decision, and
// the classifier that feeds it.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod moderation;
pub mod output;
pub mod reputation;
pub mod status;
pub mod toxicity;

#[cfg(feature = "web")]
pub mod web;
