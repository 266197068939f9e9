// End-to-end moderation flow: JSON-lines feed -> classifier -> engine -> sink.
//
// Storage is in-memory SQLite. The classifier is a stub that reads the score
// out of the message text ("tox=80"), and fails on anything else, so every
// test controls exactly what the engine sees.

#![cfg(feature = "sqlite")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Duration;

use mannerly::db::models::{PolicyRow, RankedUser, StoredPolicy, UserAggregate};
use mannerly::db::{open_sqlite_in_memory, Database};
use mannerly::feed::{self, ChatEvent, FeedStats};
use mannerly::moderation::retry::RetryPolicy;
use mannerly::moderation::sink::ActionSink;
use mannerly::moderation::{Action, ModerationEngine, Threshold};
use mannerly::reputation::calculator::reputation;
use mannerly::reputation::rank::RankQuery;
use mannerly::reputation::store::BackfillOutcome;
use mannerly::toxicity::{ToxicityResult, ToxicityScorer};

// ============================================================
// Test doubles
// ============================================================

/// Scores "tox=N" as N; anything else is a classifier failure.
struct TextScorer;

#[async_trait]
impl ToxicityScorer for TextScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        let value = text
            .strip_prefix("tox=")
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| anyhow::anyhow!("classifier timed out"))?;
        Ok(ToxicityResult {
            toxicity: value,
            detected_language: Some("en".into()),
        })
    }
}

/// Remembers every (message_id, action kind) it is handed.
#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<(String, &'static str)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionSink for RecordingSink {
    async fn apply(&self, event: &ChatEvent, action: &Action) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((event.message_id.clone(), action.kind()));
        Ok(())
    }
}

/// Wraps a real database and fails the next `failures` aggregate increments
/// and the next `ranking_failures` ranking writes. `lost_acks` increments
/// commit and then report an error, like a connection dropped mid-reply.
struct FlakyDatabase {
    inner: Arc<dyn Database>,
    failures: AtomicU32,
    ranking_failures: AtomicU32,
    lost_acks: AtomicU32,
}

impl FlakyDatabase {
    fn new(inner: Arc<dyn Database>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            ranking_failures: AtomicU32::new(0),
            lost_acks: AtomicU32::new(0),
        }
    }

    fn lose_increment_acks(&self, count: u32) {
        self.lost_acks.store(count, Ordering::SeqCst);
    }

    fn fail_ranking_writes(&self, count: u32) {
        self.ranking_failures.store(count, Ordering::SeqCst);
    }
}

/// Consume one pending failure, if any are left.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Database for FlakyDatabase {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
    async fn table_count(&self) -> Result<i64> {
        self.inner.table_count().await
    }
    async fn increment_aggregate(&self, user_id: &str, toxicity: f64) -> Result<UserAggregate> {
        if take_failure(&self.failures) {
            anyhow::bail!("connection refused");
        }
        let aggregate = self.inner.increment_aggregate(user_id, toxicity).await?;
        if take_failure(&self.lost_acks) {
            anyhow::bail!("connection closed before reply");
        }
        Ok(aggregate)
    }
    async fn get_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        self.inner.get_aggregate(user_id).await
    }
    async fn all_aggregates(&self) -> Result<Vec<(String, UserAggregate)>> {
        self.inner.all_aggregates().await
    }
    async fn put_aggregate(&self, user_id: &str, aggregate: &UserAggregate) -> Result<()> {
        self.inner.put_aggregate(user_id, aggregate).await
    }
    async fn aggregate_count(&self) -> Result<u64> {
        self.inner.aggregate_count().await
    }
    async fn upsert_ranking(&self, user_id: &str, reputation: f64) -> Result<()> {
        if take_failure(&self.ranking_failures) {
            anyhow::bail!("connection reset by peer");
        }
        self.inner.upsert_ranking(user_id, reputation).await
    }
    async fn ranking_position(&self, user_id: &str) -> Result<Option<(u64, u64)>> {
        self.inner.ranking_position(user_id).await
    }
    async fn ranking_len(&self) -> Result<u64> {
        self.inner.ranking_len().await
    }
    async fn all_rankings(&self) -> Result<Vec<(String, f64)>> {
        self.inner.all_rankings().await
    }
    async fn top_ranked(&self, limit: u32) -> Result<Vec<RankedUser>> {
        self.inner.top_ranked(limit).await
    }
    async fn get_policy(&self, community_id: &str) -> Result<StoredPolicy> {
        self.inner.get_policy(community_id).await
    }
    async fn all_policies(&self) -> Result<Vec<PolicyRow>> {
        self.inner.all_policies().await
    }
    async fn set_delete_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        self.inner.set_delete_threshold(community_id, value).await
    }
    async fn set_react_threshold(&self, community_id: &str, value: u8) -> Result<()> {
        self.inner.set_react_threshold(community_id, value).await
    }
    async fn set_log_channel(&self, community_id: &str, channel_id: &str) -> Result<()> {
        self.inner.set_log_channel(community_id, channel_id).await
    }
    async fn clear_log_channel(&self, community_id: &str) -> Result<()> {
        self.inner.clear_log_channel(community_id).await
    }
    async fn policy_count(&self) -> Result<u64> {
        self.inner.policy_count().await
    }
}

// ============================================================
// Helpers
// ============================================================

fn event(author: &str, message_id: &str, text: &str) -> String {
    serde_json::to_string(&ChatEvent {
        author_id: author.into(),
        community_id: "guild".into(),
        channel_id: "general".into(),
        message_id: message_id.into(),
        text: text.into(),
        is_bot_author: false,
    })
    .unwrap()
}

async fn run_lines(engine: &ModerationEngine, sink: &RecordingSink, lines: &[String]) -> FeedStats {
    let input = lines.join("\n");
    feed::run(input.as_bytes(), &TextScorer, engine, sink)
        .await
        .unwrap()
}

fn engine() -> ModerationEngine {
    ModerationEngine::new(open_sqlite_in_memory().unwrap()).with_retry(RetryPolicy::none())
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test]
async fn thresholds_change_between_messages() {
    let engine = engine();
    let sink = RecordingSink::default();

    // Defaults 70/50: first message at 80 is deleted
    run_lines(&engine, &sink, &[event("u", "m1", "tox=80")]).await;
    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 1);
    assert!((reputation(&agg).unwrap() - 20.0).abs() < 1e-9);

    // Delete disabled: 90 falls through to react
    engine
        .policy()
        .set_delete_threshold("guild", Threshold::DISABLED)
        .await
        .unwrap();
    run_lines(&engine, &sink, &[event("u", "m2", "tox=90")]).await;

    // Both disabled: nothing fires, but the message still counts
    engine
        .policy()
        .set_react_threshold("guild", Threshold::DISABLED)
        .await
        .unwrap();
    run_lines(&engine, &sink, &[event("u", "m3", "tox=100")]).await;

    assert_eq!(
        sink.kinds(),
        vec![
            ("m1".to_string(), "delete"),
            ("m2".to_string(), "react"),
            ("m3".to_string(), "none"),
        ]
    );

    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 3);
    assert!((agg.toxicity_sum - 270.0).abs() < 1e-9);
    assert!((reputation(&agg).unwrap() - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn threshold_boundary_is_exclusive() {
    let engine = engine();
    let sink = RecordingSink::default();
    engine
        .policy()
        .set_delete_threshold("guild", Threshold::new(60).unwrap())
        .await
        .unwrap();

    run_lines(
        &engine,
        &sink,
        &[
            event("u", "at", "tox=60"),
            event("u", "over", "tox=60.01"),
            event("u", "react-edge", "tox=50"),
        ],
    )
    .await;

    assert_eq!(
        sink.kinds(),
        vec![
            ("at".to_string(), "react"),
            ("over".to_string(), "delete"),
            ("react-edge".to_string(), "none"),
        ]
    );
}

#[tokio::test]
async fn classifier_failure_leaves_no_trace() {
    let engine = engine();
    let sink = RecordingSink::default();

    let stats = run_lines(&engine, &sink, &[event("u", "m1", "the classifier chokes on this")]).await;

    assert_eq!(stats.unscored, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(sink.kinds(), vec![("m1".to_string(), "none")]);
    assert!(engine.scores().get_aggregate("u").await.unwrap().is_none());
    assert!(engine.scores().rank_of("u").await.unwrap().is_none());
}

#[tokio::test]
async fn bots_and_garbage_never_reach_the_engine() {
    let engine = engine();
    let sink = RecordingSink::default();

    let bot = serde_json::json!({
        "author_id": "bot",
        "community_id": "guild",
        "channel_id": "general",
        "message_id": "b1",
        "text": "tox=99",
        "is_bot_author": true
    })
    .to_string();

    let stats = run_lines(
        &engine,
        &sink,
        &[bot, "{not json".to_string(), String::new(), event("u", "m1", "tox=10")],
    )
    .await;

    assert_eq!(stats.received, 3);
    assert_eq!(stats.from_bots, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(sink.kinds(), vec![("m1".to_string(), "none")]);
    assert!(engine.scores().get_aggregate("bot").await.unwrap().is_none());
}

#[tokio::test]
async fn deletion_is_logged_when_a_channel_is_set() {
    let engine = engine();
    engine
        .policy()
        .set_log_destination("guild", "mod-log")
        .await
        .unwrap();

    let message = ChatEvent {
        author_id: "u".into(),
        community_id: "guild".into(),
        channel_id: "general".into(),
        message_id: "m1".into(),
        text: "awful".into(),
        is_bot_author: false,
    }
    .scored(Some(95.5));

    match engine.evaluate(&message).await.unwrap() {
        Action::Delete {
            notification,
            log_entry: Some(entry),
        } => {
            assert_eq!(notification.mention_user_id, "u");
            assert!(notification.text.contains("95.50%"));
            assert_eq!(entry.destination_channel_id, "mod-log");
            assert_eq!(entry.text, "awful");
            assert_eq!(entry.toxicity, 95.5);
        }
        other => panic!("expected logged delete, got {other:?}"),
    }
}

// ============================================================
// Storage failures
// ============================================================

#[tokio::test]
async fn transient_storage_failure_is_retried() {
    let db: Arc<dyn Database> = Arc::new(FlakyDatabase::new(open_sqlite_in_memory().unwrap(), 2));
    let engine = ModerationEngine::new(db).with_retry(RetryPolicy::new(3, Duration::ZERO));
    let sink = RecordingSink::default();

    let stats = run_lines(&engine, &sink, &[event("u", "m1", "tox=80")]).await;

    assert_eq!(stats.failed, 0);
    assert_eq!(stats.deleted, 1);
    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 1);
}

#[tokio::test]
async fn exhausted_retries_skip_only_that_message() {
    let db: Arc<dyn Database> = Arc::new(FlakyDatabase::new(open_sqlite_in_memory().unwrap(), 3));
    let engine = ModerationEngine::new(db).with_retry(RetryPolicy::new(3, Duration::ZERO));
    let sink = RecordingSink::default();

    let stats = run_lines(
        &engine,
        &sink,
        &[event("u", "lost", "tox=80"), event("u", "kept", "tox=20")],
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(sink.kinds(), vec![("kept".to_string(), "none")]);

    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 1);
    assert!((agg.toxicity_sum - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn retry_after_lost_commit_ack_counts_message_again() {
    let flaky = Arc::new(FlakyDatabase::new(open_sqlite_in_memory().unwrap(), 0));
    flaky.lose_increment_acks(1);
    let db: Arc<dyn Database> = flaky.clone();
    let engine = ModerationEngine::new(db).with_retry(RetryPolicy::new(3, Duration::ZERO));
    let sink = RecordingSink::default();

    let stats = run_lines(&engine, &sink, &[event("u", "m1", "tox=40")]).await;

    // Recording is at-least-once: the committed first attempt is not undone
    assert_eq!(stats.failed, 0);
    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 2);
    assert!((agg.toxicity_sum - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn backfill_repairs_ranking_after_failed_ranking_write() {
    let flaky = Arc::new(FlakyDatabase::new(open_sqlite_in_memory().unwrap(), 0));
    let db: Arc<dyn Database> = flaky.clone();
    let engine = ModerationEngine::new(db).with_retry(RetryPolicy::new(3, Duration::ZERO));
    let sink = RecordingSink::default();

    run_lines(&engine, &sink, &[event("a", "m0", "tox=10")]).await;
    flaky.fail_ranking_writes(3);
    let stats = run_lines(&engine, &sink, &[event("b", "m1", "tox=95")]).await;

    // The aggregate committed; the ranking write never did
    assert_eq!(stats.failed, 1);
    let agg = engine.scores().get_aggregate("b").await.unwrap().unwrap();
    assert_eq!(agg.message_count, 1);
    assert!((agg.toxicity_sum - 95.0).abs() < 1e-9);
    assert_eq!(engine.scores().rank_of("b").await.unwrap(), None);

    let outcome = engine.scores().backfill_ranking().await.unwrap();
    assert_eq!(outcome, BackfillOutcome::Repaired(1));
    let position = engine.scores().rank_of("b").await.unwrap().unwrap();
    assert_eq!((position.rank, position.total), (2, 2));

    assert_eq!(
        engine.scores().backfill_ranking().await.unwrap(),
        BackfillOutcome::Consistent
    );
}

// ============================================================
// Ranking
// ============================================================

#[tokio::test]
async fn ranking_tracks_every_message() {
    let engine = engine();
    let sink = RecordingSink::default();

    run_lines(
        &engine,
        &sink,
        &[
            event("polite", "m1", "tox=5"),
            event("rude", "m2", "tox=60"),
            event("middling", "m3", "tox=30"),
        ],
    )
    .await;

    let ranks = RankQuery::new(engine.scores().clone());
    let board = ranks.leaderboard(10).await.unwrap();
    let order: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(order, vec!["polite", "middling", "rude"]);

    // Top of three sits at round(100 / 3, 2)
    assert_eq!(ranks.percentile("polite").await.unwrap(), Some(33.33));
    assert_eq!(ranks.percentile("rude").await.unwrap(), Some(100.0));
    assert_eq!(ranks.percentile("nobody").await.unwrap(), None);

    // A clean streak moves "rude" past "middling"
    run_lines(
        &engine,
        &sink,
        &[
            event("rude", "m4", "tox=0"),
            event("rude", "m5", "tox=0"),
            event("rude", "m6", "tox=0"),
            event("rude", "m7", "tox=0"),
        ],
    )
    .await;
    // rude: 60 / 5 = 12 avg -> 88, ahead of middling (70), behind polite (95)
    let position = engine.scores().rank_of("rude").await.unwrap().unwrap();
    assert_eq!(position.rank, 2);
    assert_eq!(position.total, 3);
}

#[tokio::test]
async fn aggregate_matches_running_sum() {
    let engine = engine();
    let scores = [12.5, 0.0, 99.99, 47.25, 63.0, 3.33];
    for score in scores {
        engine.scores().record_observation("u", score).await.unwrap();
    }
    let agg = engine.scores().get_aggregate("u").await.unwrap().unwrap();
    let sum: f64 = scores.iter().sum();
    assert_eq!(agg.message_count, scores.len() as u64);
    assert!((agg.toxicity_sum - sum).abs() < 1e-9);
    let expected = 100.0 - sum / scores.len() as f64;
    assert!((reputation(&agg).unwrap() - expected).abs() < 1e-9);
}
