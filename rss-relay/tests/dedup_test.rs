mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use rss_relay::dedup::{Decision, RejectReason, Verdict};
use rss_relay::{DuplicateGate, FeedItem, GateConfig, HistoryItem, RelayError, TokenCosine};
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn candidate(title: &str, link: &str) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        link: link.to_string(),
        id: link.to_string(),
    }
}

fn past(title: &str, link: &str, hours_ago: i64) -> HistoryItem {
    HistoryItem {
        title: title.to_string(),
        link: link.to_string(),
        published_at: now() - Duration::hours(hours_ago),
    }
}

fn scripted_gate(similarity: &Arc<ScriptedSimilarity>) -> DuplicateGate {
    init_tracing();
    DuplicateGate::new(GateConfig::default(), similarity.clone())
}

#[tokio::test]
async fn links_differing_only_in_query_are_duplicates() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    let gate = scripted_gate(&similarity);
    let history = vec![past("Unrelated wording", "http://x.com/a?utm=1", 1)];

    let decision = gate
        .scan_history(&candidate("Other words", "http://x.com/a?utm=2"), Ok(history), now())
        .await;

    assert_eq!(
        decision.verdict,
        Verdict::Reject(RejectReason::SameLink { link: "http://x.com/a?utm=1".to_string() })
    );
}

#[tokio::test]
async fn exact_similarity_threshold_does_not_reject() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    similarity.set("Prior headline", 0.80);
    let gate = scripted_gate(&similarity);

    let decision = gate
        .scan_history(
            &candidate("New headline", "http://x.com/new"),
            Ok(vec![past("Prior headline", "http://x.com/old", 2)]),
            now(),
        )
        .await;

    assert!(decision.is_accepted());
    assert_eq!(decision.warnings.len(), 1);
}

#[tokio::test]
async fn score_above_threshold_rejects() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    similarity.set("Prior headline", 0.81);
    let gate = scripted_gate(&similarity);

    let decision = gate
        .scan_history(
            &candidate("New headline", "http://x.com/new"),
            Ok(vec![past("Prior headline", "http://x.com/old", 2)]),
            now(),
        )
        .await;

    assert!(matches!(
        decision.verdict,
        Verdict::Reject(RejectReason::SimilarTitle { ref title, score }) if title == "Prior headline" && score > 0.8
    ));
}

#[tokio::test]
async fn warning_band_accepts_with_a_warning() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    similarity.set("Close call", 0.76);
    similarity.set("Far away", 0.75);
    let gate = scripted_gate(&similarity);

    let decision = gate
        .scan_history(
            &candidate("Candidate", "http://x.com/new"),
            Ok(vec![past("Close call", "http://x.com/1", 1), past("Far away", "http://x.com/2", 2)]),
            now(),
        )
        .await;

    assert!(decision.is_accepted());
    assert_eq!(decision.warnings.len(), 1);
    assert_eq!(decision.warnings[0].title, "Close call");
}

#[tokio::test]
async fn scan_stops_at_first_item_outside_window() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    let gate = scripted_gate(&similarity);
    let history = vec![
        past("Recent", "http://x.com/recent", 3),
        past("Stale", "http://x.com/dup", 30),
        // out of order on purpose: never reached
        past("Recent again", "http://x.com/dup", 1),
    ];

    let decision = gate
        .scan_history(&candidate("Candidate", "http://x.com/dup"), Ok(history), now())
        .await;

    assert!(decision.is_accepted());
}

#[tokio::test]
async fn scan_is_bounded_by_history_limit() {
    init_tracing();
    let config = GateConfig {
        history_limit: 2,
        ..GateConfig::default()
    };
    let gate = DuplicateGate::new(config, Arc::new(ScriptedSimilarity::default()));
    let history = vec![
        past("One", "http://x.com/1", 1),
        past("Two", "http://x.com/2", 1),
        past("Three", "http://x.com/dup", 1),
    ];

    let decision = gate
        .scan_history(&candidate("Candidate", "http://x.com/dup"), Ok(history), now())
        .await;

    assert!(decision.is_accepted());
}

#[tokio::test]
async fn unavailable_history_fails_open() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    let gate = scripted_gate(&similarity);

    let decision = gate
        .scan_history(
            &candidate("Candidate", "http://x.com/a"),
            Err(RelayError::HistoryUnavailable("timeout".to_string())),
            now(),
        )
        .await;

    assert_eq!(decision, Decision { verdict: Verdict::Accept, warnings: Vec::new() });
}

#[tokio::test]
async fn similarity_failure_fails_open() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    similarity.fail();
    let gate = scripted_gate(&similarity);

    let decision = gate
        .scan_history(
            &candidate("Candidate", "http://x.com/new"),
            Ok(vec![past("Anything", "http://x.com/old", 1)]),
            now(),
        )
        .await;

    assert!(decision.is_accepted());
}

#[tokio::test]
async fn similarity_failure_still_catches_a_repeated_link() {
    let similarity = Arc::new(ScriptedSimilarity::default());
    similarity.fail();
    let gate = scripted_gate(&similarity);
    let history = vec![
        past("Something else", "http://x.com/other", 1),
        past("Earlier post", "http://x.com/dup", 2),
    ];

    let decision = gate
        .scan_history(&candidate("Candidate", "http://x.com/dup"), Ok(history), now())
        .await;

    assert_eq!(
        decision.verdict,
        Verdict::Reject(RejectReason::SameLink { link: "http://x.com/dup".to_string() })
    );
}

#[tokio::test]
async fn blocklist_matches_substrings_ignoring_case() {
    let gate = scripted_gate(&Arc::new(ScriptedSimilarity::default()));
    let blocklist = vec!["Podcast".to_string(), "".to_string()];

    assert_eq!(
        gate.check_blocklist("Weekly PODCASTS roundup", &blocklist),
        Some(RejectReason::Blocked { term: "Podcast".to_string() })
    );
    assert_eq!(gate.check_blocklist("Election results", &blocklist), None);
}

#[tokio::test]
async fn token_model_rejects_reworded_repost() {
    init_tracing();
    let gate = DuplicateGate::new(GateConfig::default(), Arc::new(TokenCosine));
    let history = vec![past("Apple unveils new iPhone at September event", "http://a.com/1", 4)];

    let decision = gate
        .scan_history(
            &candidate("Apple unveils new iPhone at the September event", "http://b.com/2"),
            Ok(history),
            now(),
        )
        .await;

    assert!(matches!(decision.verdict, Verdict::Reject(RejectReason::SimilarTitle { .. })));
}
