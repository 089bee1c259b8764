//! Concurrency, exclusivity and cancellation of batch runs.

mod common;

use common::*;
use linkscout::batch::RunState;
use linkscout::config::EngineConfig;
use linkscout::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_test::assert_err;
use tokio_util::sync::CancellationToken;

fn many(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://example.com/page/{}", i)).collect()
}

#[tokio::test]
async fn test_concurrency_never_exceeds_batch_size() {
    let checker = Arc::new(FakeChecker {
        delay: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let cfg = EngineConfig {
        batch_size: 3,
        ..Default::default()
    };
    let o = orchestrator(checker.clone(), ScriptedProvider::new(vec![]), FakePages::default(), cfg);
    let urls = many(10);
    let refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = o.process_urls(records(&refs), &tx, None).await.unwrap();
    drop(tx);

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.stats.valid, 10);
    assert_eq!(checker.calls.load(Ordering::SeqCst), 10);
    let peak = checker.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {}", peak);
    assert!(peak >= 2, "batch ran sequentially");

    // Progress strictly precedes completion.
    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    let complete_at = events
        .iter()
        .position(|e| matches!(e, BatchEvent::ProcessingComplete { .. }))
        .unwrap();
    assert_eq!(complete_at, events.len() - 1);
    let mut last_count = 0;
    for e in &events {
        if let BatchEvent::UrlProcessed {
            processed_count,
            progress,
            ..
        } = e
        {
            assert_eq!(*processed_count, last_count + 1);
            assert!(*progress <= 100.0);
            last_count = *processed_count;
        }
    }
    assert_eq!(last_count, 10);
}

#[tokio::test]
async fn test_second_run_is_refused_while_first_is_active() {
    let hold = Arc::new(Semaphore::new(0));
    let checker = Arc::new(FakeChecker {
        hold: Some(hold.clone()),
        ..Default::default()
    });
    let o = orchestrator(checker, ScriptedProvider::new(vec![]), FakePages::default(), EngineConfig::default());
    let (tx, _rx) = mpsc::unbounded_channel();

    let (first, second) = tokio::join!(
        o.process_urls(records(&["https://example.com/a", "https://example.com/b"]), &tx, None),
        async {
            while !o.is_processing() {
                tokio::task::yield_now().await;
            }
            let refused = o
                .process_urls(records(&["https://example.com/c"]), &tx, None)
                .await;
            hold.add_permits(16);
            refused
        }
    );

    let err = assert_err!(second);
    assert_eq!(err, LinkScoutError::AlreadyInProgress);
    let first = first.unwrap();
    assert_eq!(first.state, RunState::Completed);
    assert_eq!(first.results.len(), 2);
    assert!(!o.is_processing());
}

#[tokio::test]
async fn test_cancel_mid_run_stops_at_batch_boundary() {
    let token = CancellationToken::new();
    let checker = Arc::new(FakeChecker {
        cancel_after: Some((2, token.clone())),
        ..Default::default()
    });
    let cfg = EngineConfig {
        batch_size: 2,
        ..Default::default()
    };
    let o = orchestrator(checker.clone(), ScriptedProvider::new(vec![]), FakePages::default(), cfg);
    let urls = many(6);
    let refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = o.process_urls(records(&refs), &tx, Some(&token)).await.unwrap();
    drop(tx);

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(o.state(), RunState::Aborted);
    assert_eq!(report.results.len(), 2);
    assert_eq!((report.stats.processed, report.stats.total), (2, 6));
    assert_eq!(checker.calls.load(Ordering::SeqCst), 2);

    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    let processed = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::UrlProcessed { .. }))
        .count();
    assert_eq!(processed, 2);
    assert_eq!(events.last(), Some(&BatchEvent::ProcessingAborted {}));
    assert!(!events
        .iter()
        .any(|e| matches!(e, BatchEvent::ProcessingComplete { .. })));

    // The orchestrator is reusable after an abort.
    assert!(!o.is_processing());
    let (tx, _rx) = mpsc::unbounded_channel();
    let again = o.process_urls(records(&refs[..1]), &tx, None).await.unwrap();
    assert_eq!(again.state, RunState::Completed);
}

#[tokio::test]
async fn test_cancel_during_replacement_search_lets_started_links_finish() {
    let token = CancellationToken::new();
    let gone_a = "https://example.com/gone/alpha-guide.html";
    let gone_b = "https://example.com/gone/beta-guide.html";
    let checker = Arc::new(FakeChecker {
        delay: Some(Duration::from_millis(10)),
        ..FakeChecker::with_statuses(&[(gone_a, 404), (gone_b, 404)])
    });
    // The first search request cancels the run; the request itself still completes.
    let provider = ScriptedProvider::cancelling(
        vec![hit("https://example.com/docs/alpha-guide", "Alpha guide")],
        token.clone(),
    );
    let pages = FakePages::new(&[("https://example.com/docs/alpha-guide", "the alpha guide, moved")]);
    let cfg = EngineConfig {
        batch_size: 4,
        ..Default::default()
    };
    let o = orchestrator(checker.clone(), provider.clone(), pages, cfg);
    let urls = [
        "https://example.com/ok/1",
        gone_a,
        "https://example.com/ok/2",
        gone_b,
        "https://example.com/ok/3",
        "https://example.com/ok/4",
    ];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = o.process_urls(records(&urls), &tx, Some(&token)).await.unwrap();
    drop(tx);

    assert_eq!(report.state, RunState::Aborted);
    // The whole first batch had started, so all four are reported; the second never began.
    assert_eq!(report.results.len(), 4);
    assert_eq!((report.stats.processed, report.stats.total), (4, 6));
    assert_eq!(report.stats.valid, 2);
    assert_eq!(report.stats.interrupted, 2);
    assert_eq!(report.stats.replaced, 0);

    for r in &report.results {
        if r.record.original_url.contains("/gone/") {
            assert_eq!(r.http_status, Some(404));
            assert!(r.replacement.is_none());
            let attempt = r.search_attempt.as_ref().expect("search attempt recorded");
            assert!(attempt.interrupted, "{} not marked", r.record.original_url);
            assert_eq!(attempt.candidates_validated, 0);
        } else {
            assert_eq!(r.status, UrlStatus::Valid);
            assert!(r.search_attempt.is_none());
        }
    }
    // Link checks only: no candidate was validated after the cancel.
    assert_eq!(checker.calls.load(Ordering::SeqCst), 4);
    assert!(!provider.queries.lock().unwrap().is_empty());

    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    let processed = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::UrlProcessed { .. }))
        .count();
    assert_eq!(processed, 4);
    assert_eq!(events.last(), Some(&BatchEvent::ProcessingAborted {}));
}

#[tokio::test]
async fn test_abort_cancels_active_run() {
    let hold = Arc::new(Semaphore::new(0));
    let checker = Arc::new(FakeChecker {
        hold: Some(hold.clone()),
        ..Default::default()
    });
    let cfg = EngineConfig {
        batch_size: 1,
        ..Default::default()
    };
    let o = orchestrator(checker.clone(), ScriptedProvider::new(vec![]), FakePages::default(), cfg);
    let (tx, _rx) = mpsc::unbounded_channel();

    let (report, aborted) = tokio::join!(
        o.process_urls(records(&["https://example.com/a", "https://example.com/b"]), &tx, None),
        async {
            while checker.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            let aborted = o.abort();
            hold.add_permits(16);
            aborted
        }
    );
    assert!(aborted);
    let report = report.unwrap();
    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.results.len(), 1);
    assert!(!o.abort());
}
