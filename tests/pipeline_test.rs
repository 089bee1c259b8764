//! End-to-end replacement discovery through the orchestrator with in-process collaborators.

mod common;

use common::*;
use linkscout::config::EngineConfig;
use linkscout::nlp::terms::extract_terms;
use linkscout::tools::url_parts::decompose;
use linkscout::validation::{ReplacementValidator, ValidationSettings};
use linkscout::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

const BROKEN: &str = "https://example.com/old/doc.html";
const MOVED: &str = "https://example.com/new/doc.html";

#[tokio::test]
async fn test_moved_doc_is_found_and_validated() {
    init_logger();
    let checker = Arc::new(FakeChecker::with_statuses(&[(BROKEN, 404)]));
    let provider = ScriptedProvider::new(vec![hit(MOVED, "Doc")]);
    let pages = FakePages::new(&[(
        MOVED,
        "The doc you were looking for now lives on example.com under a new path.",
    )]);
    let o = orchestrator(checker, provider.clone(), pages, EngineConfig::default());

    let (tx, _rx) = mpsc::unbounded_channel();
    let report = assert_ok!(o.process_urls(records(&[BROKEN]), &tx, None).await);

    let result = &report.results[0];
    assert_eq!(result.status, UrlStatus::Invalid);
    assert_eq!(result.http_status, Some(404));
    let replacement = result.replacement.as_ref().expect("replacement found");
    assert_eq!(replacement.replacement_url, MOVED);
    assert!(replacement.validated);
    let verdict = replacement.validation.as_ref().unwrap();
    assert!(verdict.overall_valid);
    assert!(verdict.content_relevant);
    assert_eq!(verdict.domain_relevance, 1.0);
    assert_eq!(report.stats.replaced, 1);
    assert!(result.fixed_url.is_none());

    // Strict mode only ever asks site-scoped and fallback queries about example.com.
    let queries = provider.queries.lock().unwrap().clone();
    assert_eq!(queries[0], "site:example.com old doc");

    let current = o.current_alternative(BROKEN).await.unwrap();
    assert_eq!(current.candidate.url(), MOVED);
    assert_eq!(current.total, 1);
    assert!(o.next_alternative(BROKEN).await.is_none());
}

#[tokio::test]
async fn test_auto_fix_records_the_fix() {
    let checker = Arc::new(FakeChecker::with_statuses(&[(BROKEN, 404)]));
    let provider = ScriptedProvider::new(vec![hit(MOVED, "Doc")]);
    let pages = FakePages::new(&[(MOVED, "Doc moved: see example.com for the new doc location and more.")]);
    let cfg = EngineConfig {
        auto_fix: true,
        ..Default::default()
    };
    let o = orchestrator(checker, provider, pages, cfg);
    let (tx, _rx) = mpsc::unbounded_channel();
    let report = o.process_urls(records(&[BROKEN]), &tx, None).await.unwrap();
    assert_eq!(report.results[0].fixed_url.as_deref(), Some(MOVED));
    assert_eq!(report.stats.fixed, 1);
}

#[tokio::test]
async fn test_reachable_but_irrelevant_candidate_is_rejected() {
    let orig = decompose("https://example.com/blog/why-do-most-strategy-exercises-fail-to-deliver.html").unwrap();
    let terms = extract_terms(&orig.file_name);
    let checker = Arc::new(FakeChecker::default());
    let candidate = "https://example.com/recipes/banana-bread";
    let pages = FakePages::new(&[(
        candidate,
        "Mash three ripe bananas, fold in flour and butter, then bake for an hour.",
    )]);
    let validator = ReplacementValidator::new(checker, Arc::new(pages));

    let verdict = validator
        .validate(
            &orig,
            &terms,
            candidate,
            &ValidationSettings::from_config(&EngineConfig::default()),
        )
        .await;
    assert!(verdict.http_valid);
    assert_eq!(verdict.http_status, Some(200));
    assert!(!verdict.content_relevant);
    assert!(!verdict.overall_valid);
}

#[tokio::test]
async fn test_validated_flag_matches_verdict_everywhere() {
    let checker = Arc::new(FakeChecker::with_statuses(&[(BROKEN, 404)]));
    let provider = ScriptedProvider::new(vec![
        hit("https://example.com/elsewhere/doc", "Doc"),
        hit(MOVED, "Doc"),
    ]);
    let pages = FakePages::new(&[
        ("https://example.com/elsewhere/doc", "Gardening tips for spring, summer and autumn planting seasons."),
        (MOVED, "This doc now lives on example.com, right where the old doc used to be."),
    ]);
    let cfg = EngineConfig {
        strict_domain_search: false,
        surface_best_guess: true,
        ..Default::default()
    };
    let o = orchestrator(checker, provider, pages, cfg);
    let (tx, _rx) = mpsc::unbounded_channel();
    let report = o.process_urls(records(&[BROKEN]), &tx, None).await.unwrap();

    let replacement = report.results[0].replacement.as_ref().unwrap();
    assert_eq!(replacement.replacement_url, MOVED);
    assert_eq!(
        replacement.validated,
        replacement.validation.as_ref().map_or(false, |v| v.overall_valid)
    );
    // The rejected candidate carries its verdict in the alternatives list.
    let rejected = replacement
        .alternatives
        .iter()
        .find(|a| a.url() != MOVED)
        .unwrap();
    assert_eq!(rejected.validation.get().map(|v| v.overall_valid), Some(false));
    assert_eq!(replacement.alternatives[0].url(), MOVED);

    // Cycling moves the tracked replacement onto the next alternative, verdict included.
    let tracked = o.replacement_for(BROKEN).await.unwrap();
    assert_eq!(tracked.current_alternative_index, 0);
    let view = o.next_alternative(BROKEN).await.unwrap();
    let moved_on = o.replacement_for(BROKEN).await.unwrap();
    assert_eq!(view.replacement, moved_on);
    assert_eq!(moved_on.current_alternative_index, 1);
    assert_eq!(moved_on.replacement_url, rejected.url());
    assert!(!moved_on.validated);
    assert_eq!(
        moved_on.validated,
        moved_on.validation.as_ref().map_or(false, |v| v.overall_valid)
    );
    assert!(o.next_alternative(BROKEN).await.is_none());
    assert_eq!(o.replacement_for(BROKEN).await.unwrap(), moved_on);
}
