//! Back/forward, history recovery and initialization scenarios.

mod common;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{names, Harness, Reply};
use pageturn::{
    BrowserHistory, EntryPayload, EventName, HistoryEntry, InternalEvent, Location, LocationVisit,
    NavigationType, Page, PopstateOutcome, RouterConfig, ScrollHost, ScrollRegion, VisitOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn home() -> Page {
    Page::new("Home", "/").with_version("1")
}

async fn visited(config: RouterConfig) -> Harness {
    let h = Harness::with_config(home(), config);
    h.router.init().await.unwrap();
    h.transport.reply(
        "/a",
        Reply::page(&Page::new("A", "/a").with_version("1").with_prop("n", json!(1))),
    );
    h.router.visit("/a", VisitOptions::new()).await.unwrap();
    h
}

fn missing_counter(h: &Harness) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    h.router
        .events()
        .on_internal(InternalEvent::MissingHistoryItem, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    count
}

// --- Popstate ---

#[tokio::test]
async fn test_back_restores_previous_page_quietly() {
    let h = visited(RouterConfig::default()).await;
    let entries = h.browser.len();
    let stream = h.stream();

    let state = h.browser.back().unwrap();
    let outcome = h.router.popstate(state).await;

    let PopstateOutcome::Restored(page) = outcome else {
        panic!("expected restore");
    };
    assert_eq!(page.component, "Home");
    assert_eq!(h.router.page().component, "Home");
    assert_eq!(h.browser.len(), entries);
    assert_eq!(names(&stream), vec![EventName::Navigate]);
    assert_eq!(
        h.renderer.renders.lock().last().cloned(),
        Some(("Home".to_string(), false))
    );
}

#[tokio::test]
async fn test_back_then_forward_restores_scroll() {
    let h = visited(RouterConfig::default()).await;
    h.scroll.scroll_document_to(ScrollRegion::new(420.0, 0.0));
    h.router.on_scroll(true).unwrap();

    let back = h.browser.back().unwrap();
    h.router.popstate(back).await;
    h.scroll.scroll_document_to(ScrollRegion::ORIGIN);

    let forward = h.browser.forward().unwrap();
    h.router.popstate(forward).await;

    assert_eq!(h.router.page().component, "A");
    assert_eq!(h.scroll.document_offset(), ScrollRegion::new(420.0, 0.0));
}

#[tokio::test]
async fn test_large_pages_round_trip_through_encoded_entries() {
    let h = visited(RouterConfig {
        max_direct_state_bytes: 64,
        ..Default::default()
    })
    .await;
    let rows: Vec<String> = (0..50).map(|i| format!("row {i}")).collect();
    let report = Page::new("Report", "/report")
        .with_version("1")
        .with_prop("rows", json!(rows));
    h.transport.reply("/report", Reply::page(&report));
    h.transport.reply("/b", Reply::page(&Page::new("B", "/b").with_version("1")));

    h.router.visit("/report", VisitOptions::new()).await.unwrap();
    assert!(h.router.history().current_entry().unwrap().payload.is_encoded());
    h.router.visit("/b", VisitOptions::new()).await.unwrap();

    let state = h.browser.back().unwrap();
    let outcome = h.router.popstate(state).await;

    assert!(matches!(outcome, PopstateOutcome::Restored(_)));
    assert_eq!(h.router.page().props["rows"], json!(rows));
}

#[tokio::test]
async fn test_corrupted_blob_clears_store_and_signals() {
    let h = visited(RouterConfig {
        encrypt_history: true,
        ..Default::default()
    })
    .await;
    let missing = missing_counter(&h);

    let state = h.browser.back().unwrap().unwrap();
    let mut entry = HistoryEntry::parse(&state).unwrap();
    entry.payload = EntryPayload::Encoded {
        blob: BASE64.encode(b"not a frame"),
    };
    h.browser.set_raw_state(Some(entry.to_value().unwrap()));

    let outcome = h.router.popstate(h.browser.state()).await;

    assert_eq!(outcome, PopstateOutcome::Missing);
    assert!(h.router.pages().is_cleared());
    assert_eq!(missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleared_store_leaves_history_untouched() {
    let h = visited(RouterConfig {
        encrypt_history: true,
        ..Default::default()
    })
    .await;
    h.transport
        .reply("/b", Reply::page(&Page::new("B", "/b").with_version("1")));

    let state = h.browser.back().unwrap().unwrap();
    let mut entry = HistoryEntry::parse(&state).unwrap();
    entry.payload = EntryPayload::Encoded {
        blob: BASE64.encode(b"not a frame"),
    };
    h.browser.set_raw_state(Some(entry.to_value().unwrap()));
    assert_eq!(
        h.router.popstate(h.browser.state()).await,
        PopstateOutcome::Missing
    );

    let broken = h.browser.state();
    let href = h.browser.href();

    h.scroll.scroll_document_to(ScrollRegion::new(300.0, 0.0));
    h.router.on_scroll(true).unwrap();
    h.router
        .remember(json!({"draft": true}), "form")
        .await
        .unwrap();
    assert_eq!(h.router.popstate(None).await, PopstateOutcome::Missing);

    assert_eq!(h.browser.state(), broken);
    assert_eq!(h.browser.href(), href);
    assert!(h.router.pages().is_cleared());

    // Leaving the broken entry does not save scroll into it either.
    h.router.visit("/b", VisitOptions::new()).await.unwrap();
    assert!(!h.router.pages().is_cleared());
    assert_eq!(h.browser.back(), Some(broken));
}

#[tokio::test]
async fn test_foreign_state_is_missing() {
    let h = visited(RouterConfig::default()).await;
    let missing = missing_counter(&h);

    let outcome = h.router.popstate(Some(json!({"scrollTop": 10}))).await;

    assert_eq!(outcome, PopstateOutcome::Missing);
    assert_eq!(missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_entries_from_cleared_history_are_missing() {
    let h = visited(RouterConfig::default()).await;
    let missing = missing_counter(&h);
    h.router.history().clear();

    let state = h.browser.back().unwrap();
    let outcome = h.router.popstate(state).await;

    assert_eq!(outcome, PopstateOutcome::Missing);
    assert_eq!(missing.load(Ordering::SeqCst), 1);
    // Writes resume normally afterwards.
    h.router.visit("/a", VisitOptions::new()).await.unwrap();
    assert!(!h.router.pages().is_cleared());
}

#[tokio::test]
async fn test_stateless_entry_is_rebuilt_from_current_page() {
    let h = Harness::new(Page::new("Docs", "/docs"));
    h.router.init().await.unwrap();

    // An anchor jump pushes a stateless entry.
    h.browser.push_state(json!(null), "/docs#api").unwrap();
    h.browser.set_raw_state(None);

    let outcome = h.router.popstate(None).await;

    assert_eq!(outcome, PopstateOutcome::Rebuilt);
    assert_eq!(h.router.page().url, "/docs#api");
    let entry = h.router.history().current_entry().unwrap();
    assert_eq!(entry.direct_page().unwrap().url, "/docs#api");
    assert_eq!(h.scroll.scrolled_into_view(), vec!["api".to_string()]);
}

// --- Initialization ---

#[tokio::test]
async fn test_initial_visit_writes_entry_and_navigates() {
    let h = Harness::new(home());
    let stream = h.stream();

    h.router.init().await.unwrap();

    assert_eq!(h.browser.len(), 1);
    assert!(h.router.history().current_entry().is_some());
    assert_eq!(names(&stream), vec![EventName::Navigate]);
    assert_eq!(h.renderer.components(), vec!["Home"]);
}

#[tokio::test]
async fn test_initial_visit_keeps_location_fragment() {
    let h = Harness::new(home());
    h.browser.push_state(json!(null), "/#pricing").unwrap();
    h.browser.set_raw_state(None);

    h.router.init().await.unwrap();

    assert_eq!(h.router.page().url, "/#pricing");
}

#[tokio::test]
async fn test_back_forward_load_restores_from_history() {
    let first = visited(RouterConfig::default()).await;
    first
        .router
        .remember(json!({"query": "rust"}), "search")
        .await
        .unwrap();
    let browser = first.browser.clone();
    browser.set_navigation_type(NavigationType::BackForward);

    // The server renders a fresh page; history knows better.
    let fresh = Page::new("A", "/a").with_version("1");
    let second = Harness::with_browser(fresh, RouterConfig::default(), browser);
    let stream = second.stream();
    second.router.init().await.unwrap();

    let page = second.router.page();
    assert_eq!(page.props["n"], 1);
    assert_eq!(page.remembered_state["search"], json!({"query": "rust"}));
    assert_eq!(names(&stream), vec![EventName::Navigate]);
}

#[tokio::test]
async fn test_location_visit_marker_restores_scroll_and_state() {
    let first = Harness::new(home());
    first.router.init().await.unwrap();
    first
        .router
        .remember(json!({"tab": 2}), "settings")
        .await
        .unwrap();
    first.scroll.scroll_document_to(ScrollRegion::new(250.0, 0.0));
    first.router.on_scroll(true).unwrap();

    let browser = first.browser.clone();
    browser
        .stash_location_visit(LocationVisit {
            preserve_scroll: true,
        })
        .unwrap();

    let second = Harness::with_browser(home(), RouterConfig::default(), browser.clone());
    let stream = second.stream();
    second.router.init().await.unwrap();

    assert_eq!(
        second.router.page().remembered_state["settings"],
        json!({"tab": 2})
    );
    assert_eq!(second.scroll.document_offset(), ScrollRegion::new(250.0, 0.0));
    assert_eq!(names(&stream), vec![EventName::Navigate]);
    assert!(browser.take_location_visit().is_none());
}

// --- Remember / restore ---

#[tokio::test]
async fn test_remember_survives_back_navigation() {
    let h = Harness::new(home());
    h.router.init().await.unwrap();
    h.router.remember(json!("draft"), "note").await.unwrap();
    h.transport
        .reply("/a", Reply::page(&Page::new("A", "/a").with_version("1")));
    h.router.visit("/a", VisitOptions::new()).await.unwrap();
    assert_eq!(h.router.restore("note").await, None);

    let state = h.browser.back().unwrap();
    h.router.popstate(state).await;

    assert_eq!(h.router.restore("note").await, Some(json!("draft")));
    assert_eq!(h.router.page().remembered_state["note"], "draft");
}
