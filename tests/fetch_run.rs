//! Integration tests for whole fetch runs over HTTP: fan-out, isolation of
//! failing sources, and resuming from recorded checkpoints.
//!
//! Each test serves feeds from its own wiremock server and records
//! checkpoints into its own temporary directory.

use chrono::DateTime;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedflux::config::FetchOptions;
use feedflux::feed::{fetch_all, HttpFeedSource, Item, RunSummary, DEFAULT_USER_AGENT};
use feedflux::storage::{checkpoint_exists, read_checkpoint};

/// Build an RSS document with one item per timestamp (`None` = no pubDate).
fn rss(stamps: &[Option<i64>]) -> String {
    let items: String = stamps
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let pub_date = ts
                .and_then(|s| DateTime::from_timestamp(s, 0))
                .map(|dt| format!("<pubDate>{}</pubDate>", dt.to_rfc2822()))
                .unwrap_or_default();
            format!("<item><guid>item-{i}</guid><title>Item {i}</title>{pub_date}</item>")
        })
        .collect();

    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Integration</title>
    <link>https://example.com/</link>
    {items}
</channel></rss>"#
    )
}

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn ok_feed(stamps: &[Option<i64>]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(rss(stamps))
        .insert_header("Content-Type", "application/rss+xml")
}

fn options(record_dir: &Path, resume: bool) -> FetchOptions {
    FetchOptions {
        timeout: Duration::from_secs(1),
        record_dir: Some(record_dir.to_path_buf()),
        resume,
        ..FetchOptions::default()
    }
}

async fn run_to_end(urls: Vec<String>, options: FetchOptions) -> (Vec<Item>, RunSummary) {
    let source = Arc::new(HttpFeedSource::new(DEFAULT_USER_AGENT).unwrap());
    let mut run = fetch_all(source, urls, options).unwrap();

    let mut items = Vec::new();
    while let Some(item) = run.next().await {
        items.push(item);
    }
    let summary = run.finish().await.unwrap();
    (items, summary)
}

fn guids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i.guid.as_str()).collect()
}

// ============================================================================
// Fan-out Isolation
// ============================================================================

#[tokio::test]
async fn test_timed_out_source_is_isolated() {
    let server = MockServer::start().await;
    serve(&server, "/a", ok_feed(&[Some(100), Some(200)])).await;
    serve(
        &server,
        "/b",
        ok_feed(&[Some(300)]).set_delay(Duration::from_secs(5)),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let a = format!("{}/a", server.uri());
    let b = format!("{}/b", server.uri());

    let (items, summary) = run_to_end(vec![a.clone(), b.clone()], options(dir.path(), false)).await;

    assert_eq!(guids(&items), vec!["item-0", "item-1"]);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(checkpoint_exists(dir.path(), &a));
    assert!(!checkpoint_exists(dir.path(), &b));
    assert_eq!(read_checkpoint(dir.path(), &a).unwrap().fetched_until, 200);
}

#[tokio::test]
async fn test_malformed_and_missing_feeds_do_not_affect_healthy_one() {
    let server = MockServer::start().await;
    serve(&server, "/good", ok_feed(&[Some(1_700_000_000)])).await;
    serve(
        &server,
        "/broken",
        ResponseTemplate::new(200).set_body_string("<not valid xml"),
    )
    .await;
    serve(&server, "/gone", ResponseTemplate::new(404)).await;
    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = ["/good", "/broken", "/gone"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();

    let (items, summary) = run_to_end(urls.clone(), options(dir.path(), false)).await;

    assert_eq!(items.len(), 1);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 2);
    assert!(checkpoint_exists(dir.path(), &urls[0]));
    assert!(!checkpoint_exists(dir.path(), &urls[1]));
    assert!(!checkpoint_exists(dir.path(), &urls[2]));
}

#[tokio::test]
async fn test_invalid_url_fails_only_its_own_source() {
    let server = MockServer::start().await;
    serve(&server, "/good", ok_feed(&[Some(100), Some(200)])).await;
    let dir = tempfile::tempdir().unwrap();
    let good = format!("{}/good", server.uri());
    let bad = "example.com/feed".to_string();

    let (items, summary) = run_to_end(vec![good.clone(), bad.clone()], options(dir.path(), false)).await;

    assert_eq!(guids(&items), vec!["item-0", "item-1"]);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(checkpoint_exists(dir.path(), &good));
    assert!(!checkpoint_exists(dir.path(), &bad));
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resume_emits_only_items_newer_than_checkpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/feed", server.uri());

    // First run records the watermark of the original items
    serve(&server, "/feed", ok_feed(&[Some(1_000), Some(2_000)])).await;
    let (first, _) = run_to_end(vec![url.clone()], options(dir.path(), false)).await;
    assert_eq!(first.len(), 2);
    assert_eq!(read_checkpoint(dir.path(), &url).unwrap().fetched_until, 2_000);

    // The feed gains one newer entry
    server.reset().await;
    serve(
        &server,
        "/feed",
        ok_feed(&[Some(3_000), Some(2_000), Some(1_000)]),
    )
    .await;

    let (second, summary) = run_to_end(vec![url.clone()], options(dir.path(), true)).await;

    assert_eq!(guids(&second), vec!["item-0"]);
    assert_eq!(second[0].published_timestamp(), Some(3_000));
    assert_eq!(summary.emitted(), 1);
    assert_eq!(read_checkpoint(dir.path(), &url).unwrap().fetched_until, 3_000);
}

#[tokio::test]
async fn test_resume_with_nothing_new_emits_nothing() {
    let server = MockServer::start().await;
    serve(&server, "/feed", ok_feed(&[Some(500), Some(400)])).await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/feed", server.uri());

    run_to_end(vec![url.clone()], options(dir.path(), false)).await;
    let (again, summary) = run_to_end(vec![url.clone()], options(dir.path(), true)).await;

    assert!(again.is_empty());
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(read_checkpoint(dir.path(), &url).unwrap().fetched_until, 500);
}

#[tokio::test]
async fn test_resume_without_prior_checkpoint_fetches_from_scratch() {
    let server = MockServer::start().await;
    serve(&server, "/feed", ok_feed(&[Some(10), None, Some(20)])).await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/feed", server.uri());

    let (items, _) = run_to_end(vec![url.clone()], options(dir.path(), true)).await;

    // Undated entries are skipped under the default policy
    assert_eq!(guids(&items), vec!["item-0", "item-2"]);
    assert_eq!(read_checkpoint(dir.path(), &url).unwrap().fetched_until, 20);
}

#[tokio::test]
async fn test_fresh_fetch_twice_emits_same_items() {
    let server = MockServer::start().await;
    serve(&server, "/feed", ok_feed(&[Some(10), Some(20), Some(30)])).await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/feed", server.uri());

    let (first, _) = run_to_end(vec![url.clone()], options(dir.path(), false)).await;
    let (second, _) = run_to_end(vec![url], options(dir.path(), false)).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}
