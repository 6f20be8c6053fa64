//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! HTTP fetcher, the engine and a SQLite database end-to-end.

use feedsync::config::{parse_config, HttpConfig, SourceConfig};
use feedsync::crawler::{CrawlEngine, HttpFetcher, PageFetcher, RecordExtractor, RunOptions};
use feedsync::model::{CrawlMode, StopReason};
use feedsync::storage::{ReconciliationStore, RunStatus, SqliteStorage};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renders a Hacker News style listing; links of even ids are site-relative
fn listing(ids: &[u64]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            let href = if id % 2 == 0 {
                format!("item?id={}", id)
            } else {
                format!("https://blog.example.org/{}", id)
            };
            format!(
                r#"<tr class="athing" id="{id}"><td class="title"><span class="titleline"><a href="{href}">Post {id}</a></span></td></tr>
<tr><td class="subtext"><span class="score">{score} points</span> by <a class="hnuser" href="user?id=bob">bob</a>
<span class="age" title="2024-05-01T10:00:00 1714557600"><a href="item?id={id}">2 days ago</a></span>
| <a href="item?id={id}">{id}&nbsp;comments</a></td></tr>
<tr class="spacer"></tr>"#,
                id = id,
                href = href,
                score = id * 10,
            )
        })
        .collect();
    format!("<html><body><table>{}</table></body></html>", rows)
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Mounts numbered pages; pages after the first are mounted before the bare path
async fn serve_pages(server: &MockServer, pages: &[&[u64]]) {
    for (index, ids) in pages.iter().enumerate().skip(1) {
        Mock::given(method("GET"))
            .and(path("/news"))
            .and(query_param("p", (index + 1).to_string()))
            .respond_with(html(listing(ids)))
            .mount(server)
            .await;
    }
    if let Some(first) = pages.first() {
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(html(listing(first)))
            .mount(server)
            .await;
    }
}

fn test_http() -> HttpConfig {
    HttpConfig {
        user_agent: "feedsync-test/1.0".to_string(),
        timeout_secs: 5,
    }
}

fn engine(store: Arc<SqliteStorage>) -> CrawlEngine {
    let fetcher = HttpFetcher::new(&test_http()).expect("Failed to build HTTP client");
    CrawlEngine::new(Arc::new(fetcher), store)
}

fn options(mode: CrawlMode, max_pages: u32) -> RunOptions {
    RunOptions {
        mode,
        max_pages,
        stop_on_duplicate: false,
        page_delay: Some(Duration::ZERO),
    }
}

#[tokio::test]
async fn test_latest_run_against_http_server() {
    let mock_server = MockServer::start().await;
    serve_pages(&mock_server, &[&[12, 11, 10]]).await;

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceConfig::new("mock", format!("{}/news", mock_server.uri()));

    let result = engine(store.clone())
        .run(&source, &options(CrawlMode::LatestOnly, 1))
        .await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.new_posts, 3);
    assert_eq!(result.highest_id_seen, 12);
    assert_eq!(store.count_records("mock").unwrap(), 3);
    assert_eq!(store.highest_known_id("mock").unwrap(), 12);
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(header("user-agent", "feedsync-test/1.0"))
        .respond_with(html(listing(&[1])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceConfig::new("mock", format!("{}/news", mock_server.uri()));

    let result = engine(store)
        .run(&source, &options(CrawlMode::LatestOnly, 1))
        .await;

    assert_eq!(result.new_posts, 1);
}

#[tokio::test]
async fn test_full_archive_paginates_into_file_database() {
    let mock_server = MockServer::start().await;
    serve_pages(&mock_server, &[&[30, 29], &[28, 27], &[]]).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("feedsync.db");
    let source = SourceConfig::new("mock", format!("{}/news", mock_server.uri()));

    {
        let store = Arc::new(SqliteStorage::new(&db_path).unwrap());
        let result = engine(store)
            .run(&source, &options(CrawlMode::FullArchive, 10))
            .await;

        assert_eq!(result.pages_scraped, 2);
        assert_eq!(result.new_posts, 4);
        assert_eq!(result.stop_reason, Some(StopReason::EmptyPage));
    }

    let reopened = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(reopened.count_records("mock").unwrap(), 4);

    let history = reopened.run_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Completed);
    assert_eq!(history[0].records_scraped, 4);
}

#[tokio::test]
async fn test_since_last_picks_up_only_new_items() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());

    let first_server = MockServer::start().await;
    serve_pages(&first_server, &[&[20, 19, 18]]).await;
    let source = SourceConfig::new("mock", format!("{}/news", first_server.uri()));
    engine(store.clone())
        .run(&source, &options(CrawlMode::LatestOnly, 1))
        .await;

    let second_server = MockServer::start().await;
    serve_pages(&second_server, &[&[22, 21, 20, 19], &[18, 17]]).await;
    let source = SourceConfig::new("mock", format!("{}/news", second_server.uri()));

    let result = engine(store.clone())
        .run(&source, &options(CrawlMode::SinceLast, 5))
        .await;

    assert_eq!(result.last_known_id, 20);
    assert_eq!(result.new_posts, 2);
    assert_eq!(result.stop_reason, Some(StopReason::ReachedKnownId));
    assert_eq!(store.count_records("mock").unwrap(), 5);
}

#[tokio::test]
async fn test_server_error_truncates_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    serve_pages(&mock_server, &[&[8, 7]]).await;

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceConfig::new("mock", format!("{}/news", mock_server.uri()));

    let result = engine(store.clone())
        .run(&source, &options(CrawlMode::UntilExisting, 5))
        .await;

    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.new_posts, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("500"), "error: {}", result.errors[0]);
    assert_eq!(result.stop_reason, Some(StopReason::PageError));

    let history = store.run_history(1).unwrap();
    assert_eq!(history[0].status, RunStatus::Partial);
}

#[tokio::test]
async fn test_relative_links_resolve_against_source() {
    let mock_server = MockServer::start().await;
    let source = SourceConfig::new("mock", format!("{}/news", mock_server.uri()));

    let extractor = RecordExtractor::new(&source).unwrap();
    let records = extractor.extract(&listing(&[4, 3])).unwrap();

    // Even ids carry a site-relative link
    assert_eq!(records[0].link, format!("{}/item?id=4", mock_server.uri()));
    assert_eq!(records[0].score, 40);
    assert_eq!(records[0].comment_count, 4);
    assert_eq!(records[0].author, "bob");
    assert_eq!(records[1].link, "https://blog.example.org/3");
}

#[tokio::test]
async fn test_configured_selectors_for_other_layout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(html(
            r#"<html><body>
            <div class="post" id="501"><h2><a href="/p/501">First</a></h2></div>
            <div class="info"><span class="meta"><b>7 votes</b> <i>carol</i>
              <time title="2024-06-01T09:00:00">yesterday</time></span></div>
            <div class="post" id="500"><h2><a href="/p/500">Second</a></h2></div>
            <div class="info"><span class="meta"><b>2 votes</b> <time>3 hours ago</time>
              <a href="/p/500#c">1 comment</a></span></div>
            </body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let toml = format!(
        r#"
[store]
database-path = "unused.db"

[http]
user-agent = "feedsync-test/1.0"

[[source]]
name = "board"
url = "{}/board"
mode = "latest"

[source.selectors]
item = "div.post"
title = "h2"
metadata = ".meta"
score = "b"
author = "i"
age = "time"
"#,
        mock_server.uri()
    );
    let config = parse_config(&toml).unwrap();
    let source = config.source("board").unwrap();

    let records = RecordExtractor::new(source)
        .unwrap()
        .extract(&listing_body(&mock_server).await)
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "First");
    assert_eq!(records[0].link, format!("{}/p/501", mock_server.uri()));
    assert_eq!(records[0].score, 7);
    assert_eq!(records[0].author, "carol");
    assert_eq!(records[1].author, "unknown");
    assert_eq!(records[1].comment_count, 1);

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let engine = CrawlEngine::new(Arc::new(fetcher), store.clone());

    let result = engine.run(source, &RunOptions::for_source(source)).await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.new_posts, 2);
    assert_eq!(result.highest_id_seen, 501);
    assert_eq!(store.count_records("board").unwrap(), 2);
}

async fn listing_body(server: &MockServer) -> String {
    let fetcher = HttpFetcher::new(&test_http()).unwrap();
    fetcher
        .fetch(&format!("{}/board", server.uri()))
        .await
        .expect("Failed to fetch board")
}
