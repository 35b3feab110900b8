//! Integration tests for the crawler
//!
//! These tests use wiremock to serve listing pages over HTTP and drive the
//! full crawl cycle end-to-end: config loading, HTTP sessions, normalization,
//! contact extraction, deduplicated storage and the runs table.

use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::Harvester;
use listing_harvester::output::SourceOutcome;
use listing_harvester::storage::{ListingStore, RunStatus, SqliteStorage};
use listing_harvester::HarvestError;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a config with fast timings and loads it back
fn load_test_config(dir: &TempDir, sources: &str, parallel: bool) -> (Config, String) {
    load_test_config_with(dir, sources, parallel, 0)
}

fn load_test_config_with(
    dir: &TempDir,
    sources: &str,
    parallel: bool,
    min_content_bytes: usize,
) -> (Config, String) {
    let db_path = dir.path().join("listings.db");
    let diagnostics = dir.path().join("diagnostics");
    let content = format!(
        r#"
[crawler]
max-pages = 5
page-delay-min-ms = 1
page-delay-max-ms = 5
request-budget = 0
max-consecutive-errors = 2
error-cooldown-ms = 10
parallel-sources = {parallel}

[fetcher]
page-load-timeout-ms = 5000
retry-cooldown-ms = 10
settle-delay-ms = 0
min-content-bytes = {min_content_bytes}
recheck-delay-ms = 0

[user-agent]
user-agent = "Mozilla/5.0 (X11; Linux x86_64)"
cookie = "ASPSESSIONID=test"

[output]
database-path = '{db}'
diagnostics-dir = '{diag}'

{sources}
"#,
        parallel = parallel,
        min_content_bytes = min_content_bytes,
        db = db_path.display(),
        diag = diagnostics.display(),
        sources = sources
    );

    let config_path = dir.path().join("harvester.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    load_config_with_hash(&config_path).expect("Failed to load config")
}

fn board_source(name: &str, server: &str) -> String {
    format!(
        r#"
[[source]]
name = "{name}"
kind = "announcement-board"
base-url = "{server}/"
search-url = "{server}/{name}/esindex.asp?page={{page}}&num={{offset}}"
page-size = 5
"#,
        name = name,
        server = server
    )
}

fn board_page(ids: &[u32], noise: usize) -> String {
    let mut body = String::new();
    for id in ids {
        body.push_str(&format!(
            r#"<div class="contanier-fluid M40 PB15">
                <span class="label">Offre</span>
                <a href="esvoir.asp?id={id}">Dattes Deglet Nour lot {id}</a>
                <p>Producteur de dattes. Contact: +213 555 123 {id:03}, email: vente{id}@example.com</p>
            </div>"#,
            id = id
        ));
    }
    for _ in 0..noise {
        body.push_str(r#"<div class="contanier-fluid M40 PB15"><p>Publicité</p></div>"#);
    }
    format!("<html><body>{}</body></html>", body)
}

async fn mount_board_page(server: &MockServer, name: &str, page: u32, markup: String) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/esindex.asp", name)))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(markup)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

fn latest_run(db_path: &Path) -> listing_harvester::storage::RunRecord {
    let storage = SqliteStorage::new(db_path).expect("Failed to open storage");
    storage
        .get_latest_run()
        .expect("Failed to read runs")
        .expect("No run recorded")
}

#[tokio::test]
async fn test_board_crawl_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_board_page(&server, "board", 1, board_page(&[101, 102, 103], 2)).await;
    mount_board_page(&server, "board", 2, board_page(&[], 0)).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.new_count, 3);
    assert_eq!(summary.duplicate_count, 0);
    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.skipped_count, 2);
    assert!(!summary.cancelled);

    let board = summary.source("board").unwrap();
    assert_eq!(board.outcome, SourceOutcome::Completed);
    assert_eq!(board.pages_requested, 2);

    let records = harvester.records();
    assert_eq!(records.len(), 3);
    let first = records.iter().find(|r| r.identity_key == "101").unwrap();
    assert_eq!(first.title, "Dattes Deglet Nour lot 101");
    assert_eq!(first.announcement_type, "Offre");
    assert_eq!(first.contacts.phones, vec!["+213 555 123 101"]);
    assert_eq!(first.contacts.emails, vec!["vente101@example.com"]);
    assert_eq!(
        first.source_url,
        format!("{}/membres/esvoir.asp?id=101", server.uri())
    );

    let status = harvester.status().snapshot();
    assert!(!status.running);
    assert!(status.message.starts_with("Finished"));

    let run = latest_run(&dir.path().join("listings.db"));
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.new_count, 3);
    assert_eq!(run.config_hash, hash);
}

#[tokio::test]
async fn test_empty_first_page_aborts_only_that_source() {
    let server = MockServer::start().await;
    mount_board_page(&server, "broken", 1, board_page(&[], 0)).await;
    mount_board_page(&server, "healthy", 1, board_page(&[201, 202], 0)).await;
    mount_board_page(&server, "healthy", 2, board_page(&[], 0)).await;

    let dir = TempDir::new().unwrap();
    let sources = format!(
        "{}{}",
        board_source("broken", &server.uri()),
        board_source("healthy", &server.uri())
    );
    let (config, hash) = load_test_config(&dir, &sources, false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();

    assert!(matches!(
        summary.source("broken").unwrap().outcome,
        SourceOutcome::Aborted { .. }
    ));
    assert_eq!(
        summary.source("healthy").unwrap().outcome,
        SourceOutcome::Completed
    );
    assert_eq!(summary.new_count, 2);
    assert_eq!(summary.source("broken").unwrap().errors, 1);
    assert_eq!(summary.error_count, 1);

    let snapshots: Vec<_> = std::fs::read_dir(dir.path().join("diagnostics"))
        .expect("Diagnostics directory missing")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].starts_with("broken_"));
}

#[tokio::test]
async fn test_rerun_counts_duplicates() {
    let server = MockServer::start().await;
    mount_board_page(&server, "board", 1, board_page(&[301, 302, 303], 2)).await;
    mount_board_page(&server, "board", 2, board_page(&[], 0)).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);

    let first = Harvester::open(config.clone(), &hash)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.new_count, 3);

    let harvester = Harvester::open(config, &hash).unwrap();
    let second = harvester.run(CancellationToken::new()).await.unwrap();
    assert_eq!(second.new_count, 0);
    assert_eq!(second.duplicate_count, 3);
    assert!(harvester.records().is_empty());

    let stats = harvester
        .store()
        .with_store(|store| store.statistics())
        .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unreviewed, 3);
}

#[tokio::test]
async fn test_second_run_on_same_harvester() {
    let server = MockServer::start().await;
    mount_board_page(&server, "board", 1, board_page(&[351, 352, 353], 0)).await;
    mount_board_page(&server, "board", 2, board_page(&[], 0)).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let first = harvester.run(CancellationToken::new()).await.unwrap();
    assert_eq!(first.new_count, 3);
    assert_eq!(harvester.records().len(), 3);

    let second = harvester.run(CancellationToken::new()).await.unwrap();
    assert_eq!(second.new_count, 0);
    assert_eq!(second.duplicate_count, 3);
    assert!(harvester.records().is_empty());
}

#[tokio::test]
async fn test_incomplete_page_is_requested_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board/esindex.asp"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_board_page(&server, "board", 1, board_page(&[701, 702, 703], 0)).await;
    let no_results = format!(
        "<html><body>{}</body></html>",
        "<p>Aucune annonce ne correspond.</p>".repeat(10)
    );
    mount_board_page(&server, "board", 2, no_results).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) =
        load_test_config_with(&dir, &board_source("board", &server.uri()), false, 200);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.new_count, 3);
    assert_eq!(summary.error_count, 0);
    assert_eq!(
        summary.source("board").unwrap().outcome,
        SourceOutcome::Completed
    );

    let requests = server.received_requests().await.unwrap();
    let first_page_loads = requests
        .iter()
        .filter(|r| r.url.query_pairs().any(|(k, v)| k == "page" && v == "1"))
        .count();
    assert_eq!(first_page_loads, 2);
}

#[tokio::test]
async fn test_parallel_sources() {
    let server = MockServer::start().await;
    mount_board_page(&server, "north", 1, board_page(&[401, 402], 0)).await;
    mount_board_page(&server, "north", 2, board_page(&[], 0)).await;
    mount_board_page(&server, "south", 1, board_page(&[501], 1)).await;
    mount_board_page(&server, "south", 2, board_page(&[], 0)).await;

    let dir = TempDir::new().unwrap();
    let sources = format!(
        "{}{}",
        board_source("north", &server.uri()),
        board_source("south", &server.uri())
    );
    let (config, hash) = load_test_config(&dir, &sources, true);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.new_count, 3);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.per_source.len(), 2);
    assert!(summary
        .per_source
        .values()
        .all(|counts| counts.outcome == SourceOutcome::Completed));
}

#[tokio::test]
async fn test_classified_search_queries() {
    let server = MockServer::start().await;

    let results = r#"<html><body>
        <article><h3>Miel de jujubier pur</h3><a href="/annonce/miel?id=9001">voir</a>
            <p>Apiculteur. Tel 0555 12 34 56</p></article>
        <article><h3>Cevital Huile</h3><a href="/annonce/x?id=9002">voir</a></article>
        </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/s/1"))
        .and(query_param("keywords", "miel"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/s/2"))
        .and(query_param("keywords", "miel"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let source = format!(
        r#"
[[source]]
name = "search"
kind = "classified-search"
base-url = "{server}/"
search-url = "{server}/s/{{page}}?keywords={{query}}"
empty-first-page = "done"

[[source.queries]]
term = "miel"
tag = "Miel"
"#,
        server = server.uri()
    );

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &source, false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.new_count, 1);
    assert_eq!(summary.skipped_count, 1);

    let records = harvester.records();
    assert_eq!(records[0].identity_key, "9001");
    assert!(records[0].category_tags.iter().any(|t| t == "Miel"));
    assert_eq!(records[0].contacts.phones, vec!["0555 12 34 56"]);
}

#[tokio::test]
async fn test_unreachable_pages_abort_after_error_streak() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let summary = harvester.run(CancellationToken::new()).await.unwrap();
    let board = summary.source("board").unwrap();

    assert_eq!(board.errors, 2);
    assert_eq!(board.pages_requested, 2);
    assert!(matches!(board.outcome, SourceOutcome::Aborted { .. }));
}

#[tokio::test]
async fn test_refuses_concurrent_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);
    let harvester = Harvester::open(config, &hash).unwrap();

    assert!(harvester.status().try_begin("external crawl"));
    let result = harvester.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(HarvestError::AlreadyRunning)));
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted() {
    let server = MockServer::start().await;
    mount_board_page(&server, "board", 1, board_page(&[601], 0)).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_test_config(&dir, &board_source("board", &server.uri()), false);
    let harvester = Harvester::open(config, &hash).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = harvester.run(cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(
        summary.source("board").unwrap().outcome,
        SourceOutcome::Cancelled
    );

    let run = latest_run(&dir.path().join("listings.db"));
    assert_eq!(run.status, RunStatus::Interrupted);
}
