//! Integration tests for the harvester
//!
//! These tests use wiremock to stand up a mock catalog and exercise the
//! full scrape cycle end-to-end: metadata, first-image lookup, the
//! two-phase image download, batching and extent discovery.

use kura_harvest::config::{parse_config, Config};
use kura_harvest::harvester::{
    build_http_client, ConcurrencyGate, RateLimiter, RetryingFetcher, UserAgentPool,
};
use kura_harvest::output::{audit_library, FnSink, RunStats};
use kura_harvest::storage::ItemMetadata;
use kura_harvest::{Harvester, ItemOutcome, ItemState};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing::Span;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(server: &MockServer, save_dir: &Path, with_search: bool) -> Config {
    let search = if with_search {
        format!("latest-search-url = \"{}/search/\"", server.uri())
    } else {
        String::new()
    };

    let toml = format!(
        r#"
[harvester]
save-dir = "{save_dir}"
max-concurrent-requests = 4
timeout-secs = 5
retries = 2
batch-size = 2
batch-pause-min-ms = 0
batch-pause-max-ms = 0

[user-agent]
fallback = "TestAgent/1.0"

[catalog]
gallery-url = "{uri}/g/"
{search}
probe-upper-bound = 64
"#,
        save_dir = save_dir.display(),
        uri = server.uri(),
        search = search,
    );

    parse_config(&toml).expect("test config should be valid")
}

fn item_page(pages: u32) -> String {
    format!(
        r#"<html><body>
        <h1 class="title">Test item</h1>
        <section id="tags">
          <div class="tag-container field-name">
            Tags:
            <span class="tags"><a class="tag"><span class="name">full color</span><span class="count">12K</span></a></span>
          </div>
          <div class="tag-container field-name">
            Pages:
            <span class="tags"><a class="tag"><span class="name">{}</span></a></span>
          </div>
        </section>
        </body></html>"#,
        pages
    )
}

fn viewer_page(image_src: &str) -> String {
    format!(
        r##"<html><body><section id="image-container"><a href="#"><img src="{}" /></a></section></body></html>"##,
        image_src
    )
}

/// Mounts the metadata page and the first image page of item `id`
async fn mount_item(server: &MockServer, id: u64, pages: u32, first_image: &str) {
    let image_src = format!("{}{}", server.uri(), first_image);
    mount_item_with_src(server, id, pages, &image_src).await;
}

/// Like [`mount_item`], with the `src` of the first image written verbatim
async fn mount_item_with_src(server: &MockServer, id: u64, pages: u32, image_src: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/g/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page(pages)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/g/{}/1/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(viewer_page(image_src)))
        .mount(server)
        .await;
}

/// Mounts one image; `expected` is the exact number of requests it must see
async fn mount_image(server: &MockServer, route: &str, status: u16, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(route.as_bytes()))
        .expect(expected)
        .mount(server)
        .await;
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn test_fetcher(retries: u32) -> RetryingFetcher {
    RetryingFetcher::new(
        build_http_client(Duration::from_secs(5)).unwrap(),
        Arc::new(RateLimiter::disabled()),
        ConcurrencyGate::new(2),
        Arc::new(UserAgentPool::single("TestAgent/1.0")),
        retries,
        Span::none(),
    )
}

#[tokio::test]
async fn test_uniform_item_downloaded_by_gamble() {
    let server = MockServer::start().await;
    mount_item(&server, 42, 3, "/galleries/900/1.jpg").await;
    mount_image(&server, "/galleries/900/1.jpg", 200, 1).await;
    mount_image(&server, "/galleries/900/2.jpg", 200, 1).await;
    mount_image(&server, "/galleries/900/3.jpg", 200, 1).await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let (dir, images_complete) = match harvester.scrape_single(42).await {
        ItemOutcome::Done {
            dir,
            images_complete,
            ..
        } => (dir, images_complete),
        other => panic!("item 42 should be done, got {:?}", other),
    };

    assert!(images_complete);
    assert_eq!(dir, save.path().join("42"));
    assert_eq!(file_names(&dir), vec!["1.jpg", "2.jpg", "3.jpg", "meta.json"]);

    let meta: ItemMetadata =
        serde_json::from_slice(&std::fs::read(dir.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta.pages(), Some(3));
    assert_eq!(meta.url(), Some(format!("{}/g/42/", server.uri()).as_str()));
    assert_eq!(
        meta.get("tags"),
        Some(&serde_json::json!([{"name": "full color", "count": "12K"}]))
    );
}

#[tokio::test]
async fn test_mixed_extensions_fall_back_to_safe_phase() {
    let server = MockServer::start().await;
    mount_item(&server, 43, 2, "/galleries/901/1.png").await;
    // page 1 is fetched once per phase
    mount_image(&server, "/galleries/901/1.png", 200, 2).await;
    // the gamble and the first safe candidate both try .png
    mount_image(&server, "/galleries/901/2.png", 404, 2).await;
    mount_image(&server, "/galleries/901/2.jpg", 200, 1).await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let outcome = harvester.scrape_single(43).await;
    assert!(matches!(
        outcome,
        ItemOutcome::Done {
            images_complete: true,
            ..
        }
    ));
    assert_eq!(
        file_names(&save.path().join("43")),
        vec!["1.png", "2.jpg", "meta.json"]
    );

    let report = audit_library(save.path(), "meta.json").unwrap();
    assert_eq!(report.items_scanned, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_relative_image_links_resolved() {
    let server = MockServer::start().await;
    let host = server.uri().trim_start_matches("http:").to_string();

    // root-relative and protocol-relative links both point at the mock server
    mount_item_with_src(&server, 44, 2, "/galleries/902/1.jpg").await;
    mount_item_with_src(&server, 45, 1, &format!("{}/galleries/903/1.gif", host)).await;
    mount_image(&server, "/galleries/902/1.jpg", 200, 1).await;
    mount_image(&server, "/galleries/902/2.jpg", 200, 1).await;
    mount_image(&server, "/galleries/903/1.gif", 200, 1).await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    for id in [44, 45] {
        let outcome = harvester.scrape_single(id).await;
        assert!(
            matches!(
                outcome,
                ItemOutcome::Done {
                    images_complete: true,
                    ..
                }
            ),
            "item {} not complete: {:?}",
            id,
            outcome
        );
    }

    assert_eq!(
        file_names(&save.path().join("44")),
        vec!["1.jpg", "2.jpg", "meta.json"]
    );
    assert_eq!(file_names(&save.path().join("45")), vec!["1.gif", "meta.json"]);
}

#[tokio::test]
async fn test_unusable_image_link_fails_item() {
    let server = MockServer::start().await;
    mount_item_with_src(&server, 46, 1, "data:image/png;base64,AAAA").await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let outcome = harvester.scrape_single(46).await;
    assert!(matches!(
        outcome,
        ItemOutcome::Failed {
            id: 46,
            state: ItemState::MetadataPersisted,
            ..
        }
    ));
}

#[tokio::test]
async fn test_existing_directory_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    std::fs::create_dir_all(save.path().join("7")).unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let outcome = harvester.scrape_single(7).await;
    assert_eq!(
        outcome,
        ItemOutcome::Skipped {
            id: 7,
            dir: save.path().join("7")
        }
    );
}

#[tokio::test]
async fn test_missing_page_count_fails_without_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/g/5/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let outcome = harvester.scrape_single(5).await;
    assert!(matches!(
        outcome,
        ItemOutcome::Failed {
            id: 5,
            state: ItemState::MetadataFetched,
            ..
        }
    ));
    assert!(!save.path().join("5").exists());
}

#[tokio::test]
async fn test_missing_image_link_keeps_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/g/6/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page(4)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/g/6/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let outcome = harvester.scrape_single(6).await;
    assert!(matches!(
        outcome,
        ItemOutcome::Failed {
            state: ItemState::MetadataPersisted,
            ..
        }
    ));
    assert_eq!(file_names(&save.path().join("6")), vec!["meta.json"]);
}

#[tokio::test]
async fn test_batch_survives_failing_item() {
    let server = MockServer::start().await;
    for id in [1u64, 3, 4] {
        let image = format!("/galleries/{}/1.jpg", 100 + id);
        mount_item(&server, id, 1, &image).await;
        mount_image(&server, &image, 200, 1).await;
    }
    Mock::given(method("GET"))
        .and(path("/g/2/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), false)).unwrap();

    let stats = RunStats::new();
    let progress = harvester.scrape_many(1..=4, &stats).await;

    assert_eq!(progress.completed, 4);
    assert_eq!(progress.total, Some(4));
    assert_eq!(progress.batch, 2);

    let summary = stats.summary();
    assert_eq!(summary.done, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_at, vec![(ItemState::Start, 1)]);

    for id in [1, 3, 4] {
        assert!(save.path().join(id.to_string()).join("1.jpg").is_file());
    }
}

#[tokio::test]
async fn test_scrape_all_uses_latest_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="gallery"><a href="/g/2/" class="cover">newest</a></div>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    for id in [1u64, 2] {
        let image = format!("/galleries/{}/1.webp", 200 + id);
        mount_item(&server, id, 1, &image).await;
        mount_image(&server, &image, 200, 1).await;
    }

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), true)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let sink = FnSink::new(move |outcome: &ItemOutcome| {
        recorder.lock().unwrap().push(outcome.id());
    });

    let progress = harvester.scrape_all(&sink).await.unwrap();
    assert_eq!(progress.completed, 2);

    let mut ids = seen.lock().unwrap().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_scrape_all_without_extent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), true)).unwrap();

    let stats = RunStats::new();
    assert!(harvester.scrape_all(&stats).await.is_none());
    assert_eq!(stats.summary().total(), 0);
}

#[tokio::test]
async fn test_scrape_random_refuses_oversized_sample() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="gallery"><a href="/g/10/">newest</a></div>"#,
        ))
        .mount(&server)
        .await;

    let save = TempDir::new().unwrap();
    let harvester = Harvester::new(&create_test_config(&server, save.path(), true)).unwrap();

    let stats = RunStats::new();
    assert!(harvester
        .scrape_random(Some(11), 1, None, &stats)
        .await
        .is_none());
    assert!(harvester
        .scrape_random(Some(1), 8, Some(4), &stats)
        .await
        .is_none());
    assert_eq!(stats.summary().total(), 0);
}

#[tokio::test]
async fn test_fetch_retries_after_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_fetcher(3)
        .fetch(&format!("{}/busy", server.uri()))
        .await
        .expect("429 followed by 200 should succeed");

    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.body, b"finally");
}

#[tokio::test]
async fn test_fetch_gives_up_on_persistent_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let outcome = test_fetcher(2)
        .fetch(&format!("{}/busy", server.uri()))
        .await;
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_fetch_survives_huge_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1e30"))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let outcome = test_fetcher(1)
        .fetch(&format!("{}/busy", server.uri()))
        .await;

    assert!(outcome.is_none());
    // a 429 on the last attempt is not followed by a backoff sleep
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_fetch_no_backoff_after_last_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    // without Retry-After the first backoff would be two seconds
    let started = std::time::Instant::now();
    let outcome = test_fetcher(1)
        .fetch(&format!("{}/busy", server.uri()))
        .await;

    assert!(outcome.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_returns_other_statuses_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_fetcher(3)
        .fetch(&format!("{}/gone", server.uri()))
        .await
        .unwrap();
    assert_eq!(outcome.status, 404);
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_fetch_connection_failure_is_absent() {
    // nothing listens on the discard port
    let outcome = test_fetcher(2).fetch("http://127.0.0.1:9/").await;
    assert!(outcome.is_none());
}
