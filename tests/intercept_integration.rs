//! Integration tests for the capture decision engine.
//!
//! These drive the full flow — settings, registries, dispatch over a mock
//! HTTP server, browser fallback — through the normalized notification entry
//! point.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dlbridge_core::{
    BridgeConfig, BrowserControl, DispatchClient, DownloadInterceptor, DownloadRecord,
    DownloadRegistry, InterceptOutcome, MemoryStore, PassReason, Settings, SettingsCache,
    SettingsStore,
};
use support::{BrowserCall, RecordingBrowser};

const SUPPORTED: &[&str] = &[".zip", ".mp4", ".pdf"];

fn test_settings(enabled: bool) -> Settings {
    Settings {
        enabled,
        supported_file_types: SUPPORTED.iter().map(|s| s.to_string()).collect(),
        last_check_for_updates: 0,
    }
}

fn zip_record(id: u64, url: &str) -> DownloadRecord {
    DownloadRecord {
        id,
        url: url.to_string(),
        filename: Some("archive.zip".to_string()),
        referrer: Some("https://origin.example/page".to_string()),
        ..DownloadRecord::default()
    }
}

/// Builds an engine against `endpoint` with no capture delay.
async fn engine_at(
    endpoint: &str,
    browser: Arc<dyn BrowserControl>,
    enabled: bool,
) -> DownloadInterceptor {
    let config = BridgeConfig {
        endpoint: url::Url::parse(endpoint).expect("test endpoint parses"),
        capture_delay: Duration::ZERO,
        ..BridgeConfig::default()
    };
    let store: Arc<dyn SettingsStore> =
        Arc::new(MemoryStore::with_settings(test_settings(enabled)));
    let dispatch = Arc::new(DispatchClient::new(&config));
    let settings = Arc::new(SettingsCache::load(store, Arc::clone(&dispatch), &config).await);
    let registry = Arc::new(DownloadRegistry::new(&config));
    DownloadInterceptor::new(settings, registry, dispatch, browser, config)
}

/// Mock server that accepts every dispatch and serves the test catalog.
async fn accepting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/filetypes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"isSuccessful": true, "data": SUPPORTED})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isSuccessful": true})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_disabled_engine_touches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isSuccessful": true})))
        .expect(0)
        .mount(&server)
        .await;

    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, false)
        .await;

    let outcome = engine
        .on_download_observed(zip_record(1, "https://example.com/archive.zip"))
        .await;

    assert_eq!(outcome, InterceptOutcome::PassedThrough(PassReason::Disabled));
    assert!(
        browser.calls().is_empty(),
        "disabled engine must make zero browser calls, got {:?}",
        browser.calls()
    );
}

#[tokio::test]
async fn test_supported_download_is_captured_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/filetypes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"isSuccessful": true, "data": SUPPORTED})),
        )
        .mount(&server)
        .await;
    // Exactly one dispatch for two notifications of the same id.
    Mock::given(method("POST"))
        .and(path("/add"))
        .and(body_partial_json(json!([{
            "url": "https://example.com/archive.zip",
            "isBrowserNative": true,
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isSuccessful": true})))
        .expect(1)
        .mount(&server)
        .await;

    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    let record = zip_record(7, "https://example.com/archive.zip");
    let first = engine.on_download_observed(record.clone()).await;
    let second = engine.on_download_observed(record).await;

    assert_eq!(first, InterceptOutcome::Captured);
    assert_eq!(
        second,
        InterceptOutcome::PassedThrough(PassReason::Duplicate),
        "trailing notification for a settled id must be absorbed"
    );
    assert_eq!(browser.cancel_count(), 1, "only one cancel for the id");
}

#[tokio::test]
async fn test_racing_notifications_yield_one_capture() {
    let server = accepting_server().await;
    let browser = Arc::new(RecordingBrowser::new());
    let engine = Arc::new(
        engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true).await,
    );

    let record = zip_record(11, "https://example.com/archive.zip");
    let (a, b) = tokio::join!(
        engine.on_download_observed(record.clone()),
        engine.on_download_observed(record),
    );

    let outcomes = [a, b];
    let captured = outcomes
        .iter()
        .filter(|o| **o == InterceptOutcome::Captured)
        .count();
    assert_eq!(captured, 1, "exactly one racer captures: {outcomes:?}");
    assert_eq!(browser.cancel_count(), 1);
}

#[tokio::test]
async fn test_unreachable_application_falls_back_to_browser() {
    // Nothing listens on port 9 on loopback: connection refused.
    let endpoint = "http://127.0.0.1:9";
    let browser = Arc::new(RecordingBrowser::new());
    let engine =
        engine_at(endpoint, Arc::clone(&browser) as Arc<dyn BrowserControl>, true).await;

    let url = "https://example.com/archive.zip";
    let outcome = engine.on_download_observed(zip_record(3, url)).await;
    assert_eq!(outcome, InterceptOutcome::FallbackToBrowser);

    let opens: Vec<_> = browser
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BrowserCall::OpenInNewTab(opened) => Some(opened),
            _ => None,
        })
        .collect();
    assert_eq!(opens, vec![url.to_string()], "exactly one tab open with the URL");

    // The browser's own retry of the same URL now passes through untouched.
    let retry = engine.on_download_observed(zip_record(4, url)).await;
    assert_eq!(retry, InterceptOutcome::PassedThrough(PassReason::Ignored));
    assert_eq!(browser.open_tab_count(), 1, "no second fallback for the retry");
}

#[tokio::test]
async fn test_rejected_dispatch_also_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/add"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"isSuccessful": false, "message": "queue full"})),
        )
        .mount(&server)
        .await;

    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    let outcome = engine
        .on_download_observed(zip_record(5, "https://example.com/archive.zip"))
        .await;
    assert_eq!(outcome, InterceptOutcome::FallbackToBrowser);
    assert_eq!(browser.open_tab_count(), 1);
}

#[tokio::test]
async fn test_unproxyable_scheme_passes_through() {
    let server = accepting_server().await;
    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    let mut record = zip_record(6, "data:application/zip;base64,UEs=");
    record.filename = Some("payload.zip".to_string());

    let outcome = engine.on_download_observed(record).await;
    assert_eq!(
        outcome,
        InterceptOutcome::PassedThrough(PassReason::UnsupportedScheme)
    );
    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_unsupported_type_passes_through() {
    let server = accepting_server().await;
    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    let record = DownloadRecord {
        id: 8,
        url: "https://example.com/page.html".to_string(),
        filename: Some("page.html".to_string()),
        mime: Some("text/html".to_string()),
        ..DownloadRecord::default()
    };

    let outcome = engine.on_download_observed(record).await;
    assert_eq!(
        outcome,
        InterceptOutcome::PassedThrough(PassReason::UnsupportedType)
    );
    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_suggestion_capable_host_suppresses_save_dialog() {
    let server = accepting_server().await;
    let browser = Arc::new(RecordingBrowser::with_filename_suggestion());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    let outcome = engine
        .on_download_observed(zip_record(9, "https://example.com/archive.zip"))
        .await;
    assert_eq!(outcome, InterceptOutcome::Captured);

    let calls = browser.calls();
    assert_eq!(
        calls[0],
        BrowserCall::SuggestFilename(
            9,
            "archive.zip".to_string(),
            dlbridge_core::ConflictPolicy::Overwrite
        ),
        "suggestion with overwrite policy comes before the cancel: {calls:?}"
    );
    assert_eq!(calls[1], BrowserCall::Cancel(9));
    assert_eq!(calls[2], BrowserCall::Erase(9));
}

#[tokio::test]
async fn test_capture_resolves_type_through_mime_fallback() {
    let server = accepting_server().await;
    let browser = Arc::new(RecordingBrowser::new());
    let engine = engine_at(&server.uri(), Arc::clone(&browser) as Arc<dyn BrowserControl>, true)
        .await;

    // No filename, opaque URL: only the MIME subtype identifies this as mp4.
    let record = DownloadRecord {
        id: 10,
        url: "https://example.com/stream?session=abc".to_string(),
        mime: Some("video/mp4".to_string()),
        ..DownloadRecord::default()
    };

    let outcome = engine.on_download_observed(record).await;
    assert_eq!(outcome, InterceptOutcome::Captured);
}
