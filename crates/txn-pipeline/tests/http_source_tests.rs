//! HTTP source fetching against a mock server

mod common;

use common::csv;
use txn_pipeline::config::SourceConfig;
use txn_pipeline::error::FetchError;
use txn_pipeline::source::{HttpSourceFetcher, RawTable, SourceFetcher};
use wiremock::{
    matchers::{header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn config(url: String) -> SourceConfig {
    SourceConfig {
        url,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let mock_server = MockServer::start().await;
    let body = csv(&["T1,1,2.5,2024-01-01"]);

    Mock::given(method("GET"))
        .and(path("/transactions.csv"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpSourceFetcher::new(&config(format!("{}/transactions.csv", mock_server.uri()))).unwrap();
    assert_eq!(fetcher.location(), format!("{}/transactions.csv", mock_server.uri()));

    let bytes = fetcher.fetch().await.unwrap();
    assert_eq!(bytes, body.as_bytes());

    let table = RawTable::from_csv(&bytes).unwrap();
    assert_eq!(table.len(), 1);
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.csv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpSourceFetcher::new(&config(format!("{}/missing.csv", mock_server.uri()))).unwrap();

    match fetcher.fetch().await.unwrap_err() {
        FetchError::Status { status, url } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/missing.csv"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_fetch_error() {
    // Nothing listens on port 9 (discard) in test environments
    let fetcher = HttpSourceFetcher::new(&config("http://127.0.0.1:9/t.csv".to_string())).unwrap();
    assert!(matches!(
        fetcher.fetch().await.unwrap_err(),
        FetchError::Http { .. }
    ));
}

#[tokio::test]
async fn test_drive_share_link_is_resolved() {
    let fetcher = HttpSourceFetcher::new(&SourceConfig::default()).unwrap();
    assert_eq!(
        fetcher.location(),
        "https://drive.google.com/uc?id=1jORbN_ETnT92S_tIrYqYBLJ37aEyrShV"
    );
}
