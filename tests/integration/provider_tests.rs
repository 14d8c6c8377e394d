//! Integration tests for the provider
//!
//! These tests use wiremock to serve directory listings and exercise the
//! full crawl and fetch cycle over HTTP.

use futures::StreamExt;
use nar_harvest::config::{
    ProviderProperties, LISTING_FORMAT, NAR_LOCATION, PROXY_PASSWORD, PROXY_SERVER,
    PROXY_SERVER_PORT, PROXY_USER, READ_TIMEOUT,
};
use nar_harvest::{ConfigError, HttpsResourceProvider, ParsedEntry, ProviderError, ResourceDescriptor};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODIFIED: &str = "2021-05-17 21:09";
const MODIFIED_MILLIS: i64 = 1621285740000;

/// Creates provider properties for an Apache-style HTML listing at `base_url`
fn create_test_properties(base_url: &str) -> ProviderProperties {
    [
        ("base.url", base_url),
        ("filter", r".*\.nar|[^.]+"),
        ("file.list.identifier", "//tr[count(td)>2]"),
        ("location.identifier", "./td[1]/a/text()"),
        ("last.modification.identifier", "./td[2]/text()"),
        ("directory.identifier", "./td[1]/a[contains(text(), '/')]"),
        ("date.time.format", "yyy-MM-dd HH:mm"),
        ("user.name", "user"),
        ("password", "pass"),
    ]
    .into_iter()
    .collect()
}

/// Same as `create_test_properties`, for JSON listings
fn create_json_properties(base_url: &str) -> ProviderProperties {
    let mut properties = create_test_properties(base_url);
    properties
        .set(LISTING_FORMAT, "json")
        .set("file.list.identifier", "$[?(@.type)]")
        .set("location.identifier", "$..name")
        .set("last.modification.identifier", "$..['last modified']")
        .set("directory.identifier", "$.[?(@.type=~ /.*d-directory/)]");
    properties
}

/// One row of an HTML listing
enum Row<'a> {
    Directory(&'a str),
    File(&'a str, &'a str),
}

fn html_listing(rows: &[Row]) -> String {
    let mut table = vec![
        "<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>".to_string(),
        r#"<tr><td><a href="../">Parent Directory</a></td><td>-</td></tr>"#.to_string(),
    ];
    for row in rows {
        table.push(match row {
            Row::Directory(name) => format!(
                r#"<tr><td><a href="{0}/">{0}/</a></td><td>-</td><td>-</td></tr>"#,
                name
            ),
            Row::File(name, modified) => format!(
                r#"<tr><td><a href="{0}">{0}</a></td><td>{1}</td><td>1.2M</td></tr>"#,
                name, modified
            ),
        });
    }
    format!(
        "<html><head><title>Index</title></head><body><table>{}</table></body></html>",
        table.join("\n")
    )
}

async fn mount_listing(server: &MockServer, at: &str, rows: &[Row<'_>]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_listing(rows))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn locations(descriptors: &[ResourceDescriptor]) -> Vec<&str> {
    descriptors.iter().map(|d| d.location.as_str()).collect()
}

#[tokio::test]
async fn test_two_level_crawl() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/",
        &[Row::Directory("dir1"), Row::File("file1.nar", MODIFIED)],
    )
    .await;
    mount_listing(&mock_server, "/dir1/", &[Row::File("file2.nar", MODIFIED)]).await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(
        descriptors,
        vec![
            ResourceDescriptor::new("file1.nar", MODIFIED_MILLIS),
            ResourceDescriptor::new("dir1/file2.nar", MODIFIED_MILLIS),
        ]
    );
}

#[tokio::test]
async fn test_crawl_under_base_path_with_nar_location() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/repo/", &[Row::Directory("bundle-1.0")]).await;
    mount_listing(
        &mock_server,
        "/repo/bundle-1.0/nars/",
        &[Row::File("bundle-1.0.nar", MODIFIED)],
    )
    .await;

    let mut properties = create_test_properties(&format!("{}/repo", mock_server.uri()));
    properties.set(NAR_LOCATION, "nars");

    let provider = HttpsResourceProvider::from_properties(&properties).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(locations(&descriptors), vec!["bundle-1.0/nars/bundle-1.0.nar"]);
}

#[tokio::test]
async fn test_deep_tree_is_crawled_level_by_level() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/",
        &[Row::Directory("a"), Row::Directory("b")],
    )
    .await;
    mount_listing(&mock_server, "/a/", &[Row::Directory("deep")]).await;
    mount_listing(&mock_server, "/b/", &[Row::File("b.nar", MODIFIED)]).await;
    mount_listing(&mock_server, "/a/deep/", &[Row::File("deep.nar", MODIFIED)]).await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    // b.nar is one level shallower, so it is discovered first
    assert_eq!(locations(&descriptors), vec!["b/b.nar", "a/deep/deep.nar"]);
}

#[tokio::test]
async fn test_same_name_in_two_directories_is_excluded() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/",
        &[Row::Directory("dir1"), Row::Directory("dir2")],
    )
    .await;
    mount_listing(
        &mock_server,
        "/dir1/",
        &[Row::File("nifi.nar", MODIFIED), Row::File("other.nar", MODIFIED)],
    )
    .await;
    mount_listing(&mock_server, "/dir2/", &[Row::File("nifi.nar", MODIFIED)]).await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(locations(&descriptors), vec!["dir1/other.nar"]);
}

#[tokio::test]
async fn test_filter_drops_files_but_not_directories() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/",
        &[
            Row::Directory("bundles.d"),
            Row::File("keep.nar", MODIFIED),
            Row::File("keep.nar.sha256", MODIFIED),
            Row::File("readme.txt", MODIFIED),
        ],
    )
    .await;
    mount_listing(&mock_server, "/bundles.d/", &[Row::File("nested.nar", MODIFIED)]).await;

    let mut properties = create_test_properties(&mock_server.uri());
    properties.set("filter", r".*\.nar");

    let provider = HttpsResourceProvider::from_properties(&properties).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(locations(&descriptors), vec!["keep.nar", "bundles.d/nested.nar"]);
}

#[tokio::test]
async fn test_requests_carry_basic_credentials() {
    let mock_server = MockServer::start().await;

    // user:pass
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(html_listing(&[Row::File("file1.nar", MODIFIED)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(locations(&descriptors), vec!["file1.nar"]);
}

#[tokio::test]
async fn test_requests_route_through_authenticated_proxy() {
    let proxy_server = MockServer::start().await;

    // puser:ppass on the proxy, user:pass on the origin
    Mock::given(method("GET"))
        .and(header("Proxy-Authorization", "Basic cHVzZXI6cHBhc3M="))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(html_listing(&[Row::File("file1.nar", MODIFIED)])),
        )
        .expect(1)
        .mount(&proxy_server)
        .await;

    let address = proxy_server.address();
    let mut properties = create_test_properties("http://repo.invalid/nars");
    properties
        .set(PROXY_SERVER, address.ip().to_string())
        .set(PROXY_SERVER_PORT, address.port().to_string())
        .set(PROXY_USER, "puser")
        .set(PROXY_PASSWORD, "ppass");

    let provider = HttpsResourceProvider::from_properties(&properties).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(locations(&descriptors), vec!["file1.nar"]);
}

#[tokio::test]
async fn test_root_listing_error_status_is_discovery_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    assert!(matches!(err, ProviderError::Discovery { .. }));
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_child_listing_error_aborts_crawl() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/",
        &[Row::File("file1.nar", MODIFIED), Row::Directory("missing")],
    )
    .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    match err {
        ProviderError::Discovery { source } => match *source {
            ProviderError::Transport { url, status } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing/"));
            }
            other => panic!("expected Transport error, got {:?}", other),
        },
        other => panic!("expected Discovery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_timestamp_aborts_crawl() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/", &[Row::File("file1.nar", "yesterday")]).await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    match err {
        ProviderError::Discovery { source } => {
            assert!(matches!(*source, ProviderError::Parse(_)));
        }
        other => panic!("expected Discovery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unclosed_markup_aborts_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><table>"))
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    assert!(matches!(err, ProviderError::Discovery { .. }));
    assert!(err.to_string().contains("Markup structure error"));
}

#[tokio::test]
async fn test_slow_listing_hits_read_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_listing(&[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut properties = create_test_properties(&mock_server.uri());
    properties.set(READ_TIMEOUT, "200 ms");

    let provider = HttpsResourceProvider::from_properties(&properties).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    match err {
        ProviderError::Discovery { source } => {
            assert!(matches!(*source, ProviderError::Http { .. }));
        }
        other => panic!("expected Discovery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_child_resources() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/dir1/",
        &[Row::Directory("dir2"), Row::File("file2.nar", MODIFIED)],
    )
    .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let children = provider
        .list_child_resources(&ParsedEntry::directory("dir1/", ""))
        .await
        .unwrap();

    assert_eq!(
        children,
        vec![
            ParsedEntry::directory("dir2/", "dir1/"),
            ParsedEntry::file("file2.nar", MODIFIED_MILLIS, "dir1/"),
        ]
    );
}

#[tokio::test]
async fn test_json_listing_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"name": "Parent Directory"},
                {"name": "dir1/", "last modified": "-", "size": "-", "type": "g.com.d-directory"},
                {"name": "file1.nar", "last modified": "2021-05-17 21:09", "size": "1M", "type": "blob"}
            ]"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dir1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"name": "file2.nar", "last modified": "2021-05-17 00:00", "size": "1M", "type": "blob"}]"#,
        ))
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_json_properties(&mock_server.uri())).unwrap();
    let descriptors = provider.list_resources().await.unwrap();

    assert_eq!(
        descriptors,
        vec![
            ResourceDescriptor::new("file1.nar", MODIFIED_MILLIS),
            ResourceDescriptor::new("dir1/file2.nar", 1621209600000),
        ]
    );
}

#[tokio::test]
async fn test_invalid_json_listing_aborts_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{"))
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_json_properties(&mock_server.uri())).unwrap();
    let err = provider.list_resources().await.unwrap_err();

    assert!(err.to_string().contains("invalid JSON"));
}

#[tokio::test]
async fn test_fetch_streams_resource_bytes() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

    Mock::given(method("GET"))
        .and(path("/dir1/file2.nar"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let mut stream = provider
        .fetch(&ResourceDescriptor::new("dir1/file2.nar", MODIFIED_MILLIS))
        .await
        .unwrap();

    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, payload);
}

#[tokio::test]
async fn test_fetch_error_status_is_transport_error() {
    let mock_server = MockServer::start().await;

    let provider =
        HttpsResourceProvider::from_properties(&create_test_properties(&mock_server.uri())).unwrap();
    let result = provider
        .fetch(&ResourceDescriptor::new("gone.nar", MODIFIED_MILLIS))
        .await;

    match result {
        Err(ProviderError::Transport { status, .. }) => assert_eq!(status, 404),
        Err(other) => panic!("expected Transport error, got {:?}", other),
        Ok(_) => panic!("expected Transport error, got a stream"),
    }
}

#[tokio::test]
async fn test_missing_credentials_fail_initialization() {
    let mut properties = create_test_properties("http://localhost:8080");
    properties.remove("password");

    let mut provider = HttpsResourceProvider::new();
    let err = provider.initialize(&properties).unwrap_err();

    assert!(matches!(err, ProviderError::Config(ConfigError::Missing("password"))));
    assert!(!provider.is_initialized());
}

#[tokio::test]
async fn test_invalid_locator_fails_initialization() {
    let mut properties = create_test_properties("http://localhost:8080");
    properties.set("location.identifier", "./td[1/a");

    let err = HttpsResourceProvider::from_properties(&properties).unwrap_err();
    assert!(matches!(err, ProviderError::Config(ConfigError::Locator(_))));
}
