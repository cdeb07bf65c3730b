use std::collections::HashMap;
use std::path::Path;

use swagger_sync::{FetchError, Locator, Patterns, Resolution, Resolver, SpecFetcher, SpecSource};

struct FakeFetcher {
    bodies: HashMap<String, String>,
}

impl FakeFetcher {
    fn new(bodies: &[(&str, &str)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| ((*url).to_owned(), (*body).to_owned()))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl SpecFetcher for FakeFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            url: url.to_owned(),
        })
    }
}

const ORDERS: &str = "https://svc/atg-orders-dev/swagger/v2/swagger.json";
const USERS: &str = "https://svc/atg-users-dev/swagger/v1/swagger.json";
const BODY: &str = r#"{"info":{"version":"1.0.0"}}"#;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

fn identities(resolutions: &[Resolution]) -> Vec<String> {
    resolutions
        .iter()
        .map(|r| match r {
            Resolution::Ready(item) => item.key(),
            Resolution::Unavailable { source, .. } => format!("unavailable:{source}"),
        })
        .collect()
}

#[tokio::test]
async fn single_url_resolves_project_and_folder() {
    let resolver = Resolver::new(FakeFetcher::new(&[(ORDERS, BODY)]));

    let resolutions = resolver
        .resolve(&SpecSource::Remote(Locator::Pattern {
            url: ORDERS.to_owned(),
            patterns: Patterns::default(),
        }))
        .await;

    assert_eq!(resolutions.len(), 1);
    let Resolution::Ready(item) = &resolutions[0] else {
        panic!("expected a ready item, got {resolutions:?}");
    };
    assert_eq!(item.key(), "orders/v2");
    assert_eq!(item.file_path(), "orders/v2/swagger.json");
    assert_eq!(item.raw_content, BODY);
    assert_eq!(item.source_url, ORDERS);
}

#[tokio::test]
async fn legacy_list_field_is_accepted_and_failures_become_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(
        dir.path(),
        "swagger.json",
        &format!(r#"{{"atgList":[{{"url":"{ORDERS}"}},{{"url":"https://svc/atg-gone-dev/swagger/v1/swagger.json"}},{{"url":"{USERS}"}}]}}"#),
    );
    let resolver = Resolver::new(FakeFetcher::new(&[(ORDERS, BODY), (USERS, BODY)]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    assert_eq!(
        identities(&resolutions),
        vec![
            "orders/v2".to_owned(),
            "unavailable:https://svc/atg-gone-dev/swagger/v1/swagger.json".to_owned(),
            "users/v1".to_owned(),
        ]
    );
    let Resolution::Unavailable { reason, .. } = &resolutions[1] else {
        unreachable!();
    };
    assert!(reason.contains("404"), "reason was {reason}");
}

#[tokio::test]
async fn nested_items_and_file_references_are_flattened() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "teams/users.json",
        &format!(r#"{{"items":[{{"url":"{USERS}"}}]}}"#),
    );
    let manifest = write(
        dir.path(),
        "root.json",
        &format!(r#"{{"items":[{{"items":[{{"url":"{ORDERS}"}}]}},{{"file":"teams/users.json"}}]}}"#),
    );
    let resolver = Resolver::new(FakeFetcher::new(&[(ORDERS, BODY), (USERS, BODY)]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    assert_eq!(identities(&resolutions), vec!["orders/v2", "users/v1"]);
}

#[tokio::test]
async fn module_entries_build_query_url() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(
        dir.path(),
        "swagger.json",
        r#"{"items":[{"baseUrl":"https://docs/api","module":"billing","definition":"public","projectName":"Billing","folderName":"public"}]}"#,
    );
    let url = "https://docs/api?module=billing&definition=public";
    let resolver = Resolver::new(FakeFetcher::new(&[(url, BODY)]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    let [Resolution::Ready(item)] = resolutions.as_slice() else {
        panic!("expected one ready item, got {resolutions:?}");
    };
    assert_eq!(item.key(), "billing/public");
    assert_eq!(item.source_url, url);
}

#[tokio::test]
async fn entry_patterns_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://svc/payments/api/v3/openapi.json";
    let manifest = write(
        dir.path(),
        "swagger.json",
        &format!(r#"{{"items":[{{"url":"{url}","keyRegEx":"svc/(.*?)/api","verRegEx":"api/(.*?)/openapi"}}]}}"#),
    );
    let resolver = Resolver::new(FakeFetcher::new(&[(url, BODY)]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    assert_eq!(identities(&resolutions), vec!["payments/v3"]);
}

#[tokio::test]
async fn unmatched_patterns_use_fallback_names() {
    let url = "https://example.com/openapi.json";
    let resolver = Resolver::new(FakeFetcher::new(&[(url, BODY)]));

    let resolutions = resolver
        .resolve(&SpecSource::Remote(Locator::Pattern {
            url: url.to_owned(),
            patterns: Patterns::default(),
        }))
        .await;

    assert_eq!(identities(&resolutions), vec!["notfound/0.0"]);
}

#[tokio::test]
async fn empty_body_is_unavailable() {
    let resolver = Resolver::new(FakeFetcher::new(&[(ORDERS, "")]));

    let resolutions = resolver
        .resolve(&SpecSource::Remote(Locator::Pattern {
            url: ORDERS.to_owned(),
            patterns: Patterns::default(),
        }))
        .await;

    assert!(matches!(
        resolutions.as_slice(),
        [Resolution::Unavailable { reason, .. }] if reason == "empty response"
    ));
}

#[tokio::test]
async fn self_referencing_manifest_stops_at_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(
        dir.path(),
        "loop.json",
        &format!(r#"{{"items":[{{"url":"{ORDERS}"}},{{"file":"loop.json"}}]}}"#),
    );
    let resolver = Resolver::new(FakeFetcher::new(&[(ORDERS, BODY)]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    let ready = resolutions
        .iter()
        .filter(|r| matches!(r, Resolution::Ready(_)))
        .count();
    assert_eq!(ready, 8);
    assert!(matches!(
        resolutions.last(),
        Some(Resolution::Unavailable { reason, .. }) if reason.contains("nesting")
    ));
}

#[tokio::test]
async fn unreadable_manifest_is_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = Resolver::new(FakeFetcher::new(&[]));

    let missing = resolver
        .resolve(&SpecSource::Manifest(dir.path().join("absent.json")))
        .await;
    assert!(matches!(missing.as_slice(), [Resolution::Unavailable { .. }]));

    let bad = write(dir.path(), "bad.json", r#"{"nothing":[]}"#);
    let invalid = resolver.resolve(&SpecSource::Manifest(bad)).await;
    assert!(matches!(
        invalid.as_slice(),
        [Resolution::Unavailable { reason, .. }] if reason.starts_with("invalid manifest")
    ));
}

#[tokio::test]
async fn entry_without_locator_is_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write(dir.path(), "swagger.json", r#"{"items":[{"module":"only"}]}"#);
    let resolver = Resolver::new(FakeFetcher::new(&[]));

    let resolutions = resolver.resolve(&SpecSource::Manifest(manifest)).await;

    assert!(matches!(resolutions.as_slice(), [Resolution::Unavailable { .. }]));
}
