mod support;

use std::time::Duration;

use axum::http::StatusCode;
use yatube::cache::{FragmentCacheConfig, INDEX_PAGE_FRAGMENT};

use support::TestApp;

fn card_count(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}

#[tokio::test]
async fn index_fragment_stays_stale_until_invalidated() {
    let app = TestApp::new();
    let author = app.user("leo").await;
    app.post(&author, "Already there", None).await;

    let first = app.get("/", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert!(first.body.contains("Already there"));

    app.post(&author, "Written after caching", None).await;

    let stale = app.get("/", None).await;
    assert!(stale.body.contains("Already there"));
    assert!(!stale.body.contains("Written after caching"));

    assert_eq!(app.fragments.invalidate(INDEX_PAGE_FRAGMENT), 1);

    let fresh = app.get("/", None).await;
    assert!(fresh.body.contains("Written after caching"));
}

#[tokio::test]
async fn index_fragment_expires_after_its_ttl() {
    let app = TestApp::with_cache(FragmentCacheConfig {
        ttl: Duration::from_millis(50),
        ..FragmentCacheConfig::default()
    });
    let author = app.user("leo").await;

    let empty = app.get("/", None).await;
    assert!(empty.body.contains("No posts yet."));

    app.post(&author, "Shows up later", None).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let refreshed = app.get("/", None).await;
    assert!(refreshed.body.contains("Shows up later"));
}

#[tokio::test]
async fn cached_fragment_keeps_the_viewer_chrome_live() {
    let app = TestApp::new();
    let author = app.user("leo").await;

    app.get("/", None).await;

    let cookie = app.sign_in(&author).await;
    let signed_in = app.get("/", Some(&cookie)).await;
    assert!(signed_in.body.contains("Log out"));
}

#[tokio::test]
async fn listings_are_paginated_by_ten() {
    let app = TestApp::with_cache(FragmentCacheConfig {
        enabled: false,
        ..FragmentCacheConfig::default()
    });
    let author = app.user("leo").await;
    for n in 0..13 {
        app.post(&author, &format!("Post number {n}"), None).await;
    }

    let first = app.get("/", None).await;
    assert_eq!(card_count(&first.body), 10);
    assert!(first.body.contains("Post number 12"));
    assert!(!first.body.contains("Post number 2<"));

    let second = app.get("/?page=2", None).await;
    assert_eq!(card_count(&second.body), 3);
    assert!(second.body.contains("Post number 0"));

    let garbage = app.get("/?page=abc", None).await;
    assert_eq!(card_count(&garbage.body), 10);

    let beyond = app.get("/?page=99", None).await;
    assert_eq!(card_count(&beyond.body), 3);

    let profile = app.get("/leo/?page=2", None).await;
    assert_eq!(card_count(&profile.body), 3);
}
