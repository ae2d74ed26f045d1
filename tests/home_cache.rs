mod support;

use axum::http::StatusCode;
use postern::application::repos::PostsWriteRepo;
use support::TestApp;

#[tokio::test]
async fn home_feed_is_served_stale_until_the_cache_is_cleared() {
    let app = TestApp::new();
    let author = app.user("auth").await;
    let post = app.post(&author, None).await;

    let cached = app.get("/", None).await;
    assert!(cached.links_to_post(post.id));

    app.backend
        .delete_post(post.id)
        .await
        .expect("post should delete");

    let stale = app.get("/", None).await;
    assert_eq!(stale.body, cached.body);

    app.state
        .cache
        .as_ref()
        .expect("cache enabled by default")
        .store
        .clear();

    let fresh = app.get("/", None).await;
    assert_ne!(fresh.body, cached.body);
    assert!(!fresh.links_to_post(post.id));
}

#[tokio::test]
async fn signed_in_viewers_get_their_own_entry() {
    let app = TestApp::new();
    let author = app.user("auth").await;
    app.post(&author, None).await;

    let anonymous = app.get("/", None).await;
    let signed_in = app.get("/", Some("auth")).await;

    assert!(!anonymous.body.contains("New post"));
    assert!(signed_in.body.contains("New post"));
}

#[tokio::test]
async fn other_feeds_are_never_cached() {
    let app = TestApp::new();
    let author = app.user("auth").await;
    let group = app.group("Test group", "test-slug").await;
    let post = app.post(&author, Some(&group)).await;

    assert!(app.get("/group/test-slug/", None).await.links_to_post(post.id));
    app.backend
        .delete_post(post.id)
        .await
        .expect("post should delete");

    let response = app.get("/group/test-slug/", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.links_to_post(post.id));

    let detail = app.get(&format!("/posts/{}/", post.id), None).await;
    assert_eq!(detail.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_check_reports_storage_ok() {
    let app = TestApp::new();

    let response = app.get("/_health/db", None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}
