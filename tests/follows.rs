mod support;

use axum::http::StatusCode;
use postern::application::repos::FollowsRepo;
use support::TestApp;

#[tokio::test]
async fn following_adds_author_posts_to_the_follow_feed() {
    let app = TestApp::without_cache();
    let author = app.user("auth").await;
    let follower = app.user("follower").await;
    app.user("bystander").await;
    let post = app.post(&author, None).await;

    let response = app.get("/profile/auth/follow/", Some("follower")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/profile/auth/"));
    assert!(
        app.backend
            .is_following(follower.id, author.id)
            .await
            .expect("lookup")
    );

    let feed = app.get("/follow/", Some("follower")).await;
    assert_eq!(feed.status, StatusCode::OK);
    assert_eq!(feed.post_count(), 1);
    assert!(feed.links_to_post(post.id));

    let other = app.get("/follow/", Some("bystander")).await;
    assert_eq!(other.post_count(), 0);
}

#[tokio::test]
async fn new_posts_reach_followers_only() {
    let app = TestApp::without_cache();
    let author = app.user("auth").await;
    app.user("follower").await;
    app.user("bystander").await;

    app.post_form("/profile/auth/follow/", Some("follower"), "")
        .await;
    let fresh = app.post(&author, None).await;

    assert!(app.get("/follow/", Some("follower")).await.links_to_post(fresh.id));
    assert!(!app.get("/follow/", Some("bystander")).await.links_to_post(fresh.id));
}

#[tokio::test]
async fn follow_and_unfollow_are_idempotent() {
    let app = TestApp::without_cache();
    let author = app.user("auth").await;
    let follower = app.user("follower").await;

    for _ in 0..2 {
        let response = app.get("/profile/auth/follow/", Some("follower")).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
    }
    assert!(
        app.backend
            .is_following(follower.id, author.id)
            .await
            .expect("lookup")
    );

    let response = app.get("/profile/auth/unfollow/", Some("follower")).await;
    assert_eq!(response.location(), Some("/profile/auth/"));
    assert!(
        !app.backend
            .is_following(follower.id, author.id)
            .await
            .expect("lookup")
    );

    let again = app.get("/profile/auth/unfollow/", Some("follower")).await;
    assert_eq!(again.status, StatusCode::SEE_OTHER);
    assert_eq!(again.location(), Some("/profile/auth/"));
}

#[tokio::test]
async fn following_yourself_creates_no_edge() {
    let app = TestApp::without_cache();
    let author = app.user("auth").await;
    let post = app.post(&author, None).await;

    let response = app.get("/profile/auth/follow/", Some("auth")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/profile/auth/"));
    assert!(
        !app.backend
            .is_following(author.id, author.id)
            .await
            .expect("lookup")
    );
    assert!(!app.get("/follow/", Some("auth")).await.links_to_post(post.id));
}

#[tokio::test]
async fn following_an_unknown_user_is_not_found() {
    let app = TestApp::without_cache();
    app.user("follower").await;

    let response = app.get("/profile/nobody/follow/", Some("follower")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_reflects_follow_state() {
    let app = TestApp::without_cache();
    app.user("auth").await;
    app.user("follower").await;

    let anonymous = app.get("/profile/auth/", None).await;
    assert!(!anonymous.body.contains("/profile/auth/follow/"));

    let own = app.get("/profile/auth/", Some("auth")).await;
    assert!(!own.body.contains("/profile/auth/follow/"));

    let before = app.get("/profile/auth/", Some("follower")).await;
    assert!(before.body.contains("action=\"/profile/auth/follow/\""));

    app.get("/profile/auth/follow/", Some("follower")).await;
    let after = app.get("/profile/auth/", Some("follower")).await;
    assert!(after.body.contains("action=\"/profile/auth/unfollow/\""));
}

#[tokio::test]
async fn profile_links_and_redirects_encode_the_username() {
    let app = TestApp::without_cache();
    let author = app.user("Лев").await;
    app.user("reader").await;
    let post = app.post(&author, None).await;
    let encoded = "/profile/%D0%9B%D0%B5%D0%B2/";

    let home = app.get("/", None).await;
    assert!(home.body.contains(&format!("href=\"{encoded}\"")));
    assert!(app.get(&format!("/posts/{}/", post.id), None).await.body.contains(encoded));

    let profile = app.get(encoded, Some("reader")).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert!(profile.body.contains(&format!("action=\"{encoded}follow/\"")));

    let response = app
        .post_form(&format!("{encoded}follow/"), Some("reader"), "")
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some(encoded));
}

#[tokio::test]
async fn reserved_characters_in_stored_usernames_stay_reachable() {
    let app = TestApp::without_cache();
    let author = app.user("bob?x").await;
    app.post(&author, None).await;

    let home = app.get("/", None).await;
    assert!(home.body.contains("href=\"/profile/bob%3Fx/\""));
    assert_eq!(app.get("/profile/bob%3Fx/", None).await.status, StatusCode::OK);
}
