mod common;

use axum::http::StatusCode;
use common::TestApp;
use yatube::db::posts;

#[tokio::test]
async fn new_post_appears_on_index_group_and_profile() {
    let app = TestApp::new();
    let author = app.user("author");
    let group = app.group("Cats", "cats");
    app.group("Dogs", "dogs");
    app.post(&author, "Whiskers at dawn", Some(&group));

    for path in ["/", "/group/cats/", "/profile/author/"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.contains("Whiskers at dawn"), "missing on {}", path);
        assert_eq!(response.post_cards(), 1, "on {}", path);
    }

    let other = app.get("/group/dogs/", None).await;
    assert!(!other.body.contains("Whiskers at dawn"));
    assert_eq!(other.post_cards(), 0);
}

#[tokio::test]
async fn listings_render_the_paginator_pages() {
    let app = TestApp::new();
    let author = app.user("author");
    let group = app.group("Cats", "cats");
    for i in 0..13 {
        app.post(&author, &format!("Post number {}", i), Some(&group));
    }

    for path in ["/", "/group/cats/", "/profile/author/"] {
        let first = app.get(path, None).await;
        assert_eq!(first.post_cards(), 10, "first page of {}", path);
        assert!(first.body.contains("Page 1 of 2"));

        let second = app.get(&format!("{}?page=2", path), None).await;
        assert_eq!(second.post_cards(), 3, "second page of {}", path);
    }
}

#[tokio::test]
async fn out_of_range_pages_fall_back() {
    let app = TestApp::new();
    let author = app.user("author");
    for i in 0..13 {
        app.post(&author, &format!("Post number {}", i), None);
    }

    let past_end = app.get("/profile/author/?page=99", None).await;
    assert_eq!(past_end.status, StatusCode::OK);
    assert_eq!(past_end.post_cards(), 3);

    let garbage = app.get("/profile/author/?page=abc", None).await;
    assert_eq!(garbage.post_cards(), 10);
}

#[tokio::test]
async fn newest_post_is_listed_first() {
    let app = TestApp::new();
    let author = app.user("author");
    app.post(&author, "Older entry", None);
    app.post(&author, "Newer entry", None);

    let body = app.get("/profile/author/", None).await.body;
    let newer = body.find("Newer entry").unwrap();
    let older = body.find("Older entry").unwrap();
    assert!(newer < older);
}

#[tokio::test]
async fn detail_page_shows_post_and_author_count() {
    let app = TestApp::new();
    let author = app.user("author");
    app.post(&author, "First words", None);
    let id = app.post(&author, "Second words", None);

    let response = app.get(&format!("/posts/{}/", id), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Second words"));
    assert!(response.body.contains("Posts by this author: 2"));
    assert!(!response.body.contains("Edit post"));

    let cookie = app.login(&author);
    let own = app.get(&format!("/posts/{}/", id), Some(&cookie)).await;
    assert!(own.body.contains("Edit post"));
}

#[tokio::test]
async fn create_and_edit_pages_render_the_form() {
    let app = TestApp::new();
    let author = app.user("author");
    app.group("Cats", "cats");
    let id = app.post(&author, "Draft text", None);
    let cookie = app.login(&author);

    let create = app.get("/create/", Some(&cookie)).await;
    assert!(create.body.contains("name=\"text\""));
    assert!(create.body.contains("name=\"group\""));
    assert!(create.body.contains("type=\"file\""));
    assert!(create.body.contains(">Cats</option>"));

    let edit = app.get(&format!("/posts/{}/edit/", id), Some(&cookie)).await;
    assert!(edit.body.contains("Edit post"));
    assert!(edit.body.contains("Draft text"));
}

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let app = TestApp::new();
    let author = app.user("author");
    app.post(&author, "Cached entry", None);

    let first = app.get("/", None).await;
    assert!(first.body.contains("Cached entry"));

    app.post(&author, "Fresh entry", None);
    let cached = app.get("/", None).await;
    assert_eq!(cached.body, first.body);
    assert!(!cached.body.contains("Fresh entry"));

    app.state.index_cache.lock().await.clear();
    let refreshed = app.get("/", None).await;
    assert!(refreshed.body.contains("Fresh entry"));
}

#[tokio::test]
async fn deleted_post_stays_on_cached_index() {
    let app = TestApp::new();
    let author = app.user("author");
    let id = app.post(&author, "Soon to be gone", None);

    let first = app.get("/", None).await;
    assert!(first.body.contains("Soon to be gone"));

    assert!(posts::delete_post(&app.conn(), id).unwrap());
    let cached = app.get("/", None).await;
    assert_eq!(cached.body, first.body);

    app.state.index_cache.lock().await.clear();
    let refreshed = app.get("/", None).await;
    assert_ne!(refreshed.body, first.body);
    assert!(!refreshed.body.contains("Soon to be gone"));
}

#[tokio::test]
async fn index_cache_is_per_viewer() {
    let app = TestApp::new();
    let author = app.user("author");
    app.post(&author, "Cached entry", None);
    let cookie = app.login(&author);

    let anonymous = app.get("/", None).await;
    assert!(anonymous.body.contains("Log in"));

    let signed_in = app.get("/", Some(&cookie)).await;
    assert!(signed_in.body.contains("Log out"));
    assert!(!signed_in.body.contains("Sign up"));
}

#[tokio::test]
async fn comments_show_on_the_detail_page() {
    let app = TestApp::new();
    let author = app.user("author");
    let reader = app.user("reader");
    let id = app.post(&author, "Discuss this", None);
    let cookie = app.login(&reader);

    let path = format!("/posts/{}/comment/", id);
    let response = app
        .post_form(&path, Some(&cookie), &[("text", "Nice point")])
        .await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), format!("/posts/{}/", id));

    let detail = app.get(&format!("/posts/{}/", id), None).await;
    assert!(detail.body.contains("Nice point"));
    assert!(detail.body.contains("reader"));
}

#[tokio::test]
async fn blank_comment_is_not_saved() {
    let app = TestApp::new();
    let author = app.user("author");
    let id = app.post(&author, "Discuss this", None);
    let cookie = app.login(&author);

    let path = format!("/posts/{}/comment/", id);
    let response = app.post_form(&path, Some(&cookie), &[("text", "   ")]).await;
    assert!(response.status.is_redirection());

    let count: i64 = app
        .conn()
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn comment_on_missing_post_is_404() {
    let app = TestApp::new();
    let reader = app.user("reader");
    let cookie = app.login(&reader);
    let response = app
        .post_form("/posts/42/comment/", Some(&cookie), &[("text", "Hello")])
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_feed_shows_followed_authors_only() {
    let app = TestApp::new();
    let author = app.user("author");
    let follower = app.user("follower");
    let stranger = app.user("stranger");
    app.post(&author, "For my followers", None);

    let follower_cookie = app.login(&follower);
    let stranger_cookie = app.login(&stranger);

    let response = app
        .get("/profile/author/follow/", Some(&follower_cookie))
        .await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), "/profile/author/");

    let feed = app.get("/follow/", Some(&follower_cookie)).await;
    assert!(feed.body.contains("For my followers"));

    let other_feed = app.get("/follow/", Some(&stranger_cookie)).await;
    assert!(!other_feed.body.contains("For my followers"));

    app.get("/profile/author/unfollow/", Some(&follower_cookie))
        .await;
    let feed = app.get("/follow/", Some(&follower_cookie)).await;
    assert!(!feed.body.contains("For my followers"));
}

#[tokio::test]
async fn following_twice_or_yourself_changes_nothing() {
    let app = TestApp::new();
    let author = app.user("author");
    let follower = app.user("follower");
    let follower_cookie = app.login(&follower);
    let author_cookie = app.login(&author);

    app.get("/profile/author/follow/", Some(&follower_cookie)).await;
    app.get("/profile/author/follow/", Some(&follower_cookie)).await;
    app.get("/profile/author/follow/", Some(&author_cookie)).await;

    let profile = app.get("/profile/author/", None).await;
    assert!(profile.body.contains("Followers: 1"));

    let own_profile = app.get("/profile/author/", Some(&author_cookie)).await;
    assert!(!own_profile.body.contains(">Follow<"));
    assert!(!own_profile.body.contains(">Unfollow<"));

    let as_follower = app.get("/profile/author/", Some(&follower_cookie)).await;
    assert!(as_follower.body.contains(">Unfollow<"));
}

#[tokio::test]
async fn follow_unknown_author_is_404() {
    let app = TestApp::new();
    let follower = app.user("follower");
    let cookie = app.login(&follower);
    let response = app.get("/profile/nobody/follow/", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
