mod common;

use axum::http::StatusCode;
use common::TestApp;

struct Fixture {
    app: TestApp,
    author_cookie: String,
    other_cookie: String,
    post_id: i64,
}

fn fixture() -> Fixture {
    let app = TestApp::new();
    let author = app.user("author");
    let other = app.user("reader");
    let group = app.group("Test group", "test-slug");
    let post_id = app.post(&author, "Test post text", Some(&group));
    Fixture {
        author_cookie: app.login(&author),
        other_cookie: app.login(&other),
        app,
        post_id,
    }
}

#[tokio::test]
async fn public_pages_are_available_to_anyone() {
    let f = fixture();
    let detail = format!("/posts/{}/", f.post_id);
    for path in ["/", "/group/test-slug/", "/profile/author/", detail.as_str()] {
        let response = f.app.get(path, None).await;
        assert_eq!(response.status, StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn unknown_page_renders_custom_404() {
    let f = fixture();
    let response = f.app.get("/unexisting_page/", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("Page not found"));
}

#[tokio::test]
async fn unknown_objects_are_404() {
    let f = fixture();
    for path in [
        "/group/no-such-group/",
        "/profile/nobody/",
        "/posts/9999/",
        "/posts/not-a-number/",
    ] {
        let response = f.app.get(path, None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "GET {}", path);
        assert!(response.body.contains("Page not found"));
    }
}

#[tokio::test]
async fn create_page_requires_login() {
    let f = fixture();
    let response = f.app.get("/create/", None).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), "/auth/login/?next=/create/");

    let response = f.app.get("/create/", Some(&f.author_cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn anonymous_edit_redirects_to_login_with_next() {
    let f = fixture();
    let path = format!("/posts/{}/edit/", f.post_id);
    let response = f.app.get(&path, None).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), format!("/auth/login/?next={}", path));
}

#[tokio::test]
async fn only_the_author_can_open_the_edit_page() {
    let f = fixture();
    let path = format!("/posts/{}/edit/", f.post_id);

    let response = f.app.get(&path, Some(&f.other_cookie)).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), format!("/posts/{}/", f.post_id));

    let response = f.app.get(&path, Some(&f.author_cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn follow_pages_require_login() {
    let f = fixture();
    for path in [
        "/follow/",
        "/profile/author/follow/",
        "/profile/author/unfollow/",
    ] {
        let response = f.app.get(path, None).await;
        assert!(response.status.is_redirection(), "GET {}", path);
        assert_eq!(response.location(), format!("/auth/login/?next={}", path));
    }
}

#[tokio::test]
async fn anonymous_comment_redirects_to_login() {
    let f = fixture();
    let path = format!("/posts/{}/comment/", f.post_id);
    let response = f.app.post_form(&path, None, &[("text", "hi")]).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), format!("/auth/login/?next={}", path));
}

#[tokio::test]
async fn expired_session_counts_as_anonymous() {
    let f = fixture();
    f.app
        .conn()
        .execute("UPDATE sessions SET expires_at = datetime('now', '-1 hour')", [])
        .unwrap();
    let response = f.app.get("/create/", Some(&f.author_cookie)).await;
    assert!(response.status.is_redirection());
}

#[tokio::test]
async fn stylesheet_is_served() {
    let f = fixture();
    let response = f.app.get("/assets/css/style.css", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(".post-card"));
}

#[tokio::test]
async fn auth_pages_are_available() {
    let f = fixture();
    for path in ["/auth/login/", "/auth/signup/", "/auth/logout/"] {
        let response = f.app.get(path, None).await;
        assert_eq!(response.status, StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn missing_static_and_media_files_render_custom_404() {
    let f = fixture();
    for path in ["/assets/css/missing.css", "/media/posts/nope.gif"] {
        let response = f.app.get(path, None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "GET {}", path);
        assert!(response.body.contains("Page not found"), "GET {}", path);
    }
}

#[tokio::test]
async fn login_redirect_keeps_the_query_string() {
    let f = fixture();
    let response = f.app.get("/follow/?page=2", None).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), "/auth/login/?next=/follow/%3Fpage%3D2");
}
