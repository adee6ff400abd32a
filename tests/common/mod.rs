//! Shared harness for the router tests: a temp data dir, a migrated
//! database and helpers that drive the router with `oneshot`.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::auth::session;
use yatube::config::Config;
use yatube::db::models::{Group, User};
use yatube::db::posts::{self, PostInput};
use yatube::db::{self, groups, users};
use yatube::routes;
use yatube::state::AppState;

pub const HOST: &str = "testserver";
const BOUNDARY: &str = "yatube-test-boundary";

/// 1x2 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub struct TestApp {
    pub state: AppState,
    pub dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// A file part for a multipart form.
pub struct Upload<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Number of post cards rendered on a listing page.
    pub fn post_cards(&self) -> usize {
        self.body.matches("class=\"post-card\"").count()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.resolve_paths(dir.path());
        config.auth.bcrypt_cost = 4;

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        Self {
            state: AppState::new(pool, config),
            dir,
        }
    }

    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn user(&self, username: &str) -> User {
        users::create_user(&self.conn(), username, None).unwrap()
    }

    pub fn group(&self, title: &str, slug: &str) -> Group {
        groups::create_group(&self.conn(), title, slug, "Test description").unwrap()
    }

    pub fn post(&self, author: &User, text: &str, group: Option<&Group>) -> i64 {
        posts::create_post(
            &self.conn(),
            author.id,
            &PostInput {
                text: text.to_string(),
                group_id: group.map(|g| g.id),
                image: None,
            },
        )
        .unwrap()
    }

    /// Cookie header value that signs `user` in.
    pub fn login(&self, user: &User) -> String {
        let token = session::create_session(&self.state.db, user.id, 1).unwrap();
        format!("{}={}", self.state.config.auth.cookie_name, token)
    }

    pub fn post_count(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = routes::app(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(path).header(header::HOST, HOST);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::HOST, HOST)
            .header(header::ORIGIN, format!("http://{}", HOST))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        upload: Option<Upload<'_>>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::HOST, HOST)
            .header(header::ORIGIN, format!("http://{}", HOST))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = multipart_body(fields, upload);
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}

pub fn multipart_body(fields: &[(&str, &str)], upload: Option<Upload<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(upload) = upload {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, upload.field, upload.file_name, upload.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(upload.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
