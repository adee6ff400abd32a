use askama::Template;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::extractors::MaybeUser;

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub current_user: Option<String>,
    pub path: Option<String>,
}

#[derive(Template)]
#[template(path = "core/403csrf.html")]
pub struct CsrfFailureTemplate {
    pub current_user: Option<String>,
    pub reason: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_response(StatusCode::OK, body),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Already-rendered HTML, e.g. a page served from the cache.
pub fn html_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Router fallback for every path nothing else matched.
pub async fn not_found(maybe_user: MaybeUser, uri: Uri) -> Response {
    not_found_page(maybe_user.username(), Some(uri.path().to_string()))
}

/// Fallback for static and media files, which run without app state.
pub async fn missing_file(uri: Uri) -> Response {
    not_found_page(None, Some(uri.path().to_string()))
}

/// `core/404.html` with a 404 status.
pub fn not_found_page(current_user: Option<String>, path: Option<String>) -> Response {
    let page = NotFoundTemplate { current_user, path };
    match page.render() {
        Ok(body) => html_response(StatusCode::NOT_FOUND, body),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}
