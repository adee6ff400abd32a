use askama::Template;
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::routes::core::{html_response, CsrfFailureTemplate};

/// Reject state-changing requests whose `Origin` (or `Referer`) names a
/// different host than the one the request was sent to.
pub async fn verify_origin(request: Request, next: Next) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    if let Err(reason) = check_headers(request.headers()) {
        tracing::warn!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            reason
        );
        return forbidden(reason);
    }

    next.run(request).await
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn check_headers(headers: &HeaderMap) -> Result<(), &'static str> {
    let source = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok());

    // No origin information: the SameSite=Strict session cookie already
    // keeps cross-site form posts from carrying a session.
    let Some(source) = source else {
        return Ok(());
    };

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or("Host header missing")?;

    if origin_matches(source, host) {
        Ok(())
    } else {
        Err("Origin checking failed")
    }
}

/// Whether `origin` (a URL such as `https://example.com:8443/path`) points at
/// the same `host[:port]` as the `Host` header.
pub fn origin_matches(origin: &str, host: &str) -> bool {
    let Ok(url) = url::Url::parse(origin) else {
        return false;
    };
    let Some(origin_host) = url.host_str() else {
        return false;
    };

    let origin_authority = match url.port() {
        Some(port) => format!("{}:{}", origin_host, port),
        None => origin_host.to_string(),
    };
    origin_authority.eq_ignore_ascii_case(host)
}

fn forbidden(reason: &str) -> Response {
    let page = CsrfFailureTemplate {
        current_user: None,
        reason: reason.to_string(),
    };
    match page.render() {
        Ok(body) => html_response(StatusCode::FORBIDDEN, body),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::FORBIDDEN, "CSRF verification failed").into_response()
        }
    }
}
