use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db::users;
use crate::error::AppResult;
use crate::extractors::{session_token, MaybeUser};
use crate::routes::core::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub current_user: Option<String>,
    pub next: String,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub current_user: Option<String>,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub current_user: Option<String>,
}

// -- Request types --

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: &str) -> Option<&str> {
    let is_local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    is_local.then_some(next)
}

/// 303 to `location` while setting the session cookie.
fn signed_in_redirect(state: &AppState, token: &str, location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (
                header::SET_COOKIE,
                session::session_cookie(
                    &state.config.auth.cookie_name,
                    token,
                    state.config.auth.session_hours,
                ),
            ),
        ],
        "",
    )
        .into_response()
}

// -- Login handlers --

/// GET /auth/login/: render login page
pub async fn login_page(
    maybe_user: MaybeUser,
    Query(query): Query<LoginQuery>,
) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        current_user: maybe_user.username(),
        next: query.next.unwrap_or_default(),
        username: String::new(),
        errors: Vec::new(),
    })
}

/// POST /auth/login/: check credentials and start a session
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let username = form.username.trim().to_string();

    let user = {
        let conn = state.db.get()?;
        users::find_by_username(&conn, &username)?
    };

    let authenticated = match user.as_ref().and_then(|u| u.password_hash.clone()) {
        Some(hash) => password::verify_password(form.password, hash).await?,
        None => false,
    };

    let user = match user {
        Some(user) if authenticated => user,
        _ => {
            tracing::warn!("Failed login attempt for {:?}", username);
            return Ok(Html(LoginTemplate {
                current_user: None,
                next: form.next,
                username,
                errors: vec![
                    "Please enter a correct username and password. Both fields may be case-sensitive."
                        .to_string(),
                ],
            })
            .into_response());
        }
    };

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    tracing::info!("{} logged in", user.username);

    let location = safe_next(&form.next).unwrap_or("/");
    Ok(signed_in_redirect(&state, &token, location))
}

// -- Signup handlers --

/// GET /auth/signup/
pub async fn signup_page(maybe_user: MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        current_user: maybe_user.username(),
        username: String::new(),
        errors: Vec::new(),
    })
}

/// POST /auth/signup/: create an account and sign it in
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();

    let mut errors = Vec::new();
    if let Err(e) = password::validate_username(&username) {
        errors.push(e);
    }
    errors.extend(password::validate_new_password(&form.password1, &form.password2));
    if errors.is_empty() {
        let conn = state.db.get()?;
        if users::username_taken(&conn, &username)? {
            errors.push("Username: a user with that username already exists.".to_string());
        }
    }

    if !errors.is_empty() {
        return Ok(Html(SignupTemplate {
            current_user: None,
            username,
            errors,
        })
        .into_response());
    }

    let hash = password::hash_password_blocking(form.password1, state.config.auth.bcrypt_cost).await?;
    let user = {
        let conn = state.db.get()?;
        users::create_user(&conn, &username, Some(&hash))?
    };
    tracing::info!("New account: {}", user.username);

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    Ok(signed_in_redirect(&state, &token, "/"))
}

// -- Logout handler --

/// GET or POST /auth/logout/: delete session and show the farewell page
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    let page = LoggedOutTemplate { current_user: None }.render()?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::SET_COOKIE, session::clear_session_cookie(cookie_name)),
        ],
        page,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_accepts_local_paths() {
        assert_eq!(safe_next("/create/"), Some("/create/"));
        assert_eq!(safe_next("/profile/leo/follow/"), Some("/profile/leo/follow/"));
    }

    #[test]
    fn safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next("https://evil.test/"), None);
        assert_eq!(safe_next("//evil.test/"), None);
        assert_eq!(safe_next("/\\evil.test"), None);
        assert_eq!(safe_next(""), None);
    }
}
