use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::db::follows;
use crate::db::posts::PostFilter;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::Page;
use crate::routes::core::Html;
use crate::routes::posts::{paginate, profile_url, PageQuery, PostView};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowFeedTemplate {
    pub current_user: Option<String>,
    pub page: Page<PostView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

/// Posts by everyone the current user follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowFeedTemplate>> {
    let conn = state.db.get()?;
    let page = paginate(
        &conn,
        PostFilter::FollowedBy(user.id),
        state.config.posts.per_page,
        query.page.as_deref(),
    )?;

    Ok(Html(FollowFeedTemplate {
        current_user: Some(user.username),
        page,
    }))
}

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::follow(&conn, user.id, author.id)? {
        tracing::info!("{} now follows {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::unfollow(&conn, user.id, author.id)? {
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}
