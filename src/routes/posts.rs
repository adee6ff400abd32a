use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::cache::CacheKey;
use crate::db::models::{Group, GroupRef, Post};
use crate::db::posts::{self, PostFilter};
use crate::db::{comments, follows, groups, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::PostForm;
use crate::pagination::{Page, Paginator};
use crate::routes::core::{html_response, Html};
use crate::state::AppState;

// --- View structs ---

#[derive(Debug, Clone)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub pub_date: String,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            pub_date: format_pub_date(&post.pub_date),
            text: post.text,
            author: post.author,
            group: post.group,
            image: post.image,
        }
    }
}

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created: String,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub current_user: Option<String>,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub current_user: Option<String>,
    pub group: Group,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub current_user: Option<String>,
    pub author: String,
    pub post_count: usize,
    pub follower_count: i64,
    pub following: bool,
    pub can_follow: bool,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub current_user: Option<String>,
    pub post: PostView,
    pub author_post_count: usize,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub current_user: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub errors: Vec<String>,
}

// --- Forms ---

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub text: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/create/", get(create_page).post(create_post))
        .route("/posts/{id}/edit/", get(edit_page).post(edit_post))
        .route("/posts/{id}/comment/", post(add_comment))
}

// --- Handlers ---

/// Index page. The rendered page is cached per URL and viewer, so changes to
/// the posts only show up once the entry expires or the cache is cleared.
async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let key = CacheKey::new(
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        maybe_user.id(),
    );

    if let Some(body) = state.index_cache.lock().await.get(&key) {
        return Ok(html_response(StatusCode::OK, body));
    }

    let page = {
        let conn = state.db.get()?;
        paginate(
            &conn,
            PostFilter::All,
            state.config.posts.per_page,
            query.page.as_deref(),
        )?
    };

    let body = IndexTemplate {
        current_user: maybe_user.username(),
        page,
    }
    .render()?;

    state.index_cache.lock().await.insert(key, body.clone());
    Ok(html_response(StatusCode::OK, body))
}

async fn group_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupListTemplate>> {
    let conn = state.db.get()?;
    let group = groups::find_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;
    let page = paginate(
        &conn,
        PostFilter::Group(group.id),
        state.config.posts.per_page,
        query.page.as_deref(),
    )?;

    Ok(Html(GroupListTemplate {
        current_user: maybe_user.username(),
        group,
        page,
    }))
}

async fn profile(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    let filter = PostFilter::Author(author.id);
    let post_count = posts::count_posts(&conn, &filter)?;
    let page = paginate(
        &conn,
        filter,
        state.config.posts.per_page,
        query.page.as_deref(),
    )?;

    let following = match maybe_user.id() {
        Some(viewer) => follows::is_following(&conn, viewer, author.id)?,
        None => false,
    };
    let can_follow = maybe_user.id().is_some_and(|viewer| viewer != author.id);

    Ok(Html(ProfileTemplate {
        current_user: maybe_user.username(),
        follower_count: follows::follower_count(&conn, author.id)?,
        author: author.username,
        post_count,
        following,
        can_follow,
        page,
    }))
}

async fn post_detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find_post(&conn, id)?.ok_or(AppError::NotFound)?;

    let author_post_count = posts::count_posts(&conn, &PostFilter::Author(post.author_id))?;
    let comments = comments::list_for_post(&conn, id)?
        .into_iter()
        .map(|c| CommentView {
            author: c.author,
            text: c.text,
            created: parse_and_format_time(&c.created),
        })
        .collect();
    let can_edit = maybe_user.id() == Some(post.author_id);

    Ok(Html(PostDetailTemplate {
        current_user: maybe_user.username(),
        post: post.into(),
        author_post_count,
        comments,
        can_edit,
    }))
}

async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let conn = state.db.get()?;
    Ok(Html(PostFormTemplate {
        current_user: Some(user.username),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(&conn, None)?,
        errors: Vec::new(),
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;

    let validated = {
        let conn = state.db.get()?;
        let text = form.text.clone();
        let selected = form.selected_group();
        match form.validate(&conn)? {
            Ok(valid) => valid,
            Err(errors) => {
                return Ok(Html(PostFormTemplate {
                    current_user: Some(user.username),
                    is_edit: false,
                    action: "/create/".to_string(),
                    text,
                    groups: group_options(&conn, selected)?,
                    errors,
                })
                .into_response());
            }
        }
    };

    let input = validated.into_input(&state.config.media_path()).await?;
    let post_id = {
        let conn = state.db.get()?;
        posts::create_post(&conn, user.id, &input)?
    };
    tracing::info!("{} created post {}", user.username, post_id);

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find_post(&conn, id)?.ok_or(AppError::NotFound)?;

    if post.author_id != user.id {
        return Ok(Redirect::to(&detail_url(id)).into_response());
    }

    let selected = post.group.as_ref().map(|g| g.id);
    Ok(Html(PostFormTemplate {
        current_user: Some(user.username),
        is_edit: true,
        action: edit_url(id),
        text: post.text,
        groups: group_options(&conn, selected)?,
        errors: Vec::new(),
    })
    .into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let id = parse_post_id(&id)?;
    let author_id = {
        let conn = state.db.get()?;
        posts::find_post(&conn, id)?
            .ok_or(AppError::NotFound)?
            .author_id
    };
    if author_id != user.id {
        return Ok(Redirect::to(&detail_url(id)).into_response());
    }

    let form = PostForm::from_multipart(multipart).await?;
    let validated = {
        let conn = state.db.get()?;
        let text = form.text.clone();
        let selected = form.selected_group();
        match form.validate(&conn)? {
            Ok(valid) => valid,
            Err(errors) => {
                return Ok(Html(PostFormTemplate {
                    current_user: Some(user.username),
                    is_edit: true,
                    action: edit_url(id),
                    text,
                    groups: group_options(&conn, selected)?,
                    errors,
                })
                .into_response());
            }
        }
    };

    let input = validated.into_input(&state.config.media_path()).await?;
    {
        let conn = state.db.get()?;
        posts::update_post(&conn, id, &input)?;
    }
    tracing::info!("{} edited post {}", user.username, id);

    Ok(Redirect::to(&detail_url(id)).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    if posts::find_post(&conn, id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let text = form.text.trim();
    if text.is_empty() {
        tracing::debug!("Ignoring empty comment on post {}", id);
    } else {
        let comment_id = comments::create_comment(&conn, id, user.id, text)?;
        tracing::info!("{} commented on post {} ({})", user.username, id, comment_id);
    }

    Ok(Redirect::to(&detail_url(id)).into_response())
}

// --- Helpers ---

/// Count and fetch one page of the filtered listing.
pub fn paginate(
    conn: &Connection,
    filter: PostFilter,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<Page<PostView>> {
    let total = posts::count_posts(conn, &filter)?;
    let window = Paginator::new(total, per_page).page(requested);
    let items = posts::list_posts(conn, &filter, window.limit, window.offset)?
        .into_iter()
        .map(PostView::from)
        .collect();
    Ok(Page::new(items, window))
}

fn group_options(conn: &Connection, selected: Option<i64>) -> AppResult<Vec<GroupOption>> {
    Ok(groups::list_groups(conn)?
        .into_iter()
        .map(|g| GroupOption {
            selected: Some(g.id) == selected,
            id: g.id,
            title: g.title,
        })
        .collect())
}

/// Post ids in URLs that are not integers behave like unknown posts.
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn detail_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

fn edit_url(id: i64) -> String {
    format!("/posts/{}/edit/", id)
}

// --- Time formatting ---

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Publication dates are shown as "15 Jan 2025".
fn format_pub_date(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, DB_TIME_FORMAT)
        .map(|dt| dt.format("%-d %b %Y").to_string())
        .unwrap_or_else(|_| db_time.to_string())
}

fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, DB_TIME_FORMAT)
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---
