//! Management commands run from the `yatube` binary instead of the server.

use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clap::ValueEnum;

use crate::auth::password;
use crate::db::models::{Comment, Follow, Group, Post, User};
use crate::db::posts::{self, PostFilter, PostSearch};
use crate::db::{comments, follows, groups, users};
use crate::state::DbPool;

const EMPTY_VALUE: &str = "-empty-";
const LIST_LIMIT: usize = 1000;
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Publication-date buckets for `list-posts --published`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Today,
    PastWeek,
    ThisMonth,
    ThisYear,
}

impl Published {
    /// Start of the bucket, relative to `now`.
    pub fn since(self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        let start = match self {
            Published::Today => today,
            Published::PastWeek => today - Duration::days(7),
            Published::ThisMonth => today.with_day(1).unwrap_or(today),
            Published::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        start.and_time(NaiveTime::MIN)
    }
}

// -- Users and groups --

pub fn create_user(pool: &DbPool, username: &str, pass: &str, cost: u32) -> anyhow::Result<User> {
    password::validate_username(username).map_err(anyhow::Error::msg)?;

    let conn = pool.get()?;
    if users::username_taken(&conn, username)? {
        anyhow::bail!("user {} already exists", username);
    }

    let hash = password::hash_password(pass, cost)?;
    let user = users::create_user(&conn, username, Some(&hash))?;
    tracing::info!("Created user {} ({})", user.username, user.id);
    Ok(user)
}

/// Slugs end up in `/group/<slug>/`, so only letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> anyhow::Result<()> {
    if slug.is_empty() {
        anyhow::bail!("slug must not be empty");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        anyhow::bail!(
            "slug {:?} may only contain letters, digits, hyphens and underscores",
            slug
        );
    }
    Ok(())
}

pub fn create_group(
    pool: &DbPool,
    title: &str,
    slug: &str,
    description: &str,
) -> anyhow::Result<Group> {
    validate_slug(slug)?;

    let conn = pool.get()?;
    let group = groups::create_group(&conn, title, slug, description)
        .with_context(|| format!("could not create group with slug {}", slug))?;
    tracing::info!("Created group {} ({})", group.slug, group.id);
    Ok(group)
}

/// One line per group: id, title, slug and description.
pub fn list_groups(pool: &DbPool) -> anyhow::Result<Vec<String>> {
    let conn = pool.get()?;
    Ok(groups::list_groups(&conn)?
        .iter()
        .map(|g| {
            format!(
                "{}\t{}\t{}\t{}",
                g.id,
                or_empty(&g.title),
                or_empty(&g.slug),
                or_empty(&g.description)
            )
        })
        .collect())
}

// -- Posts --

/// One line per post, newest first.
pub fn list_posts(
    pool: &DbPool,
    search: Option<&str>,
    published: Option<Published>,
) -> anyhow::Result<Vec<String>> {
    let now = Utc::now().naive_utc();
    let filter = PostFilter::Matching(PostSearch {
        text: search.map(str::to_string),
        published_since: published.map(|p| p.since(now).format(DB_TIME_FORMAT).to_string()),
    });
    let conn = pool.get()?;
    Ok(posts::list_posts(&conn, &filter, LIST_LIMIT, 0)?
        .iter()
        .map(post_line)
        .collect())
}

/// Move a post into the group with `slug`, or out of its group when `None`.
pub fn set_group(pool: &DbPool, post_id: i64, slug: Option<&str>) -> anyhow::Result<()> {
    let conn = pool.get()?;
    let group_id = match slug {
        Some(slug) => Some(
            groups::find_by_slug(&conn, slug)?
                .with_context(|| format!("no group with slug {}", slug))?
                .id,
        ),
        None => None,
    };

    if !posts::set_group(&conn, post_id, group_id)? {
        anyhow::bail!("no post with id {}", post_id);
    }
    tracing::info!("Post {} moved to group {:?}", post_id, slug);
    Ok(())
}

pub fn delete_post(pool: &DbPool, post_id: i64) -> anyhow::Result<()> {
    let conn = pool.get()?;
    if !posts::delete_post(&conn, post_id)? {
        anyhow::bail!("no post with id {}", post_id);
    }
    tracing::info!("Deleted post {}", post_id);
    Ok(())
}

fn post_line(post: &Post) -> String {
    let group = post
        .group
        .as_ref()
        .map(|g| g.title.as_str())
        .unwrap_or(EMPTY_VALUE);
    format!(
        "{}\t{}\t{}\t{}\t{}",
        post.id, post.pub_date, post.author, group, post.text
    )
}

// -- Comments and follows --

/// One line per comment, for one post (oldest first) or all posts (newest first).
pub fn list_comments(pool: &DbPool, post_id: Option<i64>) -> anyhow::Result<Vec<String>> {
    let conn = pool.get()?;
    let rows = match post_id {
        Some(id) => comments::list_for_post(&conn, id)?,
        None => comments::list_all(&conn)?,
    };
    Ok(rows.iter().map(comment_line).collect())
}

pub fn delete_comment(pool: &DbPool, id: i64) -> anyhow::Result<()> {
    let conn = pool.get()?;
    if !comments::delete_comment(&conn, id)? {
        anyhow::bail!("no comment with id {}", id);
    }
    tracing::info!("Deleted comment {}", id);
    Ok(())
}

fn comment_line(comment: &Comment) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        comment.id, comment.post_id, comment.created, comment.author, comment.text
    )
}

pub fn list_follows(pool: &DbPool) -> anyhow::Result<Vec<String>> {
    let conn = pool.get()?;
    Ok(follows::list_follows(&conn)?
        .iter()
        .map(|f: &Follow| format!("{}\t{}\t{}", f.id, f.user, f.author))
        .collect())
}

pub fn delete_follow(pool: &DbPool, id: i64) -> anyhow::Result<()> {
    let conn = pool.get()?;
    if !follows::delete_follow(&conn, id)? {
        anyhow::bail!("no follow with id {}", id);
    }
    tracing::info!("Deleted follow {}", id);
    Ok(())
}

fn or_empty(value: &str) -> &str {
    if value.trim().is_empty() {
        EMPTY_VALUE
    } else {
        value
    }
}
