use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{GroupRef, Post};

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
            g.id, g.slug, g.title, p.image
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

/// Which posts a listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
    Matching(PostSearch),
}

/// Search used by the management commands. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSearch {
    /// Case-insensitive substring of the text. `%` and `_` match literally.
    pub text: Option<String>,
    /// Inclusive lower bound on `pub_date`, as `YYYY-MM-DD HH:MM:SS`.
    pub published_since: Option<String>,
}

impl PostFilter {
    fn where_clause(&self) -> String {
        match self {
            PostFilter::All => String::new(),
            PostFilter::Group(_) => "WHERE p.group_id = ?1".to_string(),
            PostFilter::Author(_) => "WHERE p.author_id = ?1".to_string(),
            PostFilter::FollowedBy(_) => {
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)"
                    .to_string()
            }
            PostFilter::Matching(search) => {
                let mut conditions = Vec::new();
                if search.text.is_some() {
                    let idx = conditions.len() + 1;
                    conditions.push(format!("p.text LIKE ?{} ESCAPE '\\'", idx));
                }
                if search.published_since.is_some() {
                    conditions.push(format!("p.pub_date >= ?{}", conditions.len() + 1));
                }
                if conditions.is_empty() {
                    String::new()
                } else {
                    format!("WHERE {}", conditions.join(" AND "))
                }
            }
        }
    }

    fn bind(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        match self {
            PostFilter::All => vec![],
            PostFilter::Group(id) | PostFilter::Author(id) | PostFilter::FollowedBy(id) => {
                vec![Value::Integer(*id)]
            }
            PostFilter::Matching(search) => {
                let mut values = Vec::new();
                if let Some(text) = &search.text {
                    values.push(Value::Text(format!("%{}%", escape_like(text))));
                }
                if let Some(since) = &search.published_since {
                    values.push(Value::Text(since.clone()));
                }
                values
            }
        }
    }
}

/// Escape LIKE wildcards so they match themselves under `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fields accepted from the create and edit forms.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        author_id: row.get(3)?,
        author: row.get(4)?,
        group,
        image: row.get(8)?,
    })
}

pub fn count_posts(conn: &Connection, filter: &PostFilter) -> rusqlite::Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM posts p {}", filter.where_clause());
    let count: i64 = conn.query_row(&sql, params_from_iter(filter.bind()), |row| row.get(0))?;
    Ok(count as usize)
}

/// One window of the filtered listing, newest first.
pub fn list_posts(
    conn: &Connection,
    filter: &PostFilter,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<Post>> {
    let mut values = filter.bind();
    let limit_idx = values.len() + 1;
    values.push(rusqlite::types::Value::Integer(limit as i64));
    values.push(rusqlite::types::Value::Integer(offset as i64));

    let sql = format!(
        "{POST_SELECT} {} {NEWEST_FIRST} LIMIT ?{} OFFSET ?{}",
        filter.where_clause(),
        limit_idx,
        limit_idx + 1
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(values), post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

pub fn find_post(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()
}

pub fn create_post(conn: &Connection, author_id: i64, input: &PostInput) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
        params![input.text, author_id, input.group_id, input.image],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update text and group, and the image only when a new one is supplied.
/// Author and pub_date are never touched.
pub fn update_post(conn: &Connection, id: i64, input: &PostInput) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE posts
         SET text = ?1, group_id = ?2, image = COALESCE(?3, image)
         WHERE id = ?4",
        params![input.text, input.group_id, input.image, id],
    )?;
    Ok(rows > 0)
}

/// Move a post to another group, or out of any group.
pub fn set_group(conn: &Connection, id: i64, group_id: Option<i64>) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE posts SET group_id = ?1 WHERE id = ?2",
        params![group_id, id],
    )?;
    Ok(rows > 0)
}

pub fn delete_post(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
