use rusqlite::{params, Connection, Row};

use crate::db::models::Comment;

pub fn create_comment(
    conn: &Connection,
    post_id: i64,
    author_id: i64,
    text: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created
     FROM comments c
     JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author: row.get(3)?,
        text: row.get(4)?,
        created: row.get(5)?,
    })
}

/// Comments on a post, oldest first.
pub fn list_for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created ASC, c.id ASC"
    ))?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}

/// Every comment on every post, newest first.
pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} ORDER BY c.created DESC, c.id DESC"
    ))?;
    let comments = stmt
        .query_map([], comment_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}

pub fn delete_comment(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
