use rusqlite::{params, Connection};

use crate::db::models::Follow;

/// Record that `user_id` follows `author_id`. A second call for the same pair
/// is a no-op, and so is following yourself. Returns whether a row was added.
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    if user_id == author_id {
        return Ok(false);
    }
    let rows = conn.execute(
        "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}

pub fn follower_count(conn: &Connection, author_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )
}

/// Every follow row, oldest first.
pub fn list_follows(conn: &Connection) -> rusqlite::Result<Vec<Follow>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, u.username, a.username
         FROM follows f
         JOIN users u ON u.id = f.user_id
         JOIN users a ON a.id = f.author_id
         ORDER BY f.id",
    )?;
    let follows = stmt
        .query_map([], |row| {
            Ok(Follow {
                id: row.get(0)?,
                user: row.get(1)?,
                author: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(follows)
}

pub fn delete_follow(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM follows WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
