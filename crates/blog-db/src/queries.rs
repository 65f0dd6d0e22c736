use std::collections::{HashMap, HashSet};

use crate::Database;
use crate::models::{
    CommentRow, NewComment, NewPost, NewUser, PostChanges, PostRow, ProfileChanges, TagRow,
    UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password, image_key, image_url, created_at";

const POST_SELECT: &str = "SELECT p.id, p.user_id, u.first_name, p.title, p.body, p.image_key, p.image_url, p.created_at, p.updated_at
     FROM posts p
     JOIN users u ON p.user_id = u.id";

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.user_id, u.first_name, c.parent_id, c.message, c.created_at, c.updated_at
     FROM comments c
     JOIN users u ON c.user_id = u.id";

impl Database {
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_id(conn, id))
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| post_by_id(conn, id))
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| comment_by_id(conn, id))
    }
}

// -- Users --

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, first_name, last_name, email, password, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.email,
            user.password,
            user.created_at
        ],
    )?;
    Ok(())
}

pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let row = conn.query_row(&sql, [email], map_user).optional()?;
    Ok(row)
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user).optional()?;
    Ok(row)
}

/// Returns `false` if no such user exists.
pub fn update_user_profile(conn: &Connection, id: &str, changes: &ProfileChanges<'_>) -> Result<bool> {
    let n = conn.execute(
        "UPDATE users SET first_name = ?2, last_name = ?3, email = ?4, image_key = ?5, image_url = ?6
         WHERE id = ?1",
        params![
            id,
            changes.first_name,
            changes.last_name,
            changes.email,
            changes.image_key,
            changes.image_url
        ],
    )?;
    Ok(n > 0)
}

pub fn update_user_password(conn: &Connection, id: &str, credential: &str) -> Result<bool> {
    let n = conn.execute("UPDATE users SET password = ?2 WHERE id = ?1", params![id, credential])?;
    Ok(n > 0)
}

/// Deletes the user; posts, comments and likes go with it via ON DELETE CASCADE.
pub fn delete_user(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(n > 0)
}

/// Comments under other users' posts that deleting `user_id` takes with it:
/// the user's own comments and every reply beneath them, as
/// `(comment_id, post_id)`.
pub fn comments_lost_with_user(conn: &Connection, user_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE lost(id) AS (
             SELECT c.id FROM comments c JOIN posts p ON c.post_id = p.id
              WHERE c.user_id = ?1 AND p.user_id != ?1
             UNION
             SELECT c.id FROM comments c JOIN lost l ON c.parent_id = l.id
         )
         SELECT c.id, c.post_id FROM comments c
           JOIN lost l ON c.id = l.id
           JOIN posts p ON c.post_id = p.id
          WHERE p.user_id != ?1
          ORDER BY c.created_at",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Posts by other users that `user_id` has liked.
pub fn posts_liked_elsewhere(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT l.post_id FROM post_likes l
           JOIN posts p ON l.post_id = p.id
          WHERE l.user_id = ?1 AND p.user_id != ?1",
    )?;
    let rows = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Comments under other users' posts that `user_id` has liked, as
/// `(comment_id, post_id)`.
pub fn comments_liked_elsewhere(conn: &Connection, user_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT l.comment_id, c.post_id FROM comment_likes l
           JOIN comments c ON l.comment_id = c.id
           JOIN posts p ON c.post_id = p.id
          WHERE l.user_id = ?1 AND p.user_id != ?1",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password: row.get(4)?,
        image_key: row.get(5)?,
        image_url: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// -- Posts --

pub fn insert_post(conn: &Connection, post: &NewPost<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO posts (id, user_id, title, body, image_key, image_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            post.id,
            post.user_id,
            post.title,
            post.body,
            post.image_key,
            post.image_url,
            post.created_at
        ],
    )?;
    Ok(())
}

pub fn post_by_id(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?1");
    let row = conn.query_row(&sql, [id], map_post).optional()?;
    Ok(row)
}

pub fn posts_by_author(conn: &Connection, user_id: &str) -> Result<Vec<PostRow>> {
    let sql = format!("{POST_SELECT} WHERE p.user_id = ?1 ORDER BY p.created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_posts(conn: &Connection) -> Result<Vec<PostRow>> {
    let sql = format!("{POST_SELECT} ORDER BY p.created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_post(conn: &Connection, id: &str, changes: &PostChanges<'_>) -> Result<bool> {
    let n = conn.execute(
        "UPDATE posts SET title = ?2, body = ?3, image_key = ?4, image_url = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            id,
            changes.title,
            changes.body,
            changes.image_key,
            changes.image_url,
            changes.updated_at
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_post(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    Ok(n > 0)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        image_key: row.get(5)?,
        image_url: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// -- Tags --

pub fn tag_by_name(conn: &Connection, name: &str) -> Result<Option<TagRow>> {
    let row = conn
        .query_row("SELECT id, name FROM tags WHERE name = ?1", [name], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

/// Insert a tag unless one with this name exists. Returns whether a row was added.
///
/// The UNIQUE constraint on `tags.name` turns a racing duplicate into a no-op.
pub fn insert_tag_if_absent(conn: &Connection, name: &str) -> Result<bool> {
    let n = conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
    Ok(n > 0)
}

pub fn list_tags(conn: &Connection) -> Result<Vec<TagRow>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace the post's tag associations with exactly `tag_ids`.
pub fn replace_post_tags(conn: &Connection, post_id: &str, tag_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", [post_id])?;

    let mut stmt = conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![post_id, tag_id])?;
    }
    Ok(())
}

pub fn tag_names_for_post(conn: &Connection, post_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM post_tags pt
         JOIN tags t ON pt.tag_id = t.id
         WHERE pt.post_id = ?1
         ORDER BY t.name",
    )?;
    let names = stmt
        .query_map([post_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

/// post_id -> tag names, for every post that has at least one tag.
pub fn tag_names_by_post(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT pt.post_id, t.name FROM post_tags pt
         JOIN tags t ON pt.tag_id = t.id
         ORDER BY t.name",
    )?;
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (post_id, name) = row?;
        map.entry(post_id).or_default().push(name);
    }
    Ok(map)
}

// -- Comments --

pub fn insert_comment(conn: &Connection, comment: &NewComment<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, parent_id, message, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            comment.id,
            comment.post_id,
            comment.user_id,
            comment.parent_id,
            comment.message,
            comment.created_at
        ],
    )?;
    Ok(())
}

pub fn comment_by_id(conn: &Connection, id: &str) -> Result<Option<CommentRow>> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
    let row = conn.query_row(&sql, [id], map_comment).optional()?;
    Ok(row)
}

/// All comments, newest first.
pub fn list_comments(conn: &Connection) -> Result<Vec<CommentRow>> {
    let sql = format!("{COMMENT_SELECT} ORDER BY c.created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_comment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_comment(conn: &Connection, id: &str, message: &str, updated_at: &str) -> Result<bool> {
    let n = conn.execute(
        "UPDATE comments SET message = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, message, updated_at],
    )?;
    Ok(n > 0)
}

/// Deletes the comment and, via ON DELETE CASCADE, its replies and likes.
pub fn delete_comment(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
    Ok(n > 0)
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        author_name: row.get(3)?,
        parent_id: row.get(4)?,
        message: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// -- Likes --

/// Toggle a post like: removes if present, inserts if not.
/// Returns `true` when the like was added, `false` when it was removed.
pub fn toggle_post_like(conn: &Connection, user_id: &str, post_id: &str) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT user_id FROM post_likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        conn.execute(
            "DELETE FROM post_likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
        )?;
        Ok(false)
    } else {
        conn.execute(
            "INSERT INTO post_likes (user_id, post_id) VALUES (?1, ?2)",
            params![user_id, post_id],
        )?;
        Ok(true)
    }
}

/// Toggle a comment like. Same contract as [`toggle_post_like`].
pub fn toggle_comment_like(conn: &Connection, user_id: &str, comment_id: &str) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT user_id FROM comment_likes WHERE user_id = ?1 AND comment_id = ?2",
            params![user_id, comment_id],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        conn.execute(
            "DELETE FROM comment_likes WHERE user_id = ?1 AND comment_id = ?2",
            params![user_id, comment_id],
        )?;
        Ok(false)
    } else {
        conn.execute(
            "INSERT INTO comment_likes (user_id, comment_id) VALUES (?1, ?2)",
            params![user_id, comment_id],
        )?;
        Ok(true)
    }
}

/// Like counts keyed by the liked row id, plus the ids `viewer` has liked.
pub struct LikeSummary {
    pub counts: HashMap<String, usize>,
    pub liked_by_viewer: HashSet<String>,
}

pub fn post_like_summary(conn: &Connection, viewer: &str) -> Result<LikeSummary> {
    like_summary(conn, "post_likes", "post_id", viewer)
}

pub fn comment_like_summary(conn: &Connection, viewer: &str) -> Result<LikeSummary> {
    like_summary(conn, "comment_likes", "comment_id", viewer)
}

fn like_summary(conn: &Connection, table: &str, column: &str, viewer: &str) -> Result<LikeSummary> {
    let mut counts = HashMap::new();
    let mut liked_by_viewer = HashSet::new();

    let mut stmt = conn.prepare(&format!("SELECT {column}, user_id FROM {table}"))?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (target, user_id) = row?;
        if user_id == viewer {
            liked_by_viewer.insert(target.clone());
        }
        *counts.entry(target).or_insert(0) += 1;
    }

    Ok(LikeSummary { counts, liked_by_viewer })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2026-01-01T00:00:00.000Z";

    fn seed_user(db: &Database, id: &str, email: &str) {
        db.with_conn(|conn| {
            insert_user(
                conn,
                &NewUser {
                    id,
                    first_name: "Ada",
                    last_name: "Lovelace",
                    email,
                    password: "salt$key",
                    created_at: NOW,
                },
            )
        })
        .unwrap();
    }

    fn seed_post(db: &Database, id: &str, user_id: &str) {
        db.with_conn(|conn| {
            insert_post(
                conn,
                &NewPost {
                    id,
                    user_id,
                    title: "Hello",
                    body: "World",
                    image_key: None,
                    image_url: None,
                    created_at: NOW,
                },
            )
        })
        .unwrap();
    }

    #[test]
    fn tag_insert_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        db.with_conn(|conn| {
            assert!(insert_tag_if_absent(conn, "Marvel")?);
            assert!(!insert_tag_if_absent(conn, "Marvel")?);
            Ok(())
        })
        .unwrap();

        let tags = db.with_conn(list_tags).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Marvel");
    }

    #[test]
    fn replace_post_tags_swaps_the_whole_set() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "ada@example.com");
        seed_post(&db, "p1", "u1");

        db.with_conn(|conn| {
            for name in ["a", "b", "c"] {
                insert_tag_if_absent(conn, name)?;
            }
            let ids: Vec<i64> = ["a", "b"]
                .iter()
                .map(|n| tag_by_name(conn, n).map(|t| t.map(|t| t.id).unwrap_or_default()))
                .collect::<Result<_>>()?;
            replace_post_tags(conn, "p1", &ids)?;
            assert_eq!(tag_names_for_post(conn, "p1")?, vec!["a", "b"]);

            let c = tag_by_name(conn, "c")?.map(|t| t.id).unwrap_or_default();
            replace_post_tags(conn, "p1", &[c])?;
            assert_eq!(tag_names_for_post(conn, "p1")?, vec!["c"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn toggle_post_like_alternates() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "ada@example.com");
        seed_post(&db, "p1", "u1");

        db.with_conn(|conn| {
            assert!(toggle_post_like(conn, "u1", "p1")?);
            assert!(!toggle_post_like(conn, "u1", "p1")?);
            assert!(toggle_post_like(conn, "u1", "p1")?);
            Ok(())
        })
        .unwrap();

        let summary = db.with_conn(|conn| post_like_summary(conn, "u1")).unwrap();
        assert_eq!(summary.counts.get("p1"), Some(&1));
        assert!(summary.liked_by_viewer.contains("p1"));
    }

    #[test]
    fn deleting_a_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "ada@example.com");
        seed_post(&db, "p1", "u1");
        db.with_conn(|conn| {
            insert_comment(
                conn,
                &NewComment {
                    id: "c1",
                    post_id: "p1",
                    user_id: "u1",
                    parent_id: None,
                    message: "hi",
                    created_at: NOW,
                },
            )?;
            toggle_comment_like(conn, "u1", "c1")?;
            assert!(delete_user(conn, "u1")?);
            Ok(())
        })
        .unwrap();

        assert!(db.get_post("p1").unwrap().is_none());
        assert!(db.get_comment("c1").unwrap().is_none());
        let summary = db.with_conn(|conn| comment_like_summary(conn, "u1")).unwrap();
        assert!(summary.counts.is_empty());
    }

    fn seed_comment(db: &Database, id: &str, post_id: &str, user_id: &str, parent_id: Option<&str>) {
        db.with_conn(|conn| {
            insert_comment(
                conn,
                &NewComment {
                    id,
                    post_id,
                    user_id,
                    parent_id,
                    message: "hi",
                    created_at: NOW,
                },
            )
        })
        .unwrap();
    }

    #[test]
    fn departure_footprint_on_other_posts() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "ada", "ada@example.com");
        seed_user(&db, "bob", "bob@example.com");
        seed_post(&db, "ada-post", "ada");
        seed_post(&db, "bob-post", "bob");

        seed_comment(&db, "ada-on-bob", "bob-post", "ada", None);
        seed_comment(&db, "bob-reply", "bob-post", "bob", Some("ada-on-bob"));
        seed_comment(&db, "bob-on-bob", "bob-post", "bob", None);
        seed_comment(&db, "ada-on-ada", "ada-post", "ada", None);
        db.with_conn(|conn| {
            toggle_post_like(conn, "ada", "bob-post")?;
            toggle_post_like(conn, "ada", "ada-post")?;
            toggle_comment_like(conn, "ada", "bob-on-bob")?;
            toggle_comment_like(conn, "ada", "bob-reply")?;
            Ok(())
        })
        .unwrap();

        let mut lost = db.with_conn(|conn| comments_lost_with_user(conn, "ada")).unwrap();
        lost.sort();
        assert_eq!(
            lost,
            vec![
                ("ada-on-bob".to_string(), "bob-post".to_string()),
                ("bob-reply".to_string(), "bob-post".to_string()),
            ]
        );
        assert_eq!(
            db.with_conn(|conn| posts_liked_elsewhere(conn, "ada")).unwrap(),
            vec!["bob-post".to_string()]
        );
        let mut liked = db.with_conn(|conn| comments_liked_elsewhere(conn, "ada")).unwrap();
        liked.sort();
        assert_eq!(
            liked,
            vec![
                ("bob-on-bob".to_string(), "bob-post".to_string()),
                ("bob-reply".to_string(), "bob-post".to_string()),
            ]
        );
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "ada@example.com");

        let result = db.with_conn(|conn| {
            insert_user(
                conn,
                &NewUser {
                    id: "u2",
                    first_name: "Other",
                    last_name: "Person",
                    email: "ada@example.com",
                    password: "salt$key",
                    created_at: NOW,
                },
            )
        });
        assert!(result.is_err());
    }
}
