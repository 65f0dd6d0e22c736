//! Row types as stored in SQLite, kept apart from the blog-types API models.
//! Ids are UUID strings and timestamps RFC 3339 strings, as stored.

pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub author_name: String,
    pub title: String,
    pub body: String,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub author_name: String,
    pub parent_id: Option<String>,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

/// Column values for `INSERT INTO posts`.
pub struct NewPost<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub image_key: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub created_at: &'a str,
}

/// Full replacement of a post's mutable columns.
pub struct PostChanges<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub image_key: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub updated_at: &'a str,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub created_at: &'a str,
}

/// Full replacement of a user's profile columns.
pub struct ProfileChanges<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub image_key: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

pub struct NewComment<'a> {
    pub id: &'a str,
    pub post_id: &'a str,
    pub user_id: &'a str,
    pub parent_id: Option<&'a str>,
    pub message: &'a str,
    pub created_at: &'a str,
}
