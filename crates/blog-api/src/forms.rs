use axum::extract::Multipart;
use axum::extract::multipart::Field;

use crate::error::{MutationError, Result};
use crate::mutations::Upload;
use crate::mutations::accounts::ProfileDraft;
use crate::mutations::posts::PostDraft;

/// 10 MB cap on a single uploaded image.
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

fn bad_form(e: impl std::fmt::Display) -> MutationError {
    MutationError::invalid(format!("Invalid form data: {e}"))
}

async fn text(field: Field<'_>) -> Result<String> {
    field.text().await.map_err(bad_form)
}

/// An empty file part (a form submitted without choosing a file) counts as
/// no image.
async fn image(field: Field<'_>) -> Result<Option<Upload>> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content = field.bytes().await.map_err(bad_form)?;
    if content.is_empty() {
        return Ok(None);
    }
    if content.len() > MAX_IMAGE_SIZE {
        return Err(MutationError::invalid("Image exceeds the 10 MB limit"));
    }
    Ok(Some(Upload { file_name, content }))
}

/// `title`, `body`, repeated `tags`, optional `image`.
pub async fn post_draft(mut form: Multipart) -> Result<PostDraft> {
    let mut draft = PostDraft::default();
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        match field.name() {
            Some("title") => draft.title = text(field).await?,
            Some("body") => draft.body = text(field).await?,
            Some("tags") | Some("tags[]") => draft.tags.push(text(field).await?),
            Some("image") => draft.image = image(field).await?,
            _ => {}
        }
    }
    Ok(draft)
}

/// `firstName`, `lastName`, `email`, optional `image`.
pub async fn profile_draft(mut form: Multipart) -> Result<ProfileDraft> {
    let mut draft = ProfileDraft::default();
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        match field.name() {
            Some("firstName") => draft.first_name = text(field).await?,
            Some("lastName") => draft.last_name = text(field).await?,
            Some("email") => draft.email = text(field).await?,
            Some("image") => draft.image = image(field).await?,
            _ => {}
        }
    }
    Ok(draft)
}
