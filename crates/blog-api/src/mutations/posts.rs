use tracing::info;
use uuid::Uuid;

use blog_db::models::{NewPost, PostChanges};
use blog_db::queries;
use blog_types::events::Event;

use super::{
    Actor, Committed, Orchestrator, Upload, normalize_tags, now, required, resolve_tags, stamp,
};
use crate::error::{MutationError, Result};

/// Title, body, tag names and an optional image, as submitted.
#[derive(Debug, Default)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub image: Option<Upload>,
}

struct ValidDraft {
    title: String,
    body: String,
    tags: Vec<String>,
}

impl PostDraft {
    fn validate(self) -> Result<(ValidDraft, Option<Upload>)> {
        let draft = ValidDraft {
            title: required(self.title, "title")?,
            body: required(self.body, "body")?,
            tags: normalize_tags(self.tags)?,
        };
        Ok((draft, self.image))
    }
}

impl Orchestrator {
    /// Create a post and announce it with `POST_ADDED`.
    pub async fn create_post(&self, actor: &Actor, draft: PostDraft) -> Result<Uuid> {
        let (draft, image) = draft.validate()?;
        let stored = self.upload_optional(image).await?;

        let post_id = Uuid::new_v4();
        let author_id = actor.id;
        let created_at = now();
        let uploaded = stored.as_ref().map(|m| m.key.clone());

        self.commit(
            uploaded,
            move |tx| {
                let author = queries::user_by_id(tx, &author_id.to_string())?
                    .ok_or_else(|| MutationError::not_found("user"))?;
                let tag_ids = resolve_tags(tx, &draft.tags)?;

                let id = post_id.to_string();
                queries::insert_post(
                    tx,
                    &NewPost {
                        id: &id,
                        user_id: &author.id,
                        title: &draft.title,
                        body: &draft.body,
                        image_key: stored.as_ref().map(|m| m.key.as_str()),
                        image_url: stored.as_ref().map(|m| m.url.as_str()),
                        created_at: &stamp(created_at),
                    },
                )?;
                queries::replace_post_tags(tx, &id, &tag_ids)?;
                Ok((author.first_name, draft, stored))
            },
            move |(author_name, draft, stored)| {
                info!("Post {} created by {}", post_id, author_id);
                Committed::new(post_id).event(Event::PostAdded {
                    id: post_id,
                    author_id,
                    author_name,
                    title: draft.title,
                    body: draft.body,
                    image_url: stored.map(|m| m.url),
                    tags: draft.tags,
                    created_at,
                    updated_at: created_at,
                })
            },
        )
        .await
    }

    /// Replace a post's title, body and tag set, and its image if a new one
    /// is supplied. The previous image is deleted only after commit.
    pub async fn update_post(&self, actor: &Actor, post_id: Uuid, draft: PostDraft) -> Result<()> {
        let (draft, image) = draft.validate()?;
        self.authorize_post(actor, post_id).await?;

        let stored = self.upload_optional(image).await?;
        let updated_at = now();
        let uploaded = stored.as_ref().map(|m| m.key.clone());

        self.commit(
            uploaded,
            move |tx| {
                let id = post_id.to_string();
                let post = queries::post_by_id(tx, &id)?.ok_or_else(|| MutationError::not_found("post"))?;
                let tag_ids = resolve_tags(tx, &draft.tags)?;

                let (image_key, image_url, retired) = match &stored {
                    Some(m) => (Some(m.key.clone()), Some(m.url.clone()), post.image_key),
                    None => (post.image_key, post.image_url, None),
                };
                queries::update_post(
                    tx,
                    &id,
                    &PostChanges {
                        title: &draft.title,
                        body: &draft.body,
                        image_key: image_key.as_deref(),
                        image_url: image_url.as_deref(),
                        updated_at: &stamp(updated_at),
                    },
                )?;
                queries::replace_post_tags(tx, &id, &tag_ids)?;
                Ok((draft, image_url, retired))
            },
            move |(draft, image_url, retired)| {
                info!("Post {} updated", post_id);
                Committed::new(())
                    .event(Event::PostUpdated {
                        id: post_id,
                        title: draft.title,
                        body: draft.body,
                        image_url,
                        tags: draft.tags,
                        updated_at,
                    })
                    .retire(retired)
            },
        )
        .await
    }

    /// Delete a post with its comments, likes and image.
    pub async fn delete_post(&self, actor: &Actor, post_id: Uuid) -> Result<()> {
        self.authorize_post(actor, post_id).await?;

        self.commit(
            None,
            move |tx| {
                let id = post_id.to_string();
                let post = queries::post_by_id(tx, &id)?.ok_or_else(|| MutationError::not_found("post"))?;
                queries::delete_post(tx, &id)?;
                Ok(post.image_key)
            },
            move |image_key| {
                info!("Post {} deleted", post_id);
                Committed::new(())
                    .event(Event::PostDeleted { id: post_id })
                    .retire(image_key)
            },
        )
        .await
    }

    /// Like the post if `actor` has not, unlike it if they have.
    /// Returns `true` when the like was added.
    pub async fn toggle_post_like(&self, actor: &Actor, post_id: Uuid) -> Result<bool> {
        let user_id = actor.id;

        self.commit(
            None,
            move |tx| {
                let id = post_id.to_string();
                if queries::post_by_id(tx, &id)?.is_none() {
                    return Err(MutationError::not_found("post"));
                }
                Ok(queries::toggle_post_like(tx, &user_id.to_string(), &id)?)
            },
            move |add_like| {
                Committed::new(add_like).event(Event::PostLiked {
                    post_id,
                    user_id,
                    add_like,
                })
            },
        )
        .await
    }

    /// The post must exist and belong to `actor`.
    async fn authorize_post(&self, actor: &Actor, post_id: Uuid) -> Result<()> {
        let actor_id = actor.id.to_string();
        self.read(move |db| {
            let post = db
                .get_post(&post_id.to_string())?
                .ok_or_else(|| MutationError::not_found("post"))?;
            if post.user_id != actor_id {
                return Err(MutationError::unauthorized(
                    "You do not have permission to modify this post",
                ));
            }
            Ok(())
        })
        .await
    }
}
