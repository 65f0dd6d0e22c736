use tracing::info;
use uuid::Uuid;

use blog_db::models::{CommentRow, NewComment};
use blog_db::queries;
use blog_types::events::{CommentPayload, Event};

use super::{Actor, Committed, Orchestrator, now, required, stamp};
use crate::error::{MutationError, Result};

impl Orchestrator {
    /// Add a comment, optionally as a reply to another comment on the same
    /// post, and announce it with `COMMENT_ADDED`.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        post_id: Uuid,
        message: String,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let message = required(message, "message")?;
        let comment_id = Uuid::new_v4();
        let author_id = actor.id;
        let created_at = now();

        self.commit(
            None,
            move |tx| {
                let post = post_id.to_string();
                if queries::post_by_id(tx, &post)?.is_none() {
                    return Err(MutationError::not_found("post"));
                }
                let parent = parent_id.map(|p| p.to_string());
                if let Some(parent) = &parent {
                    let parent_row = queries::comment_by_id(tx, parent)?
                        .ok_or_else(|| MutationError::not_found("parent comment"))?;
                    if parent_row.post_id != post {
                        return Err(MutationError::invalid(
                            "parentId must reference a comment on the same post",
                        ));
                    }
                }
                let author = queries::user_by_id(tx, &author_id.to_string())?
                    .ok_or_else(|| MutationError::not_found("user"))?;

                queries::insert_comment(
                    tx,
                    &NewComment {
                        id: &comment_id.to_string(),
                        post_id: &post,
                        user_id: &author.id,
                        parent_id: parent.as_deref(),
                        message: &message,
                        created_at: &stamp(created_at),
                    },
                )?;
                Ok((author.first_name, message))
            },
            move |(author_name, message)| {
                info!("Comment {} added to post {}", comment_id, post_id);
                Committed::new(comment_id).event(Event::CommentAdded {
                    post_id,
                    comment: CommentPayload {
                        id: comment_id,
                        message,
                        parent_id,
                        author_id,
                        author_name,
                        created_at,
                    },
                })
            },
        )
        .await
    }

    pub async fn update_comment(
        &self,
        actor: &Actor,
        post_id: Uuid,
        comment_id: Uuid,
        message: String,
    ) -> Result<()> {
        let message = required(message, "message")?;
        self.authorize_comment(actor, post_id, comment_id).await?;
        let updated_at = now();

        self.commit(
            None,
            move |tx| {
                if !queries::update_comment(tx, &comment_id.to_string(), &message, &stamp(updated_at))? {
                    return Err(MutationError::not_found("comment"));
                }
                Ok(message)
            },
            move |message| {
                info!("Comment {} updated", comment_id);
                Committed::new(()).event(Event::CommentUpdated {
                    post_id,
                    comment_id,
                    message,
                    updated_at,
                })
            },
        )
        .await
    }

    /// Delete a comment together with its replies and likes.
    pub async fn delete_comment(&self, actor: &Actor, post_id: Uuid, comment_id: Uuid) -> Result<()> {
        self.authorize_comment(actor, post_id, comment_id).await?;

        self.commit(
            None,
            move |tx| {
                if !queries::delete_comment(tx, &comment_id.to_string())? {
                    return Err(MutationError::not_found("comment"));
                }
                Ok(())
            },
            move |()| {
                info!("Comment {} deleted", comment_id);
                Committed::new(()).event(Event::CommentDeleted { post_id, comment_id })
            },
        )
        .await
    }

    /// Returns `true` when the like was added.
    pub async fn toggle_comment_like(
        &self,
        actor: &Actor,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<bool> {
        let user_id = actor.id;

        self.commit(
            None,
            move |tx| {
                let comment = comment_on_post(queries::comment_by_id(tx, &comment_id.to_string())?, post_id)?;
                Ok(queries::toggle_comment_like(tx, &user_id.to_string(), &comment.id)?)
            },
            move |add_like| {
                Committed::new(add_like).event(Event::CommentLiked {
                    post_id,
                    comment_id,
                    user_id,
                    add_like,
                })
            },
        )
        .await
    }

    /// The comment must exist on `post_id` and belong to `actor`.
    async fn authorize_comment(&self, actor: &Actor, post_id: Uuid, comment_id: Uuid) -> Result<()> {
        let actor_id = actor.id.to_string();
        self.read(move |db| {
            let comment = comment_on_post(db.get_comment(&comment_id.to_string())?, post_id)?;
            if comment.user_id != actor_id {
                return Err(MutationError::unauthorized(
                    "You do not have permission to modify this comment",
                ));
            }
            Ok(())
        })
        .await
    }
}

fn comment_on_post(row: Option<CommentRow>, post_id: Uuid) -> Result<CommentRow> {
    match row {
        Some(comment) if comment.post_id == post_id.to_string() => Ok(comment),
        _ => Err(MutationError::not_found("comment")),
    }
}
