use std::collections::HashMap;

use uuid::Uuid;

use blog_db::models::{CommentRow, PostRow};
use blog_db::queries::{self, LikeSummary};
use blog_types::api::{AuthorRef, CommentView, PostView, TagView};

use crate::error::Result;
use crate::mutations::{Orchestrator, parse_id, parse_time};

struct Snapshot {
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
    tags: HashMap<String, Vec<String>>,
    post_likes: LikeSummary,
    comment_likes: LikeSummary,
}

impl Orchestrator {
    pub async fn list_tags(&self) -> Result<Vec<TagView>> {
        let tags = self.read(|db| Ok(db.with_conn(queries::list_tags)?)).await?;
        Ok(tags
            .into_iter()
            .map(|t| TagView { id: t.id, name: t.name })
            .collect())
    }

    /// Every post, newest first, with its tags, likes and comments as seen by
    /// `viewer`. Image URLs are signed afresh.
    pub async fn list_posts(&self, viewer: Uuid) -> Result<Vec<PostView>> {
        let viewer = viewer.to_string();
        let snapshot = self
            .read(move |db| {
                let snapshot = db.with_conn(|conn| {
                    Ok(Snapshot {
                        posts: queries::list_posts(conn)?,
                        comments: queries::list_comments(conn)?,
                        tags: queries::tag_names_by_post(conn)?,
                        post_likes: queries::post_like_summary(conn, &viewer)?,
                        comment_likes: queries::comment_like_summary(conn, &viewer)?,
                    })
                })?;
                Ok(snapshot)
            })
            .await?;

        let Snapshot {
            posts,
            comments,
            mut tags,
            post_likes,
            comment_likes,
        } = snapshot;

        let mut comments_by_post: HashMap<String, Vec<CommentView>> = HashMap::new();
        for row in comments {
            let view = CommentView {
                id: parse_id(&row.id),
                message: row.message,
                parent_id: row.parent_id.as_deref().map(parse_id),
                created_at: parse_time(&row.created_at),
                updated_at: parse_time(&row.updated_at),
                user: AuthorRef {
                    id: parse_id(&row.user_id),
                    name: row.author_name,
                },
                like_count: count_for(&comment_likes, &row.id),
                liked_by_me: comment_likes.liked_by_viewer.contains(&row.id),
            };
            comments_by_post.entry(row.post_id).or_default().push(view);
        }

        Ok(posts
            .into_iter()
            .map(|row| PostView {
                id: parse_id(&row.id),
                user: AuthorRef {
                    id: parse_id(&row.user_id),
                    name: row.author_name,
                },
                title: row.title,
                body: row.body,
                image_url: row.image_key.as_deref().map(|key| self.media().access_url(key)),
                like_count: count_for(&post_likes, &row.id),
                liked_by_me: post_likes.liked_by_viewer.contains(&row.id),
                created_at: parse_time(&row.created_at),
                updated_at: parse_time(&row.updated_at),
                comments: comments_by_post.remove(&row.id).unwrap_or_default(),
                tags: tags.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }
}

fn count_for(summary: &LikeSummary, id: &str) -> usize {
    summary.counts.get(id).copied().unwrap_or(0)
}
