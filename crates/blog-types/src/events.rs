use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events pushed over the WebSocket gateway after a mutation commits.
///
/// Serialized as `{"type": "POST_ADDED", "data": {...}}` with camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    /// A post was created
    PostAdded {
        id: Uuid,
        author_id: Uuid,
        author_name: String,
        title: String,
        body: String,
        image_url: Option<String>,
        tags: Vec<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },

    /// A post's title, body, image or tag set changed
    PostUpdated {
        id: Uuid,
        title: String,
        body: String,
        image_url: Option<String>,
        tags: Vec<String>,
        updated_at: DateTime<Utc>,
    },

    PostDeleted { id: Uuid },

    /// A user liked (`add_like = true`) or unliked a post
    PostLiked {
        post_id: Uuid,
        user_id: Uuid,
        add_like: bool,
    },

    CommentAdded { post_id: Uuid, comment: CommentPayload },

    CommentUpdated {
        post_id: Uuid,
        comment_id: Uuid,
        message: String,
        updated_at: DateTime<Utc>,
    },

    CommentDeleted { post_id: Uuid, comment_id: Uuid },

    /// A user liked (`add_like = true`) or unliked a comment
    CommentLiked {
        post_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
        add_like: bool,
    },
}

/// The comment carried by [`Event::CommentAdded`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub id: Uuid,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Discriminant of an [`Event`], matching the wire `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PostAdded,
    PostUpdated,
    PostDeleted,
    PostLiked,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    CommentLiked,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostAdded => "POST_ADDED",
            Self::PostUpdated => "POST_UPDATED",
            Self::PostDeleted => "POST_DELETED",
            Self::PostLiked => "POST_LIKED",
            Self::CommentAdded => "COMMENT_ADDED",
            Self::CommentUpdated => "COMMENT_UPDATED",
            Self::CommentDeleted => "COMMENT_DELETED",
            Self::CommentLiked => "COMMENT_LIKED",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PostAdded { .. } => EventKind::PostAdded,
            Self::PostUpdated { .. } => EventKind::PostUpdated,
            Self::PostDeleted { .. } => EventKind::PostDeleted,
            Self::PostLiked { .. } => EventKind::PostLiked,
            Self::CommentAdded { .. } => EventKind::CommentAdded,
            Self::CommentUpdated { .. } => EventKind::CommentUpdated,
            Self::CommentDeleted { .. } => EventKind::CommentDeleted,
            Self::CommentLiked { .. } => EventKind::CommentLiked,
        }
    }

    /// The post this event concerns. Every event is scoped to exactly one post.
    pub fn post_id(&self) -> Uuid {
        match self {
            Self::PostAdded { id, .. }
            | Self::PostUpdated { id, .. }
            | Self::PostDeleted { id } => *id,
            Self::PostLiked { post_id, .. }
            | Self::CommentAdded { post_id, .. }
            | Self::CommentUpdated { post_id, .. }
            | Self::CommentDeleted { post_id, .. }
            | Self::CommentLiked { post_id, .. } => *post_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_liked_wire_shape() {
        let post_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let event = Event::PostLiked { post_id, user_id, add_like: true };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "POST_LIKED",
                "data": { "postId": post_id, "userId": user_id, "addLike": true }
            })
        );
    }

    #[test]
    fn comment_added_omits_missing_parent() {
        let event = Event::CommentAdded {
            post_id: Uuid::new_v4(),
            comment: CommentPayload {
                id: Uuid::new_v4(),
                message: "first!".into(),
                parent_id: None,
                author_id: Uuid::new_v4(),
                author_name: "Ada".into(),
                created_at: Utc::now(),
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "COMMENT_ADDED");
        let comment = &value["data"]["comment"];
        assert!(comment.get("parentId").is_none());
        assert_eq!(comment["authorName"], "Ada");
    }

    #[test]
    fn kind_matches_wire_tag() {
        let events = [
            Event::PostDeleted { id: Uuid::new_v4() },
            Event::CommentDeleted { post_id: Uuid::new_v4(), comment_id: Uuid::new_v4() },
            Event::CommentLiked {
                post_id: Uuid::new_v4(),
                comment_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                add_like: false,
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind().as_str());
        }
    }
}
