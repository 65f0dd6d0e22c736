//! The write path: validate, stage media, run one transaction, and publish
//! the resulting events once it has committed.

pub mod accounts;
pub mod comments;
pub mod posts;

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use blog_db::{Connection, Database, Transaction, queries};
use blog_media::{MediaStore, object_key};
use blog_types::api::Claims;
use blog_types::events::Event;

use crate::error::{MutationError, Result};
use crate::publisher::EventPublisher;

/// The authenticated user a mutation runs on behalf of.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
        }
    }
}

/// An attachment received with a request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content: Bytes,
}

/// An attachment that is already in the media store.
#[derive(Debug, Clone)]
pub(crate) struct StoredMedia {
    pub key: String,
    pub url: String,
}

/// What a committed transaction leaves behind: the caller's value, the
/// events to publish, and media objects that are no longer referenced.
pub(crate) struct Committed<T> {
    pub value: T,
    pub events: Vec<Event>,
    pub retired_media: Vec<String>,
}

impl<T> Committed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
            retired_media: Vec::new(),
        }
    }

    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn retire(mut self, key: Option<String>) -> Self {
        self.retired_media.extend(key);
        self
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    db: Arc<Database>,
    media: Arc<dyn MediaStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl Orchestrator {
    pub fn new(
        db: Arc<Database>,
        media: Arc<dyn MediaStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { db, media, publisher }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }

    /// Run blocking datastore reads off the async runtime.
    pub(crate) async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref())).await?
    }

    /// Put an attachment in the store ahead of the transaction that will
    /// reference it.
    pub(crate) async fn upload(&self, upload: Upload) -> Result<StoredMedia> {
        let key = object_key(&upload.file_name);
        let url = self.media.put(&key, upload.content).await?;
        Ok(StoredMedia { key, url })
    }

    pub(crate) async fn upload_optional(&self, upload: Option<Upload>) -> Result<Option<StoredMedia>> {
        match upload {
            Some(upload) => self.upload(upload).await.map(Some),
            None => Ok(None),
        }
    }

    /// The commit phase.
    ///
    /// `write` runs inside one transaction on a blocking thread. If it
    /// commits, `after` turns its output into a [`Committed`] whose events are
    /// published and whose retired media is deleted. If it does not, the
    /// freshly `uploaded` object is deleted and nothing is published.
    ///
    /// The phase runs in its own task so that a caller that goes away after
    /// this point cannot leave a committed mutation unpublished.
    pub(crate) async fn commit<W, S, A, T>(
        &self,
        uploaded: Option<String>,
        write: W,
        after: A,
    ) -> Result<T>
    where
        W: FnOnce(&Transaction<'_>) -> Result<S> + Send + 'static,
        S: Send + 'static,
        A: FnOnce(S) -> Committed<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let media = self.media.clone();
        let publisher = self.publisher.clone();

        let phase = tokio::spawn(async move {
            let staged = match tokio::task::spawn_blocking(move || db.transaction(write)).await {
                Ok(result) => result.map_err(MutationError::from),
                Err(e) => Err(MutationError::from(e)),
            };

            let staged = match staged {
                Ok(staged) => staged,
                Err(e) => {
                    if let Some(key) = uploaded {
                        discard(media.as_ref(), &key).await;
                    }
                    return Err(e);
                }
            };

            let Committed {
                value,
                events,
                retired_media,
            } = after(staged);

            for event in events {
                info!("Committed {} for post {}", event.kind(), event.post_id());
                publisher.publish(event).await;
            }
            for key in retired_media {
                discard(media.as_ref(), &key).await;
            }

            Ok(value)
        });

        phase.await?
    }
}

/// Best-effort delete; a failure is logged and otherwise ignored.
async fn discard(media: &dyn MediaStore, key: &str) {
    if let Err(e) = media.delete(key).await {
        warn!("Failed to delete media object {}: {}", key, e);
    }
}

/// Get-or-create every tag in `names`, returning their ids in order.
pub(crate) fn resolve_tags(conn: &Connection, names: &[String]) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        if let Some(tag) = queries::tag_by_name(conn, name)? {
            ids.push(tag.id);
            continue;
        }
        queries::insert_tag_if_absent(conn, name)?;
        match queries::tag_by_name(conn, name)? {
            Some(tag) => ids.push(tag.id),
            None => return Err(MutationError::TagResolutionFailed(name.clone())),
        }
    }
    Ok(ids)
}

pub const MAX_TAG_LEN: usize = 64;

/// Trim, reject blanks, and drop repeats while keeping first-seen order.
pub(crate) fn normalize_tags(raw: Vec<String>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut tags = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(MutationError::invalid("Tag names must not be empty"));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(MutationError::invalid(format!(
                "Tag names are limited to {MAX_TAG_LEN} characters"
            )));
        }
        if seen.insert(tag.to_string()) {
            tags.push(tag.to_string());
        }
    }
    Ok(tags)
}

pub(crate) fn required(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MutationError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Current time at the precision the datastore keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub(crate) fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Unparseable stored timestamp {:?}: {}", raw, e);
            DateTime::<Utc>::default()
        })
}

pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Unparseable stored id {:?}: {}", raw, e);
        Uuid::nil()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags(vec![" Marvel ".into(), "DC".into(), "Marvel".into()]).unwrap();
        assert_eq!(tags, vec!["Marvel", "DC"]);
    }

    #[test]
    fn blank_tag_is_a_validation_failure() {
        let result = normalize_tags(vec!["ok".into(), "   ".into()]);
        assert!(matches!(result, Err(MutationError::ValidationFailed(_))));
    }

    #[test]
    fn resolve_creates_once_and_reuses() {
        let db = Database::open_in_memory().unwrap();
        let names = vec!["Marvel".to_string(), "DC".to_string()];

        let first = db.transaction(|tx| resolve_tags(tx, &names)).unwrap();
        let second = db.transaction(|tx| resolve_tags(tx, &names)).unwrap();
        assert_eq!(first, second);

        let tags = db.with_conn(queries::list_tags).unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn tag_that_cannot_be_refetched_fails_resolution() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER swallow_tags AFTER INSERT ON tags
                 BEGIN DELETE FROM tags WHERE id = NEW.id; END;",
            )?;
            Ok(())
        })
        .unwrap();

        let names = vec!["Ghost".to_string()];
        let result = db.transaction(|tx| resolve_tags(tx, &names));
        assert!(matches!(
            result,
            Err(blog_db::TxError::Aborted(MutationError::TagResolutionFailed(ref name))) if name == "Ghost"
        ));
    }

    #[test]
    fn timestamps_survive_storage() {
        let at = now();
        assert_eq!(parse_time(&stamp(at)), at);
    }
}
