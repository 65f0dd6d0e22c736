use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use blog_crypto::{hash_password, verify_password};
use blog_db::models::{NewUser, PostRow, ProfileChanges, UserRow};
use blog_db::queries;
use blog_types::api::{SignUpRequest, UserInfo};
use blog_types::events::Event;

use super::{Actor, Committed, Orchestrator, Upload, now, parse_id, required, stamp};
use crate::error::{MutationError, Result};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Well-formed credential (all-zero salt and key) that no password matches.
/// Sign-in verifies against it when the email is unknown so both failure
/// paths pay for one key derivation.
const ABSENT_USER_CREDENTIAL: &str =
    "AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// The public face of a user row.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserRow> for Account {
    fn from(row: UserRow) -> Self {
        Self {
            id: parse_id(&row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
        }
    }
}

/// Submitted profile fields and an optional new avatar.
#[derive(Debug, Default)]
pub struct ProfileDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image: Option<Upload>,
}

fn valid_email(email: String) -> Result<String> {
    let email = required(email, "email")?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(MutationError::invalid("email is not a valid address")),
    }
}

fn valid_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(MutationError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

impl Orchestrator {
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<Account> {
        let first_name = required(req.first_name, "firstName")?;
        let last_name = required(req.last_name, "lastName")?;
        let email = valid_email(req.email)?;
        valid_password(&req.password)?;

        let lookup = email.clone();
        if self.read(move |db| Ok(db.get_user_by_email(&lookup)?)).await?.is_some() {
            return Err(MutationError::invalid("User already exists"));
        }

        let password = req.password;
        let credential = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let user_id = Uuid::new_v4();
        self.commit(
            None,
            move |tx| {
                // A concurrent sign-up may have taken the email since the read above.
                if queries::user_by_email(tx, &email)?.is_some() {
                    return Err(MutationError::invalid("User already exists"));
                }
                queries::insert_user(
                    tx,
                    &NewUser {
                        id: &user_id.to_string(),
                        first_name: &first_name,
                        last_name: &last_name,
                        email: &email,
                        password: &credential,
                        created_at: &stamp(now()),
                    },
                )?;
                Ok(Account {
                    id: user_id,
                    first_name,
                    last_name,
                    email,
                })
            },
            |account| {
                info!("User {} signed up", account.id);
                Committed::new(account)
            },
        )
        .await
    }

    /// Check an email/password pair. Wrong email and wrong password produce
    /// the same error after the same amount of hashing work.
    pub async fn sign_in(&self, email: String, password: String) -> Result<Account> {
        let lookup = email.trim().to_string();
        let user = self.read(move |db| Ok(db.get_user_by_email(&lookup)?)).await?;

        let credential = match &user {
            Some(user) => user.password.clone(),
            None => ABSENT_USER_CREDENTIAL.to_string(),
        };
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &credential)).await??;

        match user {
            Some(user) if matches => Ok(user.into()),
            _ => Err(MutationError::unauthorized("Invalid email or password")),
        }
    }

    pub async fn user_info(&self, user_id: Uuid) -> Result<UserInfo> {
        let user = self
            .read(move |db| Ok(db.get_user_by_id(&user_id.to_string())?))
            .await?
            .ok_or_else(|| MutationError::not_found("user"))?;

        Ok(UserInfo {
            image_url: user.image_key.as_deref().map(|key| self.media().access_url(key)),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        })
    }

    /// Store a fresh credential (new salt) for `actor`.
    pub async fn update_password(&self, actor: &Actor, new_password: String) -> Result<()> {
        valid_password(&new_password)?;
        let credential = tokio::task::spawn_blocking(move || hash_password(&new_password)).await??;
        let user_id = actor.id;

        self.commit(
            None,
            move |tx| {
                if !queries::update_user_password(tx, &user_id.to_string(), &credential)? {
                    return Err(MutationError::not_found("user"));
                }
                Ok(())
            },
            move |()| {
                info!("User {} changed password", user_id);
                Committed::new(())
            },
        )
        .await
    }

    /// Replace name and email, and the avatar if one is supplied. The old
    /// avatar is deleted only after commit.
    pub async fn update_profile(&self, actor: &Actor, draft: ProfileDraft) -> Result<UserInfo> {
        let first_name = required(draft.first_name, "firstName")?;
        let last_name = required(draft.last_name, "lastName")?;
        let email = valid_email(draft.email)?;

        let stored = self.upload_optional(draft.image).await?;
        let uploaded = stored.as_ref().map(|m| m.key.clone());
        let user_id = actor.id.to_string();

        self.commit(
            uploaded,
            move |tx| {
                let user = queries::user_by_id(tx, &user_id)?
                    .ok_or_else(|| MutationError::not_found("user"))?;
                if let Some(other) = queries::user_by_email(tx, &email)? {
                    if other.id != user.id {
                        return Err(MutationError::invalid("email is already in use"));
                    }
                }

                let (image_key, image_url, retired) = match stored {
                    Some(m) => (Some(m.key), Some(m.url), user.image_key),
                    None => (user.image_key, user.image_url, None),
                };
                queries::update_user_profile(
                    tx,
                    &user_id,
                    &ProfileChanges {
                        first_name: &first_name,
                        last_name: &last_name,
                        email: &email,
                        image_key: image_key.as_deref(),
                        image_url: image_url.as_deref(),
                    },
                )?;
                let info = UserInfo {
                    first_name,
                    last_name,
                    email,
                    image_url,
                };
                Ok((info, retired))
            },
            move |(info, retired)| Committed::new(info).retire(retired),
        )
        .await
    }

    /// Delete the account and everything it owns. Each removed post is
    /// announced with `POST_DELETED`. What the user left under other people's
    /// posts is announced too: withdrawn likes as `POST_LIKED`/`COMMENT_LIKED`
    /// with `addLike = false`, and removed comments (replies included) as
    /// `COMMENT_DELETED`. Owned media is deleted after commit.
    pub async fn delete_user(&self, actor: &Actor) -> Result<()> {
        let user_id = actor.id.to_string();
        let actor_id = actor.id;

        self.commit(
            None,
            move |tx| {
                let user = queries::user_by_id(tx, &user_id)?
                    .ok_or_else(|| MutationError::not_found("user"))?;
                let departure = Departure {
                    posts: queries::posts_by_author(tx, &user_id)?,
                    lost_comments: queries::comments_lost_with_user(tx, &user_id)?,
                    liked_posts: queries::posts_liked_elsewhere(tx, &user_id)?,
                    liked_comments: queries::comments_liked_elsewhere(tx, &user_id)?,
                };
                queries::delete_user(tx, &user_id)?;
                Ok((user, departure))
            },
            move |(user, departure)| {
                info!(
                    "User {} deleted with {} posts and {} comments elsewhere",
                    user.id,
                    departure.posts.len(),
                    departure.lost_comments.len()
                );
                departure.into_events(actor_id).retire(user.image_key)
            },
        )
        .await
    }
}

/// Rows an account deletion removes, gathered before the cascade runs.
struct Departure {
    posts: Vec<PostRow>,
    lost_comments: Vec<(String, String)>,
    liked_posts: Vec<String>,
    liked_comments: Vec<(String, String)>,
}

impl Departure {
    fn into_events(self, user_id: Uuid) -> Committed<()> {
        let lost: HashSet<&str> = self.lost_comments.iter().map(|(id, _)| id.as_str()).collect();
        let mut committed = Committed::new(());

        for post_id in &self.liked_posts {
            committed = committed.event(Event::PostLiked {
                post_id: parse_id(post_id),
                user_id,
                add_like: false,
            });
        }
        for (comment_id, post_id) in &self.liked_comments {
            if lost.contains(comment_id.as_str()) {
                continue;
            }
            committed = committed.event(Event::CommentLiked {
                post_id: parse_id(post_id),
                comment_id: parse_id(comment_id),
                user_id,
                add_like: false,
            });
        }
        for (comment_id, post_id) in &self.lost_comments {
            committed = committed.event(Event::CommentDeleted {
                post_id: parse_id(post_id),
                comment_id: parse_id(comment_id),
            });
        }
        for post in self.posts {
            committed = committed
                .event(Event::PostDeleted {
                    id: parse_id(&post.id),
                })
                .retire(post.image_key);
        }
        committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(valid_email(" ada@example.com ".into()).is_ok());
        for bad in ["", "ada", "@example.com", "ada@"] {
            assert!(valid_email(bad.into()).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn absent_user_credential_parses_and_never_matches() {
        assert!(!verify_password("", ABSENT_USER_CREDENTIAL).unwrap());
        assert!(!verify_password("correct horse", ABSENT_USER_CREDENTIAL).unwrap());
    }

    #[test]
    fn short_password_rejected() {
        assert!(valid_password("1234567").is_err());
        assert!(valid_password("12345678").is_ok());
    }
}
