//! Operator commands behind the `users`, `groups` and `posts` subcommands.

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CreateGroupParams, CreateUserParams, RepoError, Repositories,
};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::slug::{SlugError, derive_slug, slug_candidates, validate_slug};
use crate::domain::users::is_valid_username;

const MAX_GROUP_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct AdminService {
    repos: Repositories,
}

impl AdminService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, AdminError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AdminError::Validation {
                field: "username",
                reason: "must not be empty",
            });
        }
        if !is_valid_username(username) {
            return Err(AdminError::Validation {
                field: "username",
                reason: "must be at most 150 letters, digits or `_ . @ + -`",
            });
        }

        let user = self
            .repos
            .users
            .create_user(CreateUserParams {
                username: username.to_string(),
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
            })
            .await?;
        info!(target = "postern::application::admin", user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Removes the user along with everything they authored.
    pub async fn delete_user(&self, username: &str) -> Result<(), AdminError> {
        let user = self
            .repos
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AdminError::UnknownUser(username.to_string()))?;
        self.repos.users.delete_user(user.id).await?;
        info!(target = "postern::application::admin", user_id = user.id, username = %user.username, "user deleted");
        Ok(())
    }

    pub async fn create_group(
        &self,
        command: CreateGroupCommand,
    ) -> Result<GroupRecord, AdminError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(AdminError::Validation {
                field: "title",
                reason: "must not be empty",
            });
        }
        if title.chars().count() > MAX_GROUP_TITLE_CHARS {
            return Err(AdminError::Validation {
                field: "title",
                reason: "must be at most 200 characters",
            });
        }

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(slug)?;
                slug.to_string()
            }
            _ => self.free_slug(&title).await?,
        };

        let group = self
            .repos
            .groups
            .create_group(CreateGroupParams {
                title,
                slug,
                description: command.description.trim().to_string(),
            })
            .await?;
        info!(target = "postern::application::admin", group_id = group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    async fn free_slug(&self, title: &str) -> Result<String, AdminError> {
        let base = derive_slug(title)?;
        for candidate in slug_candidates(&base) {
            if self.repos.groups.find_group_by_slug(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(SlugError::Exhausted { base }.into())
    }

    /// Posts in the group survive without a group.
    pub async fn delete_group(&self, slug: &str) -> Result<(), AdminError> {
        let group = self
            .repos
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| AdminError::UnknownGroup(slug.to_string()))?;
        self.repos.groups.delete_group(group.id).await?;
        info!(target = "postern::application::admin", group_id = group.id, slug = %group.slug, "group deleted");
        Ok(())
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<(), AdminError> {
        match self.repos.posts_write.delete_post(post_id).await {
            Ok(()) => {
                info!(target = "postern::application::admin", post_id, "post deleted");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(AdminError::UnknownPost(post_id)),
            Err(err) => Err(err.into()),
        }
    }
}
