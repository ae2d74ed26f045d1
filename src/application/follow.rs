use thiserror::Error;
use tracing::debug;

use crate::application::repos::{RepoError, Repositories};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    Removed,
    Unchanged,
    SelfFollow,
}

#[derive(Clone)]
pub struct FollowService {
    repos: Repositories,
}

impl FollowService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Idempotent; following yourself is ignored.
    pub async fn follow(
        &self,
        user: &UserRecord,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.resolve_author(author_username).await?;
        if author.id == user.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = self.repos.follows.follow(user.id, author.id).await?;
        debug!(
            target = "postern::application::follow",
            user = %user.username,
            author = %author.username,
            created,
            "follow requested"
        );
        Ok(if created {
            FollowOutcome::Created
        } else {
            FollowOutcome::Unchanged
        })
    }

    pub async fn unfollow(
        &self,
        user: &UserRecord,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.resolve_author(author_username).await?;
        let removed = self.repos.follows.unfollow(user.id, author.id).await?;
        debug!(
            target = "postern::application::follow",
            user = %user.username,
            author = %author.username,
            removed,
            "unfollow requested"
        );
        Ok(if removed {
            FollowOutcome::Removed
        } else {
            FollowOutcome::Unchanged
        })
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.repos
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
