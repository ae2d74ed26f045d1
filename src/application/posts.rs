//! Post authoring and comments.
//!
//! Form input arrives as raw strings; validation produces either a typed
//! command or a set of field errors the form page renders next to the
//! offending inputs. Nothing is written when validation fails.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CreateCommentParams, CreatePostParams, RepoError, Repositories, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

pub const REQUIRED_FIELD: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
}

impl PostForm {
    pub fn from_post(post: &PostRecord) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

/// Field name to message; empty when the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, &'static str>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.fields.entry(field).or_insert(message);
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error("user {user_id} is not the author of post {post_id}")]
    NotAuthor { post_id: i64, user_id: i64 },
    #[error("invalid form: {}", .0.summary())]
    Invalid(FormErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
}

#[derive(Clone)]
pub struct AuthoringService {
    repos: Repositories,
}

impl AuthoringService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Choices offered by the group selector.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.repos.groups.list_groups().await?)
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        form: &PostForm,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate_post(form).await?;
        let post = self
            .repos
            .posts_write
            .create_post(CreatePostParams {
                author_id: author.id,
                text: validated.text,
                group_id: validated.group_id,
                image: None,
            })
            .await?;

        info!(
            target = "postern::application::posts",
            post_id = post.id,
            author = %author.username,
            label = %post.label(),
            "post created"
        );
        Ok(post)
    }

    /// Loads a post the actor may edit.
    pub async fn editable_post(
        &self,
        actor: &UserRecord,
        post_id: i64,
    ) -> Result<PostRecord, PostError> {
        let post = self
            .repos
            .posts
            .find_post_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost(post_id))?;

        if post.author_id != actor.id {
            return Err(PostError::NotAuthor {
                post_id,
                user_id: actor.id,
            });
        }
        Ok(post)
    }

    pub async fn edit_post(
        &self,
        actor: &UserRecord,
        post_id: i64,
        form: &PostForm,
    ) -> Result<PostRecord, PostError> {
        let post = self.editable_post(actor, post_id).await?;
        let validated = self.validate_post(form).await?;

        let updated = self
            .repos
            .posts_write
            .update_post(UpdatePostParams {
                id: post.id,
                text: validated.text,
                group_id: validated.group_id,
            })
            .await?;

        info!(
            target = "postern::application::posts",
            post_id = updated.id,
            author = %actor.username,
            "post updated"
        );
        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        actor: &UserRecord,
        post_id: i64,
        form: &CommentForm,
    ) -> Result<CommentRecord, PostError> {
        if self.repos.posts.find_post_by_id(post_id).await?.is_none() {
            return Err(PostError::UnknownPost(post_id));
        }

        let text = form.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED_FIELD);
            return Err(PostError::Invalid(errors));
        }

        let comment = self
            .repos
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: actor.id,
                text: text.to_string(),
            })
            .await?;
        Ok(comment)
    }

    async fn validate_post(&self, form: &PostForm) -> Result<ValidatedPost, PostError> {
        let mut errors = FormErrors::default();

        let text = form.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED_FIELD);
        }

        let raw_group = form.group.trim();
        let group_id = if raw_group.is_empty() {
            None
        } else {
            match raw_group.parse::<i64>() {
                Ok(id) if self.repos.groups.find_group_by_id(id).await?.is_some() => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            }
        };

        if errors.is_empty() {
            Ok(ValidatedPost {
                text: text.to_string(),
                group_id,
            })
        } else {
            Err(PostError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::repos::{
        CommentsRepo, CreateGroupParams, CreateUserParams, GroupsRepo, PostsRepo, UsersRepo,
    };
    use crate::infra::memory::InMemoryRepositories;

    async fn fixture() -> (Arc<InMemoryRepositories>, AuthoringService, UserRecord) {
        let backend = Arc::new(InMemoryRepositories::new());
        let author = backend
            .create_user(CreateUserParams {
                username: "auth".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .expect("author");
        let service = AuthoringService::new(Repositories::from_backend(backend.clone()));
        (backend, service, author)
    }

    fn form(text: &str, group: &str) -> PostForm {
        PostForm {
            text: text.to_string(),
            group: group.to_string(),
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_saving() {
        let (backend, service, author) = fixture().await;

        let result = service.create_post(&author, &form("   ", "")).await;
        let Err(PostError::Invalid(errors)) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("text"), Some(REQUIRED_FIELD));
        assert_eq!(
            backend
                .count_posts(crate::application::repos::PostQueryFilter::All)
                .await
                .expect("count"),
            0
        );
    }

    #[tokio::test]
    async fn unknown_group_is_an_invalid_choice() {
        let (_, service, author) = fixture().await;

        let result = service.create_post(&author, &form("text", "77")).await;
        let Err(PostError::Invalid(errors)) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("group"), Some(INVALID_CHOICE));
        assert_eq!(errors.get("text"), None);
    }

    #[tokio::test]
    async fn create_trims_text_and_assigns_group() {
        let (backend, service, author) = fixture().await;
        let group = backend
            .create_group(CreateGroupParams {
                title: "Group".to_string(),
                slug: "group".to_string(),
                description: String::new(),
            })
            .await
            .expect("group");

        let post = service
            .create_post(&author, &form("  hello  ", &group.id.to_string()))
            .await
            .expect("post");
        assert_eq!(post.text, "hello");
        assert_eq!(post.group_id, Some(group.id));
    }

    #[tokio::test]
    async fn edit_by_non_author_leaves_post_unchanged() {
        let (backend, service, author) = fixture().await;
        let intruder = backend
            .create_user(CreateUserParams {
                username: "intruder".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .expect("intruder");
        let post = service
            .create_post(&author, &form("original", ""))
            .await
            .expect("post");

        let result = service
            .edit_post(&intruder, post.id, &form("changed", ""))
            .await;
        assert!(matches!(result, Err(PostError::NotAuthor { .. })));

        let stored = backend
            .find_post_by_id(post.id)
            .await
            .expect("find")
            .expect("post");
        assert_eq!(stored.text, "original");
    }

    #[tokio::test]
    async fn edit_keeps_publication_date() {
        let (_, service, author) = fixture().await;
        let post = service
            .create_post(&author, &form("original", ""))
            .await
            .expect("post");

        let updated = service
            .edit_post(&author, post.id, &form("changed", ""))
            .await
            .expect("edit");
        assert_eq!(updated.text, "changed");
        assert_eq!(updated.pub_date, post.pub_date);
    }

    #[tokio::test]
    async fn empty_comment_is_not_saved() {
        let (backend, service, author) = fixture().await;
        let post = service
            .create_post(&author, &form("post", ""))
            .await
            .expect("post");

        let result = service
            .add_comment(&author, post.id, &CommentForm { text: " ".to_string() })
            .await;
        assert!(matches!(result, Err(PostError::Invalid(_))));
        assert_eq!(backend.count_comments(post.id).await.expect("count"), 0);

        service
            .add_comment(&author, post.id, &CommentForm { text: "nice".to_string() })
            .await
            .expect("comment");
        assert_eq!(backend.count_comments(post.id).await.expect("count"), 1);
    }
}
