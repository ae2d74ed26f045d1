//! In-process repository adapter.
//!
//! Mirrors the relational schema closely enough to be a drop-in for local
//! runs without a database and for the test-suite: unique usernames, slugs
//! and follow edges, foreign-key checks on insert, cascades on user/post
//! deletion and null-on-delete for a post's group.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, HealthRepo, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{CommentRecord, FollowRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Default)]
struct MemoryState {
    last_user_id: i64,
    last_group_id: i64,
    last_post_id: i64,
    last_comment_id: i64,
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    follows: HashSet<FollowRecord>,
}

impl MemoryState {
    fn matches(&self, post: &PostRecord, filter: PostQueryFilter) -> bool {
        match filter {
            PostQueryFilter::All => true,
            PostQueryFilter::Group(group_id) => post.group_id == Some(group_id),
            PostQueryFilter::Author(author_id) => post.author_id == author_id,
            PostQueryFilter::FollowedBy(user_id) => {
                self.follows.contains(&FollowRecord {
                    user_id,
                    author_id: post.author_id,
                })
            }
        }
    }

    fn ensure_group(&self, group_id: Option<i64>) -> Result<(), RepoError> {
        match group_id {
            Some(id) if !self.groups.contains_key(&id) => Err(RepoError::InvalidInput {
                message: format!("group {id} does not exist"),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_user(&self, user_id: i64) -> Result<(), RepoError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(RepoError::InvalidInput {
                message: format!("user {user_id} does not exist"),
            })
        }
    }

    fn remove_post_cascade(&mut self, post_id: i64) -> bool {
        let removed = self.posts.remove(&post_id).is_some();
        if removed {
            self.comments.retain(|_, comment| comment.post_id != post_id);
        }
        removed
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
pub struct InMemoryRepositories {
    state: RwLock<MemoryState>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a post with an explicit publication date.
    pub async fn create_post_at(
        &self,
        params: CreatePostParams,
        pub_date: OffsetDateTime,
    ) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_user(params.author_id)?;
        state.ensure_group(params.group_id)?;

        let id = next_id(&mut state.last_post_id);
        let record = PostRecord {
            id,
            text: params.text,
            pub_date,
            image: params.image,
            author_id: params.author_id,
            group_id: params.group_id,
        };
        state.posts.insert(id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_users_by_ids(&self, ids: &[i64]) -> Result<Vec<UserRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id)).cloned().collect())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|user| user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        let id = next_id(&mut state.last_user_id);
        let record = UserRecord {
            id,
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            date_joined: OffsetDateTime::now_utc(),
        };
        state.users.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let owned: Vec<i64> = state
            .posts
            .values()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        for post_id in owned {
            state.remove_post_cascade(post_id);
        }
        state.comments.retain(|_, comment| comment.author_id != id);
        state
            .follows
            .retain(|edge| edge.user_id != id && edge.author_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for InMemoryRepositories {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        let mut groups: Vec<GroupRecord> = state.groups.values().cloned().collect();
        groups.sort_by(|left, right| left.title.cmp(&right.title).then(left.id.cmp(&right.id)));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn find_groups_by_ids(&self, ids: &[i64]) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.groups.get(id)).cloned().collect())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }

        let id = next_id(&mut state.last_group_id);
        let record = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.groups.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        for post in state.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn list_posts(
        &self,
        filter: PostQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let mut matching: Vec<&PostRecord> = state
            .posts
            .values()
            .filter(|post| state.matches(post, filter))
            .collect();
        matching.sort_by(|left, right| {
            right
                .pub_date
                .cmp(&left.pub_date)
                .then(right.id.cmp(&left.id))
        });

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn count_posts(&self, filter: PostQueryFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        let count = state
            .posts
            .values()
            .filter(|post| state.matches(post, filter))
            .count();
        Ok(count as u64)
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.create_post_at(params, OffsetDateTime::now_utc()).await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_group(params.group_id)?;

        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.remove_post_cascade(id) {
            Ok(())
        } else {
            Err(RepoError::NotFound)
        }
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn count_comments(&self, post_id: i64) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        let count = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .count();
        Ok(count as u64)
    }

    async fn count_comments_by_post(
        &self,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, u64>, RepoError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for comment in state.comments.values() {
            if post_ids.contains(&comment.post_id) {
                *counts.entry(comment.post_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_user(params.author_id)?;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post {} does not exist", params.post_id),
            });
        }

        let id = next_id(&mut state.last_comment_id);
        let record = CommentRecord {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created: OffsetDateTime::now_utc(),
        };
        state.comments.insert(id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for InMemoryRepositories {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .state
            .read()
            .await
            .follows
            .contains(&FollowRecord { user_id, author_id }))
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "users cannot follow themselves".to_string(),
            });
        }
        state.ensure_user(user_id)?;
        state.ensure_user(author_id)?;
        Ok(state.follows.insert(FollowRecord { user_id, author_id }))
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .state
            .write()
            .await
            .follows
            .remove(&FollowRecord { user_id, author_id }))
    }
}

#[async_trait]
impl HealthRepo for InMemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    async fn user(repo: &InMemoryRepositories, username: &str) -> UserRecord {
        repo.create_user(CreateUserParams {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect("create user")
    }

    async fn group(repo: &InMemoryRepositories, slug: &str) -> GroupRecord {
        repo.create_group(CreateGroupParams {
            title: format!("Group {slug}"),
            slug: slug.to_string(),
            description: String::new(),
        })
        .await
        .expect("create group")
    }

    fn post_params(author_id: i64, group_id: Option<i64>, text: &str) -> CreatePostParams {
        CreatePostParams {
            author_id,
            text: text.to_string(),
            group_id,
            image: None,
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first_with_id_tiebreak() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let base = OffsetDateTime::now_utc();

        let older = repo
            .create_post_at(post_params(author.id, None, "older"), base - Duration::hours(1))
            .await
            .expect("post");
        let tied_first = repo
            .create_post_at(post_params(author.id, None, "tied first"), base)
            .await
            .expect("post");
        let tied_second = repo
            .create_post_at(post_params(author.id, None, "tied second"), base)
            .await
            .expect("post");

        let ids: Vec<i64> = repo
            .list_posts(PostQueryFilter::All, PageRequest::new(10, 0))
            .await
            .expect("list")
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, vec![tied_second.id, tied_first.id, older.id]);
    }

    #[tokio::test]
    async fn deleting_group_nulls_post_reference() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let group = group(&repo, "test-slug").await;
        let post = repo
            .create_post(post_params(author.id, Some(group.id), "in group"))
            .await
            .expect("post");

        repo.delete_group(group.id).await.expect("delete group");

        let stored = repo
            .find_post_by_id(post.id)
            .await
            .expect("find")
            .expect("post survives");
        assert_eq!(stored.group_id, None);
        assert_eq!(
            repo.count_posts(PostQueryFilter::Group(group.id))
                .await
                .expect("count"),
            0
        );
    }

    #[tokio::test]
    async fn deleting_post_removes_comments() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let reader = user(&repo, "reader").await;
        let post = repo
            .create_post(post_params(author.id, None, "commented"))
            .await
            .expect("post");
        repo.create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: reader.id,
            text: "nice".to_string(),
        })
        .await
        .expect("comment");

        repo.delete_post(post.id).await.expect("delete post");

        assert_eq!(repo.count_comments(post.id).await.expect("count"), 0);
        assert!(matches!(
            repo.delete_post(post.id).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn deleting_author_cascades_posts_comments_and_follows() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let reader = user(&repo, "reader").await;
        let post = repo
            .create_post(post_params(author.id, None, "bye"))
            .await
            .expect("post");
        let reader_post = repo
            .create_post(post_params(reader.id, None, "stays"))
            .await
            .expect("post");
        repo.create_comment(CreateCommentParams {
            post_id: reader_post.id,
            author_id: author.id,
            text: "by author".to_string(),
        })
        .await
        .expect("comment");
        repo.follow(reader.id, author.id).await.expect("follow");

        repo.delete_user(author.id).await.expect("delete user");

        assert!(repo.find_post_by_id(post.id).await.expect("find").is_none());
        assert_eq!(repo.count_comments(reader_post.id).await.expect("count"), 0);
        assert!(!repo.is_following(reader.id, author.id).await.expect("check"));
        assert_eq!(repo.count_posts(PostQueryFilter::All).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn follow_edges_are_unique() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let reader = user(&repo, "reader").await;

        assert!(repo.follow(reader.id, author.id).await.expect("follow"));
        assert!(!repo.follow(reader.id, author.id).await.expect("follow again"));
        assert!(repo.unfollow(reader.id, author.id).await.expect("unfollow"));
        assert!(!repo.unfollow(reader.id, author.id).await.expect("unfollow again"));
        assert!(matches!(
            repo.follow(reader.id, reader.id).await,
            Err(RepoError::Integrity { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_group_is_rejected_on_insert() {
        let repo = InMemoryRepositories::new();
        let author = user(&repo, "auth").await;
        let result = repo.create_post(post_params(author.id, Some(42), "x")).await;
        assert!(matches!(result, Err(RepoError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn duplicate_slug_and_username_are_rejected() {
        let repo = InMemoryRepositories::new();
        user(&repo, "auth").await;
        group(&repo, "test-slug").await;

        let dup_user = repo
            .create_user(CreateUserParams {
                username: "auth".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await;
        assert!(matches!(dup_user, Err(RepoError::Duplicate { .. })));

        let dup_group = repo
            .create_group(CreateGroupParams {
                title: "Other".to_string(),
                slug: "test-slug".to_string(),
                description: String::new(),
            })
            .await;
        assert!(matches!(dup_group, Err(RepoError::Duplicate { .. })));
    }
}
