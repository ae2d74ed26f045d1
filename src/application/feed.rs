use std::collections::HashMap;
use std::num::NonZeroU32;

use serde::Serialize;
use thiserror::Error;

use crate::application::pagination::{Page, PageNumber, Paginator};
use crate::application::repos::{PostQueryFilter, RepoError, Repositories};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::{posts, users::username_segment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    Group(String),
    Author(String),
    Following(i64),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A post as rendered in any listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub label: String,
    pub published: String,
    pub iso_date: String,
    pub author_username: String,
    /// Percent-encoded username for `/profile/{username}/` links.
    pub author_segment: String,
    pub author_name: String,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub image: Option<String>,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_segment: String,
    pub author_name: String,
    pub created: String,
}

/// Feed page plus whichever entity the filter resolved to.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub page: Page<PostView>,
    pub group: Option<GroupRecord>,
    pub author: Option<UserRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub post_count: u64,
    pub following: bool,
    pub is_self: bool,
    pub page: Page<PostView>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostView,
    pub author_id: i64,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
}

#[derive(Clone)]
pub struct FeedService {
    repos: Repositories,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(repos: Repositories, page_size: NonZeroU32) -> Self {
        Self {
            repos,
            paginator: Paginator::new(page_size),
        }
    }

    pub async fn page(
        &self,
        filter: &FeedFilter,
        requested: PageNumber,
    ) -> Result<FeedPage, FeedError> {
        let (query, group, author) = self.resolve_filter(filter).await?;

        let total = self.repos.posts.count_posts(query).await?;
        let number = self.paginator.resolve(requested, total);
        let records = self
            .repos
            .posts
            .list_posts(query, self.paginator.request_for(number))
            .await?;
        let views = self.build_views(records).await?;

        Ok(FeedPage {
            page: self.paginator.page(number, total, views),
            group,
            author,
        })
    }

    /// Profile feed with the author's post count and the viewer's follow state.
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        requested: PageNumber,
    ) -> Result<ProfileFeed, FeedError> {
        let feed = self
            .page(&FeedFilter::Author(username.to_string()), requested)
            .await?;
        let author = feed
            .author
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.repos.follows.is_following(viewer.id, author.id).await?
            }
            _ => false,
        };

        Ok(ProfileFeed {
            post_count: feed.page.total_count,
            is_self: viewer.is_some_and(|viewer| viewer.id == author.id),
            following,
            author,
            page: feed.page,
        })
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, FeedError> {
        let record = self
            .repos
            .posts
            .find_post_by_id(post_id)
            .await?
            .ok_or(FeedError::UnknownPost(post_id))?;
        let author_id = record.author_id;

        let author_post_count = self
            .repos
            .posts
            .count_posts(PostQueryFilter::Author(author_id))
            .await?;
        let comments = self.repos.comments.list_comments(post_id).await?;
        let comments = self.build_comment_views(comments).await?;
        let post = self
            .build_views(vec![record])
            .await?
            .pop()
            .ok_or(FeedError::UnknownPost(post_id))?;

        Ok(PostDetail {
            post,
            author_id,
            author_post_count,
            comments,
        })
    }

    async fn resolve_filter(
        &self,
        filter: &FeedFilter,
    ) -> Result<(PostQueryFilter, Option<GroupRecord>, Option<UserRecord>), FeedError> {
        match filter {
            FeedFilter::All => Ok((PostQueryFilter::All, None, None)),
            FeedFilter::Group(slug) => {
                let group = self
                    .repos
                    .groups
                    .find_group_by_slug(slug)
                    .await?
                    .ok_or_else(|| FeedError::UnknownGroup(slug.clone()))?;
                Ok((PostQueryFilter::Group(group.id), Some(group), None))
            }
            FeedFilter::Author(username) => {
                let author = self
                    .repos
                    .users
                    .find_user_by_username(username)
                    .await?
                    .ok_or_else(|| FeedError::UnknownAuthor(username.clone()))?;
                Ok((PostQueryFilter::Author(author.id), None, Some(author)))
            }
            FeedFilter::Following(user_id) => {
                Ok((PostQueryFilter::FollowedBy(*user_id), None, None))
            }
        }
    }

    /// Resolves authors, groups and comment totals for a whole page at once.
    async fn build_views(&self, records: Vec<PostRecord>) -> Result<Vec<PostView>, FeedError> {
        let post_ids: Vec<i64> = records.iter().map(|record| record.id).collect();
        let authors = self
            .users_by_id(records.iter().map(|record| record.author_id))
            .await?;
        let group_ids = distinct(records.iter().filter_map(|record| record.group_id));
        let groups: HashMap<i64, GroupRecord> = self
            .repos
            .groups
            .find_groups_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|group| (group.id, group))
            .collect();
        let comment_counts = self.repos.comments.count_comments_by_post(&post_ids).await?;

        records
            .into_iter()
            .map(|record| -> Result<PostView, FeedError> {
                let author = authors.get(&record.author_id).ok_or_else(|| {
                    FeedError::Repo(RepoError::Integrity {
                        message: format!("post {} references a missing author", record.id),
                    })
                })?;
                let group = record.group_id.and_then(|id| groups.get(&id));

                Ok(PostView {
                    id: record.id,
                    label: record.label(),
                    published: posts::format_human_date(record.pub_date),
                    iso_date: posts::format_iso_datetime(record.pub_date),
                    author_username: author.username.clone(),
                    author_segment: username_segment(&author.username),
                    author_name: author.display_name(),
                    group_title: group.map(|group| group.title.clone()),
                    group_slug: group.map(|group| group.slug.clone()),
                    comment_count: comment_counts.get(&record.id).copied().unwrap_or(0),
                    image: record.image,
                    text: record.text,
                })
            })
            .collect()
    }

    async fn build_comment_views(
        &self,
        comments: Vec<CommentRecord>,
    ) -> Result<Vec<CommentView>, FeedError> {
        let authors = self
            .users_by_id(comments.iter().map(|comment| comment.author_id))
            .await?;

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = authors.get(&comment.author_id)?;
                Some(CommentView {
                    id: comment.id,
                    author_username: author.username.clone(),
                    author_segment: username_segment(&author.username),
                    author_name: author.display_name(),
                    created: posts::format_human_date(comment.created),
                    text: comment.text,
                })
            })
            .collect())
    }

    async fn users_by_id(
        &self,
        ids: impl Iterator<Item = i64>,
    ) -> Result<HashMap<i64, UserRecord>, FeedError> {
        let ids = distinct(ids);
        let users = self.repos.users.find_users_by_ids(&ids).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
