use postern::{
    application::{
        pagination::PageRequest,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateUserParams, FollowsRepo, GroupsRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
            RepoError, UsersRepo,
        },
    },
    domain::entities::{PostRecord, UserRecord},
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;

async fn user(repo: &PostgresRepositories, username: &str) -> UserRecord {
    repo.create_user(CreateUserParams {
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
    })
    .await
    .expect("create user")
}

async fn post(
    repo: &PostgresRepositories,
    author: &UserRecord,
    group_id: Option<i64>,
    text: &str,
) -> PostRecord {
    repo.create_post(CreatePostParams {
        author_id: author.id,
        text: text.to_string(),
        group_id,
        image: None,
    })
    .await
    .expect("create post")
}

async fn comment(repo: &PostgresRepositories, post: &PostRecord, author: &UserRecord) {
    repo.create_comment(CreateCommentParams {
        post_id: post.id,
        author_id: author.id,
        text: "Test comment".to_string(),
    })
    .await
    .expect("create comment");
}

fn first_page() -> PageRequest {
    PageRequest::new(10, 0)
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_group_nulls_post_references(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let author = user(&repo, "auth").await;
    let group = repo
        .create_group(CreateGroupParams {
            title: "Test group".to_string(),
            slug: "test-slug".to_string(),
            description: String::new(),
        })
        .await
        .expect("create group");
    let grouped = post(&repo, &author, Some(group.id), "grouped").await;

    assert_eq!(
        repo.count_posts(PostQueryFilter::Group(group.id))
            .await
            .expect("count"),
        1
    );

    repo.delete_group(group.id).await.expect("delete group");

    let stored = repo
        .find_post_by_id(grouped.id)
        .await
        .expect("lookup")
        .expect("post survives its group");
    assert_eq!(stored.group_id, None);
    assert_eq!(
        repo.count_posts(PostQueryFilter::Group(group.id))
            .await
            .expect("count"),
        0
    );
    assert!(
        repo.find_group_by_slug("test-slug")
            .await
            .expect("lookup")
            .is_none()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_post_removes_its_comments(pool: PgPool) {
    let repo = PostgresRepositories::new(pool.clone());
    let author = user(&repo, "auth").await;
    let reader = user(&repo, "reader").await;
    let doomed = post(&repo, &author, None, "doomed").await;
    let kept = post(&repo, &author, None, "kept").await;
    comment(&repo, &doomed, &reader).await;
    comment(&repo, &doomed, &author).await;
    comment(&repo, &kept, &reader).await;

    repo.delete_post(doomed.id).await.expect("delete post");

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
        .bind(doomed.id)
        .fetch_one(&pool)
        .await
        .expect("count orphans");
    assert_eq!(orphans, 0);
    assert_eq!(repo.count_comments(kept.id).await.expect("count"), 1);
    assert!(matches!(
        repo.delete_post(doomed.id).await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn following_twice_keeps_one_edge(pool: PgPool) {
    let repo = PostgresRepositories::new(pool.clone());
    let author = user(&repo, "auth").await;
    let follower = user(&repo, "follower").await;

    assert!(repo.follow(follower.id, author.id).await.expect("follow"));
    assert!(!repo.follow(follower.id, author.id).await.expect("repeat follow"));

    let edges: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(follower.id)
            .bind(author.id)
            .fetch_one(&pool)
            .await
            .expect("count edges");
    assert_eq!(edges, 1);
    assert!(
        repo.is_following(follower.id, author.id)
            .await
            .expect("lookup")
    );

    assert!(repo.unfollow(follower.id, author.id).await.expect("unfollow"));
    assert!(!repo.unfollow(follower.id, author.id).await.expect("repeat unfollow"));
    assert!(
        !repo
            .is_following(follower.id, author.id)
            .await
            .expect("lookup")
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn self_follow_violates_the_check_constraint(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let author = user(&repo, "auth").await;

    let result = repo.follow(author.id, author.id).await;
    assert!(matches!(result, Err(RepoError::Integrity { .. })), "{result:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn listings_are_newest_first_with_id_tiebreak(pool: PgPool) {
    let repo = PostgresRepositories::new(pool.clone());
    let author = user(&repo, "auth").await;
    let oldest = post(&repo, &author, None, "oldest").await;
    let tied_low = post(&repo, &author, None, "tied low").await;
    let tied_high = post(&repo, &author, None, "tied high").await;

    sqlx::query("UPDATE posts SET pub_date = '2022-02-13 10:30:00+00' WHERE id = $1")
        .bind(oldest.id)
        .execute(&pool)
        .await
        .expect("backdate");
    sqlx::query("UPDATE posts SET pub_date = '2022-02-14 09:00:00+00' WHERE id = ANY($1)")
        .bind(vec![tied_low.id, tied_high.id])
        .execute(&pool)
        .await
        .expect("tie dates");

    let ids: Vec<i64> = repo
        .list_posts(PostQueryFilter::All, first_page())
        .await
        .expect("list")
        .iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(ids, vec![tied_high.id, tied_low.id, oldest.id]);

    let second: Vec<i64> = repo
        .list_posts(PostQueryFilter::All, PageRequest::new(2, 2))
        .await
        .expect("list")
        .iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(second, vec![oldest.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn followed_filter_lists_only_followed_authors(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let followed = user(&repo, "followed").await;
    let ignored = user(&repo, "ignored").await;
    let reader = user(&repo, "reader").await;
    let wanted = post(&repo, &followed, None, "wanted").await;
    post(&repo, &ignored, None, "unwanted").await;
    repo.follow(reader.id, followed.id).await.expect("follow");

    let filter = PostQueryFilter::FollowedBy(reader.id);
    let posts = repo.list_posts(filter, first_page()).await.expect("list");
    assert_eq!(
        posts.iter().map(|post| post.id).collect::<Vec<_>>(),
        vec![wanted.id]
    );
    assert_eq!(repo.count_posts(filter).await.expect("count"), 1);
    assert_eq!(
        repo.count_posts(PostQueryFilter::FollowedBy(ignored.id))
            .await
            .expect("count"),
        0
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_user_cascades_to_posts_comments_and_follows(pool: PgPool) {
    let repo = PostgresRepositories::new(pool.clone());
    let author = user(&repo, "auth").await;
    let reader = user(&repo, "reader").await;
    let authored = post(&repo, &author, None, "authored").await;
    let readers_post = post(&repo, &reader, None, "reader's").await;
    comment(&repo, &readers_post, &author).await;
    repo.follow(reader.id, author.id).await.expect("follow");

    repo.delete_user(author.id).await.expect("delete user");

    assert!(
        repo.find_post_by_id(authored.id)
            .await
            .expect("lookup")
            .is_none()
    );
    assert_eq!(repo.count_comments(readers_post.id).await.expect("count"), 0);
    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows")
        .fetch_one(&pool)
        .await
        .expect("count edges");
    assert_eq!(edges, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn batched_lookups_cover_a_whole_page(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);
    let author = user(&repo, "auth").await;
    let reader = user(&repo, "reader").await;
    let busy = post(&repo, &author, None, "busy").await;
    let quiet = post(&repo, &author, None, "quiet").await;
    comment(&repo, &busy, &reader).await;
    comment(&repo, &busy, &author).await;

    let mut names: Vec<String> = repo
        .find_users_by_ids(&[reader.id, author.id, i64::MAX])
        .await
        .expect("users")
        .into_iter()
        .map(|user| user.username)
        .collect();
    names.sort();
    assert_eq!(names, vec!["auth".to_string(), "reader".to_string()]);

    let counts = repo
        .count_comments_by_post(&[busy.id, quiet.id])
        .await
        .expect("counts");
    assert_eq!(counts.get(&busy.id), Some(&2));
    assert_eq!(counts.get(&quiet.id), None);

    assert!(
        repo.find_groups_by_ids(&[])
            .await
            .expect("groups")
            .is_empty()
    );
}
