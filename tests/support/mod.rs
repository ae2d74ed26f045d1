#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use postern::{
    application::repos::{
        CreateGroupParams, CreatePostParams, CreateUserParams, GroupsRepo, Repositories, UsersRepo,
    },
    config::Settings,
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::{
        http::{HttpState, build_router},
        memory::InMemoryRepositories,
    },
};
use time::{Duration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;

pub const USER_HEADER: &str = "x-remote-user";

pub struct TestApp {
    pub backend: Arc<InMemoryRepositories>,
    pub state: HttpState,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn post_count(&self) -> usize {
        self.body.matches("class=\"post-card\"").count()
    }

    pub fn links_to_post(&self, post_id: i64) -> bool {
        self.body.contains(&format!("href=\"/posts/{post_id}/\""))
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn without_cache() -> Self {
        let mut settings = Settings::default();
        settings.cache.enabled = false;
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: Settings) -> Self {
        let backend = Arc::new(InMemoryRepositories::new());
        let state = HttpState::new(Repositories::from_backend(backend.clone()), &settings);
        let router = build_router(state.clone());
        Self {
            backend,
            state,
            router,
        }
    }

    pub async fn get(&self, uri: &str, viewer: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(viewer) = viewer {
            builder = builder.header(USER_HEADER, viewer);
        }
        self.send(builder.body(Body::empty()).expect("request should build"))
            .await
    }

    pub async fn post_form(&self, uri: &str, viewer: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(viewer) = viewer {
            builder = builder.header(USER_HEADER, viewer);
        }
        self.send(
            builder
                .body(Body::from(body.to_string()))
                .expect("request should build"),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).expect("body should be utf-8"),
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.backend
            .create_user(CreateUserParams {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .expect("user should be created")
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.backend
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: "Test description".to_string(),
            })
            .await
            .expect("group should be created")
    }

    /// Inserts `count` posts one minute apart so the newest has the highest id.
    pub async fn posts(
        &self,
        author: &UserRecord,
        group: Option<&GroupRecord>,
        count: usize,
    ) -> Vec<PostRecord> {
        let base = datetime!(2022-02-13 10:30 UTC);
        let mut posts = Vec::with_capacity(count);
        for index in 0..count {
            let post = self
                .backend
                .create_post_at(
                    CreatePostParams {
                        author_id: author.id,
                        text: format!("Test post number {index}"),
                        group_id: group.map(|group| group.id),
                        image: None,
                    },
                    base + Duration::minutes(index as i64),
                )
                .await
                .expect("post should be created");
            posts.push(post);
        }
        posts
    }

    pub async fn post(&self, author: &UserRecord, group: Option<&GroupRecord>) -> PostRecord {
        self.backend
            .create_post_at(
                CreatePostParams {
                    author_id: author.id,
                    text: "Test post".to_string(),
                    group_id: group.map(|group| group.id),
                    image: None,
                },
                OffsetDateTime::now_utc(),
            )
            .await
            .expect("post should be created")
    }
}
