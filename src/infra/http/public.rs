use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        feed::FeedFilter,
        pagination::PageNumber,
        posts::{CommentForm, FormErrors, PostError, PostForm},
    },
    cache::response_cache_layer,
    domain::users::username_segment,
    presentation::views::{
        FeedContext, FollowTemplate, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        PostDetailContext, PostDetailTemplate, PostFormContext, PostFormTemplate, ProfileContext,
        ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    HttpState, RequireUser, Viewer, db_health_response,
    middleware::{log_responses, set_request_context},
};

pub fn build_router(state: HttpState) -> Router {
    // Only the main feed is cached; every other page reflects writes immediately.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route(
            "/profile/{username}/follow/",
            get(profile_follow).post(profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(profile_unfollow).post(profile_unfollow),
        )
        .route("/posts/{post_id}/", get(post_detail))
        .route("/posts/{post_id}/edit/", get(post_edit).post(post_update))
        .route("/posts/{post_id}/comment/", axum::routing::post(add_comment))
        .route("/create/", get(post_create).post(post_submit))
        .route("/follow/", get(follow_index))
        .route("/_health/db", get(db_health));

    cached_routes
        .merge(routes)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

fn parse_post_id(raw: &str) -> Result<i64, HttpError> {
    raw.parse().map_err(|_| {
        HttpError::not_found(
            "infra::http::public::parse_post_id",
            format!("`{raw}` is not a post id"),
        )
    })
}

fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username_segment(username))
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let feed = state.feed.page(&FeedFilter::All, query.number()).await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(viewer.user()).titled("Latest posts"),
        FeedContext::new("Latest posts", feed.page),
    );
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let feed = state
        .feed
        .page(&FeedFilter::Group(slug.clone()), query.number())
        .await?;
    let (title, description) = feed
        .group
        .map(|group| (group.title, group.description))
        .unwrap_or_else(|| (slug, String::new()));

    let view = LayoutContext::new(
        LayoutChrome::for_viewer(viewer.user()).titled(title.clone()),
        FeedContext::new(title, feed.page).with_description(description),
    );
    Ok(render_template_response(GroupTemplate { view }, StatusCode::OK))
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let profile = state
        .feed
        .profile(&username, viewer.user(), query.number())
        .await?;
    let content = ProfileContext::new(profile, viewer.user().is_some());
    let title = format!("Profile of {}", content.display_name);

    let view = LayoutContext::new(LayoutChrome::for_viewer(viewer.user()).titled(title), content);
    Ok(render_template_response(ProfileTemplate { view }, StatusCode::OK))
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    let post_id = parse_post_id(&raw_id)?;
    let detail = state.feed.post_detail(post_id).await?;
    let title = detail.post.label.clone();

    let view = LayoutContext::new(
        LayoutChrome::for_viewer(viewer.user()).titled(title),
        PostDetailContext::new(detail, viewer.user()),
    );
    Ok(render_template_response(PostDetailTemplate { view }, StatusCode::OK))
}

async fn render_post_form(
    state: &HttpState,
    chrome: LayoutChrome,
    form: PostForm,
    errors: FormErrors,
    post_id: Option<i64>,
) -> Result<Response, HttpError> {
    let groups = state.authoring.group_choices().await?;
    let title = if post_id.is_some() { "Edit post" } else { "New post" };
    let view = LayoutContext::new(
        chrome.titled(title),
        PostFormContext::new(form, errors, groups, post_id),
    );
    Ok(render_template_response(PostFormTemplate { view }, StatusCode::OK))
}

async fn post_create(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Result<Response, HttpError> {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    render_post_form(&state, chrome, PostForm::default(), FormErrors::default(), None).await
}

async fn post_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Form(form): Form<PostForm>,
) -> Result<Response, HttpError> {
    match state.authoring.create_post(&user, &form).await {
        Ok(_) => Ok(Redirect::to(&profile_url(&user.username)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let chrome = LayoutChrome::for_viewer(Some(&user));
            render_post_form(&state, chrome, form, errors, None).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn post_edit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    let post_id = parse_post_id(&raw_id)?;
    match state.authoring.editable_post(&user, post_id).await {
        Ok(post) => {
            let chrome = LayoutChrome::for_viewer(Some(&user));
            let form = PostForm::from_post(&post);
            render_post_form(&state, chrome, form, FormErrors::default(), Some(post_id)).await
        }
        Err(PostError::NotAuthor { .. }) => {
            Ok(Redirect::to(&post_detail_url(post_id)).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

async fn post_update(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Response, HttpError> {
    let post_id = parse_post_id(&raw_id)?;
    match state.authoring.edit_post(&user, post_id, &form).await {
        Ok(_) | Err(PostError::NotAuthor { .. }) => {
            Ok(Redirect::to(&post_detail_url(post_id)).into_response())
        }
        Err(PostError::Invalid(errors)) => {
            let chrome = LayoutChrome::for_viewer(Some(&user));
            render_post_form(&state, chrome, form, errors, Some(post_id)).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, HttpError> {
    let post_id = parse_post_id(&raw_id)?;
    match state.authoring.add_comment(&user, post_id, &form).await {
        Ok(_) => Ok(Redirect::to(&post_detail_url(post_id)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let detail = state.feed.post_detail(post_id).await?;
            let title = detail.post.label.clone();
            let view = LayoutContext::new(
                LayoutChrome::for_viewer(Some(&user)).titled(title),
                PostDetailContext::new(detail, Some(&user)).with_comment_errors(form, errors),
            );
            Ok(render_template_response(
                PostDetailTemplate { view },
                StatusCode::OK,
            ))
        }
        Err(err) => Err(err.into()),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let feed = state
        .feed
        .page(&FeedFilter::Following(user.id), query.number())
        .await?;
    let view = LayoutContext::new(
        LayoutChrome::for_viewer(Some(&user)).titled("Following"),
        FeedContext::new("Posts from authors you follow", feed.page),
    );
    Ok(render_template_response(FollowTemplate { view }, StatusCode::OK))
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, HttpError> {
    state.follow.follow(&user, &username).await?;
    Ok(Redirect::to(&profile_url(&username)).into_response())
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, HttpError> {
    state.follow.unfollow(&user, &username).await?;
    Ok(Redirect::to(&profile_url(&username)).into_response())
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.repos.health.health_check().await)
}

async fn not_found(viewer: Viewer) -> Response {
    render_not_found_response(LayoutChrome::for_viewer(viewer.user()))
}
