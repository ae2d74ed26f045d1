use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{PostDetail, PostView, ProfileFeed};
use crate::application::pagination::Page;
use crate::application::posts::{CommentForm, FormErrors, PostForm};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::users::username_segment;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

const SITE_TITLE: &str = "Postern";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome.titled("Page not found"), ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Per-request page frame: document title and the signed-in user, if any.
#[derive(Debug, Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub page_title: String,
    pub viewer: Option<ViewerLink>,
}

/// Signed-in user as shown in the navigation bar.
#[derive(Debug, Clone)]
pub struct ViewerLink {
    pub username: String,
    pub segment: String,
}

impl Default for LayoutChrome {
    fn default() -> Self {
        Self {
            site_title: SITE_TITLE.to_string(),
            page_title: SITE_TITLE.to_string(),
            viewer: None,
        }
    }
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        Self {
            viewer: viewer.map(|user| ViewerLink {
                username: user.username.clone(),
                segment: username_segment(&user.username),
            }),
            ..Self::default()
        }
    }

    pub fn titled(self, title: impl Into<String>) -> Self {
        Self {
            page_title: title.into(),
            ..self
        }
    }
}

pub struct LayoutContext<T> {
    pub chrome: LayoutChrome,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self { chrome, content }
    }
}

pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

impl PaginationView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous: page.previous_page_number(),
            next: page.next_page_number(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct FeedContext {
    pub heading: String,
    pub description: Option<String>,
    pub posts: Vec<PostView>,
    pub pagination: PaginationView,
}

impl FeedContext {
    pub fn new(heading: impl Into<String>, page: Page<PostView>) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            pagination: PaginationView::from_page(&page),
            posts: page.items,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            description: (!description.trim().is_empty()).then_some(description),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub segment: String,
    pub display_name: String,
    pub post_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub posts: Vec<PostView>,
    pub pagination: PaginationView,
}

impl ProfileContext {
    pub fn new(profile: ProfileFeed, viewer_present: bool) -> Self {
        let ProfileFeed {
            author,
            post_count,
            following,
            is_self,
            page,
        } = profile;

        Self {
            display_name: author.display_name(),
            segment: username_segment(&author.username),
            username: author.username,
            post_count,
            following,
            can_follow: viewer_present && !is_self,
            pagination: PaginationView::from_page(&page),
            posts: page.items,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

pub struct PostDetailContext {
    pub post: PostView,
    pub author_post_count: u64,
    pub comments: Vec<crate::application::feed::CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub comment_form: CommentForm,
    pub errors: FormErrors,
}

impl PostDetailContext {
    pub fn new(detail: PostDetail, viewer: Option<&UserRecord>) -> Self {
        let can_edit = viewer.is_some_and(|viewer| viewer.id == detail.author_id);
        Self {
            post: detail.post,
            author_post_count: detail.author_post_count,
            comments: detail.comments,
            can_edit,
            can_comment: viewer.is_some(),
            comment_form: CommentForm::default(),
            errors: FormErrors::default(),
        }
    }

    pub fn with_comment_errors(self, form: CommentForm, errors: FormErrors) -> Self {
        Self {
            comment_form: form,
            errors,
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormContext {
    pub form: PostForm,
    pub errors: FormErrors,
    pub groups: Vec<GroupChoice>,
    /// Set when editing an existing post.
    pub post_id: Option<i64>,
}

impl PostFormContext {
    pub fn new(
        form: PostForm,
        errors: FormErrors,
        groups: Vec<GroupRecord>,
        post_id: Option<i64>,
    ) -> Self {
        let selected = form.selected_group();
        let groups = groups
            .into_iter()
            .map(|group| GroupChoice {
                selected: selected == Some(group.id),
                id: group.id,
                title: group.title,
            })
            .collect();
        Self {
            form,
            errors,
            groups,
            post_id,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.post_id.is_some()
    }
}

#[derive(Template)]
#[template(path = "post_create.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
