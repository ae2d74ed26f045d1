use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        admin::AdminError, feed::FeedError, follow::FollowError, posts::PostError,
        repos::RepoError,
    },
    infra::error::InfraError,
    presentation::views::{LayoutChrome, render_not_found_response},
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Handler failure: a public message for the client plus a diagnostic report
/// picked up by the response logger. `404` renders the not-found page.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Page not found", detail)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = if self.status == StatusCode::NOT_FOUND {
            render_not_found_response(LayoutChrome::default())
        } else {
            (self.status, self.public_message).into_response()
        };
        self.report.attach(&mut response);
        response
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "application::error::feed_error_to_http_error";
        match error {
            FeedError::UnknownGroup(slug) => {
                HttpError::not_found(SOURCE, format!("group `{slug}` does not exist"))
            }
            FeedError::UnknownAuthor(username) => {
                HttpError::not_found(SOURCE, format!("user `{username}` does not exist"))
            }
            FeedError::UnknownPost(id) => {
                HttpError::not_found(SOURCE, format!("post {id} does not exist"))
            }
            FeedError::Repo(err) => repo_error_to_http(SOURCE, &err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::error::post_error_to_http_error";
        match error {
            PostError::UnknownPost(id) => {
                HttpError::not_found(SOURCE, format!("post {id} does not exist"))
            }
            PostError::NotAuthor { post_id, user_id } => HttpError::new(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Forbidden",
                format!("user {user_id} is not the author of post {post_id}"),
            ),
            PostError::Invalid(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                errors.summary(),
            ),
            PostError::Repo(err) => repo_error_to_http(SOURCE, &err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::error::follow_error_to_http_error";
        match error {
            FollowError::UnknownAuthor(username) => {
                HttpError::not_found(SOURCE, format!("user `{username}` does not exist"))
            }
            FollowError::Repo(err) => repo_error_to_http(SOURCE, &err),
        }
    }
}

/// Maps a storage failure onto the response status and public message.
pub fn repo_error_to_http(source: &'static str, err: &RepoError) -> HttpError {
    let (status, message) = match err {
        RepoError::NotFound => return HttpError::not_found(source, err.to_string()),
        RepoError::Duplicate { .. } => (StatusCode::CONFLICT, "Duplicate record"),
        RepoError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "Invalid input"),
        RepoError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable"),
        RepoError::Integrity { .. } | RepoError::Persistence(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };
    HttpError::from_error(source, status, message, err)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<AdminError> for AppError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::UnknownUser(_) | AdminError::UnknownGroup(_) | AdminError::UnknownPost(_) => {
                Self::NotFound(error.to_string())
            }
            AdminError::Validation { .. } | AdminError::Slug(_) => {
                Self::validation(error.to_string())
            }
            AdminError::Repo(err) => Self::unexpected(err.to_string()),
        }
    }
}
