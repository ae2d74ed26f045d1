//! Viewer identity from the trusted proxy header.
//!
//! Authentication happens upstream; the proxy forwards the signed-in
//! username in a configurable header. A username with no matching account
//! is treated as anonymous.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

use crate::application::error::{HttpError, repo_error_to_http};
use crate::domain::entities::UserRecord;

use super::HttpState;

/// The signed-in user, if any.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        let Some(username) = parts
            .headers
            .get(&state.auth.user_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Ok(Self(None));
        };

        let user = state
            .repos
            .users
            .find_user_by_username(username)
            .await
            .map_err(|err| repo_error_to_http("infra::http::auth::viewer", &err))?;
        Ok(Self(user))
    }
}

/// A signed-in user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserRecord);

impl<S> FromRequestParts<S> for RequireUser
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match user {
            Some(user) => Ok(Self(user)),
            None => {
                let state = HttpState::from_ref(state);
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or_else(|| parts.uri.path());
                Err(login_redirect(&state.auth.login_url, next).into_response())
            }
        }
    }
}

/// `303 See Other` to the login page carrying the requested path in `next`.
pub fn login_redirect(login_url: &str, next: &str) -> Redirect {
    let encoded = form_urlencoded::byte_serialize(next.as_bytes())
        .collect::<String>()
        .replace("%2F", "/");
    let separator = if login_url.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{login_url}{separator}next={encoded}"))
}
