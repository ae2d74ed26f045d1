mod auth;
mod middleware;
mod public;

pub use auth::{RequireUser, Viewer, login_redirect};
pub use middleware::RequestContext;
pub use public::build_router;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::application::feed::FeedService;
use crate::application::follow::FollowService;
use crate::application::posts::AuthoringService;
use crate::application::repos::{RepoError, Repositories};
use crate::cache::{CacheConfig, CacheState};
use crate::config::{AuthSettings, Settings};

/// Shared handler state: application services over one repository backend.
#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub authoring: Arc<AuthoringService>,
    pub follow: Arc<FollowService>,
    pub repos: Repositories,
    pub auth: AuthSettings,
    pub cache: Option<CacheState>,
}

impl HttpState {
    pub fn new(repos: Repositories, settings: &Settings) -> Self {
        let cache_config = CacheConfig::from(&settings.cache);
        let cache = cache_config
            .enabled
            .then(|| CacheState::new(cache_config, settings.auth.user_header.clone()));

        Self {
            feed: Arc::new(FeedService::new(repos.clone(), settings.feed.page_size)),
            authoring: Arc::new(AuthoringService::new(repos.clone())),
            follow: Arc::new(FollowService::new(repos.clone())),
            repos,
            auth: settings.auth.clone(),
            cache,
        }
    }
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
