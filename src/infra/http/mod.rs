//! HTTP surface: router, shared state and error-to-page mapping.

mod auth;
mod feed;
mod media;
mod middleware;
mod posts;
mod session;
mod social;

pub use session::{RequireUser, Viewer};

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, Uri},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    accounts::AccountService, error::AppError, error::ErrorReport, feed::FeedService,
    posts::PostService, repos::Repositories, social::FollowService,
};
use crate::cache::FragmentCache;
use crate::infra::{assets, db::PostgresRepositories, uploads::MediaStorage};
use crate::presentation::views::{
    LayoutChrome, render_not_found_response, render_server_error_response,
};

use self::middleware::{log_responses, set_request_context};

/// Database liveness probe behind `/_health/db`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), String>;
}

#[async_trait]
impl HealthProbe for PostgresRepositories {
    async fn ping(&self) -> Result<(), String> {
        self.health_check().await.map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
    pub ttl: time::Duration,
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub session_cookie: SessionCookie,
    pub max_request_bytes: usize,
}

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub social: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub fragments: Arc<FragmentCache>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthProbe>,
    pub session_cookie: SessionCookie,
    pub max_request_bytes: usize,
}

impl HttpState {
    /// Wire every service to one repository backend.
    pub fn from_repositories<R>(
        repos: Arc<R>,
        media: Arc<MediaStorage>,
        fragments: Arc<FragmentCache>,
        options: HttpOptions,
    ) -> Self
    where
        R: Repositories + HealthProbe,
    {
        let feed = FeedService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
        );
        let posts = PostService::new(repos.clone(), repos.clone(), repos.clone(), media.clone());
        let social = FollowService::new(repos.clone(), repos.clone());
        let accounts =
            AccountService::new(repos.clone(), repos.clone(), options.session_cookie.ttl);

        Self {
            feed: Arc::new(feed),
            posts: Arc::new(posts),
            social: Arc::new(social),
            accounts: Arc::new(accounts),
            fragments,
            media,
            health: repos,
            session_cookie: options.session_cookie,
            max_request_bytes: options.max_request_bytes,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let body_limit = state.max_request_bytes;

    Router::new()
        .route("/", get(feed::index))
        .route("/new/", get(posts::new_post_form).post(posts::create_post))
        .route("/follow/", get(feed::follow_index))
        .route("/group/{slug}/", get(feed::group_posts))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/{*path}", get(media::serve_media))
        .route("/static/{*path}", get(assets::serve_static))
        .route("/_health/db", get(db_health))
        .route("/{username}/", get(feed::profile))
        .route("/{username}/follow/", post(social::follow))
        .route("/{username}/unfollow/", post(social::unfollow))
        .route("/{username}/{post_id}/", get(feed::post_view))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_form).post(posts::edit_post),
        )
        .route("/{username}/{post_id}/comment/", post(posts::add_comment))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(message) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_message(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                message,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_found(Viewer(viewer): Viewer, uri: Uri) -> Response {
    render_not_found_response(
        LayoutChrome::new("Page not found", viewer.as_ref()),
        uri.path(),
    )
}

/// Missing records render the 404 page and failures the 500 page.
pub(crate) fn app_error_response(
    source: &'static str,
    chrome: LayoutChrome,
    path: &str,
    err: AppError,
) -> Response {
    let status = err.status_code();
    if status == StatusCode::NOT_FOUND {
        return render_not_found_response(chrome, path);
    }
    if status.is_server_error() {
        let report = ErrorReport::from_error(source, status, &err);
        return render_server_error_response(chrome, report);
    }

    let mut response = err.into_response();
    if let Some(report) = response.extensions_mut().get_mut::<ErrorReport>() {
        report.source = source;
    }
    response
}

/// Parse the `{post_id}` segment; anything that is not a positive integer is missing.
pub(crate) fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("42"), Some(42));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("-3"), None);
        assert_eq!(parse_post_id("abc"), None);
    }
}
