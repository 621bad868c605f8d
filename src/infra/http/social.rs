use axum::{
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};

use crate::presentation::views::{LayoutChrome, profile_url};

use super::{HttpState, RequireUser, app_error_response};

pub(super) async fn follow(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.social.follow(&viewer, &username).await {
        Ok((author, _)) => Redirect::to(&profile_url(&author.username)).into_response(),
        Err(err) => app_error_response(
            "infra::http::social::follow",
            LayoutChrome::new("Profile", Some(&viewer)),
            uri.path(),
            err,
        ),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.social.unfollow(&viewer, &username).await {
        Ok((author, _)) => Redirect::to(&profile_url(&author.username)).into_response(),
        Err(err) => app_error_response(
            "infra::http::social::unfollow",
            LayoutChrome::new("Profile", Some(&viewer)),
            uri.path(),
            err,
        ),
    }
}
