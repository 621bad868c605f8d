//! Cookie-session extractors.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use url::form_urlencoded;
use uuid::Uuid;

use crate::domain::entities::UserRecord;
use crate::presentation::views::LayoutChrome;

use super::{HttpState, SessionCookie, app_error_response};

pub const LOGIN_PATH: &str = "/auth/login/";

/// The signed-in user, if the request carries a live session cookie.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

/// A signed-in user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserRecord);

impl FromRequestParts<HttpState> for Viewer {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(viewer) = parts.extensions.get::<Viewer>() {
            return Ok(viewer.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = session_token(&jar, &state.session_cookie.name) else {
            parts.extensions.insert(Viewer(None));
            return Ok(Viewer(None));
        };

        match state.accounts.resolve_session(token).await {
            Ok(user) => {
                let viewer = Viewer(user);
                parts.extensions.insert(viewer.clone());
                Ok(viewer)
            }
            Err(err) => Err(app_error_response(
                "infra::http::session::Viewer",
                LayoutChrome::new("Error", None),
                parts.uri.path(),
                err,
            )),
        }
    }
}

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let Viewer(viewer) = Viewer::from_request_parts(parts, state).await?;
        match viewer {
            Some(user) => Ok(RequireUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_redirect(next)).into_response())
            }
        }
    }
}

/// `/auth/login/?next=<path>` with the path form-encoded.
pub fn login_redirect(next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

pub(super) fn session_token(jar: &CookieJar, cookie_name: &str) -> Option<Uuid> {
    jar.get(cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

pub(super) fn session_cookie(config: &SessionCookie, token: Uuid) -> Cookie<'static> {
    Cookie::build((config.name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .max_age(config.ttl)
        .build()
}

pub(super) fn expired_session_cookie(config: &SessionCookie) -> Cookie<'static> {
    Cookie::build((config.name.clone(), String::new()))
        .path("/")
        .build()
}
