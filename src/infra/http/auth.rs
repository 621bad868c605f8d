use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::warn;

use crate::application::{
    accounts::local_redirect_target,
    forms::{FormErrors, LoginForm, SignupForm},
    posts::Submission,
};
use crate::presentation::views::{
    LayoutChrome, LayoutContext, LoggedOutTemplate, LoginTemplate, LoginView, SignupTemplate,
    SignupView, render_template_response,
};

use super::session::{LOGIN_PATH, expired_session_cookie, session_cookie, session_token};
use super::{HttpState, Viewer, app_error_response};

#[derive(Debug, Default, Deserialize)]
pub(super) struct NextQuery {
    #[serde(default)]
    next: String,
}

pub(super) async fn signup_form(Viewer(viewer): Viewer) -> Response {
    render_template_response(
        SignupTemplate {
            view: LayoutContext::new(
                LayoutChrome::new("Sign up", viewer.as_ref()),
                SignupView::default(),
            ),
        },
        StatusCode::OK,
    )
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    uri: Uri,
    Form(form): Form<SignupForm>,
) -> Response {
    let chrome = LayoutChrome::new("Sign up", viewer.as_ref());

    match state.accounts.signup(&form).await {
        Ok(Submission::Accepted(_)) => Redirect::to(LOGIN_PATH).into_response(),
        Ok(Submission::Rejected(errors)) => {
            let content = SignupView::with_errors(
                &form.first_name,
                &form.last_name,
                &form.username,
                &form.email,
                &errors,
            );
            render_template_response(
                SignupTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => app_error_response("infra::http::auth::signup", chrome, uri.path(), err),
    }
}

pub(super) async fn login_form(
    Viewer(viewer): Viewer,
    Query(query): Query<NextQuery>,
) -> Response {
    let content = LoginView {
        next: query.next,
        ..LoginView::default()
    };
    render_login(LayoutChrome::new("Log in", viewer.as_ref()), content)
}

/// Opens a session and follows `next` when it points back into the site.
pub(super) async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Response {
    let chrome = LayoutChrome::new("Log in", None);

    match state.accounts.login(&form).await {
        Ok(Submission::Accepted((_, session))) => {
            let jar = jar.add(session_cookie(&state.session_cookie, session.token));
            let target = local_redirect_target(&form.next).unwrap_or("/");
            (jar, Redirect::to(target)).into_response()
        }
        Ok(Submission::Rejected(errors)) => render_login(chrome, login_view(&form, &errors)),
        Err(err) => app_error_response("infra::http::auth::login", chrome, uri.path(), err),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar, &state.session_cookie.name) {
        if let Err(err) = state.accounts.logout(token).await {
            warn!(
                target = "yatube::http::auth",
                error = %err,
                "failed to delete session during logout"
            );
        }
    }

    let jar = jar.remove(expired_session_cookie(&state.session_cookie));
    let page = render_template_response(
        LoggedOutTemplate {
            view: LayoutContext::new(LayoutChrome::new("Logged out", None), ()),
        },
        StatusCode::OK,
    );
    (jar, page).into_response()
}

fn login_view(form: &LoginForm, errors: &FormErrors) -> LoginView {
    LoginView {
        username: form.username.clone(),
        next: form.next.clone(),
        username_errors: errors.field("username").to_vec(),
        password_errors: errors.field("password").to_vec(),
        non_field_errors: errors.non_field().to_vec(),
    }
}

fn render_login(chrome: LayoutChrome, content: LoginView) -> Response {
    render_template_response(
        LoginTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}
