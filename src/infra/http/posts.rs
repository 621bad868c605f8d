use axum::{
    Form,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;

use crate::application::{
    error::HttpError,
    forms::{CommentForm, FormErrors, ImageUpload, PostForm},
    posts::Submission,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::presentation::views::{
    LayoutChrome, LayoutContext, PostFormTemplate, PostFormView, post_url,
    render_not_found_response, render_template_response,
};

use super::{HttpState, RequireUser, app_error_response, parse_post_id};

const NEW_POST_PATH: &str = "/new/";

pub(super) async fn new_post_form(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    uri: Uri,
) -> Response {
    render_post_form(
        &state,
        "infra::http::posts::new_post_form",
        &viewer,
        uri.path(),
        FormTarget::New,
        &PostForm::default(),
        &FormErrors::new(),
    )
    .await
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    uri: Uri,
    multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::create_post";

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    match state.posts.create(&viewer, &form).await {
        Ok(Submission::Accepted(_)) => Redirect::to("/").into_response(),
        Ok(Submission::Rejected(errors)) => {
            render_post_form(
                &state,
                SOURCE,
                &viewer,
                uri.path(),
                FormTarget::New,
                &form,
                &errors,
            )
            .await
        }
        Err(err) => app_error_response(
            SOURCE,
            LayoutChrome::new("New post", Some(&viewer)),
            uri.path(),
            err,
        ),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_form";

    let post = match load_editable(&state, SOURCE, &viewer, &username, &post_id, &uri).await {
        Ok(post) => post,
        Err(response) => return response,
    };

    let form = PostForm {
        text: post.text.clone(),
        group: post
            .group
            .as_ref()
            .map(|group| group.id.to_string())
            .unwrap_or_default(),
        image: None,
        clear_image: false,
    };
    render_post_form(
        &state,
        SOURCE,
        &viewer,
        uri.path(),
        FormTarget::Edit(&post),
        &form,
        &FormErrors::new(),
    )
    .await
}

pub(super) async fn edit_post(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
    multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_post";

    let post = match load_editable(&state, SOURCE, &viewer, &username, &post_id, &uri).await {
        Ok(post) => post,
        Err(response) => return response,
    };

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    match state.posts.edit(&viewer, &post, &form).await {
        Ok(Submission::Accepted(updated)) => {
            Redirect::to(&post_url(&updated.author_username, updated.id)).into_response()
        }
        Ok(Submission::Rejected(errors)) => {
            render_post_form(
                &state,
                SOURCE,
                &viewer,
                uri.path(),
                FormTarget::Edit(&post),
                &form,
                &errors,
            )
            .await
        }
        Err(err) => app_error_response(
            SOURCE,
            LayoutChrome::new("Edit post", Some(&viewer)),
            uri.path(),
            err,
        ),
    }
}

/// Blank comments are dropped; either way the visitor lands back on the post.
pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
    Form(form): Form<CommentForm>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::add_comment";
    let chrome = || LayoutChrome::new("Post", Some(&viewer));

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome(), uri.path());
    };
    let (author, post) = match state.feed.owned_post(&username, post_id).await {
        Ok(found) => found,
        Err(err) => return app_error_response(SOURCE, chrome(), uri.path(), err),
    };

    if let Err(err) = state.posts.comment(&viewer, &post, &form).await {
        return app_error_response(SOURCE, chrome(), uri.path(), err);
    }
    Redirect::to(&post_url(&author.username, post.id)).into_response()
}

enum FormTarget<'a> {
    New,
    Edit(&'a PostRecord),
}

/// Resolves the post behind an edit URL. Visitors other than the author are sent to the read view.
async fn load_editable(
    state: &HttpState,
    source: &'static str,
    viewer: &UserRecord,
    username: &str,
    raw_post_id: &str,
    uri: &Uri,
) -> Result<PostRecord, Response> {
    let chrome = || LayoutChrome::new("Edit post", Some(viewer));

    let Some(post_id) = parse_post_id(raw_post_id) else {
        return Err(render_not_found_response(chrome(), uri.path()));
    };
    let (author, post) = state
        .feed
        .owned_post(username, post_id)
        .await
        .map_err(|err| app_error_response(source, chrome(), uri.path(), err))?;

    if author.id != viewer.id {
        return Err(Redirect::to(&post_url(&author.username, post.id)).into_response());
    }
    Ok(post)
}

async fn render_post_form(
    state: &HttpState,
    source: &'static str,
    viewer: &UserRecord,
    path: &str,
    target: FormTarget<'_>,
    form: &PostForm,
    errors: &FormErrors,
) -> Response {
    let (title, is_edit, action_url, current_image) = match target {
        FormTarget::New => ("New post", false, NEW_POST_PATH.to_string(), None),
        FormTarget::Edit(post) => (
            "Edit post",
            true,
            format!("{}edit/", post_url(&post.author_username, post.id)),
            post.image.as_deref(),
        ),
    };
    let chrome = LayoutChrome::new(title, Some(viewer));

    let groups = match state.feed.groups().await {
        Ok(groups) => groups,
        Err(err) => return app_error_response(source, chrome, path, err),
    };

    let content = PostFormView::new(
        action_url,
        is_edit,
        &form.text,
        &form.group,
        &groups,
        current_image,
        errors,
    );
    render_template_response(
        PostFormTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";
    let invalid = |err: axum_extra::extract::multipart::MultipartError| {
        HttpError::new(
            SOURCE,
            err.status(),
            "The submitted form could not be read",
            err.body_text(),
        )
    };

    let mut form = PostForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        match field.name() {
            Some("text") => form.text = field.text().await.map_err(invalid)?,
            Some("group") => form.group = field.text().await.map_err(invalid)?,
            Some("image-clear") => {
                let value = field.text().await.map_err(invalid)?;
                form.clear_image = matches!(value.trim(), "on" | "true" | "1");
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(invalid)?;
                form.image = Some(ImageUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}
