use std::io::ErrorKind;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, Uri, header},
    response::Response,
};

use crate::application::error::ErrorReport;
use crate::infra::{assets::build_response, uploads::MediaStorageError};
use crate::presentation::views::{
    LayoutChrome, render_not_found_response, render_server_error_response,
};

use super::{HttpState, Viewer};

const SOURCE: &str = "infra::http::media::serve_media";

/// Uploaded post images under `/media/`. Files without an image type are
/// served as opaque bytes.
pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(path): Path<String>,
    uri: Uri,
) -> Response {
    match state.media.read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path)
                .first()
                .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
                .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM);
            let mut response = build_response(bytes, mime, "public, max-age=86400");
            response.headers_mut().insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            response
        }
        Err(MediaStorageError::InvalidPath) => {
            render_not_found_response(LayoutChrome::new("Not found", viewer.as_ref()), uri.path())
        }
        Err(MediaStorageError::Io(err))
            if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) =>
        {
            render_not_found_response(LayoutChrome::new("Not found", viewer.as_ref()), uri.path())
        }
        Err(err) => render_server_error_response(
            LayoutChrome::new("Server error", viewer.as_ref()),
            ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err),
        ),
    }
}
