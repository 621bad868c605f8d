//! Request id assignment and failed-response logging.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level, debug, event, info_span};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request identifiers, available to handlers as a request extension.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
}

/// Tags the request with a fresh id, echoes it in `x-request-id` and runs the rest of the
/// stack inside a `request` span.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4(),
    };
    request.extensions_mut().insert(ctx.clone());

    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Drains the `ErrorReport` of every 4xx/5xx response into one structured event.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let query = request.uri().query().map(str::to_owned);
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        log_failure(status, query.as_deref(), elapsed, report);
    } else {
        debug!(
            target: "yatube::http::response",
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "request served"
        );
    }

    response
}

fn log_failure(
    status: StatusCode,
    query: Option<&str>,
    elapsed: Duration,
    report: Option<ErrorReport>,
) {
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");
    let elapsed_ms = elapsed.as_millis() as u64;

    macro_rules! emit {
        ($level:expr, $message:literal) => {
            event!(
                target: "yatube::http::response",
                $level,
                status = status.as_u16(),
                query = query.unwrap_or(""),
                elapsed_ms,
                source,
                detail,
                chain = ?chain,
                $message
            )
        };
    }

    if status.is_server_error() {
        emit!(Level::ERROR, "request failed");
    } else {
        emit!(Level::WARN, "client request error");
    }
}
