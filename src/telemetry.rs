use axum::http::{HeaderName, Request};
use tower_http::request_id::RequestId;

/// Header carrying the per-request correlation id, inbound and outbound.
pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "eduloan_auth=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Correlation id set by the request-id layer, or `-` outside of it.
pub fn correlation_id<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-")
        .to_string()
}

pub fn make_span<B>(req: &Request<B>) -> tracing::Span {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let correlation_id = correlation_id(req);
    tracing::info_span!(
        "http_request",
        %method,
        uri = %uri,
        correlation_id = %correlation_id,
        status = tracing::field::Empty
    )
}
