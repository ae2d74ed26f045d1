use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use metrics::histogram;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Per-request identifier, visible to handlers and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Records request latency and logs failed requests with their diagnostic chain.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    histogram!(
        "postern_http_request_ms",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string(),
    )
    .record(elapsed_ms);

    if status.is_client_error() || status.is_server_error() {
        let failure = FailedRequest {
            status,
            method,
            uri,
            elapsed_ms,
            request_id,
            report: response.extensions_mut().remove::<ErrorReport>(),
        };
        failure.log();
    }

    response
}

struct FailedRequest {
    status: StatusCode,
    method: Method,
    uri: Uri,
    elapsed_ms: f64,
    request_id: String,
    report: Option<ErrorReport>,
}

impl FailedRequest {
    fn log(self) {
        let (source, chain) = match self.report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");
        let path = self.uri.path();
        let query = self.uri.query().unwrap_or("");

        if self.status.is_server_error() {
            error!(
                target = "postern::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "request failed"
            );
        } else {
            warn!(
                target = "postern::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                request_id = %self.request_id,
                "client request error"
            );
        }
    }
}
