//! HTTP handlers for the init/invoke control surface
//!
//! `POST /init` selects the active handler, `POST /invoke` runs it. Anything
//! else is answered with `404`.

use axum::{
    body::Body,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::Response,
    routing::post,
    Router,
};
use bytes::Bytes;
use fnstack_core::{ErrorCode, RequestId, RuntimeError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::catalog::ModuleCatalog;
use crate::dispatcher::Dispatcher;
use crate::registry::HandlerRegistry;
use crate::resolver::{ResolutionError, Resolver};

const SERVER: &str = concat!("fnstack/", env!("CARGO_PKG_VERSION"));
const REQUEST_ID_HEADER: &str = "x-request-id";
const ERROR_TYPE_HEADER: &str = "x-fnstack-error-type";

/// Shared state for the runtime routes
pub struct RuntimeState {
    pub dispatcher: Dispatcher,
    /// Largest accepted request body in bytes; `None` accepts any size
    pub body_limit: Option<usize>,
}

impl RuntimeState {
    pub fn new(catalog: ModuleCatalog, default_reference: impl Into<String>) -> Self {
        let resolver = Resolver::new(Arc::new(catalog));
        Self {
            dispatcher: Dispatcher::new(
                Arc::new(HandlerRegistry::new()),
                resolver,
                default_reference,
            ),
            body_limit: None,
        }
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            body_limit: None,
        }
    }

    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        self.dispatcher.registry()
    }
}

#[derive(Debug, Serialize)]
struct InitResponse<'a> {
    message: &'a str,
    handler: &'a str,
}

/// Build the runtime router
pub fn router(state: Arc<RuntimeState>) -> Router {
    let body_limit = match state.body_limit {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/init", post(init).fallback(unsupported_path))
        .route("/invoke", post(invoke).fallback(unsupported_path))
        .fallback(unsupported_path)
        .layer(body_limit)
        .with_state(state)
}

// === Handler functions ===

/// POST /init
/// Resolve a handler reference and make it the active handler
pub async fn init(
    State(state): State<Arc<RuntimeState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = RequestId::new();

    let payload = match read_json_body(body) {
        Ok(payload) => payload,
        Err(e) => return error_response(e.with_request_id(request_id.id)),
    };

    let reference = match payload.get("handler") {
        None | Some(Value::Null) => state.dispatcher.default_reference().to_string(),
        Some(Value::String(reference)) => reference.clone(),
        Some(other) => {
            warn!(request_id = %request_id, handler = %other, "Handler reference is not a string");
            return error_response(
                ResolutionError::MalformedReference
                    .to_runtime_error()
                    .with_request_id(request_id.id),
            );
        }
    };

    info!(request_id = %request_id, handler = %reference, "Init");

    match state.dispatcher.resolver().resolve(&reference) {
        Ok(handler) => {
            let previous = state.registry().set(handler);
            info!(
                request_id = %request_id,
                handler = %reference,
                previous = ?previous.as_ref().map(|h| h.reference().as_str()),
                "Handler initialized"
            );
            json_response(
                StatusCode::OK,
                &InitResponse {
                    message: "Handler initialized",
                    handler: &reference,
                },
                &request_id,
            )
        }
        Err(e) => {
            warn!(request_id = %request_id, handler = %reference, error = %e, "Handler resolution failed");
            error_response(e.to_runtime_error().with_request_id(request_id.id))
        }
    }
}

/// POST /invoke
/// Call the active handler with `{"event": ..., "context": {...}}`
pub async fn invoke(
    State(state): State<Arc<RuntimeState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = RequestId::new();

    let mut payload = match read_json_body(body) {
        Ok(payload) => payload,
        Err(e) => return error_response(e.with_request_id(request_id.id)),
    };

    let event = payload.remove("event").unwrap_or(Value::Null);
    let context = payload.remove("context");

    info!(request_id = %request_id, "Invoke");

    match state.dispatcher.invoke(&request_id, event, context).await {
        Ok(result) => {
            debug!(
                request_id = %request_id,
                status_code = ?result.status_code(),
                "Handler returned"
            );
            json_response(StatusCode::OK, &result, &request_id)
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Invocation failed");
            error_response(e.to_runtime_error().with_request_id(request_id.id))
        }
    }
}

/// Any other path or method
pub async fn unsupported_path(method: Method, uri: Uri) -> Response {
    warn!(method = %method, path = %uri.path(), "Unsupported path");
    error_response(RuntimeError::new(ErrorCode::UnsupportedPath).with_request_id(RequestId::new().id))
}

// === Request/response framing ===

/// Parse a request body as a JSON object; an empty body counts as `{}`.
/// A body over the configured limit is `PayloadTooLarge`, not malformed.
fn read_json_body(body: Result<Bytes, BytesRejection>) -> Result<Map<String, Value>, RuntimeError> {
    let body = body.map_err(|e| {
        let code = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorCode::PayloadTooLarge
        } else {
            ErrorCode::MalformedRequestBody
        };
        RuntimeError::new(code).with_details(e.body_text())
    })?;

    if body.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RuntimeError::new(ErrorCode::MalformedRequestBody)
            .with_details("Request body must be a JSON object")),
        Err(e) => {
            Err(RuntimeError::new(ErrorCode::MalformedRequestBody).with_details(e.to_string()))
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T, request_id: &RequestId) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => build_response(status, bytes, request_id.as_str()),
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to serialize response");
            error_response(
                RuntimeError::new(ErrorCode::InternalError).with_request_id(request_id.id.clone()),
            )
        }
    }
}

fn error_response(error: RuntimeError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = build_response(status, error.to_json().into_bytes(), &error.request_id);

    let headers = response.headers_mut();
    headers.insert(ERROR_TYPE_HEADER, HeaderValue::from_static(error.code.as_str()));
    if matches!(error.code, ErrorCode::MalformedRequestBody | ErrorCode::PayloadTooLarge) {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

fn build_response(status: StatusCode, body: Vec<u8>, request_id: &str) -> Response {
    let length = body.len();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER));
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    response
}
