//! Invocation dispatch
//!
//! One invocation runs as a linear pipeline: resolve the default handler if
//! the registry is empty, build the context, call the handler, check that the
//! result is a JSON object. Every failure ends that invocation only.

use fnstack_core::{ErrorCode, RequestId, RuntimeError};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::panic_message;
use crate::context::ContextBuilder;
use crate::registry::HandlerRegistry;
use crate::resolver::{ResolutionError, ResolvedHandler, Resolver};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Handler resolution failed: {0}")]
    ResolutionFailed(#[source] ResolutionError),

    #[error("Handler raised an exception: {0}")]
    HandlerFailure(String),

    #[error("Handler returned a non-dict response")]
    InvalidResultShape,
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ResolutionFailed(_) => ErrorCode::ResolutionFailed,
            Self::HandlerFailure(_) => ErrorCode::HandlerFailure,
            Self::InvalidResultShape => ErrorCode::InvalidResultShape,
        }
    }

    /// Error body returned by `/invoke`
    pub fn to_runtime_error(&self) -> RuntimeError {
        let error = RuntimeError::new(self.code());
        match self {
            Self::ResolutionFailed(inner) => error.with_details(inner.to_string()),
            Self::HandlerFailure(details) => error.with_details(details.clone()),
            Self::InvalidResultShape => error,
        }
    }
}

/// The mapping a handler returned, forwarded unchanged
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InvocationResult(Map<String, Value>);

impl InvocationResult {
    /// The handler's own `statusCode`, if it set an integer one
    pub fn status_code(&self) -> Option<i64> {
        self.0.get("statusCode").and_then(Value::as_i64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    resolver: Resolver,
    default_reference: String,
    contexts: ContextBuilder,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        resolver: Resolver,
        default_reference: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            resolver,
            default_reference: default_reference.into(),
            contexts: ContextBuilder::default(),
        }
    }

    pub fn with_context_builder(mut self, contexts: ContextBuilder) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn default_reference(&self) -> &str {
        &self.default_reference
    }

    /// Run one invocation against the active handler
    pub async fn invoke(
        &self,
        request_id: &RequestId,
        event: Value,
        context_fields: Option<Value>,
    ) -> Result<InvocationResult, DispatchError> {
        let handler = self.ensure_handler()?;
        let context = self.contexts.build(request_id, context_fields);

        debug!(request_id = %request_id, handler = %handler.reference(), "Calling handler");

        let outcome = AssertUnwindSafe(handler.call(event, context))
            .catch_unwind()
            .await;

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                error!(
                    request_id = %request_id,
                    handler = %handler.reference(),
                    error = %e,
                    source = ?e,
                    "Handler raised an exception"
                );
                return Err(DispatchError::HandlerFailure(e.to_string()));
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(
                    request_id = %request_id,
                    handler = %handler.reference(),
                    panic = %reason,
                    "Handler panicked"
                );
                return Err(DispatchError::HandlerFailure(reason));
            }
        };

        match value {
            Value::Object(map) => Ok(InvocationResult(map)),
            other => {
                warn!(
                    request_id = %request_id,
                    handler = %handler.reference(),
                    returned = json_kind(&other),
                    "Handler returned a non-dict response"
                );
                Err(DispatchError::InvalidResultShape)
            }
        }
    }

    /// Active handler, resolving the default reference on first use
    fn ensure_handler(&self) -> Result<ResolvedHandler, DispatchError> {
        let (handler, initialized) = self
            .registry
            .get_or_try_init(|| self.resolver.resolve(&self.default_reference))
            .map_err(|e| {
                warn!(handler = %self.default_reference, error = %e, "Lazy handler resolution failed");
                DispatchError::ResolutionFailed(e)
            })?;

        if initialized {
            info!(handler = %handler.reference(), "Handler lazily initialized");
        }
        Ok(handler)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Module, ModuleCatalog};
    use crate::context::{InvocationContext, NoopLogger};
    use crate::handler::{handler_fn, BoxError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_response(body: &str) -> Value {
        json!({
            "statusCode": 200,
            "isBase64Encoded": false,
            "headers": { "Content-Type": "text/plain" },
            "body": body,
        })
    }

    fn catalog(loads: Arc<AtomicUsize>) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        catalog
            .register_lazy("app", move || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Module::new().handler(
                    "handler",
                    handler_fn(|event: Value, ctx: InvocationContext| async move {
                        let who = ctx.get("who").and_then(Value::as_str).unwrap_or("nobody");
                        Ok::<_, BoxError>(ok_response(&format!("{who}:{event}")))
                    }),
                ))
            })
            .register(
                "faulty",
                Module::new()
                    .handler(
                        "raises",
                        handler_fn(|_event: Value, _ctx: InvocationContext| async move {
                            Err::<Value, BoxError>("division by zero".into())
                        }),
                    )
                    .handler(
                        "panics",
                        handler_fn(|_event: Value, _ctx: InvocationContext| async move {
                            if true {
                                panic!("index out of range");
                            }
                            Ok::<_, BoxError>(Value::Null)
                        }),
                    )
                    .handler(
                        "returns_list",
                        handler_fn(|_event: Value, _ctx: InvocationContext| async move {
                            Ok::<_, BoxError>(json!([1, 2, 3]))
                        }),
                    ),
            );
        catalog
    }

    fn dispatcher(default_reference: &str) -> (Dispatcher, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = Resolver::new(Arc::new(catalog(loads.clone())));
        let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::new()), resolver, default_reference)
            .with_context_builder(ContextBuilder::new(Arc::new(NoopLogger)));
        (dispatcher, loads)
    }

    fn use_handler(dispatcher: &Dispatcher, reference: &str) {
        let handler = dispatcher.resolver().resolve(reference).unwrap();
        dispatcher.registry().set(handler);
    }

    #[tokio::test]
    async fn test_lazy_default_resolution_happens_once() {
        let (dispatcher, loads) = dispatcher("app.handler");
        assert!(dispatcher.registry().is_empty());

        let id = RequestId::new();
        dispatcher.invoke(&id, json!(1), None).await.unwrap();
        dispatcher.invoke(&id, json!(2), None).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.registry().reference().unwrap().as_str(), "app.handler");
    }

    #[tokio::test]
    async fn test_result_forwarded_unchanged() {
        let (dispatcher, _) = dispatcher("app.handler");

        let result = dispatcher
            .invoke(&RequestId::new(), json!({ "k": "v" }), Some(json!({ "who": "tester" })))
            .await
            .unwrap();

        assert_eq!(result.into_value(), ok_response(r#"tester:{"k":"v"}"#));
    }

    #[tokio::test]
    async fn test_identical_inputs_identical_results() {
        let (dispatcher, _) = dispatcher("app.handler");
        let id = RequestId::new();

        let first = dispatcher.invoke(&id, json!({ "x": 1 }), Some(json!({}))).await.unwrap();
        let second = dispatcher.invoke(&id, json!({ "x": 1 }), Some(json!({}))).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status_code(), Some(200));
    }

    #[tokio::test]
    async fn test_resolution_failure_stores_nothing() {
        let (dispatcher, _) = dispatcher("missing.handler");

        let err = dispatcher.invoke(&RequestId::new(), Value::Null, None).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ResolutionFailed(ResolutionError::ImportFailure(_))
        ));
        assert!(dispatcher.registry().is_empty());

        let body = err.to_runtime_error();
        assert_eq!(body.http_status(), 500);
        assert_eq!(body.message, "Handler resolution failed");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let (dispatcher, _) = dispatcher("app.handler");
        use_handler(&dispatcher, "faulty.raises");

        let err = dispatcher.invoke(&RequestId::new(), Value::Null, None).await.unwrap_err();
        match &err {
            DispatchError::HandlerFailure(details) => assert_eq!(details, "division by zero"),
            other => panic!("unexpected error: {other:?}"),
        }

        let body = err.to_runtime_error();
        assert_eq!(body.http_status(), 500);
        assert_eq!(body.message, "Handler raised an exception");
        assert_eq!(body.details.as_deref(), Some("division by zero"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let (dispatcher, _) = dispatcher("app.handler");
        use_handler(&dispatcher, "faulty.panics");

        let err = dispatcher.invoke(&RequestId::new(), Value::Null, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFailure(ref d) if d == "index out of range"));

        // Registry and dispatcher stay usable
        use_handler(&dispatcher, "app.handler");
        assert!(dispatcher.invoke(&RequestId::new(), Value::Null, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_mapping_result_rejected() {
        let (dispatcher, _) = dispatcher("app.handler");
        use_handler(&dispatcher, "faulty.returns_list");

        let err = dispatcher.invoke(&RequestId::new(), Value::Null, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidResultShape));
        assert_eq!(
            err.to_runtime_error().to_json(),
            r#"{"message":"Handler returned a non-dict response"}"#
        );
    }

    #[tokio::test]
    async fn test_init_switches_target() {
        let (dispatcher, _) = dispatcher("faulty.raises");
        use_handler(&dispatcher, "app.handler");

        // Explicit Init wins over the default reference
        assert!(dispatcher.invoke(&RequestId::new(), Value::Null, None).await.is_ok());

        use_handler(&dispatcher, "faulty.returns_list");
        assert!(matches!(
            dispatcher.invoke(&RequestId::new(), Value::Null, None).await,
            Err(DispatchError::InvalidResultShape)
        ));
    }
}
