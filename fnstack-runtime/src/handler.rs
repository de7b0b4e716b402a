//! The handler capability invoked per request

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::context::InvocationContext;

/// Error type returned by handlers and module loaders
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A user-supplied function with the fixed `(event, context)` signature.
///
/// The returned value is forwarded to the caller as the invocation result and
/// is expected to be a JSON object shaped like an HTTP response
/// (`statusCode`, `isBase64Encoded`, `headers`, `body`).
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, event: Value, context: InvocationContext) -> Result<Value, BoxError>;
}

/// Adapter turning an async closure into a [`Handler`]
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async function or closure as a [`Handler`]
///
/// ```ignore
/// let echo = handler_fn(|event: Value, _ctx: InvocationContext| async move {
///     Ok(json!({ "statusCode": 200, "body": event.to_string() }))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn call(&self, event: Value, context: InvocationContext) -> Result<Value, BoxError> {
        (self.f)(event, context).await
    }
}
