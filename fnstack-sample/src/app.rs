//! The `app` module: greets whoever the event names

use fnstack_runtime::{handler_fn, BoxError, InvocationContext, Module};
use serde_json::{json, Value};

use crate::spaced_json;

/// Name used when the event does not carry one
pub const DEFAULT_NAME: &str = "FunctionGraph";

/// `app.handler` plus a non-callable `app.DEFAULT_NAME`
pub fn module() -> Module {
    Module::new()
        .handler("handler", handler_fn(handler))
        .value("DEFAULT_NAME", DEFAULT_NAME)
}

/// Pull a caller-provided name from the event.
///
/// Looks at a top-level string `name` first, then at `name` inside `body`,
/// where `body` may be a JSON-encoded string or an object.
pub fn extract_name(event: &Value) -> String {
    let Some(event) = event.as_object() else {
        return DEFAULT_NAME.to_string();
    };

    if let Some(name) = event.get("name").and_then(Value::as_str) {
        return name.to_string();
    }

    let name = match event.get("body") {
        Some(Value::String(body)) if !body.is_empty() => serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|parsed| parsed.get("name").and_then(Value::as_str).map(str::to_string)),
        Some(Value::Object(body)) => body.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    name.unwrap_or_else(|| DEFAULT_NAME.to_string())
}

/// `app.handler`
pub async fn handler(event: Value, context: InvocationContext) -> Result<Value, BoxError> {
    let name = extract_name(&event);
    context
        .logger()
        .info(&format!("Responding with message for {name}"));

    let message = json!({
        "message": format!("Hello, {name}!"),
        "event": event,
    });
    let body = spaced_json::to_string(&message)?;

    Ok(json!({
        "statusCode": 200,
        "isBase64Encoded": false,
        "headers": { "Content-Type": "application/json" },
        "body": body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnstack_core::RequestId;
    use fnstack_runtime::{ContextBuilder, NoopLogger};
    use std::sync::Arc;

    fn context() -> InvocationContext {
        ContextBuilder::new(Arc::new(NoopLogger)).build(&RequestId::new(), Some(json!({})))
    }

    #[test]
    fn test_extract_name_variants() {
        assert_eq!(extract_name(&json!({ "name": "World" })), "World");
        assert_eq!(extract_name(&json!({ "body": "{\"name\": \"Ada\"}" })), "Ada");
        assert_eq!(extract_name(&json!({ "body": { "name": "Linus" } })), "Linus");
    }

    #[test]
    fn test_extract_name_falls_back() {
        for event in [
            Value::Null,
            json!("World"),
            json!([{ "name": "x" }]),
            json!({}),
            json!({ "name": 7 }),
            json!({ "body": "" }),
            json!({ "body": "not json" }),
            json!({ "body": "[\"name\"]" }),
            json!({ "body": { "name": false } }),
        ] {
            assert_eq!(extract_name(&event), DEFAULT_NAME, "{event}");
        }
    }

    #[test]
    fn test_non_string_name_checks_body() {
        let event = json!({ "name": 1, "body": { "name": "Grace" } });
        assert_eq!(extract_name(&event), "Grace");
    }

    #[tokio::test]
    async fn test_handler_response() {
        let result = handler(json!({ "name": "World" }), context()).await.unwrap();

        assert_eq!(
            result,
            json!({
                "statusCode": 200,
                "isBase64Encoded": false,
                "headers": { "Content-Type": "application/json" },
                "body": "{\"message\": \"Hello, World!\", \"event\": {\"name\": \"World\"}}",
            })
        );
    }

    #[tokio::test]
    async fn test_handler_default_name() {
        let result = handler(Value::Null, context()).await.unwrap();
        assert_eq!(
            result["body"],
            "{\"message\": \"Hello, FunctionGraph!\", \"event\": null}"
        );
    }

    #[test]
    fn test_module_attributes() {
        let module = module();
        assert!(module.attribute("handler").unwrap().is_callable());
        assert!(!module.attribute("DEFAULT_NAME").unwrap().is_callable());
    }
}
