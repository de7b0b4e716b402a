//! Invocation context passed to handlers

use fnstack_core::RequestId;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Severity accepted by a [`Logger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leveled log sink handed to handlers through their context
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Routes handler log lines into the runtime's own `tracing` output
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "fnstack::handler", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "fnstack::handler", "{}", message),
            LogLevel::Info => tracing::info!(target: "fnstack::handler", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "fnstack::handler", "{}", message),
            LogLevel::Error => tracing::error!(target: "fnstack::handler", "{}", message),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

static DEFAULT_LOGGER: Lazy<Arc<dyn Logger>> = Lazy::new(|| Arc::new(TracingLogger));

/// Process-wide logger injected when the caller does not supply one
pub fn default_logger() -> Arc<dyn Logger> {
    DEFAULT_LOGGER.clone()
}

/// Context for a single invocation.
///
/// `fields` holds the caller-supplied mapping verbatim. A caller field named
/// `logger` stays plain data; the logging capability is always [`Self::logger`].
#[derive(Clone)]
pub struct InvocationContext {
    request_id: String,
    fields: Map<String, Value>,
    logger: Arc<dyn Logger>,
}

impl InvocationContext {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builds a fresh [`InvocationContext`] per invocation. Never fails.
#[derive(Clone)]
pub struct ContextBuilder {
    default_logger: Arc<dyn Logger>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(default_logger())
    }
}

impl ContextBuilder {
    pub fn new(default_logger: Arc<dyn Logger>) -> Self {
        Self { default_logger }
    }

    /// Build a context from caller-supplied fields.
    ///
    /// Anything other than a JSON object (absent, `null`, arrays, scalars)
    /// yields an empty field map.
    pub fn build(&self, request_id: &RequestId, fields: Option<Value>) -> InvocationContext {
        self.build_with_logger(request_id, fields, None)
    }

    /// Like [`Self::build`], with an explicit logger taking the place of the default
    pub fn build_with_logger(
        &self,
        request_id: &RequestId,
        fields: Option<Value>,
        logger: Option<Arc<dyn Logger>>,
    ) -> InvocationContext {
        let fields = match fields {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        InvocationContext {
            request_id: request_id.id.clone(),
            fields,
            logger: logger.unwrap_or_else(|| self.default_logger.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, message: &str) {
            self.lines.lock().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_fields_copied_verbatim() {
        let ctx = ContextBuilder::default().build(
            &RequestId::with_id("req-1"),
            Some(json!({ "function_name": "demo", "memory": 128 })),
        );

        assert_eq!(ctx.request_id(), "req-1");
        assert_eq!(ctx.get("function_name"), Some(&json!("demo")));
        assert_eq!(ctx.get("memory"), Some(&json!(128)));
        assert_eq!(ctx.fields().len(), 2);
    }

    #[test]
    fn test_non_mapping_fields_degrade_to_empty() {
        let builder = ContextBuilder::default();
        let id = RequestId::new();

        for input in [None, Some(Value::Null), Some(json!([1, 2])), Some(json!("ctx"))] {
            let ctx = builder.build(&id, input);
            assert!(ctx.fields().is_empty());
        }
    }

    #[test]
    fn test_default_logger_injected() {
        let recorder = Arc::new(RecordingLogger::default());
        let builder = ContextBuilder::new(recorder.clone());

        let ctx = builder.build(&RequestId::new(), Some(json!({})));
        ctx.logger().info("hello");
        ctx.logger().warn("careful");

        let lines = recorder.lines.lock();
        assert_eq!(
            *lines,
            vec![
                (LogLevel::Info, "hello".to_string()),
                (LogLevel::Warn, "careful".to_string())
            ]
        );
    }

    #[test]
    fn test_caller_logger_field_is_plain_data() {
        let recorder = Arc::new(RecordingLogger::default());
        let builder = ContextBuilder::new(recorder.clone());

        let ctx = builder.build(&RequestId::new(), Some(json!({ "logger": "custom" })));
        assert_eq!(ctx.get("logger"), Some(&json!("custom")));

        ctx.logger().error("still routed");
        assert_eq!(recorder.lines.lock().len(), 1);
    }

    #[test]
    fn test_explicit_logger_wins() {
        let default = Arc::new(RecordingLogger::default());
        let explicit = Arc::new(RecordingLogger::default());
        let builder = ContextBuilder::new(default.clone());

        let logger: Arc<dyn Logger> = explicit.clone();
        let ctx = builder.build_with_logger(&RequestId::new(), None, Some(logger));
        ctx.logger().debug("to explicit");

        assert!(default.lines.lock().is_empty());
        assert_eq!(explicit.lines.lock().len(), 1);
    }

    #[test]
    fn test_noop_logger() {
        let builder = ContextBuilder::new(Arc::new(NoopLogger));
        let ctx = builder.build(&RequestId::new(), None);
        ctx.logger().error("dropped");
    }
}
