//! Module catalog
//!
//! Handlers are registered statically under a module path, each module exposing
//! named attributes. The resolver looks references up here instead of loading
//! code at runtime. Modules may be registered lazily; their loader runs on the
//! first lookup and its result is kept for the life of the process.

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::handler::{BoxError, Handler};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No module named '{0}'")]
    ModuleNotFound(String),

    #[error("{reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Loader for module '{path}' panicked: {reason}")]
    LoaderPanicked { path: String, reason: String },
}

/// A named member of a module
#[derive(Clone)]
pub enum Attribute {
    /// Invocable with `(event, context)`
    Handler(Arc<dyn Handler>),
    /// Plain data; resolving it as a handler fails
    Value(Value),
}

impl Attribute {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// A set of attributes registered under one module path
#[derive(Debug, Clone, Default)]
pub struct Module {
    attributes: HashMap<String, Attribute>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler attribute
    pub fn handler(mut self, name: impl Into<String>, handler: impl Handler) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Handler(Arc::new(handler)));
        self
    }

    /// Add a non-callable attribute
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Value(value.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

type Loader = Box<dyn Fn() -> Result<Module, BoxError> + Send + Sync>;

enum Entry {
    Loaded(Arc<Module>),
    Lazy {
        cell: OnceCell<Arc<Module>>,
        loader: Loader,
    },
}

/// Registry of modules keyed by module path
#[derive(Default)]
pub struct ModuleCatalog {
    modules: HashMap<String, Entry>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module that is available immediately
    pub fn register(&mut self, path: impl Into<String>, module: Module) -> &mut Self {
        let path = path.into();
        debug!(module = %path, "Registered module");
        self.modules.insert(path, Entry::Loaded(Arc::new(module)));
        self
    }

    /// Register a module whose loader runs on first lookup.
    ///
    /// A loader that fails (or panics) leaves the module unloaded, so the next
    /// lookup runs it again.
    pub fn register_lazy<F>(&mut self, path: impl Into<String>, loader: F) -> &mut Self
    where
        F: Fn() -> Result<Module, BoxError> + Send + Sync + 'static,
    {
        let path = path.into();
        debug!(module = %path, "Registered lazy module");
        self.modules.insert(
            path,
            Entry::Lazy {
                cell: OnceCell::new(),
                loader: Box::new(loader),
            },
        );
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    pub fn module_paths(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Look up a module, running its loader if it has not been loaded yet
    pub fn load(&self, path: &str) -> Result<Arc<Module>, CatalogError> {
        let entry = self
            .modules
            .get(path)
            .ok_or_else(|| CatalogError::ModuleNotFound(path.to_string()))?;

        match entry {
            Entry::Loaded(module) => Ok(module.clone()),
            Entry::Lazy { cell, loader } => {
                let loaded = catch_unwind(AssertUnwindSafe(|| {
                    cell.get_or_try_init(|| -> Result<Arc<Module>, CatalogError> {
                        let module = loader().map_err(|e| CatalogError::LoadFailed {
                            path: path.to_string(),
                            reason: e.to_string(),
                        })?;
                        info!(module = %path, "Module loaded");
                        Ok(Arc::new(module))
                    })
                    .cloned()
                }));

                match loaded {
                    Ok(result) => result,
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        error!(module = %path, reason = %reason, "Module loader panicked");
                        Err(CatalogError::LoaderPanicked {
                            path: path.to_string(),
                            reason,
                        })
                    }
                }
            }
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InvocationContext;
    use crate::handler::handler_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_handler() -> impl Handler {
        handler_fn(|_event: Value, _ctx: InvocationContext| async move {
            Ok::<_, BoxError>(Value::Null)
        })
    }

    #[test]
    fn test_register_and_load() {
        let mut catalog = ModuleCatalog::new();
        catalog.register(
            "app",
            Module::new().handler("handler", ok_handler()).value("VERSION", "1.0"),
        );

        let module = catalog.load("app").unwrap();
        assert!(module.attribute("handler").unwrap().is_callable());
        assert!(!module.attribute("VERSION").unwrap().is_callable());
        assert!(module.attribute("missing").is_none());
    }

    #[test]
    fn test_module_not_found() {
        let catalog = ModuleCatalog::new();
        let err = catalog.load("nope").unwrap_err();
        assert!(matches!(err, CatalogError::ModuleNotFound(_)));
        assert_eq!(err.to_string(), "No module named 'nope'");
    }

    #[test]
    fn test_lazy_loader_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut catalog = ModuleCatalog::new();
        catalog.register_lazy("pkg.mod", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().handler("handler", ok_handler()))
        });

        catalog.load("pkg.mod").unwrap();
        catalog.load("pkg.mod").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_loader_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut catalog = ModuleCatalog::new();
        catalog.register_lazy("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("database unavailable".into())
            } else {
                Ok(Module::new())
            }
        });

        let err = catalog.load("flaky").unwrap_err();
        assert!(matches!(err, CatalogError::LoadFailed { .. }));
        assert_eq!(err.to_string(), "database unavailable");

        assert!(catalog.load("flaky").is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_loader_is_contained() {
        let mut catalog = ModuleCatalog::new();
        catalog.register_lazy("broken", || panic!("import side effect failed"));

        let err = catalog.load("broken").unwrap_err();
        match err {
            CatalogError::LoaderPanicked { path, reason } => {
                assert_eq!(path, "broken");
                assert_eq!(reason, "import side effect failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
