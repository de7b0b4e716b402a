//! Handler resolution
//!
//! Turns a `module.function` reference into a callable by looking the module up
//! in the [`ModuleCatalog`].

use fnstack_core::{ErrorCode, RuntimeError};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Attribute, CatalogError, ModuleCatalog};
use crate::context::InvocationContext;
use crate::handler::{BoxError, Handler};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Handler must be in 'module.function' format")]
    MalformedReference,

    #[error("Unable to import handler: {0}")]
    ImportFailure(String),

    #[error("Unable to import handler: {0}")]
    AttributeMissing(String),

    #[error("Handler attribute is not callable")]
    NotCallable,

    /// Module loading failed in a way the reference cannot explain
    #[error("Handler resolution failed: {0}")]
    Internal(String),
}

impl ResolutionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedReference => ErrorCode::MalformedReference,
            Self::ImportFailure(_) => ErrorCode::ImportFailure,
            Self::AttributeMissing(_) => ErrorCode::AttributeMissing,
            Self::NotCallable => ErrorCode::NotCallable,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Self::ImportFailure(d) | Self::AttributeMissing(d) | Self::Internal(d) => Some(d.as_str()),
            Self::MalformedReference | Self::NotCallable => None,
        }
    }

    /// Error body returned by `/init`
    pub fn to_runtime_error(&self) -> RuntimeError {
        let mut error = RuntimeError::new(self.code());
        if let Self::Internal(_) = self {
            error = error.with_message("Handler resolution failed");
        }
        match self.details() {
            Some(details) => error.with_details(details),
            None => error,
        }
    }
}

/// A validated `<module-path>.<function-name>` reference.
///
/// Split on the last `.`, so `pkg.sub.handler` names `handler` in module
/// `pkg.sub`. Both parts must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerReference {
    raw: String,
    separator: usize,
}

impl HandlerReference {
    pub fn parse(reference: &str) -> Result<Self, ResolutionError> {
        let separator = reference
            .rfind('.')
            .ok_or(ResolutionError::MalformedReference)?;

        if separator == 0 || separator == reference.len() - 1 {
            return Err(ResolutionError::MalformedReference);
        }

        Ok(Self {
            raw: reference.to_string(),
            separator,
        })
    }

    pub fn module(&self) -> &str {
        &self.raw[..self.separator]
    }

    pub fn function(&self) -> &str {
        &self.raw[self.separator + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for HandlerReference {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HandlerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A reference together with the callable it resolved to
#[derive(Clone)]
pub struct ResolvedHandler {
    reference: HandlerReference,
    handler: Arc<dyn Handler>,
}

impl ResolvedHandler {
    pub fn new(reference: HandlerReference, handler: Arc<dyn Handler>) -> Self {
        Self { reference, handler }
    }

    pub fn reference(&self) -> &HandlerReference {
        &self.reference
    }

    pub async fn call(&self, event: Value, context: InvocationContext) -> Result<Value, BoxError> {
        self.handler.call(event, context).await
    }

    /// Whether both values point at the same callable
    pub fn same_handler(&self, other: &ResolvedHandler) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// Resolves references against a shared catalog
#[derive(Clone)]
pub struct Resolver {
    catalog: Arc<ModuleCatalog>,
}

impl Resolver {
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn resolve(&self, reference: &str) -> Result<ResolvedHandler, ResolutionError> {
        let reference = HandlerReference::parse(reference)?;

        let module = self.catalog.load(reference.module()).map_err(|e| match e {
            CatalogError::ModuleNotFound(_) | CatalogError::LoadFailed { .. } => {
                ResolutionError::ImportFailure(e.to_string())
            }
            CatalogError::LoaderPanicked { .. } => ResolutionError::Internal(e.to_string()),
        })?;

        match module.attribute(reference.function()) {
            Some(Attribute::Handler(handler)) => {
                debug!(handler = %reference, "Resolved handler");
                Ok(ResolvedHandler::new(reference, handler.clone()))
            }
            Some(Attribute::Value(_)) => Err(ResolutionError::NotCallable),
            None => Err(ResolutionError::AttributeMissing(format!(
                "module '{}' has no attribute '{}'",
                reference.module(),
                reference.function()
            ))),
        }
    }
}
