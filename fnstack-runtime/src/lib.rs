//! Function runtime for fnstack
//!
//! Implements the two-phase init/invoke protocol: handlers are registered in a
//! [`ModuleCatalog`], selected by `module.function` reference, and invoked with
//! a JSON event and an [`InvocationContext`].

pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod resolver;

pub use catalog::{Attribute, CatalogError, Module, ModuleCatalog};
pub use context::{
    default_logger, ContextBuilder, InvocationContext, LogLevel, Logger, NoopLogger, TracingLogger,
};
pub use dispatcher::{DispatchError, Dispatcher, InvocationResult};
pub use handler::{handler_fn, BoxError, Handler, HandlerFn};
pub use handlers::{router, RuntimeState};
pub use registry::HandlerRegistry;
pub use resolver::{HandlerReference, ResolutionError, ResolvedHandler, Resolver};
