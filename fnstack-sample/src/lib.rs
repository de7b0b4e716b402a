//! Sample function for fnstack
//!
//! Registers the `app` module, whose `app.handler` is the runtime's default
//! handler reference.

pub mod app;
mod spaced_json;

use fnstack_runtime::ModuleCatalog;

/// Module path of the sample module
pub const MODULE: &str = "app";

/// Reference of the sample handler
pub const DEFAULT_HANDLER: &str = "app.handler";

/// Add the sample module to a catalog
pub fn register(catalog: &mut ModuleCatalog) {
    catalog.register_lazy(MODULE, || Ok(app::module()));
}
