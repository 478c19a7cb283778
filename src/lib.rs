pub mod commands;
pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{ResourceError, ResourceResult};
pub use crate::core::instance::{Instance, InstanceManager, LoaderType};
pub use crate::core::resource::{
    ImportOptions, ImportOutcome, IndexKey, Resource, ResourceDomain, ResourceService,
    ResourceType, TypeHint, TypeRegistry,
};
pub use crate::core::state::{AppState, ResourceSettings};

/// Initialize structured logging. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launcher_resources=debug")),
        )
        .init();
}
