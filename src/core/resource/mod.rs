//! Resource import and identity resolution.
//!
//! A file enters through [`ResourceService`]: it is stat'ed, hashed, probed
//! by the [`TypeRegistry`], assembled by a [`ResourceBuilder`], stored with a
//! JSON sidecar by the [`ResourceStore`] and published in the
//! [`ResourceIndex`].

pub mod archive;
pub mod builder;
pub mod events;
pub mod in_flight;
pub mod index;
pub mod model;
pub mod registry;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use archive::ArchiveView;
pub use builder::ResourceBuilder;
pub use events::{
    ChannelSink, ImportPhase, NoopSink, ProgressSink, ResourceEvent, ResourceEventSink,
};
pub use in_flight::InFlight;
pub use index::{ResourceIndex, ResourceQuery};
pub use model::{
    CurseforgeSource, IndexKey, Resource, ResourceDomain, ResourceMetadata, ResourceType,
};
pub use registry::{Resolution, TypeHint, TypeRegistry};
pub use service::{ImportOptions, ImportOutcome, ResourceService};
pub use store::ResourceStore;
pub use types::{ResourceParser, TypeDescriptor};
