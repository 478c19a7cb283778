pub mod deployment;
pub mod manager;
pub mod model;

pub use manager::InstanceManager;
pub use model::{Instance, LoaderType};
