//! Infrastructure adapters.

pub mod registry_client;

pub use registry_client::HttpRegistryClient;
