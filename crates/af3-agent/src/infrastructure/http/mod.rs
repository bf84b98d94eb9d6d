pub mod registry;

pub use registry::HttpRegistryClient;
