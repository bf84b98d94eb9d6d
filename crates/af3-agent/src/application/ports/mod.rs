pub mod inference;
pub mod registry;

pub use inference::{InferenceOutput, InferencePort};
pub use registry::RegistryPort;
