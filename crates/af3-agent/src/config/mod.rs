pub mod unified;

pub use unified::{AgentConfig, AgentSection, PipelineSection};
