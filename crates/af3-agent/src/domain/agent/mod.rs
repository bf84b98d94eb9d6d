pub mod model;
pub mod status;

pub use model::Agent;
pub use status::AgentStatus;
