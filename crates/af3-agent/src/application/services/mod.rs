pub mod heartbeat;
pub mod poller;
pub mod worker;

pub use heartbeat::HeartbeatService;
pub use poller::TaskPoller;
pub use worker::InferenceWorker;
