pub mod node;
pub mod task;
pub mod types;

pub mod config;
pub mod error;

pub mod backoff;
pub mod constants;
pub mod rate_limit;
pub mod shutdown;
pub mod telemetry;

pub mod utils;

pub use constants::*;
