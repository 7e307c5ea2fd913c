//! YAML configuration for the services.

mod node;
mod worker;

pub use node::{ExpiryConfig, NodeConfig, StatsConfig};
pub use worker::{QueueConfig, StyleConfig, WorkerConfig};
