//! Rolling get/post latency statistics: UDP ingest, in-memory windows,
//! JSON snapshots over TCP.

mod client;
mod service;
mod window;

pub use client::StatsClient;
pub use service::StatsServer;
pub use window::{StatsStore, Table};
