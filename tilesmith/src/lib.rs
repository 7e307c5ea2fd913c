//! Services of the tilesmith stack: the render worker, the storage node,
//! the expiry service and the stats collector, plus their configuration.

pub mod config;
pub mod expiry;
pub mod server;
pub mod stats;
pub mod worker;
