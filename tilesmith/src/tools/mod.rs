pub mod expiry_server;
pub mod stats_server;
pub mod storage_node;
pub mod worker;
