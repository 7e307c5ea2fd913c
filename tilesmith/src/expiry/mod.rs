//! Per-metatile expiry tracking: a packed bit per metatile, per style,
//! persisted in memory-mapped files and served over a tiny UDP protocol.

mod client;
mod index;
mod protocol;
mod service;

pub use client::ExpiryClient;
pub use index::{ExpiryFile, ExpiryIndex};
pub use protocol::{Command, REQUEST_LEN, Request, decode_request, encode_request};
pub use service::ExpiryServer;
