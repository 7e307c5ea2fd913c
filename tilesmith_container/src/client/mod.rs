mod storage;

pub use storage::{MetaHandle, StorageClient};
