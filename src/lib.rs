#![deny(unsafe_op_in_unsafe_fn)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub(crate) mod arena;
pub(crate) mod block;
pub(crate) mod completion;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod lease;
pub(crate) mod loom;
pub(crate) mod object_pool;
pub(crate) mod pool;
pub(crate) mod reader;
pub(crate) mod writer;

pub use arena::Arena;
pub use config::{PoolConfig, KIB, MIB};
pub use error::{Error, Result};
pub use object_pool::{ObjectPool, Reset};
pub use pool::{Pool, PoolStats};
pub use reader::{ReadHandle, ReadOutcome};
pub use writer::{WriteHandle, WriteOutcome};

// Always std: the `std` feature only toggles the `std::io` impls of the handles.
pub(crate) fn abort() {
    std::process::abort();
}
