//! L2 tier port
//!
//! The engine treats the second tier as an opaque byte store. Values cross
//! the boundary JSON-encoded, so any backend that can hold bytes with a TTL
//! can serve as L2.

use std::sync::Arc;
use std::time::Duration;

use lumen_common::error::CommonResult;

/// Pluggable external key-value store
pub trait L2Store: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &str;

    /// Read the encoded value stored under `key`
    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>>;

    /// Store an encoded value; `ttl` of `None` means no expiry
    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CommonResult<()>;

    /// Remove `key`; deleting an absent key succeeds
    fn delete(&self, key: &str) -> CommonResult<()>;
}

impl<T: L2Store + ?Sized> L2Store for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CommonResult<()> {
        (**self).write(key, value, ttl)
    }

    fn delete(&self, key: &str) -> CommonResult<()> {
        (**self).delete(key)
    }
}
