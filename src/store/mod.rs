//! Remote file store capability.
//!
//! The harvest cycle consumes the store only through this trait; the
//! WebDAV implementation lives in [`webdav`], and tests substitute an
//! in-memory fake. All paths are relative to the store's base collection,
//! `/`-separated, without leading or trailing separators.

pub mod webdav;

use crate::error::Result;

/// Remote file store operations used by the harvest cycle.
pub trait Store: Send + Sync {
    /// Create `dir` (and any missing parents). Idempotent: an already
    /// existing directory is not an error.
    fn ensure_dir(&self, dir: &str) -> Result<()>;

    /// Whether an object or collection exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Write `data` to `path`, overwriting any existing object.
    fn put(&self, path: &str, data: &[u8]) -> Result<()>;
}
