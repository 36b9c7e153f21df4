//! Cache value trait and statistics.

use crate::transport::Binder;
use serde::Serialize;

/// A cached value that is backed by a transport handle.
///
/// The handle decides the value's lifetime in a [`super::HandleCache`]: the
/// entry is dropped as soon as the handle reports dead.
pub trait HandleBound: Clone {
    fn handle(&self) -> Binder;
}

impl HandleBound for Binder {
    fn handle(&self) -> Binder {
        self.clone()
    }
}

/// Counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cache name, for logs.
    pub name: String,
    /// Number of entries currently stored.
    pub entries: usize,
    /// Lookups answered from a live entry.
    pub hits: u64,
    /// Times the loader was called.
    pub loads: u64,
    /// Entries dropped because their handle died.
    pub evictions: u64,
}
