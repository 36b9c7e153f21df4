//! Caches for resolved remote handles.
//!
//! Two caches with different lifetime rules:
//! - [`HandleCache`]: keyed values that live exactly as long as their
//!   transport handle, evicted on death notification
//! - [`TokenCache`]: bounded identity cache of weak references, used to reuse
//!   wrappers (stubs, callbacks) while somebody still holds them

mod handle_cache;
mod token_cache;
mod traits;

pub use handle_cache::HandleCache;
pub use token_cache::TokenCache;
pub use traits::{CacheStats, HandleBound};
