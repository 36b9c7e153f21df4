//! Authority lookup.
//!
//! A locator maps an authority string (the name a process publishes its
//! registry under) to that registry's bridge handle.

use crate::error::{BridgeError, Result};
use crate::registry::BridgeRef;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Resolves authorities to bridges.
pub trait Locator: Send + Sync {
    /// Live bridge published under `authority`, if any.
    fn locate(&self, authority: &str) -> Result<Option<BridgeRef>>;
}

/// In-memory locator populated by explicit publishing.
#[derive(Default)]
pub struct StaticLocator {
    bridges: RwLock<HashMap<String, BridgeRef>>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `bridge` under `authority`, replacing any previous entry.
    pub fn publish(&self, authority: &str, bridge: BridgeRef) -> Result<()> {
        if authority.is_empty() {
            return Err(BridgeError::invalid_argument("authority", "must not be empty"));
        }
        debug!("Published authority '{}' as bridge #{}", authority, bridge.as_binder().id());
        self.bridges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(authority.to_string(), bridge);
        Ok(())
    }

    pub fn withdraw(&self, authority: &str) -> Option<BridgeRef> {
        self.bridges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(authority)
    }

    /// Published authorities, sorted.
    pub fn authorities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bridges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Locator for StaticLocator {
    fn locate(&self, authority: &str) -> Result<Option<BridgeRef>> {
        let bridges = self.bridges.read().unwrap_or_else(PoisonError::into_inner);
        Ok(bridges
            .get(authority)
            .filter(|bridge| bridge.as_binder().is_alive())
            .cloned())
    }
}
