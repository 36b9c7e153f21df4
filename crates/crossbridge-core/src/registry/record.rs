//! Forwarding records.

use super::{BridgeRef, Category};
use crate::transport::{CallerIdentity, DeathWatch};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A remote bridge registered under a name, plus the watch on its handle.
pub(crate) struct BridgeRecord {
    pub id: u64,
    pub name: String,
    pub category: Category,
    pub bridge: BridgeRef,
    pub caller: CallerIdentity,
    pub registered_at: DateTime<Utc>,
    watch: DeathWatch,
}

impl BridgeRecord {
    pub fn new(
        id: u64,
        name: &str,
        category: Category,
        bridge: BridgeRef,
        watch: DeathWatch,
    ) -> Self {
        let caller = bridge.as_binder().origin();
        Self {
            id,
            name: name.to_string(),
            category,
            bridge,
            caller,
            registered_at: Utc::now(),
            watch,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.bridge.as_binder().is_alive()
    }

    /// Detach the death watch. `true` only the first time.
    pub fn detach(&self) -> bool {
        self.watch.detach()
    }

    pub fn info(&self) -> RecordInfo {
        RecordInfo {
            name: self.name.clone(),
            category: self.category,
            handle: self.bridge.as_binder().id(),
            caller_pid: self.caller.pid,
            caller_endpoint: self.caller.endpoint.clone(),
            registered_at: self.registered_at.to_rfc3339(),
            alive: self.is_alive(),
        }
    }
}

/// Snapshot of a forwarding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    pub name: String,
    pub category: Category,
    pub handle: u64,
    pub caller_pid: u32,
    pub caller_endpoint: String,
    pub registered_at: String,
    pub alive: bool,
}
