use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::id::NodeId;

/// Key/value pairs held by a single node.
///
/// Keys are SHA-1 hashes living in the same address space as node
/// identifiers, so a key's hash decides which peers are responsible for it.
/// Writes are last-write-wins; entries never expire.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: RwLock<HashMap<NodeId, Bytes>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under the hash of `key`, overwriting any prior value.
    pub fn store(&self, key: &[u8], value: Bytes) {
        self.entries.write().insert(NodeId::hash_of(key), value);
    }

    /// Looks up the value stored under `key`. A miss is an expected outcome,
    /// not an error.
    pub fn find_value(&self, key: &[u8]) -> Option<Bytes> {
        self.entries.read().get(&NodeId::hash_of(key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
