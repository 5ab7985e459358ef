use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::DhtError;
use crate::id::NodeId;
use crate::lookup::{iterative_find_value, LookupConfig};
use crate::message::{Query, Response};
use crate::node::DhtNode;
use crate::transport::{FindValueResult, Transport};

/// Process-wide directory of participating nodes.
///
/// Stands in for network reachability: it resolves an identifier to a live
/// node the way a real deployment would resolve it to an endpoint. Handles
/// are shared, not owned; removing a node never purges its identifier from
/// other nodes' routing tables, so lookups must expect stale candidates.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use rkad::{DhtNode, NodeId, Registry};
///
/// let registry = Registry::new();
/// let node = registry.add_node(DhtNode::new(NodeId::generate())).unwrap();
///
/// node.store(b"greeting", Bytes::from_static(b"hello"));
/// assert_eq!(
///     registry.lookup(node.id(), b"greeting"),
///     Some(Bytes::from_static(b"hello")),
/// );
/// ```
#[derive(Default)]
pub struct Registry {
    nodes: RwLock<HashMap<NodeId, Arc<DhtNode>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under its identifier and returns the shared handle.
    ///
    /// A duplicate identifier is rejected, never silently overwritten; two
    /// live nodes with the same identifier is a configuration error.
    pub fn add_node(&self, node: DhtNode) -> Result<Arc<DhtNode>, DhtError> {
        let mut nodes = self.nodes.write();
        let id = *node.id();

        if nodes.contains_key(&id) {
            return Err(DhtError::DuplicateNodeId(id));
        }

        let node = Arc::new(node);
        nodes.insert(id, Arc::clone(&node));
        debug!(node = %id, "node registered");
        Ok(node)
    }

    /// Unregisters a node. Other nodes keep whatever they knew about it;
    /// their lookups will skip the stale identifier when it fails to resolve.
    pub fn remove_node(&self, id: &NodeId) -> Option<Arc<DhtNode>> {
        let removed = self.nodes.write().remove(id);
        if removed.is_some() {
            debug!(node = %id, "node unregistered");
        }
        removed
    }

    pub fn resolve(&self, id: &NodeId) -> Option<Arc<DhtNode>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Introduces a new node to a known one: each inserts the other into its
    /// routing table. Both inserts happen under the registry lock so
    /// concurrent removal cannot leave the pair half-wired.
    ///
    /// An unregistered `known_id` makes this a no-op; bootstrapping against
    /// an unreachable peer simply wires up nothing.
    pub fn bootstrap(&self, new_node: &DhtNode, known_id: &NodeId) {
        let nodes = self.nodes.read();

        let Some(known) = nodes.get(known_id) else {
            debug!(peer = %known_id, "bootstrap target not registered, skipping");
            return;
        };

        new_node.insert_peer(*known_id);
        known.insert_peer(*new_node.id());
        info!(node = %new_node.id(), via = %known_id, "node bootstrapped");
    }

    /// Looks up a value starting from `origin`: local storage first, then
    /// the origin's closest known peers to the key's hash, in ascending
    /// distance order. The first peer holding the value wins; peers that no
    /// longer resolve are skipped. `None` means the origin is unknown or
    /// every candidate came up empty.
    pub fn lookup(&self, origin: &NodeId, key: &[u8]) -> Option<Bytes> {
        let origin_node = self.resolve(origin)?;

        if let Some(value) = origin_node.find_value(key) {
            debug!(node = %origin, "lookup hit local storage");
            return Some(value);
        }

        let target = NodeId::hash_of(key);
        let candidates = origin_node.find_closest(&target, origin_node.routing().bucket_size());

        for candidate in candidates {
            match self.find_value(origin, &candidate, key) {
                Ok(FindValueResult::Found(value)) => {
                    debug!(node = %origin, peer = %candidate, "lookup found value on peer");
                    return Some(value);
                }
                Ok(FindValueResult::Closest(_)) => {}
                Err(err) => {
                    debug!(peer = %candidate, error = %err, "candidate unreachable, skipping");
                }
            }
        }

        None
    }

    /// Like [`lookup`](Self::lookup), but advances the search frontier
    /// through peers-of-peers instead of stopping at the origin's own
    /// candidates.
    pub fn iterative_lookup(
        &self,
        origin: &NodeId,
        key: &[u8],
        config: &LookupConfig,
    ) -> Option<Bytes> {
        let origin_node = self.resolve(origin)?;

        if let Some(value) = origin_node.find_value(key) {
            return Some(value);
        }

        let target = NodeId::hash_of(key);
        let seeds = origin_node.find_closest(&target, config.count);
        iterative_find_value(self, origin, &seeds, key, config).value
    }

    /// Delivers one query to a peer, as a network transport would.
    fn deliver(&self, from: &NodeId, peer: &NodeId, query: Query) -> Result<Response, DhtError> {
        let node = self.resolve(peer).ok_or(DhtError::UnknownPeer(*peer))?;
        Ok(node.handle(*from, query))
    }
}

impl Transport for Registry {
    fn ping(&self, from: &NodeId, peer: &NodeId) -> Result<(), DhtError> {
        match self.deliver(from, peer, Query::Ping)? {
            Response::Pong => Ok(()),
            other => Err(DhtError::InvalidMessage(format!(
                "unexpected reply to ping: {:?}",
                other
            ))),
        }
    }

    fn store(
        &self,
        from: &NodeId,
        peer: &NodeId,
        key: &[u8],
        value: Bytes,
    ) -> Result<(), DhtError> {
        let query = Query::Store {
            key: Bytes::copy_from_slice(key),
            value,
        };
        match self.deliver(from, peer, query)? {
            Response::Stored => Ok(()),
            other => Err(DhtError::InvalidMessage(format!(
                "unexpected reply to store: {:?}",
                other
            ))),
        }
    }

    fn find_value(
        &self,
        from: &NodeId,
        peer: &NodeId,
        key: &[u8],
    ) -> Result<FindValueResult, DhtError> {
        let query = Query::FindValue {
            key: Bytes::copy_from_slice(key),
        };
        match self.deliver(from, peer, query)? {
            Response::Value(value) => Ok(FindValueResult::Found(value)),
            Response::Nodes(nodes) => Ok(FindValueResult::Closest(nodes)),
            other => Err(DhtError::InvalidMessage(format!(
                "unexpected reply to find_value: {:?}",
                other
            ))),
        }
    }

    fn find_node(
        &self,
        from: &NodeId,
        peer: &NodeId,
        target: &NodeId,
    ) -> Result<Vec<NodeId>, DhtError> {
        match self.deliver(from, peer, Query::FindNode { target: *target })? {
            Response::Nodes(nodes) => Ok(nodes),
            other => Err(DhtError::InvalidMessage(format!(
                "unexpected reply to find_node: {:?}",
                other
            ))),
        }
    }
}
