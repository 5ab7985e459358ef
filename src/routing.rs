use std::collections::VecDeque;

use parking_lot::RwLock;
use tracing::debug;

use crate::id::NodeId;
use crate::{ID_BITS, K};

/// One k-bucket: up to `k` peer identifiers at a single distance magnitude,
/// least-recently-seen at the head, most-recently-seen at the tail.
///
/// Buckets hold bare identifiers, never node handles; presence asserts "this
/// identifier was seen", not "this node is reachable now". Resolution happens
/// separately through the registry or transport.
#[derive(Debug)]
struct Bucket {
    nodes: VecDeque<NodeId>,
}

impl Bucket {
    fn new(k: usize) -> Self {
        Self {
            nodes: VecDeque::with_capacity(k),
        }
    }

    /// Inserts or refreshes an identifier, returning the evicted one if the
    /// bucket was full. A re-seen identifier moves to the tail; a full bucket
    /// drops its least-recently-seen head.
    fn insert(&mut self, id: NodeId, k: usize) -> Option<NodeId> {
        if let Some(pos) = self.nodes.iter().position(|n| *n == id) {
            self.nodes.remove(pos);
            self.nodes.push_back(id);
            return None;
        }

        if self.nodes.len() < k {
            self.nodes.push_back(id);
            return None;
        }

        let evicted = self.nodes.pop_front();
        self.nodes.push_back(id);
        evicted
    }

    fn remove(&mut self, id: &NodeId) -> bool {
        if let Some(pos) = self.nodes.iter().position(|n| n == id) {
            self.nodes.remove(pos);
            true
        } else {
            false
        }
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| n == id)
    }
}

/// A node's view of the network: one bucket per possible distance magnitude.
///
/// Owned by exactly one node and never contains that node's own identifier.
/// Each bucket carries its own lock, so inserts and closest-node queries from
/// concurrent inbound traffic serialize per bucket.
pub struct RoutingTable {
    our_id: NodeId,
    k: usize,
    buckets: Vec<RwLock<Bucket>>,
}

impl RoutingTable {
    pub fn new(our_id: NodeId) -> Self {
        Self::with_bucket_size(our_id, K)
    }

    pub fn with_bucket_size(our_id: NodeId, k: usize) -> Self {
        let buckets = (0..ID_BITS).map(|_| RwLock::new(Bucket::new(k))).collect();
        Self { our_id, k, buckets }
    }

    pub fn our_id(&self) -> &NodeId {
        &self.our_id
    }

    pub fn bucket_size(&self) -> usize {
        self.k
    }

    /// Records that a peer was seen. Inserting our own identifier is a no-op.
    ///
    /// The deterministic bucket assignment keeps any identifier in at most
    /// one bucket.
    pub fn insert(&self, id: NodeId) {
        if id == self.our_id {
            return;
        }

        let bucket_idx = self.our_id.bucket_index(&id);
        let evicted = self.buckets[bucket_idx].write().insert(id, self.k);

        if let Some(old) = evicted {
            debug!(bucket = bucket_idx, evicted = %old, inserted = %id, "bucket full, dropped least recently seen peer");
        }
    }

    pub fn remove(&self, id: &NodeId) -> bool {
        let bucket_idx = self.our_id.bucket_index(id);
        self.buckets[bucket_idx].write().remove(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        let bucket_idx = self.our_id.bucket_index(id);
        self.buckets[bucket_idx].read().contains(id)
    }

    /// The `count` known identifiers closest to `target`, ascending by XOR
    /// distance. Returns fewer when fewer are known; an empty table yields an
    /// empty list.
    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = Vec::new();

        for bucket in &self.buckets {
            let bucket = bucket.read();
            nodes.extend(bucket.nodes.iter().copied());
        }

        nodes.sort_by(|a, b| target.distance(a).cmp(&target.distance(b)));
        nodes.truncate(count);
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.buckets.iter().map(|b| b.read().nodes.len()).sum()
    }

    /// Every known identifier, in bucket order, head-to-tail within a bucket.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for bucket in &self.buckets {
            let bucket = bucket.read();
            nodes.extend(bucket.nodes.iter().copied());
        }
        nodes
    }
}
