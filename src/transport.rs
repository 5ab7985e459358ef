use bytes::Bytes;

use crate::error::DhtError;
use crate::id::NodeId;

/// Answer to a FIND_VALUE query.
#[derive(Debug, Clone)]
pub enum FindValueResult {
    /// The peer holds the value.
    Found(Bytes),
    /// The peer does not; these are its closest known identifiers to the
    /// key's hash, ascending by distance.
    Closest(Vec<NodeId>),
}

/// How one node reaches another.
///
/// Routing tables hold bare identifiers, so every remote operation starts
/// with resolution: an implementation maps the peer identifier to something
/// reachable, or fails with [`DhtError::UnknownPeer`]. That failure is an
/// expected network condition; callers skip the peer and continue rather
/// than aborting a lookup.
///
/// `from` is the querying node's identifier. It rides along with every
/// operation so the receiving peer can insert the sender into its own
/// routing table, the passive discovery that lets the network self-organize.
///
/// [`Registry`](crate::Registry) provides the in-process implementation; a
/// networked deployment substitutes one backed by sockets without touching
/// the lookup logic.
pub trait Transport {
    fn ping(&self, from: &NodeId, peer: &NodeId) -> Result<(), DhtError>;

    fn store(&self, from: &NodeId, peer: &NodeId, key: &[u8], value: Bytes)
        -> Result<(), DhtError>;

    fn find_value(
        &self,
        from: &NodeId,
        peer: &NodeId,
        key: &[u8],
    ) -> Result<FindValueResult, DhtError>;

    fn find_node(
        &self,
        from: &NodeId,
        peer: &NodeId,
        target: &NodeId,
    ) -> Result<Vec<NodeId>, DhtError>;
}
