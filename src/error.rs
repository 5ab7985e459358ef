use crate::id::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid node id length")]
    InvalidNodeId,

    #[error("node id already registered: {0}")]
    DuplicateNodeId(NodeId),

    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),
}
