//! rkad - a Kademlia distributed hash table node
//!
//! This library implements the Kademlia routing and storage algorithm:
//! peers carry 160-bit identifiers, organize known peers into k-buckets by
//! XOR distance, and locate key/value pairs by consulting local storage and
//! then progressively closer peers.
//!
//! # Modules
//!
//! - [`bencode`] - wire codec for DHT messages
//! - [`id`] - node identifiers and the XOR distance metric
//! - [`routing`] - k-buckets and the per-node routing table
//! - [`storage`] - per-node key/value storage
//! - [`node`] - a single DHT peer
//! - [`message`] - logical wire messages
//! - [`transport`] - how a node reaches other nodes
//! - [`registry`] - in-process node directory, bootstrap wiring, and lookups
//! - [`lookup`] - iterative closest-node search

pub mod bencode;
pub mod error;
pub mod id;
pub mod lookup;
pub mod message;
pub mod node;
pub mod registry;
pub mod routing;
pub mod storage;
pub mod transport;

pub use error::DhtError;
pub use id::{Distance, NodeId};
pub use lookup::{
    iterative_find_node, iterative_find_value, LookupConfig, LookupResult, LookupStats,
};
pub use message::{Body, Message, Query, Response, TransactionId};
pub use node::DhtNode;
pub use registry::Registry;
pub use routing::RoutingTable;
pub use storage::LocalStore;
pub use transport::{FindValueResult, Transport};

/// Bucket capacity: how many peers each k-bucket holds.
pub const K: usize = 20;

/// Identifier width in bits; one bucket per possible distance magnitude.
pub const ID_BITS: usize = 160;

/// Default lookup fan-out per round.
pub const ALPHA: usize = 3;

#[cfg(test)]
mod tests;
