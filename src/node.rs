use bytes::Bytes;

use crate::id::NodeId;
use crate::message::{Body, Message, Query, Response};
use crate::routing::RoutingTable;
use crate::storage::LocalStore;
use crate::K;

/// A single DHT peer: an identifier, a routing table, and local storage.
///
/// Both owned structures are internally synchronized, so a shared `DhtNode`
/// handles concurrent inbound queries without external locking.
pub struct DhtNode {
    id: NodeId,
    routing: RoutingTable,
    store: LocalStore,
}

impl DhtNode {
    pub fn new(id: NodeId) -> Self {
        Self::with_bucket_size(id, K)
    }

    pub fn with_bucket_size(id: NodeId, k: usize) -> Self {
        Self {
            id,
            routing: RoutingTable::with_bucket_size(id, k),
            store: LocalStore::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn insert_peer(&self, id: NodeId) {
        self.routing.insert(id);
    }

    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<NodeId> {
        self.routing.find_closest(target, count)
    }

    pub fn store(&self, key: &[u8], value: Bytes) {
        self.store.store(key, value);
    }

    pub fn find_value(&self, key: &[u8]) -> Option<Bytes> {
        self.store.find_value(key)
    }

    /// Handles one inbound query and produces its answer.
    ///
    /// The sender is inserted into the routing table first; every inbound
    /// message is a discovery opportunity, not just explicit bootstraps.
    /// A FIND_VALUE miss answers with the closest known peers to the key's
    /// hash so the caller can continue the search.
    pub fn handle(&self, from: NodeId, query: Query) -> Response {
        self.routing.insert(from);

        match query {
            Query::Ping => Response::Pong,
            Query::Store { key, value } => {
                self.store.store(&key, value);
                Response::Stored
            }
            Query::FindValue { key } => match self.store.find_value(&key) {
                Some(value) => Response::Value(value),
                None => Response::Nodes(
                    self.routing
                        .find_closest(&NodeId::hash_of(&key), self.routing.bucket_size()),
                ),
            },
            Query::FindNode { target } => Response::Nodes(
                self.routing
                    .find_closest(&target, self.routing.bucket_size()),
            ),
        }
    }

    /// Handles one decoded wire message. Queries yield a response message
    /// echoing the transaction id; inbound responses only feed discovery.
    pub fn handle_message(&self, message: Message) -> Option<Message> {
        match message.body {
            Body::Query(query) => {
                let response = self.handle(message.sender, query);
                Some(Message::response(message.transaction_id, self.id, response))
            }
            Body::Response(_) => {
                self.routing.insert(message.sender);
                None
            }
        }
    }
}
