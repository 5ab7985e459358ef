use std::collections::BTreeMap;

use bytes::Bytes;

use crate::bencode::{decode, encode, Value};
use crate::error::DhtError;
use crate::id::NodeId;

pub type TransactionId = Bytes;

#[derive(Debug, Clone)]
pub enum Query {
    Ping,
    Store { key: Bytes, value: Bytes },
    FindValue { key: Bytes },
    FindNode { target: NodeId },
}

#[derive(Debug, Clone)]
pub enum Response {
    Pong,
    Stored,
    /// The queried peer holds the requested value.
    Value(Bytes),
    /// Closest identifiers the peer knows, ascending by distance to the
    /// target. Also the answer to a FIND_VALUE miss.
    Nodes(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub enum Body {
    Query(Query),
    Response(Response),
}

/// One DHT wire message.
///
/// Every message carries the sender's identifier so the receiver can insert
/// the sender into its own routing table; the network self-organizes through
/// this passive discovery.
#[derive(Debug, Clone)]
pub struct Message {
    pub transaction_id: TransactionId,
    pub sender: NodeId,
    pub body: Body,
}

impl Message {
    pub fn query(transaction_id: TransactionId, sender: NodeId, query: Query) -> Self {
        Self {
            transaction_id,
            sender,
            body: Body::Query(query),
        }
    }

    pub fn response(transaction_id: TransactionId, sender: NodeId, response: Response) -> Self {
        Self {
            transaction_id,
            sender,
            body: Body::Response(response),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, DhtError> {
        let value = decode(data)?;

        let dict = value
            .as_dict()
            .ok_or_else(|| DhtError::InvalidMessage("expected dict".into()))?;

        let transaction_id = dict
            .get(b"t".as_slice())
            .and_then(|v| v.as_bytes())
            .cloned()
            .ok_or_else(|| DhtError::InvalidMessage("missing transaction id".into()))?;

        let kind = dict
            .get(b"y".as_slice())
            .and_then(|v| v.as_str())
            .ok_or_else(|| DhtError::InvalidMessage("missing message type".into()))?;

        match kind {
            "q" => Self::parse_query(transaction_id, dict),
            "r" => Self::parse_response(transaction_id, dict),
            other => Err(DhtError::InvalidMessage(format!(
                "unknown message type: {}",
                other
            ))),
        }
    }

    fn parse_query(
        transaction_id: TransactionId,
        dict: &BTreeMap<Bytes, Value>,
    ) -> Result<Self, DhtError> {
        let name = dict
            .get(b"q".as_slice())
            .and_then(|v| v.as_str())
            .ok_or_else(|| DhtError::InvalidMessage("missing query name".into()))?;

        let args = dict
            .get(b"a".as_slice())
            .and_then(|v| v.as_dict())
            .ok_or_else(|| DhtError::InvalidMessage("missing query args".into()))?;

        let sender = args
            .get(b"id".as_slice())
            .and_then(|v| v.as_bytes())
            .and_then(|b| NodeId::from_bytes(b).ok())
            .ok_or_else(|| DhtError::InvalidMessage("missing sender id".into()))?;

        let query = match name {
            "ping" => Query::Ping,
            "store" => {
                let key = args
                    .get(b"key".as_slice())
                    .and_then(|v| v.as_bytes())
                    .cloned()
                    .ok_or_else(|| DhtError::InvalidMessage("missing key".into()))?;
                let value = args
                    .get(b"value".as_slice())
                    .and_then(|v| v.as_bytes())
                    .cloned()
                    .ok_or_else(|| DhtError::InvalidMessage("missing value".into()))?;
                Query::Store { key, value }
            }
            "find_value" => {
                let key = args
                    .get(b"key".as_slice())
                    .and_then(|v| v.as_bytes())
                    .cloned()
                    .ok_or_else(|| DhtError::InvalidMessage("missing key".into()))?;
                Query::FindValue { key }
            }
            "find_node" => {
                let target = args
                    .get(b"target".as_slice())
                    .and_then(|v| v.as_bytes())
                    .and_then(|b| NodeId::from_bytes(b).ok())
                    .ok_or_else(|| DhtError::InvalidMessage("missing target".into()))?;
                Query::FindNode { target }
            }
            other => {
                return Err(DhtError::InvalidMessage(format!(
                    "unknown query: {}",
                    other
                )))
            }
        };

        Ok(Self::query(transaction_id, sender, query))
    }

    fn parse_response(
        transaction_id: TransactionId,
        dict: &BTreeMap<Bytes, Value>,
    ) -> Result<Self, DhtError> {
        let fields = dict
            .get(b"r".as_slice())
            .and_then(|v| v.as_dict())
            .ok_or_else(|| DhtError::InvalidMessage("missing response dict".into()))?;

        let sender = fields
            .get(b"id".as_slice())
            .and_then(|v| v.as_bytes())
            .and_then(|b| NodeId::from_bytes(b).ok())
            .ok_or_else(|| DhtError::InvalidMessage("missing sender id".into()))?;

        let response = if let Some(value) = fields.get(b"value".as_slice()).and_then(|v| v.as_bytes())
        {
            Response::Value(value.clone())
        } else if let Some(packed) = fields.get(b"nodes".as_slice()).and_then(|v| v.as_bytes()) {
            Response::Nodes(unpack_nodes(packed))
        } else if fields.get(b"stored".as_slice()).is_some() {
            Response::Stored
        } else {
            Response::Pong
        };

        Ok(Self::response(transaction_id, sender, response))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut dict = BTreeMap::new();

        dict.insert(
            Bytes::from_static(b"t"),
            Value::Bytes(self.transaction_id.clone()),
        );

        let sender = Value::Bytes(Bytes::copy_from_slice(self.sender.as_bytes()));

        match &self.body {
            Body::Query(query) => {
                dict.insert(Bytes::from_static(b"y"), Value::string("q"));

                let mut args = BTreeMap::new();
                args.insert(Bytes::from_static(b"id"), sender);

                let name = match query {
                    Query::Ping => "ping",
                    Query::Store { key, value } => {
                        args.insert(Bytes::from_static(b"key"), Value::Bytes(key.clone()));
                        args.insert(Bytes::from_static(b"value"), Value::Bytes(value.clone()));
                        "store"
                    }
                    Query::FindValue { key } => {
                        args.insert(Bytes::from_static(b"key"), Value::Bytes(key.clone()));
                        "find_value"
                    }
                    Query::FindNode { target } => {
                        args.insert(
                            Bytes::from_static(b"target"),
                            Value::Bytes(Bytes::copy_from_slice(target.as_bytes())),
                        );
                        "find_node"
                    }
                };

                dict.insert(Bytes::from_static(b"q"), Value::string(name));
                dict.insert(Bytes::from_static(b"a"), Value::Dict(args));
            }
            Body::Response(response) => {
                dict.insert(Bytes::from_static(b"y"), Value::string("r"));

                let mut fields = BTreeMap::new();
                fields.insert(Bytes::from_static(b"id"), sender);

                match response {
                    Response::Pong => {}
                    Response::Stored => {
                        fields.insert(Bytes::from_static(b"stored"), Value::Integer(1));
                    }
                    Response::Value(value) => {
                        fields.insert(Bytes::from_static(b"value"), Value::Bytes(value.clone()));
                    }
                    Response::Nodes(nodes) => {
                        fields.insert(Bytes::from_static(b"nodes"), Value::Bytes(pack_nodes(nodes)));
                    }
                }

                dict.insert(Bytes::from_static(b"r"), Value::Dict(fields));
            }
        }

        encode(&Value::Dict(dict))
    }
}

fn pack_nodes(nodes: &[NodeId]) -> Bytes {
    let mut packed = Vec::with_capacity(nodes.len() * 20);
    for node in nodes {
        packed.extend_from_slice(node.as_bytes());
    }
    Bytes::from(packed)
}

fn unpack_nodes(packed: &[u8]) -> Vec<NodeId> {
    packed
        .chunks_exact(20)
        .filter_map(|chunk| NodeId::from_bytes(chunk).ok())
        .collect()
}
