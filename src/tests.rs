use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::id::{Distance, NodeId};
use crate::lookup::{iterative_find_node, LookupConfig};
use crate::message::{Body, Message, Query, Response};
use crate::node::DhtNode;
use crate::registry::Registry;
use crate::routing::RoutingTable;
use crate::storage::LocalStore;
use crate::transport::Transport;

fn nid(n: u8) -> NodeId {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    NodeId(bytes)
}

#[test]
fn test_distance_symmetric_and_zero_on_self() {
    let a = NodeId::generate();
    let b = NodeId::generate();

    assert_eq!(a.distance(&b), b.distance(&a));
    assert!(a.distance(&a).is_zero());
    assert!(!a.distance(&b).is_zero());
}

#[test]
fn test_distance_identifies_unique_point() {
    let a = NodeId::generate();
    let d = nid(0x3C);

    // XOR is self-inverse: a ^ d is the single id at distance d from a
    let mut b_bytes = [0u8; 20];
    for (i, byte) in b_bytes.iter_mut().enumerate() {
        *byte = a.0[i] ^ d.0[i];
    }
    let b = NodeId(b_bytes);

    assert_eq!(a.distance(&b), Distance(d.0));
    assert_eq!(b.distance(&a), Distance(d.0));
}

#[test]
fn test_bucket_index_monotonic_in_distance() {
    let our = nid(0);

    let mut far_bytes = [0u8; 20];
    far_bytes[18] = 1; // distance 256
    let others = [nid(1), nid(2), nid(3), nid(0x10), nid(0x80), NodeId(far_bytes)];

    let indices: Vec<usize> = others.iter().map(|o| our.bucket_index(o)).collect();
    let mut sorted = indices.clone();
    sorted.sort();

    assert_eq!(indices, sorted);
    assert_eq!(indices[0], 0);
    assert_eq!(indices[5], 8);
}

#[test]
fn test_bucket_index_groups_by_magnitude() {
    let our = nid(0);

    for n in 0x10..=0x1F {
        assert_eq!(our.bucket_index(&nid(n)), 4);
    }
}

#[test]
fn test_bucket_evicts_least_recently_seen() {
    // 0x10..0x13 all land in the same bucket relative to an all-zero id
    let table = RoutingTable::with_bucket_size(nid(0), 3);
    table.insert(nid(0x10));
    table.insert(nid(0x11));
    table.insert(nid(0x12));
    assert_eq!(table.node_count(), 3);

    table.insert(nid(0x13));

    assert_eq!(table.node_count(), 3);
    assert!(!table.contains(&nid(0x10)));
    assert_eq!(table.all_nodes(), vec![nid(0x11), nid(0x12), nid(0x13)]);
}

#[test]
fn test_bucket_reinsert_moves_to_tail() {
    let table = RoutingTable::with_bucket_size(nid(0), 3);
    table.insert(nid(0x10));
    table.insert(nid(0x11));
    table.insert(nid(0x12));

    // re-seeing 0x10 refreshes it, so 0x11 is now the oldest
    table.insert(nid(0x10));
    table.insert(nid(0x13));

    assert!(!table.contains(&nid(0x11)));
    assert_eq!(table.all_nodes(), vec![nid(0x12), nid(0x10), nid(0x13)]);
}

#[test]
fn test_routing_table_ignores_own_id() {
    let table = RoutingTable::new(nid(7));
    table.insert(nid(7));

    assert_eq!(table.node_count(), 0);
}

#[test]
fn test_find_closest_sorted_and_bounded() {
    let table = RoutingTable::new(nid(0));
    for n in 1..=10 {
        table.insert(nid(n));
    }

    let target = nid(5);
    let closest = table.find_closest(&target, 3);
    assert_eq!(closest, vec![nid(5), nid(4), nid(7)]);

    // asking for more than is known returns everything, still sorted
    let all = table.find_closest(&target, 50);
    assert_eq!(all.len(), 10);
    let distances: Vec<Distance> = all.iter().map(|n| target.distance(n)).collect();
    let mut sorted = distances.clone();
    sorted.sort();
    assert_eq!(distances, sorted);
}

#[test]
fn test_find_closest_on_empty_table() {
    let table = RoutingTable::new(nid(0));
    assert!(table.find_closest(&nid(5), 8).is_empty());
}

#[test]
fn test_store_and_find_value() {
    let store = LocalStore::new();
    assert!(store.is_empty());
    assert_eq!(store.find_value(b"k1"), None);

    store.store(b"k1", Bytes::from_static(b"v1"));
    assert_eq!(store.find_value(b"k1"), Some(Bytes::from_static(b"v1")));
    assert_eq!(store.len(), 1);

    // last write wins
    store.store(b"k1", Bytes::from_static(b"v2"));
    assert_eq!(store.find_value(b"k1"), Some(Bytes::from_static(b"v2")));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_lookup_local_hit() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(0x10))).unwrap();

    x.store(b"k1", Bytes::from_static(b"v1"));

    assert_eq!(
        registry.lookup(x.id(), b"k1"),
        Some(Bytes::from_static(b"v1"))
    );
}

#[test]
fn test_lookup_via_remote_candidate() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(0x10))).unwrap();
    let y = registry.add_node(DhtNode::new(nid(0x20))).unwrap();

    registry.bootstrap(&x, y.id());
    assert!(x.routing().contains(y.id()));
    assert!(y.routing().contains(x.id()));

    y.store(b"k2", Bytes::from_static(b"v2"));

    assert_eq!(
        registry.lookup(x.id(), b"k2"),
        Some(Bytes::from_static(b"v2"))
    );
}

#[test]
fn test_lookup_skips_removed_candidate() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(0x10))).unwrap();
    let y = registry.add_node(DhtNode::new(nid(0x20))).unwrap();

    registry.bootstrap(&x, y.id());
    y.store(b"k2", Bytes::from_static(b"v2"));

    registry.remove_node(y.id());

    // x still carries the stale identifier; the lookup skips it quietly
    assert!(x.routing().contains(y.id()));
    assert_eq!(registry.lookup(x.id(), b"k2"), None);
}

#[test]
fn test_lookup_unknown_origin() {
    let registry = Registry::new();
    assert_eq!(registry.lookup(&nid(0x99), b"k1"), None);
}

#[test]
fn test_lookup_with_no_knowledge() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(0x10))).unwrap();

    assert_eq!(registry.lookup(x.id(), b"missing"), None);
}

#[test]
fn test_registry_rejects_duplicate_id() {
    let registry = Registry::new();
    registry.add_node(DhtNode::new(nid(1))).unwrap();

    assert!(registry.add_node(DhtNode::new(nid(1))).is_err());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_bootstrap_against_unknown_peer_is_noop() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(1))).unwrap();

    registry.bootstrap(&x, &nid(0x99));

    assert_eq!(x.routing().node_count(), 0);
}

#[test]
fn test_inbound_query_inserts_sender() {
    let x = DhtNode::new(nid(0x10));

    let response = x.handle(nid(7), Query::Ping);

    assert!(matches!(response, Response::Pong));
    assert!(x.routing().contains(&nid(7)));
}

#[test]
fn test_find_value_miss_answers_with_closest() {
    let x = DhtNode::new(nid(0x10));
    x.insert_peer(nid(0x20));
    x.insert_peer(nid(0x30));

    let query = Query::FindValue {
        key: Bytes::from_static(b"absent"),
    };
    match x.handle(nid(0x40), query) {
        Response::Nodes(nodes) => {
            assert!(nodes.contains(&nid(0x20)));
            assert!(nodes.contains(&nid(0x30)));
            // the sender was inserted before the answer was computed
            assert!(nodes.contains(&nid(0x40)));
        }
        other => panic!("expected nodes, got {:?}", other),
    }
}

#[test]
fn test_message_ping_round_trip() {
    let sender = NodeId::generate();
    let tid = Bytes::from_static(b"aa");

    let msg = Message::query(tid.clone(), sender, Query::Ping);
    let parsed = Message::parse(&msg.encode()).unwrap();

    assert_eq!(parsed.transaction_id, tid);
    assert_eq!(parsed.sender, sender);
    assert!(matches!(parsed.body, Body::Query(Query::Ping)));
}

#[test]
fn test_message_store_round_trip() {
    let sender = NodeId::generate();
    let tid = Bytes::from_static(b"bb");

    let msg = Message::query(
        tid.clone(),
        sender,
        Query::Store {
            key: Bytes::from_static(b"k"),
            value: Bytes::from_static(b"v"),
        },
    );
    let parsed = Message::parse(&msg.encode()).unwrap();

    assert_eq!(parsed.transaction_id, tid);
    match parsed.body {
        Body::Query(Query::Store { key, value }) => {
            assert_eq!(key, Bytes::from_static(b"k"));
            assert_eq!(value, Bytes::from_static(b"v"));
        }
        other => panic!("wrong body: {:?}", other),
    }
}

#[test]
fn test_message_find_node_round_trip() {
    let sender = NodeId::generate();
    let target = NodeId::generate();
    let tid = Bytes::from_static(b"cc");

    let msg = Message::query(tid, sender, Query::FindNode { target });
    let parsed = Message::parse(&msg.encode()).unwrap();

    match parsed.body {
        Body::Query(Query::FindNode { target: t }) => assert_eq!(t, target),
        other => panic!("wrong body: {:?}", other),
    }
}

#[test]
fn test_message_response_round_trips() {
    let sender = NodeId::generate();
    let tid = Bytes::from_static(b"dd");

    let nodes = vec![nid(1), nid(2), nid(3)];
    let msg = Message::response(tid.clone(), sender, Response::Nodes(nodes.clone()));
    let parsed = Message::parse(&msg.encode()).unwrap();
    match parsed.body {
        Body::Response(Response::Nodes(parsed_nodes)) => assert_eq!(parsed_nodes, nodes),
        other => panic!("wrong body: {:?}", other),
    }

    let msg = Message::response(tid.clone(), sender, Response::Value(Bytes::from_static(b"v")));
    let parsed = Message::parse(&msg.encode()).unwrap();
    match parsed.body {
        Body::Response(Response::Value(value)) => assert_eq!(value, Bytes::from_static(b"v")),
        other => panic!("wrong body: {:?}", other),
    }

    let msg = Message::response(tid, sender, Response::Stored);
    let parsed = Message::parse(&msg.encode()).unwrap();
    assert!(matches!(parsed.body, Body::Response(Response::Stored)));
}

#[test]
fn test_handle_message_answers_query() {
    let x = DhtNode::new(nid(0x10));
    x.store(b"k", Bytes::from_static(b"v"));

    let tid = Bytes::from_static(b"ee");
    let msg = Message::query(
        tid.clone(),
        nid(7),
        Query::FindValue {
            key: Bytes::from_static(b"k"),
        },
    );

    let reply = x.handle_message(msg).unwrap();
    assert_eq!(reply.transaction_id, tid);
    assert_eq!(reply.sender, *x.id());
    assert!(matches!(
        reply.body,
        Body::Response(Response::Value(ref v)) if v == &Bytes::from_static(b"v")
    ));
}

#[test]
fn test_handle_message_response_feeds_discovery() {
    let x = DhtNode::new(nid(0x10));

    let msg = Message::response(Bytes::from_static(b"ff"), nid(9), Response::Pong);
    assert!(x.handle_message(msg).is_none());
    assert!(x.routing().contains(&nid(9)));
}

#[test]
fn test_iterative_lookup_walks_the_frontier() {
    let registry = Registry::new();
    let a = registry.add_node(DhtNode::new(nid(0x01))).unwrap();
    let b = registry.add_node(DhtNode::new(nid(0x02))).unwrap();
    let c = registry.add_node(DhtNode::new(nid(0x03))).unwrap();
    let d = registry.add_node(DhtNode::new(nid(0x04))).unwrap();

    a.insert_peer(*b.id());
    b.insert_peer(*c.id());
    c.insert_peer(*d.id());
    d.store(b"deep", Bytes::from_static(b"treasure"));

    // one hop of candidates is not enough to reach d
    assert_eq!(registry.lookup(a.id(), b"deep"), None);

    let config = LookupConfig::default();
    assert_eq!(
        registry.iterative_lookup(a.id(), b"deep", &config),
        Some(Bytes::from_static(b"treasure"))
    );
}

#[test]
fn test_iterative_find_node_converges_on_target() {
    let registry = Registry::new();
    let a = registry.add_node(DhtNode::new(nid(0x01))).unwrap();
    let b = registry.add_node(DhtNode::new(nid(0x02))).unwrap();
    let c = registry.add_node(DhtNode::new(nid(0x03))).unwrap();
    let d = registry.add_node(DhtNode::new(nid(0x04))).unwrap();

    a.insert_peer(*b.id());
    b.insert_peer(*c.id());
    c.insert_peer(*d.id());

    let seeds = vec![*b.id()];
    let found = iterative_find_node(
        &registry,
        a.id(),
        &seeds,
        d.id(),
        &LookupConfig::default(),
    );

    assert_eq!(found.first(), Some(d.id()));
}

#[test]
fn test_iterative_lookup_deadline_gives_up() {
    let registry = Registry::new();
    let a = registry.add_node(DhtNode::new(nid(0x01))).unwrap();
    let b = registry.add_node(DhtNode::new(nid(0x02))).unwrap();

    a.insert_peer(*b.id());
    b.store(b"deep", Bytes::from_static(b"treasure"));

    let config = LookupConfig {
        deadline: Some(Duration::ZERO),
        ..Default::default()
    };
    assert_eq!(registry.iterative_lookup(a.id(), b"deep", &config), None);
}

#[test]
fn test_remote_store_and_ping_through_transport() {
    let registry = Registry::new();
    let x = registry.add_node(DhtNode::new(nid(1))).unwrap();
    let y = registry.add_node(DhtNode::new(nid(2))).unwrap();

    registry.ping(x.id(), y.id()).unwrap();
    registry
        .store(x.id(), y.id(), b"k", Bytes::from_static(b"v"))
        .unwrap();

    assert_eq!(y.find_value(b"k"), Some(Bytes::from_static(b"v")));
    // both operations announced x to y
    assert!(y.routing().contains(x.id()));

    assert!(registry.ping(x.id(), &nid(0x99)).is_err());
}

#[test]
fn test_concurrent_stores_and_lookups() {
    use std::thread;

    let registry = Arc::new(Registry::new());
    let a = registry.add_node(DhtNode::new(nid(1))).unwrap();
    let b = registry.add_node(DhtNode::new(nid(2))).unwrap();
    registry.bootstrap(&a, &nid(2));

    let mut handles = Vec::new();
    for i in 0..4u8 {
        let registry = Arc::clone(&registry);
        let writer = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
        handles.push(thread::spawn(move || {
            let key = vec![i];
            writer.store(&key, Bytes::from(vec![i; 4]));
            registry.lookup(writer.id(), &key)
        }));
    }

    for handle in handles {
        assert!(handle.join().unwrap().is_some());
    }
}
