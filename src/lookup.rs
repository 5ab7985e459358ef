use std::collections::HashSet;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::id::NodeId;
use crate::transport::{FindValueResult, Transport};
use crate::{ALPHA, K};

/// Upper bound on query rounds for a single lookup.
const MAX_ROUNDS: usize = 10;

/// Tuning for an iterative lookup.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// How many closest identifiers the search tracks and returns.
    pub count: usize,
    /// Unqueried candidates contacted per round.
    pub alpha: usize,
    /// Round budget before the search gives up.
    pub max_rounds: usize,
    /// Overall wall-clock budget. When it runs out the search reports what
    /// it has instead of blocking on further peers; `None` means unbounded.
    pub deadline: Option<Duration>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            count: K,
            alpha: ALPHA,
            max_rounds: MAX_ROUNDS,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LookupStats {
    /// Peers that answered.
    pub queried: usize,
    /// Peers skipped as unreachable.
    pub skipped: usize,
    pub rounds: usize,
}

/// Outcome of an iterative value lookup.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub value: Option<Bytes>,
    /// Closest identifiers seen, ascending by distance to the key's hash.
    pub closest: Vec<NodeId>,
    pub stats: LookupStats,
}

/// Searches for a value by advancing a frontier of closest-known candidates.
///
/// Each round queries up to `alpha` unqueried candidates nearest the key's
/// hash; a miss contributes the peer's own closest identifiers to the
/// frontier. The first peer that holds the value ends the search. The search
/// is exhausted when no unqueried candidate remains, the round budget is
/// spent, or the deadline passes. Unreachable peers are skipped, never fatal.
pub fn iterative_find_value<T: Transport>(
    transport: &T,
    origin: &NodeId,
    seeds: &[NodeId],
    key: &[u8],
    config: &LookupConfig,
) -> LookupResult {
    let target = NodeId::hash_of(key);
    let started = Instant::now();
    let mut stats = LookupStats::default();
    let mut shortlist = Shortlist::new(*origin, target, seeds, config.count);

    while stats.rounds < config.max_rounds {
        if deadline_passed(&started, config) {
            debug!(key_hash = %target, "lookup deadline reached, giving up");
            break;
        }

        let batch = shortlist.next_batch(config.alpha);
        if batch.is_empty() {
            break;
        }
        stats.rounds += 1;

        for peer in batch {
            match transport.find_value(origin, &peer, key) {
                Ok(FindValueResult::Found(value)) => {
                    stats.queried += 1;
                    debug!(peer = %peer, rounds = stats.rounds, "iterative lookup found value");
                    return LookupResult {
                        value: Some(value),
                        closest: shortlist.closest(),
                        stats,
                    };
                }
                Ok(FindValueResult::Closest(nodes)) => {
                    stats.queried += 1;
                    shortlist.merge(nodes);
                }
                Err(err) => {
                    stats.skipped += 1;
                    debug!(peer = %peer, error = %err, "candidate unreachable, skipping");
                }
            }
        }
    }

    LookupResult {
        value: None,
        closest: shortlist.closest(),
        stats,
    }
}

/// Finds the closest known identifiers to `target` by the same frontier
/// search, querying peers for their own closest nodes until no new
/// candidates turn up.
pub fn iterative_find_node<T: Transport>(
    transport: &T,
    origin: &NodeId,
    seeds: &[NodeId],
    target: &NodeId,
    config: &LookupConfig,
) -> Vec<NodeId> {
    let started = Instant::now();
    let mut rounds = 0;
    let mut shortlist = Shortlist::new(*origin, *target, seeds, config.count);

    while rounds < config.max_rounds {
        if deadline_passed(&started, config) {
            debug!(node_id = %target, "lookup deadline reached, giving up");
            break;
        }

        let batch = shortlist.next_batch(config.alpha);
        if batch.is_empty() {
            break;
        }
        rounds += 1;

        for peer in batch {
            match transport.find_node(origin, &peer, target) {
                Ok(nodes) => shortlist.merge(nodes),
                Err(err) => {
                    debug!(peer = %peer, error = %err, "candidate unreachable, skipping");
                }
            }
        }
    }

    shortlist.closest()
}

fn deadline_passed(started: &Instant, config: &LookupConfig) -> bool {
    config
        .deadline
        .is_some_and(|deadline| started.elapsed() >= deadline)
}

/// Candidates ordered by distance to the target, with query bookkeeping.
///
/// Capped at the configured count, so far-off discoveries fall away once
/// enough closer ones are known.
struct Shortlist {
    origin: NodeId,
    target: NodeId,
    capacity: usize,
    candidates: Vec<NodeId>,
    seen: HashSet<NodeId>,
    queried: HashSet<NodeId>,
}

impl Shortlist {
    fn new(origin: NodeId, target: NodeId, seeds: &[NodeId], capacity: usize) -> Self {
        let mut shortlist = Self {
            origin,
            target,
            capacity,
            candidates: Vec::new(),
            seen: HashSet::new(),
            queried: HashSet::new(),
        };
        shortlist.merge(seeds.to_vec());
        shortlist
    }

    fn merge(&mut self, nodes: Vec<NodeId>) {
        for node in nodes {
            if node == self.origin || !self.seen.insert(node) {
                continue;
            }
            self.candidates.push(node);
        }

        let target = self.target;
        self.candidates
            .sort_by(|a, b| target.distance(a).cmp(&target.distance(b)));
        self.candidates.truncate(self.capacity);
    }

    fn next_batch(&mut self, alpha: usize) -> Vec<NodeId> {
        let batch: Vec<NodeId> = self
            .candidates
            .iter()
            .filter(|node| !self.queried.contains(*node))
            .take(alpha)
            .copied()
            .collect();

        for peer in &batch {
            self.queried.insert(*peer);
        }
        batch
    }

    fn closest(&self) -> Vec<NodeId> {
        self.candidates.clone()
    }
}
