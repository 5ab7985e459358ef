use crate::error::DhtError;
use crate::ID_BITS;
use rand::Rng as _;
use sha1::{Digest, Sha1};
use std::fmt;

const LEN: usize = ID_BITS / 8;

/// A 160-bit node identifier.
///
/// Identifies a peer, or (when derived from a storage key via [`NodeId::hash_of`])
/// a target location in the same address space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; LEN]);

impl NodeId {
    pub fn generate() -> Self {
        let mut id = [0u8; LEN];
        rand::rng().fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        if bytes.len() != LEN {
            return Err(DhtError::InvalidNodeId);
        }
        let mut id = [0u8; LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; LEN] {
        &self.0
    }

    /// Derives the identifier-shaped location of a storage key (SHA-1).
    pub fn hash_of(key: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(key);
        Self(hasher.finalize().into())
    }

    /// XOR distance to another identifier.
    ///
    /// Symmetric, zero iff the identifiers are equal, and for any `a` and
    /// magnitude `d` exactly one `b` satisfies `a.distance(&b) == d`.
    pub fn distance(&self, other: &NodeId) -> Distance {
        let mut dist = [0u8; LEN];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        Distance(dist)
    }

    /// Which bucket of our routing table `other` belongs in: the position of
    /// the highest set bit of the distance, so farther peers land in
    /// higher-indexed buckets. Zero distance clamps to bucket 0; a node never
    /// routes to itself, so that index is never used.
    pub fn bucket_index(&self, other: &NodeId) -> usize {
        self.distance(other).bit_length().saturating_sub(1)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// XOR distance between two identifiers, ordered as an unsigned magnitude.
///
/// Big-endian byte order, so the derived lexicographic `Ord` matches numeric
/// comparison of the 160-bit value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance(pub [u8; LEN]);

impl Distance {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Number of bits needed to represent the magnitude; 0 for zero distance.
    pub fn bit_length(&self) -> usize {
        for (i, &byte) in self.0.iter().enumerate() {
            if byte != 0 {
                return (LEN - i) * 8 - byte.leading_zeros() as usize;
            }
        }
        0
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
