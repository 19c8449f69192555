// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit hash used throughout the engine for addressing passes
/// and for state/subtree digests.
pub type Hash = [u8; 32];

/// Canonical identifier for a registered pass.
///
/// `PassId` values are produced by [`make_pass_id`] which hashes the pass name
/// with a domain prefix (`blake3("pass:" || name)`). The canonical id is what
/// gets recorded as a mark author in the change timeline and as the key of the
/// persisted pass-timestamp map, so it stays stable across processes and
/// across save/restore.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct PassId(pub Hash);

impl PassId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// Short hex form used in errors and telemetry.
    #[must_use]
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[0..8])
    }
}

/// Produces a stable, domain-separated pass identifier (prefix `b"pass:"`) using BLAKE3.
pub fn make_pass_id(name: &str) -> PassId {
    let mut hasher = Hasher::new();
    hasher.update(b"pass:");
    hasher.update(name.as_bytes());
    PassId(hasher.finalize().into())
}

/// Compact, process-local pass identifier used on hot paths.
///
/// The pipeline maps canonical 256-bit pass ids to compact u32 handles at
/// registration time. These handles are never serialized; they are purely an
/// in-process acceleration (e.g. loop-controller run counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactPassId(pub u32);

/// Index of a node slot inside the AST arena.
///
/// Ids are allocated monotonically and never reused: a deleted node leaves a
/// tombstoned slot behind, so a stale `NodeId` can be detected instead of
/// silently aliasing a new node.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        // Arena growth is bounded far below u32::MAX in practice; saturate
        // rather than wrap so a pathological arena fails loudly on lookup.
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the arena slot index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a registered shadow subtree.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShadowId(u32);

impl ShadowId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_ids_are_domain_separated_and_stable() {
        let a = make_pass_id("inline-aliases");
        let b = make_pass_id("inline-aliases");
        let c = make_pass_id("dead-code");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.short_hex().len(), 16);
    }
}
