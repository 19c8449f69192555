// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shadow subtrees: registry and wrap/unwrap lifecycle passes.
//!
//! A shadow is an independently rooted AST fragment attached to a host node's
//! shadow slot. Its nodes belong to the shadow and to nothing else: scope
//! resolution and change marks for them stay inside the shadow, and main-tree
//! traversals never descend through a shadow slot.

use std::collections::BTreeMap;

use crate::compiler::EngineError;
use crate::cx::PassCx;
use crate::ident::{NodeId, ShadowId};
use crate::pass::{CompilerPass, PassResult};
use crate::tree::AstTree;

/// One registered shadow: its id, the main-tree host, and the shadow root.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShadowEntry {
    /// Registry identity.
    pub id: ShadowId,
    /// Host node in the main tree whose shadow slot holds this shadow.
    pub host: NodeId,
    /// Root of the shadow subtree; always parentless.
    pub root: NodeId,
}

/// Registry of attached shadow subtrees.
#[derive(Debug, Default)]
pub struct ShadowRegistry {
    entries: BTreeMap<ShadowId, ShadowEntry>,
    by_host: BTreeMap<NodeId, ShadowId>,
    roots: BTreeMap<NodeId, ShadowId>,
    next: u32,
}

impl ShadowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, host: NodeId, root: NodeId) -> ShadowId {
        let id = ShadowId::from_raw(self.next);
        self.next += 1;
        let entry = ShadowEntry { id, host, root };
        self.entries.insert(id, entry);
        self.by_host.insert(host, id);
        self.roots.insert(root, id);
        id
    }

    pub(crate) fn unregister_host(&mut self, host: NodeId) -> Option<ShadowEntry> {
        let id = self.by_host.remove(&host)?;
        let entry = self.entries.remove(&id)?;
        self.roots.remove(&entry.root);
        Some(entry)
    }

    pub(crate) fn unregister_id(&mut self, id: ShadowId) -> Option<ShadowEntry> {
        let entry = self.entries.remove(&id)?;
        self.by_host.remove(&entry.host);
        self.roots.remove(&entry.root);
        Some(entry)
    }

    /// Looks up the shadow attached to `host`, if any.
    #[must_use]
    pub fn shadow_for_host(&self, host: NodeId) -> Option<ShadowId> {
        self.by_host.get(&host).copied()
    }

    /// Looks up a registry entry.
    #[must_use]
    pub fn entry(&self, id: ShadowId) -> Option<&ShadowEntry> {
        self.entries.get(&id)
    }

    /// Returns the shadow whose subtree is rooted at `root`, if any.
    #[must_use]
    pub fn shadow_rooted_at(&self, root: NodeId) -> Option<ShadowId> {
        self.roots.get(&root).copied()
    }

    /// Decides shadow containment for `node` by walking its parent chain
    /// until a registered shadow root or the top is reached.
    #[must_use]
    pub fn shadow_of(&self, tree: &AstTree, node: NodeId) -> Option<ShadowId> {
        let mut cur = Some(node);
        while let Some(c) = cur {
            if let Some(id) = self.roots.get(&c) {
                return Some(*id);
            }
            cur = tree.parent(c);
        }
        None
    }

    /// Iterates registry entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ShadowEntry> {
        self.entries.values()
    }

    /// Number of attached shadows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no shadow is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn snapshot(&self) -> (Vec<ShadowEntry>, u32) {
        (self.entries.values().copied().collect(), self.next)
    }

    pub(crate) fn from_snapshot(entries: Vec<ShadowEntry>, next: u32) -> Self {
        let mut reg = Self {
            next,
            ..Self::default()
        };
        for entry in entries {
            reg.entries.insert(entry.id, entry);
            reg.by_host.insert(entry.host, entry.id);
            reg.roots.insert(entry.root, entry.id);
        }
        reg
    }
}

/// One-shot pass that moves every isolated-marked subtree behind a shadow.
///
/// Runs as the first pass of a wrapped pipeline prefix. Outermost markers
/// win: an isolated subtree nested inside another isolated subtree travels
/// with its ancestor.
#[derive(Debug, Default)]
pub struct WrapIsolatedPass;

impl CompilerPass for WrapIsolatedPass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        _program_root: NodeId,
        _changed: &crate::change::ChangeSet,
    ) -> PassResult {
        cx.wrap_isolated_subtrees().map(|_| ())
    }
}

/// One-shot pass that splices every shadow back over its host.
///
/// Runs as the last pass of a wrapped pipeline prefix; afterwards the main
/// tree is structurally equivalent to the pre-wrap tree modulo whatever the
/// passes in between rewrote.
#[derive(Debug, Default)]
pub struct UnwrapIsolatedPass;

impl CompilerPass for UnwrapIsolatedPass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        _program_root: NodeId,
        _changed: &crate::change::ChangeSet,
    ) -> PassResult {
        cx.unwrap_isolated_subtrees().map(|_| ())
    }
}

/// Convenience guard: `host` must not already carry a shadow.
pub(crate) fn ensure_slot_free(tree: &AstTree, host: NodeId) -> Result<(), EngineError> {
    if tree.shadow_slot(host).is_some() {
        return Err(EngineError::ShadowAlreadyPresent(host));
    }
    Ok(())
}
