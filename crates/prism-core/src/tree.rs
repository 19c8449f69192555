// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena-backed AST storage and structural mutators.
//!
//! One arena holds every node of a compiler instance: the externs tree, the
//! program tree, and all shadow subtrees. Slots are addressed by [`NodeId`]
//! and never reused; deleting a subtree tombstones its slots so stale ids
//! fail lookups instead of aliasing.
//!
//! Invariants maintained by every mutator:
//! - a child's `parent` back-link always agrees with the forward edge,
//! - a node appears at most once in one parent's child list,
//! - the shadow slot is not a child edge and is never traversed by
//!   [`AstTree::collect_subtree`] or the digest/equality walks.

use blake3::Hasher;

use crate::compiler::EngineError;
use crate::ident::{Hash, NodeId, ShadowId};
use crate::node::{AstNode, Attributes, NodeKind, NodeValue, SourceLocation};

const EMPTY_CHILDREN: &[NodeId] = &[];

/// Arena of AST nodes.
#[derive(Debug, Default)]
pub struct AstTree {
    pub(crate) slots: Vec<Option<AstNode>>,
}

impl AstTree {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_slots(slots: Vec<Option<AstNode>>) -> Self {
        Self { slots }
    }

    /// Allocates a node with no value payload.
    pub fn new_node(&mut self, kind: NodeKind, loc: SourceLocation) -> NodeId {
        self.alloc(AstNode::new(kind, None, loc))
    }

    /// Allocates a value-bearing node (`Name`, `Str`, `Number`, …).
    pub fn new_node_with_value(
        &mut self,
        kind: NodeKind,
        value: NodeValue,
        loc: SourceLocation,
    ) -> NodeId {
        self.alloc(AstNode::new(kind, Some(value), loc))
    }

    fn alloc(&mut self, node: AstNode) -> NodeId {
        let id = NodeId::from_index(self.slots.len());
        self.slots.push(Some(node));
        id
    }

    /// Returns `true` when `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&AstNode, EngineError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(EngineError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut AstNode, EngineError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(EngineError::UnknownNode(id))
    }

    /// Token kind of a live node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).ok().map(|n| n.kind)
    }

    /// Value payload of a live node.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<NodeValue> {
        self.node(id).ok().and_then(|n| n.value)
    }

    /// Source location of a live node.
    #[must_use]
    pub fn loc(&self, id: NodeId) -> Option<SourceLocation> {
        self.node(id).ok().map(|n| n.loc)
    }

    /// Parent back-link of a live node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    /// Ordered children of a node; empty for dead ids.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(EMPTY_CHILDREN, |n| n.children.as_slice())
    }

    /// Attribute slots of a live node.
    #[must_use]
    pub fn attrs(&self, id: NodeId) -> Option<&Attributes> {
        self.node(id).ok().map(|n| &n.attrs)
    }

    /// Mutable attribute slots, for the construction phase.
    ///
    /// Passes must route attribute writes through the pass context instead so
    /// the change timeline observes them.
    pub fn attrs_mut(&mut self, id: NodeId) -> Option<&mut Attributes> {
        self.node_mut(id).ok().map(|n| &mut n.attrs)
    }

    /// Shadow slot of a node, when occupied.
    #[must_use]
    pub fn shadow_slot(&self, id: NodeId) -> Option<ShadowId> {
        self.node(id).ok().and_then(|n| n.shadow)
    }

    pub(crate) fn set_shadow_slot(
        &mut self,
        id: NodeId,
        shadow: Option<ShadowId>,
    ) -> Result<(), EngineError> {
        self.node_mut(id)?.shadow = shadow;
        Ok(())
    }

    /// Replaces the value payload of a node.
    pub fn set_value(&mut self, id: NodeId, value: Option<NodeValue>) -> Result<(), EngineError> {
        self.node_mut(id)?.value = value;
        Ok(())
    }

    /// Returns `true` when `maybe_ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, maybe_ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(c) = cur {
            if c == maybe_ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    /// Appends `child` to `parent`'s child list.
    ///
    /// `child` must be parentless and must not be an ancestor of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        self.check_attachable(parent, child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Inserts `new` immediately before `anchor` in the anchor's parent.
    pub fn insert_before(&mut self, anchor: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.insert_adjacent(anchor, new, 0)
    }

    /// Inserts `new` immediately after `anchor` in the anchor's parent.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.insert_adjacent(anchor, new, 1)
    }

    fn insert_adjacent(
        &mut self,
        anchor: NodeId,
        new: NodeId,
        offset: usize,
    ) -> Result<(), EngineError> {
        let parent = self.node(anchor)?.parent.ok_or(EngineError::NoParent(anchor))?;
        self.check_attachable(parent, new)?;
        let pos = self.child_position(parent, anchor)?;
        self.node_mut(parent)?.children.insert(pos + offset, new);
        self.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        if self.node(child)?.parent.is_some() {
            return Err(EngineError::NodeAttached(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(EngineError::CycleDetected(child));
        }
        Ok(())
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> Result<usize, EngineError> {
        self.node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(EngineError::StructuralInvariant {
                node: Some(child),
                detail: "child missing from its parent's child list",
            })
    }

    /// Detaches `id` from its parent, leaving the subtree alive and rootless.
    pub fn detach(&mut self, id: NodeId) -> Result<(), EngineError> {
        let parent = self.node(id)?.parent.ok_or(EngineError::NoParent(id))?;
        let pos = self.child_position(parent, id)?;
        self.node_mut(parent)?.children.remove(pos);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Puts `new` in `old`'s tree position; `old` becomes a rootless live subtree.
    ///
    /// This is the non-consuming exchange used by the shadow wrap/unwrap
    /// lifecycle. Pass-facing replacement goes through the context, which also
    /// deletes the displaced subtree.
    pub fn swap_subtree(&mut self, old: NodeId, new: NodeId) -> Result<(), EngineError> {
        let parent = self.node(old)?.parent.ok_or(EngineError::NoParent(old))?;
        self.check_attachable(parent, new)?;
        let pos = self.child_position(parent, old)?;
        self.node_mut(old)?.parent = None;
        self.node_mut(parent)?.children[pos] = new;
        self.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    /// Collects `root` and every descendant reachable through child edges,
    /// pre-order. Shadow slots are not descended.
    #[must_use]
    pub fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            out.push(id);
            // Reverse so pre-order pops children left to right.
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Tombstones a single slot. Callers are responsible for edges.
    pub(crate) fn free(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterates live node ids in allocation order.
    pub fn iter_live(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| NodeId::from_index(i)))
    }

    /// Structural equivalence of two subtrees: kind, value payload, attribute
    /// slots, and child shape, ignoring source locations and shadow slots.
    #[must_use]
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> bool {
        let (Ok(na), Ok(nb)) = (self.node(a), self.node(b)) else {
            return false;
        };
        if na.kind != nb.kind
            || na.value != nb.value
            || na.attrs != nb.attrs
            || na.children.len() != nb.children.len()
        {
            return false;
        }
        na.children
            .iter()
            .zip(nb.children.iter())
            .all(|(&ca, &cb)| self.structural_eq(ca, cb))
    }

    /// Canonical digest of a subtree.
    ///
    /// Encoding is explicit and stable: pre-order walk, per node a kind tag,
    /// a value presence tag + fixed-width payload, the attribute slots, and a
    /// little-endian child count. Locations and shadow slots are excluded, so
    /// the digest matches exactly when [`Self::structural_eq`] holds.
    #[must_use]
    pub fn subtree_digest(&self, root: NodeId) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(b"prism:subtree:v1");
        for id in self.collect_subtree(root) {
            if let Ok(node) = self.node(id) {
                hash_node(&mut hasher, node);
            }
        }
        hasher.finalize().into()
    }
}

fn hash_node(hasher: &mut Hasher, node: &AstNode) {
    hasher.update(&[kind_tag(node.kind)]);
    match node.value {
        None => {
            hasher.update(&[0]);
        }
        Some(NodeValue::Str(sym)) => {
            hasher.update(&[1]);
            hasher.update(&sym_bytes(sym));
        }
        Some(NodeValue::Number(n)) => {
            hasher.update(&[2]);
            hasher.update(&n.to_bits().to_le_bytes());
        }
        Some(NodeValue::Bool(b)) => {
            hasher.update(&[3, u8::from(b)]);
        }
    }
    hash_attrs(hasher, &node.attrs);
    let child_count = u64::try_from(node.children.len()).unwrap_or(u64::MAX);
    hasher.update(&child_count.to_le_bytes());
}

fn hash_attrs(hasher: &mut Hasher, attrs: &Attributes) {
    let flags = u8::from(attrs.declared_const)
        | (u8::from(attrs.inferred_const) << 1)
        | (u8::from(attrs.exported) << 2)
        | (u8::from(attrs.isolated) << 3);
    hasher.update(&[flags]);
    hash_opt_sym(hasher, attrs.declared_type);
    hash_opt_sym(hasher, attrs.jsdoc);
    match &attrs.resolved_module {
        None => {
            hasher.update(&[0]);
        }
        Some(path) => {
            let bytes = path.to_string_lossy();
            hasher.update(&[1]);
            let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
            hasher.update(&len.to_le_bytes());
            hasher.update(bytes.as_bytes());
        }
    }
}

fn hash_opt_sym(hasher: &mut Hasher, sym: Option<crate::intern::Symbol>) {
    match sym {
        None => {
            hasher.update(&[0]);
        }
        Some(s) => {
            hasher.update(&[1]);
            hasher.update(&sym_bytes(s));
        }
    }
}

fn sym_bytes(sym: crate::intern::Symbol) -> [u8; 4] {
    // Symbols hash as their raw u32; the interner snapshot travels with the
    // persisted state, so the mapping is stable for a given compiler.
    sym.raw().to_le_bytes()
}

fn kind_tag(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Program => 0,
        NodeKind::Script => 1,
        NodeKind::ModuleBody => 2,
        NodeKind::Function => 3,
        NodeKind::ParamList => 4,
        NodeKind::Block => 5,
        NodeKind::Var => 6,
        NodeKind::Name => 7,
        NodeKind::Number => 8,
        NodeKind::Str => 9,
        NodeKind::Null => 10,
        NodeKind::True => 11,
        NodeKind::False => 12,
        NodeKind::Assign => 13,
        NodeKind::ExprResult => 14,
        NodeKind::Return => 15,
        NodeKind::If => 16,
        NodeKind::Switch => 17,
        NodeKind::Case => 18,
        NodeKind::ForIn => 19,
        NodeKind::ForOf => 20,
        NodeKind::Try => 21,
        NodeKind::Catch => 22,
        NodeKind::Call => 23,
        NodeKind::OptChainCall => 24,
        NodeKind::GetProp => 25,
        NodeKind::OptChainGetProp => 26,
        NodeKind::ObjectLit => 27,
        NodeKind::StringKey => 28,
        NodeKind::Class => 29,
        NodeKind::Export => 30,
        NodeKind::Import => 31,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::intern::FileTable;

    fn loc(files: &mut FileTable) -> SourceLocation {
        SourceLocation::new(files.add("test.js"), 1, 0)
    }

    #[test]
    fn append_and_detach_keep_back_links_consistent() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let root = tree.new_node(NodeKind::Script, l);
        let a = tree.new_node(NodeKind::Block, l);
        let b = tree.new_node(NodeKind::Block, l);
        tree.append_child(root, a).unwrap();
        tree.append_child(root, b).unwrap();
        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.parent(a), Some(root));

        tree.detach(a).unwrap();
        assert_eq!(tree.children(root), &[b]);
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn attaching_an_attached_node_fails() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let root = tree.new_node(NodeKind::Script, l);
        let a = tree.new_node(NodeKind::Block, l);
        tree.append_child(root, a).unwrap();
        let err = tree.append_child(root, a).unwrap_err();
        assert!(matches!(err, EngineError::NodeAttached(n) if n == a));
    }

    #[test]
    fn attaching_an_ancestor_is_a_cycle() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let root = tree.new_node(NodeKind::Script, l);
        let a = tree.new_node(NodeKind::Block, l);
        tree.append_child(root, a).unwrap();
        tree.detach(a).unwrap();
        // root under a, then a back under root's subtree would be fine; a
        // under itself is not.
        let err = tree.append_child(a, a).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected(_)));
    }

    #[test]
    fn insert_before_and_after_position_correctly() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let root = tree.new_node(NodeKind::Script, l);
        let mid = tree.new_node(NodeKind::Block, l);
        tree.append_child(root, mid).unwrap();
        let first = tree.new_node(NodeKind::Var, l);
        let last = tree.new_node(NodeKind::Return, l);
        tree.insert_before(mid, first).unwrap();
        tree.insert_after(mid, last).unwrap();
        assert_eq!(tree.children(root), &[first, mid, last]);
    }

    #[test]
    fn swap_subtree_leaves_old_alive_and_rootless() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let root = tree.new_node(NodeKind::Script, l);
        let old = tree.new_node(NodeKind::Block, l);
        tree.append_child(root, old).unwrap();
        let new = tree.new_node(NodeKind::Block, l);
        tree.swap_subtree(old, new).unwrap();
        assert_eq!(tree.children(root), &[new]);
        assert!(tree.contains(old));
        assert_eq!(tree.parent(old), None);
    }

    #[test]
    fn digest_matches_structural_equality() {
        let mut files = FileTable::new();
        let l = loc(&mut files);
        let mut tree = AstTree::new();
        let a = tree.new_node_with_value(NodeKind::Number, NodeValue::Number(1.0), l);
        let b = tree.new_node_with_value(NodeKind::Number, NodeValue::Number(1.0), l);
        let c = tree.new_node_with_value(NodeKind::Number, NodeValue::Number(2.0), l);
        assert!(tree.structural_eq(a, b));
        assert_eq!(tree.subtree_digest(a), tree.subtree_digest(b));
        assert!(!tree.structural_eq(a, c));
        assert_ne!(tree.subtree_digest(a), tree.subtree_digest(c));
    }
}
