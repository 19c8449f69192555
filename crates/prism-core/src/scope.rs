// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scope resolution: every node maps to its nearest enclosing scope root.
//!
//! Scope roots are structural (program, script, function literal, loadable
//! module body). A rootless node that is not itself a scope-root kind — a
//! shadow root, or a subtree mid-splice — anchors scopes for its own subtree.

use std::collections::BTreeSet;

use crate::ident::NodeId;
use crate::tree::AstTree;

/// Resolves the nearest enclosing scope root of `node`, itself included.
///
/// Returns `None` only for dead ids.
#[must_use]
pub fn enclosing_scope(tree: &AstTree, node: NodeId) -> Option<NodeId> {
    let mut cur = node;
    loop {
        let kind = tree.kind(cur)?;
        if kind.is_scope_root() {
            return Some(cur);
        }
        match tree.parent(cur) {
            Some(p) => cur = p,
            // Top of a detached or shadow subtree: the root anchors the scope.
            None => return Some(cur),
        }
    }
}

/// Collects every scope root inside the subtree under `root`, `root` included.
///
/// Walks child edges only; shadow slots are not descended.
#[must_use]
pub fn collect_scope_roots(tree: &AstTree, root: NodeId) -> BTreeSet<NodeId> {
    let mut out = BTreeSet::new();
    for id in tree.collect_subtree(root) {
        if id == root || tree.kind(id).is_some_and(|k| k.is_scope_root()) {
            out.insert(id);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::intern::FileTable;
    use crate::node::{NodeKind, SourceLocation};

    #[test]
    fn blocks_are_not_scope_roots() {
        let mut files = FileTable::new();
        let l = SourceLocation::new(files.add("a.js"), 1, 0);
        let mut tree = AstTree::new();
        let script = tree.new_node(NodeKind::Script, l);
        let func = tree.new_node(NodeKind::Function, l);
        let block = tree.new_node(NodeKind::Block, l);
        let var = tree.new_node(NodeKind::Var, l);
        tree.append_child(script, func).unwrap();
        tree.append_child(func, block).unwrap();
        tree.append_child(block, var).unwrap();

        assert_eq!(enclosing_scope(&tree, var), Some(func));
        assert_eq!(enclosing_scope(&tree, block), Some(func));
        assert_eq!(enclosing_scope(&tree, func), Some(func));
        assert_eq!(enclosing_scope(&tree, script), Some(script));
    }

    #[test]
    fn scope_roots_of_a_script_include_nested_functions() {
        let mut files = FileTable::new();
        let l = SourceLocation::new(files.add("a.js"), 1, 0);
        let mut tree = AstTree::new();
        let script = tree.new_node(NodeKind::Script, l);
        let f1 = tree.new_node(NodeKind::Function, l);
        let f2 = tree.new_node(NodeKind::Function, l);
        tree.append_child(script, f1).unwrap();
        tree.append_child(f1, f2).unwrap();

        let roots = collect_scope_roots(&tree, script);
        assert_eq!(roots, [script, f1, f2].into_iter().collect());
    }
}
