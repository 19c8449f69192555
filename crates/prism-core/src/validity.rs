// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structure validity checking.
//!
//! Verifies the invariants every pass must preserve:
//! - forward edges and parent back-links agree, with no duplicate children,
//! - the externs/program roots and every shadow root are parentless,
//! - shadow slots and the shadow registry describe the same attachments,
//! - every live node belongs to exactly one region: the main tree or one
//!   shadow (a detached subtree left behind at a pass boundary fails here).
//!
//! A failure is a structural invariant violation and is fatal to the
//! pipeline; the offending node is named.

use std::collections::BTreeSet;

use crate::change::ChangeSet;
use crate::compiler::{Compiler, EngineError};
use crate::cx::PassCx;
use crate::ident::NodeId;
use crate::pass::{CompilerPass, PassRecord, PassResult};

/// Runs the full structure check over the compiler's forest.
pub fn verify_structure(compiler: &Compiler) -> Result<(), EngineError> {
    let tree = compiler.tree();

    for root in [compiler.externs_root(), compiler.program_root()] {
        if !tree.contains(root) {
            return Err(EngineError::StructuralInvariant {
                node: Some(root),
                detail: "main tree root is dead",
            });
        }
        if tree.parent(root).is_some() {
            return Err(EngineError::StructuralInvariant {
                node: Some(root),
                detail: "main tree root has a parent",
            });
        }
    }

    // Edge consistency over every live node.
    for node in tree.iter_live() {
        let mut seen = BTreeSet::new();
        for &child in tree.children(node) {
            if !tree.contains(child) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(child),
                    detail: "child edge points at a dead node",
                });
            }
            if !seen.insert(child) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(child),
                    detail: "node appears twice in one child list",
                });
            }
            if tree.parent(child) != Some(node) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(child),
                    detail: "parent back-link disagrees with forward edge",
                });
            }
        }
        if let Some(parent) = tree.parent(node) {
            if !tree.children(parent).contains(&node) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(node),
                    detail: "node's parent does not list it as a child",
                });
            }
        }
    }

    // Shadow slots and registry agree.
    for node in tree.iter_live() {
        if let Some(id) = tree.shadow_slot(node) {
            let entry = compiler
                .shadows()
                .entry(id)
                .ok_or(EngineError::StructuralInvariant {
                    node: Some(node),
                    detail: "shadow slot references an unregistered shadow",
                })?;
            if entry.host != node {
                return Err(EngineError::StructuralInvariant {
                    node: Some(node),
                    detail: "shadow registry host disagrees with the slot",
                });
            }
            if !tree.contains(entry.root) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(entry.root),
                    detail: "shadow root is dead",
                });
            }
            if tree.parent(entry.root).is_some() {
                return Err(EngineError::StructuralInvariant {
                    node: Some(entry.root),
                    detail: "shadow root has a parent in a tree",
                });
            }
        }
    }
    for entry in compiler.shadows().iter() {
        if tree.shadow_slot(entry.host) != Some(entry.id) {
            return Err(EngineError::StructuralInvariant {
                node: Some(entry.host),
                detail: "registered shadow is missing from its host's slot",
            });
        }
    }

    // Partition: every live node is reachable from exactly one region root.
    let mut covered: BTreeSet<NodeId> = BTreeSet::new();
    let mut region_roots = vec![compiler.externs_root(), compiler.program_root()];
    region_roots.extend(compiler.shadows().iter().map(|e| e.root));
    for root in region_roots {
        for node in tree.collect_subtree(root) {
            if !covered.insert(node) {
                return Err(EngineError::StructuralInvariant {
                    node: Some(node),
                    detail: "node is reachable from two region roots",
                });
            }
        }
    }
    for node in tree.iter_live() {
        if !covered.contains(&node) {
            return Err(EngineError::StructuralInvariant {
                node: Some(node),
                detail: "live node is not reachable from any region root",
            });
        }
    }

    Ok(())
}

/// Validity-check pass wrapping [`verify_structure`].
#[derive(Debug, Default)]
pub struct StructureCheckPass;

impl CompilerPass for StructureCheckPass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        _program_root: NodeId,
        _changed: &ChangeSet,
    ) -> PassResult {
        cx.verify_structure()
    }
}

/// Ready-made record for the structure check, registrable as an interleaved
/// validity check or at a fixed pipeline position.
#[must_use]
pub fn structure_check_record() -> PassRecord {
    PassRecord::validity_check("structure-check", StructureCheckPass)
}
