// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Synthetic passes for exercising the pipeline engine.
//!
//! Every pass records its invocations into a [`SharedLog`] so tests can
//! assert run counts and the exact change sets the engine handed over.

use std::cell::RefCell;
use std::rc::Rc;

use prism_core::{
    ChangeSet, CompilerPass, NodeId, NodeKind, NodeValue, PassCx, PassResult,
};

/// What a synthetic pass observed across its runs.
#[derive(Debug, Default)]
pub struct PassLog {
    /// How many times `process` ran.
    pub runs: u32,
    /// The change set handed to each run, in order.
    pub change_sets: Vec<Vec<NodeId>>,
}

/// Shared handle to a [`PassLog`].
pub type SharedLog = Rc<RefCell<PassLog>>;

/// Creates a fresh shared log.
#[must_use]
pub fn shared_log() -> SharedLog {
    Rc::new(RefCell::new(PassLog::default()))
}

fn record(log: &SharedLog, changed: &ChangeSet) {
    let mut log = log.borrow_mut();
    log.runs += 1;
    log.change_sets.push(changed.iter().copied().collect());
}

/// Which subtrees a literal-rewriting pass walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteTarget {
    /// The externs and program trees.
    Main,
    /// Every registered shadow subtree.
    Shadows,
}

/// Rewrites every `Number` literal equal to `from` into `to` within its
/// target region, reporting each rewrite.
#[derive(Debug)]
pub struct LiteralRewritePass {
    /// Literal value to rewrite.
    pub from: f64,
    /// Replacement value.
    pub to: f64,
    /// Region the pass walks.
    pub target: RewriteTarget,
    /// Run log.
    pub log: SharedLog,
}

impl CompilerPass for LiteralRewritePass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        externs_root: NodeId,
        program_root: NodeId,
        changed: &ChangeSet,
    ) -> PassResult {
        record(&self.log, changed);
        let roots: Vec<NodeId> = match self.target {
            RewriteTarget::Main => vec![externs_root, program_root],
            RewriteTarget::Shadows => cx.shadows().iter().map(|e| e.root).collect(),
        };
        for root in roots {
            for node in cx.tree().collect_subtree(root) {
                let is_match = cx.tree().kind(node) == Some(NodeKind::Number)
                    && matches!(cx.tree().value(node), Some(NodeValue::Number(n)) if n.to_bits() == self.from.to_bits());
                if is_match {
                    cx.set_value(node, Some(NodeValue::Number(self.to)))?;
                }
            }
        }
        Ok(())
    }
}

/// Reports a change at the program root on every run without touching the
/// tree; a loop containing it can never converge.
#[derive(Debug)]
pub struct AlwaysChangePass {
    /// Run log.
    pub log: SharedLog,
}

impl CompilerPass for AlwaysChangePass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        program_root: NodeId,
        changed: &ChangeSet,
    ) -> PassResult {
        record(&self.log, changed);
        cx.report_change(program_root)
    }
}

/// Observes its change sets and does nothing.
#[derive(Debug)]
pub struct NoOpPass {
    /// Run log.
    pub log: SharedLog,
}

impl CompilerPass for NoOpPass {
    fn process(
        &mut self,
        _cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        _program_root: NodeId,
        changed: &ChangeSet,
    ) -> PassResult {
        record(&self.log, changed);
        Ok(())
    }
}

/// Inlines one local alias: replaces `var <alias> = <original>;` initializers
/// with `null` and rewrites uses of the alias back to the original name.
///
/// The rewrite is idempotent: once the initializer is gone the pass finds no
/// alias declaration and reports nothing, so a loop around it converges.
#[derive(Debug)]
pub struct AliasInlinePass {
    /// Alias name to eliminate.
    pub alias: &'static str,
    /// Name the alias points at.
    pub original: &'static str,
    /// Run log.
    pub log: SharedLog,
}

impl CompilerPass for AliasInlinePass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        program_root: NodeId,
        changed: &ChangeSet,
    ) -> PassResult {
        record(&self.log, changed);
        let alias_sym = cx.symbol(self.alias);
        let original_sym = cx.symbol(self.original);

        // Find alias declarations whose initializer is the original name.
        let mut inits: Vec<NodeId> = Vec::new();
        let mut uses: Vec<NodeId> = Vec::new();
        for node in cx.tree().collect_subtree(program_root) {
            if cx.tree().kind(node) != Some(NodeKind::Name) {
                continue;
            }
            if cx.tree().value(node) != Some(NodeValue::Str(alias_sym)) {
                continue;
            }
            let parent_kind = cx.tree().parent(node).and_then(|p| cx.tree().kind(p));
            if parent_kind == Some(NodeKind::Var) {
                let init = cx.tree().children(node).first().copied();
                if let Some(init) = init {
                    if cx.tree().kind(init) == Some(NodeKind::Name)
                        && cx.tree().value(init) == Some(NodeValue::Str(original_sym))
                    {
                        inits.push(init);
                    }
                }
            } else {
                uses.push(node);
            }
        }
        if inits.is_empty() {
            return Ok(());
        }

        for init in inits {
            let loc = cx
                .tree()
                .loc(init)
                .ok_or(prism_core::EngineError::UnknownNode(init))?;
            let null = cx.create_node(NodeKind::Null, loc);
            cx.replace(init, null)?;
        }
        for use_site in uses {
            cx.set_value(use_site, Some(NodeValue::Str(original_sym)))?;
        }
        Ok(())
    }
}
