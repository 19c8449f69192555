// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core compiler state and the engine operations passes are built on.
//!
//! A [`Compiler`] owns one arena holding the externs tree, the program tree,
//! and every shadow subtree, plus the shadow registry, the change timeline,
//! the diagnostic log, interned strings/files, options, and the optional
//! module loader. Outside an active pass the tree is treated as immutable;
//! passes mutate it through the context handed to `process`, which routes
//! every mutation through [`Compiler::report_change`].

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

use thiserror::Error;

use crate::change::{ChangeSet, ChangeTimeline, Region};
use crate::diagnostics::DiagnosticLog;
use crate::ident::{NodeId, PassId, ShadowId};
use crate::intern::{FileTable, StringInterner};
use crate::modload::ModuleLoader;
use crate::node::{NodeKind, SourceLocation};
use crate::options::CompilerOptions;
use crate::pass::{PassRecord, PassResult};
use crate::scope::{collect_scope_roots, enclosing_scope};
use crate::shadow::{ensure_slot_free, ShadowRegistry};
use crate::tree::AstTree;

/// Errors emitted by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node id referenced a dead or never-allocated slot.
    #[error("unknown node id: {0:?}")]
    UnknownNode(NodeId),
    /// A node that must be parentless still has a parent.
    #[error("node already attached to a parent: {0:?}")]
    NodeAttached(NodeId),
    /// A node that must have a parent is a root.
    #[error("node has no parent: {0:?}")]
    NoParent(NodeId),
    /// Attaching here would create a parent cycle.
    #[error("attachment would create a cycle through {0:?}")]
    CycleDetected(NodeId),
    /// The host's shadow slot is already occupied.
    #[error("shadow already present on host {0:?}")]
    ShadowAlreadyPresent(NodeId),
    /// The host's shadow slot is empty.
    #[error("no shadow attached to host {0:?}")]
    NoShadowAttached(NodeId),
    /// An engine invariant failed; fatal to the pipeline.
    #[error("structural invariant violated at {node:?}: {detail}")]
    StructuralInvariant {
        /// Offending node, when one can be named.
        node: Option<NodeId>,
        /// What failed.
        detail: &'static str,
    },
    /// A fixed-point loop exceeded its divergence cap.
    #[error("loop did not converge after {rounds} rounds; still changing: {passes:?}")]
    LoopDivergence {
        /// Rounds executed, including the final over-cap round.
        rounds: u32,
        /// Passes that reported changes in the final round.
        passes: Vec<&'static str>,
    },
    /// Two passes registered under the same name.
    #[error("duplicate pass name: {0}")]
    DuplicatePassName(&'static str),
    /// Two passes registered under the same canonical id.
    #[error("duplicate pass id: {0}")]
    DuplicatePassId(String),
    /// A validity check attempted to report a code change.
    #[error("validity check may not report code changes: {0}")]
    IllegalChangeReport(&'static str),
    /// Hot swap requested while `allow_hot_swap_replace_script` is off.
    #[error("hot swap of scripts is disabled by options")]
    HotSwapDisabled,
    /// Hot swap target or replacement is not a script root.
    #[error("node is not a script: {0:?}")]
    NotAScript(NodeId),
}

/// Identity of the currently executing pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActivePass {
    pub(crate) id: PassId,
    pub(crate) name: &'static str,
    pub(crate) can_report: bool,
}

/// Scoped activation of a pass context.
///
/// The loop controller and pipeline open this guard around every pass hook;
/// dropping it resets the engine's active-pass slot whether the pass returned
/// normally or unwound.
pub(crate) struct PassGuard<'a> {
    compiler: &'a mut Compiler,
}

impl Deref for PassGuard<'_> {
    type Target = Compiler;

    fn deref(&self) -> &Compiler {
        self.compiler
    }
}

impl DerefMut for PassGuard<'_> {
    fn deref_mut(&mut self) -> &mut Compiler {
        self.compiler
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.compiler.active = None;
    }
}

/// Process-wide compiler context and engine state.
pub struct Compiler {
    pub(crate) tree: AstTree,
    pub(crate) externs_root: NodeId,
    pub(crate) program_root: NodeId,
    pub(crate) shadows: ShadowRegistry,
    pub(crate) timeline: ChangeTimeline,
    pub(crate) diagnostics: DiagnosticLog,
    pub(crate) files: FileTable,
    pub(crate) interner: StringInterner,
    pub(crate) options: CompilerOptions,
    pub(crate) loader: Option<Box<dyn ModuleLoader>>,
    pub(crate) active: Option<ActivePass>,
}

impl core::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compiler")
            .field("live_nodes", &self.tree.live_count())
            .field("shadows", &self.shadows.len())
            .field("clock", &self.timeline.clock())
            .finish_non_exhaustive()
    }
}

impl Compiler {
    /// Creates a compiler with empty externs and program trees.
    #[must_use]
    pub fn new(options: CompilerOptions) -> Self {
        let mut files = FileTable::new();
        let synthetic = files.add("<synthetic>");
        let loc = SourceLocation::new(synthetic, 0, 0);
        let mut tree = AstTree::new();
        let externs_root = tree.new_node(NodeKind::Program, loc);
        let program_root = tree.new_node(NodeKind::Program, loc);
        Self {
            tree,
            externs_root,
            program_root,
            shadows: ShadowRegistry::new(),
            timeline: ChangeTimeline::new(),
            diagnostics: DiagnosticLog::new(),
            files,
            interner: StringInterner::new(),
            options,
            loader: None,
            active: None,
        }
    }

    /// Root of the externs tree.
    #[must_use]
    pub fn externs_root(&self) -> NodeId {
        self.externs_root
    }

    /// Root of the program tree.
    #[must_use]
    pub fn program_root(&self) -> NodeId {
        self.program_root
    }

    /// Shared view of the arena.
    #[must_use]
    pub fn tree(&self) -> &AstTree {
        &self.tree
    }

    /// Mutable arena access for the construction phase.
    ///
    /// Mutations made here bypass change reporting; they are only appropriate
    /// before the pipeline first runs (every pass's first query is a full
    /// traversal anyway).
    pub fn tree_mut(&mut self) -> &mut AstTree {
        &mut self.tree
    }

    /// Shadow registry.
    #[must_use]
    pub fn shadows(&self) -> &ShadowRegistry {
        &self.shadows
    }

    /// Change timeline.
    #[must_use]
    pub fn timeline(&self) -> &ChangeTimeline {
        &self.timeline
    }

    /// Diagnostic log.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Mutable diagnostic log.
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.diagnostics
    }

    /// Source-file table.
    #[must_use]
    pub fn files(&self) -> &FileTable {
        &self.files
    }

    /// Mutable source-file table.
    pub fn files_mut(&mut self) -> &mut FileTable {
        &mut self.files
    }

    /// String interner.
    #[must_use]
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Mutable string interner.
    pub fn interner_mut(&mut self) -> &mut StringInterner {
        &mut self.interner
    }

    /// Pipeline options.
    #[must_use]
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Installs the module loader consulted by import-rewriting passes.
    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = Some(loader);
    }

    /// The installed module loader, if any.
    #[must_use]
    pub fn loader(&self) -> Option<&dyn ModuleLoader> {
        self.loader.as_deref()
    }

    /// Registers `file` and appends an empty script for it to the program tree.
    pub fn add_script(&mut self, file: &str) -> Result<NodeId, EngineError> {
        let script = self.new_detached_script(file);
        self.tree.append_child(self.program_root, script)?;
        Ok(script)
    }

    /// Registers `file` and creates an unattached script root, e.g. as a hot
    /// swap replacement.
    pub fn new_detached_script(&mut self, file: &str) -> NodeId {
        let fid = self.files.add(file);
        let loc = SourceLocation::new(fid, 1, 0);
        self.tree.new_node(NodeKind::Script, loc)
    }

    pub(crate) fn enter_pass(&mut self, info: ActivePass) -> PassGuard<'_> {
        self.active = Some(info);
        PassGuard { compiler: self }
    }

    pub(crate) fn ensure_active_can_mutate(&self) -> Result<(), EngineError> {
        match &self.active {
            Some(active) if !active.can_report => {
                Err(EngineError::IllegalChangeReport(active.name))
            }
            _ => Ok(()),
        }
    }

    /// Publishes a change at `node`: resolves the enclosing scope within the
    /// node's region and marks that region's timeline table.
    ///
    /// Passes must call this (directly or through the context's mutators) for
    /// every structural or attribute mutation other passes might consume.
    pub fn report_change(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.ensure_active_can_mutate()?;
        if !self.tree.contains(node) {
            return Err(EngineError::UnknownNode(node));
        }
        let scope = enclosing_scope(&self.tree, node).ok_or(EngineError::UnknownNode(node))?;
        match self.shadows.shadow_of(&self.tree, node) {
            Some(shadow) => self.timeline.mark_shadow(shadow, scope),
            None => self.timeline.mark_main(scope),
        }
        Ok(())
    }

    /// Records `t` as the last-run timestamp of `pass`.
    pub(crate) fn stamp_pass(&mut self, pass: PassId, t: u64) {
        self.timeline.set_stamp(pass, t);
    }

    /// Change-set query: scope roots in `region` modified since `pass` last
    /// ran. On a first run the result is every scope root in the region.
    #[must_use]
    pub fn changed_scopes_for(&self, pass: &PassId, region: Region) -> ChangeSet {
        match self.timeline.stamp_of(pass) {
            None => self.all_scopes_in(region),
            Some(stamp) => self.timeline.changed_since(stamp, region),
        }
    }

    /// Every scope root currently in `region`.
    #[must_use]
    pub fn all_scopes_in(&self, region: Region) -> ChangeSet {
        let mut out = BTreeSet::new();
        match region {
            Region::Main => {
                out.extend(collect_scope_roots(&self.tree, self.externs_root));
                out.extend(collect_scope_roots(&self.tree, self.program_root));
            }
            Region::Shadow(id) => {
                if let Some(entry) = self.shadows.entry(id) {
                    out.extend(collect_scope_roots(&self.tree, entry.root));
                }
            }
            Region::AllShadows => {
                for entry in self.shadows.iter() {
                    out.extend(collect_scope_roots(&self.tree, entry.root));
                }
            }
            Region::All => {
                out.extend(self.all_scopes_in(Region::Main));
                out.extend(self.all_scopes_in(Region::AllShadows));
            }
        }
        out
    }

    /// Attaches `root` as the shadow of `host`.
    ///
    /// Fails with [`EngineError::ShadowAlreadyPresent`] when the slot is
    /// occupied. `root` must be a live, parentless node outside the host's
    /// ancestry.
    pub fn attach_shadow(&mut self, host: NodeId, root: NodeId) -> Result<ShadowId, EngineError> {
        self.ensure_active_can_mutate()?;
        if !self.tree.contains(host) {
            return Err(EngineError::UnknownNode(host));
        }
        ensure_slot_free(&self.tree, host)?;
        if self.tree.parent(root).is_some() {
            return Err(EngineError::NodeAttached(root));
        }
        if root == self.externs_root || root == self.program_root {
            return Err(EngineError::StructuralInvariant {
                node: Some(root),
                detail: "a main tree root cannot become a shadow root",
            });
        }
        if self.tree.is_ancestor_or_self(root, host) {
            return Err(EngineError::CycleDetected(root));
        }
        if self.shadows.shadow_rooted_at(root).is_some() {
            return Err(EngineError::StructuralInvariant {
                node: Some(root),
                detail: "node is already the root of another shadow",
            });
        }
        let id = self.shadows.register(host, root);
        self.tree.set_shadow_slot(host, Some(id))?;
        self.report_change(host)?;
        Ok(id)
    }

    /// Detaches and returns the shadow root attached to `host`.
    ///
    /// Fails with [`EngineError::NoShadowAttached`] when the slot is empty.
    /// The returned subtree is rootless; reattach or delete it before the
    /// pass boundary, or the structure check will flag it.
    pub fn detach_shadow(&mut self, host: NodeId) -> Result<NodeId, EngineError> {
        self.ensure_active_can_mutate()?;
        if !self.tree.contains(host) {
            return Err(EngineError::UnknownNode(host));
        }
        let entry = self
            .shadows
            .unregister_host(host)
            .ok_or(EngineError::NoShadowAttached(host))?;
        self.tree.set_shadow_slot(host, None)?;
        self.timeline.remove_shadow_table(entry.id);
        self.report_change(host)?;
        Ok(entry.root)
    }

    /// Deletes the subtree under `id`, shadows included, tombstoning every
    /// removed scope.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.ensure_active_can_mutate()?;
        if id == self.externs_root || id == self.program_root {
            return Err(EngineError::StructuralInvariant {
                node: Some(id),
                detail: "main tree roots cannot be deleted",
            });
        }
        if !self.tree.contains(id) {
            return Err(EngineError::UnknownNode(id));
        }
        if self.shadows.shadow_rooted_at(id).is_some() {
            return Err(EngineError::StructuralInvariant {
                node: Some(id),
                detail: "detach a shadow from its host before deleting it",
            });
        }
        let region_shadow = self.shadows.shadow_of(&self.tree, id);
        self.delete_subtree_in_region(id, region_shadow)
    }

    /// Deletion body with the origin region pinned by the caller; used when
    /// the subtree has already been detached and its region is no longer
    /// derivable from the parent chain.
    pub(crate) fn delete_subtree_in_region(
        &mut self,
        id: NodeId,
        region_shadow: Option<ShadowId>,
    ) -> Result<(), EngineError> {
        if let Some(parent) = self.tree.parent(id) {
            self.tree.detach(id)?;
            self.report_change(parent)?;
        }
        let mut roots = vec![(id, true)];
        while let Some((root, in_origin_region)) = roots.pop() {
            for node in self.tree.collect_subtree(root) {
                if let Some(sid) = self.tree.shadow_slot(node) {
                    if let Some(entry) = self.shadows.unregister_id(sid) {
                        roots.push((entry.root, false));
                    }
                    self.timeline.remove_shadow_table(sid);
                }
                if in_origin_region
                    && (node == id || self.tree.kind(node).is_some_and(NodeKind::is_scope_root))
                {
                    match region_shadow {
                        Some(shadow) => self.timeline.tombstone_shadow(shadow, node),
                        None => self.timeline.tombstone_main(node),
                    }
                }
                self.tree.free(node);
            }
        }
        Ok(())
    }

    /// Wrap phase: moves every isolated-marked subtree behind a shadow on a
    /// freshly created stub host. Returns how many subtrees were wrapped.
    ///
    /// Outermost markers win; a marked node nested under another marked node
    /// travels inside its ancestor's shadow.
    pub fn wrap_isolated_subtrees(&mut self) -> Result<usize, EngineError> {
        self.ensure_active_can_mutate()?;
        let mut targets = Vec::new();
        for root in [self.externs_root, self.program_root] {
            for node in self.tree.collect_subtree(root) {
                if node == root {
                    continue;
                }
                let isolated = self.tree.attrs(node).is_some_and(|a| a.isolated);
                if isolated && !self.has_isolated_proper_ancestor(node) {
                    targets.push(node);
                }
            }
        }
        for target in &targets {
            let kind = self
                .tree
                .kind(*target)
                .ok_or(EngineError::UnknownNode(*target))?;
            let loc = self
                .tree
                .loc(*target)
                .ok_or(EngineError::UnknownNode(*target))?;
            let host = self.tree.new_node(kind, loc);
            self.tree.swap_subtree(*target, host)?;
            let id = self.shadows.register(host, *target);
            self.tree.set_shadow_slot(host, Some(id))?;
            self.report_change(host)?;
        }
        Ok(targets.len())
    }

    fn has_isolated_proper_ancestor(&self, node: NodeId) -> bool {
        let mut cur = self.tree.parent(node);
        while let Some(c) = cur {
            if self.tree.attrs(c).is_some_and(|a| a.isolated) {
                return true;
            }
            cur = self.tree.parent(c);
        }
        false
    }

    /// Unwrap phase: splices every registered shadow back over its stub host.
    /// Returns how many subtrees were unwrapped.
    pub fn unwrap_isolated_subtrees(&mut self) -> Result<usize, EngineError> {
        self.ensure_active_can_mutate()?;
        let entries: Vec<_> = self.shadows.iter().copied().collect();
        for entry in &entries {
            self.shadows.unregister_id(entry.id);
            self.timeline.remove_shadow_table(entry.id);
            self.tree.set_shadow_slot(entry.host, None)?;
            self.tree.swap_subtree(entry.host, entry.root)?;
            self.tree.free(entry.host);
            self.report_change(entry.root)?;
        }
        Ok(entries.len())
    }

    /// Hot swap: replaces a script subtree with a freshly built one.
    ///
    /// Requires `allow_hot_swap_replace_script`. Tombstones every scope of
    /// the old script and marks the replacement's scope, so every pass's
    /// next query sees exactly that scope and nothing else.
    pub fn replace_script(&mut self, old: NodeId, new: NodeId) -> Result<(), EngineError> {
        if !self.options.allow_hot_swap_replace_script {
            return Err(EngineError::HotSwapDisabled);
        }
        self.ensure_active_can_mutate()?;
        for id in [old, new] {
            if self.tree.kind(id) != Some(NodeKind::Script) {
                return Err(EngineError::NotAScript(id));
            }
        }
        if self.shadows.shadow_of(&self.tree, old).is_some() {
            return Err(EngineError::StructuralInvariant {
                node: Some(old),
                detail: "hot swap targets must live in the main tree",
            });
        }
        self.tree.swap_subtree(old, new)?;
        self.delete_subtree(old)?;
        self.timeline.mark_main(new);
        Ok(())
    }

    /// Runs a pass's `init` hook inside an active-pass context.
    pub fn run_pass_init(&mut self, rec: &mut PassRecord) -> PassResult {
        let info = ActivePass {
            id: rec.id,
            name: rec.name,
            can_report: rec.can_report_code_change,
        };
        let mut guard = self.enter_pass(info);
        let mut cx = crate::cx::PassCx::new(&mut guard);
        rec.pass.init(&mut cx)
    }

    /// Runs a pass's `process` hook inside an active-pass context.
    pub fn run_pass(&mut self, rec: &mut PassRecord, changed: &ChangeSet) -> PassResult {
        let info = ActivePass {
            id: rec.id,
            name: rec.name,
            can_report: rec.can_report_code_change,
        };
        let externs = self.externs_root;
        let program = self.program_root;
        let mut guard = self.enter_pass(info);
        let mut cx = crate::cx::PassCx::new(&mut guard);
        rec.pass.process(&mut cx, externs, program, changed)
    }

    /// Runs a pass's `finalize` hook inside an active-pass context.
    pub fn run_pass_finalize(&mut self, rec: &mut PassRecord) -> PassResult {
        let info = ActivePass {
            id: rec.id,
            name: rec.name,
            can_report: rec.can_report_code_change,
        };
        let mut guard = self.enter_pass(info);
        let mut cx = crate::cx::PassCx::new(&mut guard);
        rec.pass.finalize(&mut cx)
    }
}
