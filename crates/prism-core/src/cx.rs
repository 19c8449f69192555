// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The engine-provided pass context.
//!
//! `PassCx` is the only handle a pass gets. Its mutators mirror the tree
//! operations and publish the corresponding change before returning, so a
//! pass cannot structurally modify the tree without the timeline noticing.
//! Observation goes through [`PassCx::tree`]; there is no mutable tree access.

use std::path::{Path, PathBuf};

use crate::change::ChangeSet;
use crate::compiler::{Compiler, EngineError};
use crate::diagnostics::{Diagnostic, Level};
use crate::ident::{NodeId, ShadowId};
use crate::intern::Symbol;
use crate::modload::{AliasEntry, LoadError, LOAD_WARNING};
use crate::node::{NodeKind, NodeValue, SourceLocation};
use crate::options::CompilerOptions;
use crate::shadow::ShadowEntry;
use crate::tree::AstTree;

/// Context handle passed to every pass hook.
pub struct PassCx<'a> {
    compiler: &'a mut Compiler,
}

impl<'a> PassCx<'a> {
    pub(crate) fn new(compiler: &'a mut Compiler) -> Self {
        Self { compiler }
    }

    /// Read-only view of the arena.
    #[must_use]
    pub fn tree(&self) -> &AstTree {
        self.compiler.tree()
    }

    /// Pipeline options.
    #[must_use]
    pub fn options(&self) -> &CompilerOptions {
        self.compiler.options()
    }

    /// Interns a string payload.
    pub fn symbol(&mut self, text: &str) -> Symbol {
        self.compiler.interner_mut().intern(text)
    }

    /// Resolves an interned symbol.
    #[must_use]
    pub fn symbol_str(&self, sym: Symbol) -> Option<&str> {
        self.compiler.interner().resolve(sym)
    }

    /// Registered shadows, in id order.
    #[must_use]
    pub fn shadows(&self) -> Vec<ShadowEntry> {
        self.compiler.shadows().iter().copied().collect()
    }

    /// Shadow containment of `node`.
    #[must_use]
    pub fn shadow_of(&self, node: NodeId) -> Option<ShadowId> {
        self.compiler.shadows().shadow_of(self.compiler.tree(), node)
    }

    /// Allocates a node with no value payload. Allocation alone is not a
    /// change; one is published when the node is attached.
    pub fn create_node(&mut self, kind: NodeKind, loc: SourceLocation) -> NodeId {
        self.compiler.tree_mut().new_node(kind, loc)
    }

    /// Allocates a value-bearing node.
    pub fn create_node_with_value(
        &mut self,
        kind: NodeKind,
        value: NodeValue,
        loc: SourceLocation,
    ) -> NodeId {
        self.compiler.tree_mut().new_node_with_value(kind, value, loc)
    }

    /// Appends `child` under `parent` and publishes the change.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        self.compiler.tree_mut().append_child(parent, child)?;
        self.compiler.report_change(parent)
    }

    /// Inserts `new` before `anchor` and publishes the change.
    pub fn insert_before(&mut self, anchor: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        self.compiler.tree_mut().insert_before(anchor, new)?;
        self.compiler.report_change(new)
    }

    /// Inserts `new` after `anchor` and publishes the change.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        self.compiler.tree_mut().insert_after(anchor, new)?;
        self.compiler.report_change(new)
    }

    /// Detaches `node` from its parent and publishes the change at the old
    /// parent. The subtree stays alive; reattach or delete it before the pass
    /// returns, or the structure check will flag it.
    pub fn detach(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        let parent = self
            .compiler
            .tree()
            .parent(node)
            .ok_or(EngineError::NoParent(node))?;
        self.compiler.tree_mut().detach(node)?;
        self.compiler.report_change(parent)
    }

    /// Replaces `old` with `new`, deleting the displaced subtree (shadows
    /// included) and tombstoning its scopes.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        // Capture the displaced subtree's region before it goes rootless so
        // its tombstones land in the right table.
        let region = self.compiler.shadows().shadow_of(self.compiler.tree(), old);
        self.compiler.tree_mut().swap_subtree(old, new)?;
        self.compiler.report_change(new)?;
        self.compiler.delete_subtree_in_region(old, region)
    }

    /// Deletes the subtree under `node`, shadows included.
    pub fn delete_subtree(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.compiler.delete_subtree(node)
    }

    /// Replaces a node's value payload and publishes the change.
    pub fn set_value(&mut self, node: NodeId, value: Option<NodeValue>) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        self.compiler.tree_mut().set_value(node, value)?;
        self.compiler.report_change(node)
    }

    /// Sets the declared-type attribute and publishes the change.
    pub fn set_declared_type(
        &mut self,
        node: NodeId,
        declared_type: Option<Symbol>,
    ) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.declared_type = declared_type)
    }

    /// Sets the declared-constant flag and publishes the change.
    pub fn set_declared_const(&mut self, node: NodeId, value: bool) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.declared_const = value)
    }

    /// Sets the inferred-constant flag and publishes the change.
    pub fn set_inferred_const(&mut self, node: NodeId, value: bool) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.inferred_const = value)
    }

    /// Sets the exported flag and publishes the change.
    pub fn set_exported(&mut self, node: NodeId, value: bool) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.exported = value)
    }

    /// Sets the jsdoc reference and publishes the change.
    pub fn set_jsdoc(&mut self, node: NodeId, jsdoc: Option<Symbol>) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.jsdoc = jsdoc)
    }

    /// Attaches a module resolution result and publishes the change.
    pub fn set_resolved_module(
        &mut self,
        node: NodeId,
        path: Option<PathBuf>,
    ) -> Result<(), EngineError> {
        self.update_attrs(node, |attrs| attrs.resolved_module = path)
    }

    fn update_attrs(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut crate::node::Attributes),
    ) -> Result<(), EngineError> {
        self.ensure_can_mutate()?;
        let attrs = self
            .compiler
            .tree_mut()
            .attrs_mut(node)
            .ok_or(EngineError::UnknownNode(node))?;
        f(attrs);
        self.compiler.report_change(node)
    }

    /// Publishes a change at `node` for a mutation the context API does not
    /// cover itself.
    pub fn report_change(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.compiler.report_change(node)
    }

    /// Attaches `root` as the shadow of `host`.
    pub fn attach_shadow(&mut self, host: NodeId, root: NodeId) -> Result<ShadowId, EngineError> {
        self.compiler.attach_shadow(host, root)
    }

    /// Detaches and returns the shadow root attached to `host`.
    pub fn detach_shadow(&mut self, host: NodeId) -> Result<NodeId, EngineError> {
        self.compiler.detach_shadow(host)
    }

    /// Wrap phase of the shadow lifecycle.
    pub fn wrap_isolated_subtrees(&mut self) -> Result<usize, EngineError> {
        self.compiler.wrap_isolated_subtrees()
    }

    /// Unwrap phase of the shadow lifecycle.
    pub fn unwrap_isolated_subtrees(&mut self) -> Result<usize, EngineError> {
        self.compiler.unwrap_isolated_subtrees()
    }

    /// Hot swap of a script subtree; see [`Compiler::replace_script`].
    pub fn replace_script(&mut self, old: NodeId, new: NodeId) -> Result<(), EngineError> {
        self.compiler.replace_script(old, new)
    }

    /// Appends a diagnostic to the log.
    pub fn report_diagnostic(&mut self, diag: Diagnostic) {
        self.compiler.diagnostics_mut().push(diag);
    }

    /// Resolves a module specifier through the installed loader.
    ///
    /// Resolution failures do not halt the pipeline: they surface as a
    /// [`LOAD_WARNING`] diagnostic at `loc` and the call returns `None`.
    pub fn resolve_module(
        &mut self,
        specifier: &str,
        from: &Path,
        loc: Option<SourceLocation>,
    ) -> Option<PathBuf> {
        let resolved: Result<PathBuf, LoadError> = match self.compiler.loader() {
            Some(loader) => loader.resolve(specifier, from),
            None => Err(LoadError::NotFound(specifier.to_string())),
        };
        match resolved {
            Ok(path) => Some(path),
            Err(err) => {
                let mut diag =
                    Diagnostic::new(LOAD_WARNING, Level::Warning).with_message(err.to_string());
                if let Some(loc) = loc {
                    diag = diag.at(loc);
                }
                self.compiler.diagnostics_mut().push(diag);
                None
            }
        }
    }

    /// Package-root → main-entry map of the installed loader.
    #[must_use]
    pub fn package_main_entries(&self) -> Option<&std::collections::BTreeMap<PathBuf, PathBuf>> {
        self.compiler.loader().map(|l| l.package_main_entries())
    }

    /// Package alias map of the installed loader.
    #[must_use]
    pub fn package_aliased_entries(
        &self,
    ) -> Option<&std::collections::BTreeMap<PathBuf, AliasEntry>> {
        self.compiler.loader().map(|l| l.package_aliased_entries())
    }

    /// Change-set query for an arbitrary pass id and region; the engine calls
    /// this on the active pass's behalf before `process`.
    #[must_use]
    pub fn changed_scopes_for(
        &self,
        pass: &crate::ident::PassId,
        region: crate::change::Region,
    ) -> ChangeSet {
        self.compiler.changed_scopes_for(pass, region)
    }

    /// Runs the structure validity check over the whole forest.
    pub fn verify_structure(&self) -> Result<(), EngineError> {
        crate::validity::verify_structure(self.compiler)
    }

    fn ensure_can_mutate(&self) -> Result<(), EngineError> {
        // The report path re-checks, but mutators gate up front so a validity
        // check cannot modify the tree and then fail on the report.
        self.compiler.ensure_active_can_mutate()
    }
}
