// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pass descriptors and the pass interface.
use crate::change::{ChangeSet, Region};
use crate::compiler::EngineError;
use crate::cx::PassCx;
use crate::ident::{make_pass_id, CompactPassId, NodeId, PassId};

/// How the pipeline schedules a pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PassKind {
    /// Runs once at its declared position.
    OneShot,
    /// Runs repeatedly inside a fixed-point loop with its contiguous peers.
    LoopMember,
    /// Inspects the tree between other passes; may not report code changes.
    ValidityCheck,
}

/// Which part of the forest a pass operates on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperatesOn {
    /// The externs and program trees only.
    MainOnly,
    /// Shadow subtrees only.
    ShadowOnly,
    /// Everything.
    Both,
}

impl OperatesOn {
    pub(crate) fn region(self) -> Region {
        match self {
            Self::MainOnly => Region::Main,
            Self::ShadowOnly => Region::AllShadows,
            Self::Both => Region::All,
        }
    }
}

/// Result type every pass hook returns.
pub type PassResult = Result<(), EngineError>;

/// The three-method pass interface.
///
/// `process` is invoked with the two roots and the set of scope roots changed
/// since this pass last ran (all scopes in its region on the first run). The
/// contract: fully consume that change set before returning — the engine will
/// not hand the same scopes back unless someone else changes them again.
pub trait CompilerPass {
    /// Performs the pass's work over the current tree.
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        externs_root: NodeId,
        program_root: NodeId,
        changed: &ChangeSet,
    ) -> PassResult;

    /// Called once before the pass's first invocation in a pipeline run.
    fn init(&mut self, _cx: &mut PassCx<'_>) -> PassResult {
        Ok(())
    }

    /// Called once after the pass's last invocation in a pipeline run.
    fn finalize(&mut self, _cx: &mut PassCx<'_>) -> PassResult {
        Ok(())
    }
}

/// Descriptor for a pass registered with the pipeline.
///
/// Each record owns:
/// * a canonical identifier derived from the name
/// * the scheduling kind and region policy
/// * an optional per-pass iteration cap (loop members)
/// * the pass object itself
pub struct PassRecord {
    pub(crate) id: PassId,
    pub(crate) name: &'static str,
    pub(crate) kind: PassKind,
    pub(crate) operates_on: OperatesOn,
    pub(crate) iteration_cap: Option<u32>,
    pub(crate) can_report_code_change: bool,
    pub(crate) compact: CompactPassId,
    pub(crate) pass: Box<dyn CompilerPass>,
}

impl PassRecord {
    fn new(
        name: &'static str,
        kind: PassKind,
        can_report_code_change: bool,
        pass: impl CompilerPass + 'static,
    ) -> Self {
        Self {
            id: make_pass_id(name),
            name,
            kind,
            operates_on: OperatesOn::Both,
            iteration_cap: None,
            can_report_code_change,
            compact: CompactPassId(0),
            pass: Box::new(pass),
        }
    }

    /// Builds a one-shot pass record.
    #[must_use]
    pub fn one_shot(name: &'static str, pass: impl CompilerPass + 'static) -> Self {
        Self::new(name, PassKind::OneShot, true, pass)
    }

    /// Builds a loop-member pass record.
    #[must_use]
    pub fn loop_member(name: &'static str, pass: impl CompilerPass + 'static) -> Self {
        Self::new(name, PassKind::LoopMember, true, pass)
    }

    /// Builds a validity-check record. Validity checks may not report code
    /// changes; an attempt is an engine error.
    #[must_use]
    pub fn validity_check(name: &'static str, pass: impl CompilerPass + 'static) -> Self {
        Self::new(name, PassKind::ValidityCheck, false, pass)
    }

    /// Restricts the pass to a region.
    #[must_use]
    pub fn operates_on(mut self, operates_on: OperatesOn) -> Self {
        self.operates_on = operates_on;
        self
    }

    /// Caps how many times a loop member may run within one loop.
    #[must_use]
    pub fn iteration_cap(mut self, cap: u32) -> Self {
        self.iteration_cap = Some(cap);
        self
    }

    /// Human-readable pass name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Canonical pass identifier.
    #[must_use]
    pub fn id(&self) -> &PassId {
        &self.id
    }

    /// Scheduling kind.
    #[must_use]
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Region policy.
    #[must_use]
    pub fn region_policy(&self) -> OperatesOn {
        self.operates_on
    }
}

impl core::fmt::Debug for PassRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PassRecord")
            .field("id", &self.id.short_hex())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("operates_on", &self.operates_on)
            .finish_non_exhaustive()
    }
}
