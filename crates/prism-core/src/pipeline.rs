// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Top-level pipeline driver.
//!
//! Consumes a declared list of pass records: one-shots run in order,
//! contiguous runs of loop members are handed to the loop controller, and a
//! configured validity check runs after each pass. Cancellation is observed
//! between passes and between loop rounds; a mid-pass cancel is not
//! supported, passes are assumed short relative to that granularity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::compiler::{Compiler, EngineError};
use crate::ident::{CompactPassId, PassId};
use crate::loop_ctrl::{run_loop, run_validity_check, LoopOutcome};
use crate::pass::{PassKind, PassRecord};
use crate::telemetry::{NullTelemetrySink, TelemetrySink};

/// Terminal status of a pipeline run that did not hit an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every pass completed.
    Completed,
    /// A pass produced an error-level diagnostic and
    /// `continue_after_errors` is off.
    Halted,
    /// The cancellation flag was observed.
    Cancelled,
}

/// Cooperative cancellation flag checked between passes and loop rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Declared sequence of passes plus driver state.
pub struct Pipeline {
    passes: Vec<PassRecord>,
    validity: Option<PassRecord>,
    telemetry: Arc<dyn TelemetrySink>,
    cancel: CancelFlag,
    names: FxHashSet<&'static str>,
    ids: FxHashSet<PassId>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.passes)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates an empty pipeline with a null telemetry sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            validity: None,
            telemetry: Arc::new(NullTelemetrySink),
            cancel: CancelFlag::new(),
            names: FxHashSet::default(),
            ids: FxHashSet::default(),
        }
    }

    /// Appends a pass record. Registration order is execution order.
    pub fn register(&mut self, mut rec: PassRecord) -> Result<(), EngineError> {
        self.check_unique(&rec)?;
        rec.compact = CompactPassId(u32::try_from(self.passes.len()).unwrap_or(u32::MAX));
        self.names.insert(rec.name());
        self.ids.insert(*rec.id());
        self.passes.push(rec);
        Ok(())
    }

    /// Configures the validity check interleaved after each pass and between
    /// loop iterations.
    pub fn set_validity_check(&mut self, rec: PassRecord) -> Result<(), EngineError> {
        self.check_unique(&rec)?;
        self.names.insert(rec.name());
        self.ids.insert(*rec.id());
        self.validity = Some(rec);
        Ok(())
    }

    fn check_unique(&self, rec: &PassRecord) -> Result<(), EngineError> {
        if self.names.contains(rec.name()) {
            return Err(EngineError::DuplicatePassName(rec.name()));
        }
        if self.ids.contains(rec.id()) {
            return Err(EngineError::DuplicatePassId(rec.id().short_hex()));
        }
        Ok(())
    }

    /// Installs a telemetry sink.
    pub fn set_telemetry(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.telemetry = sink;
    }

    /// Handle callers can use to request cancellation from outside.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Number of registered passes (the configured validity check excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` when no pass is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Drives every registered pass over the compiler's trees.
    pub fn process(&mut self, compiler: &mut Compiler) -> Result<PipelineStatus, EngineError> {
        let total = self.passes.len();
        let mut completed = 0usize;
        let mut i = 0usize;
        while i < self.passes.len() {
            if self.cancel.is_cancelled() {
                return Ok(PipelineStatus::Cancelled);
            }
            match self.passes[i].kind() {
                PassKind::LoopMember => {
                    let end = self.loop_group_end(i);
                    if compiler.options().checks_only {
                        completed += end - i;
                        self.report_progress(completed, total);
                        i = end;
                        continue;
                    }
                    let outcome = self.run_loop_group(compiler, i, end)?;
                    match outcome {
                        LoopOutcome::Converged { .. } => {}
                        LoopOutcome::Cancelled => return Ok(PipelineStatus::Cancelled),
                        LoopOutcome::Halted => return Ok(PipelineStatus::Halted),
                    }
                    for rec in &self.passes[i..end] {
                        self.telemetry.pass_completed(rec.name());
                        completed += 1;
                        self.report_progress(completed, total);
                    }
                    i = end;
                }
                PassKind::OneShot => {
                    if compiler.options().checks_only {
                        completed += 1;
                        self.report_progress(completed, total);
                        i += 1;
                        continue;
                    }
                    let halted = self.run_one_shot(compiler, i)?;
                    completed += 1;
                    self.report_progress(completed, total);
                    if halted {
                        return Ok(PipelineStatus::Halted);
                    }
                    i += 1;
                }
                PassKind::ValidityCheck => {
                    let rec = &mut self.passes[i];
                    run_validity_check(compiler, rec)?;
                    self.telemetry.pass_completed(self.passes[i].name());
                    completed += 1;
                    self.report_progress(completed, total);
                    i += 1;
                }
            }
        }
        debug!(passes = total, "pipeline completed");
        Ok(PipelineStatus::Completed)
    }

    fn loop_group_end(&self, start: usize) -> usize {
        let mut end = start;
        while end < self.passes.len() && self.passes[end].kind() == PassKind::LoopMember {
            end += 1;
        }
        end
    }

    fn run_loop_group(
        &mut self,
        compiler: &mut Compiler,
        start: usize,
        end: usize,
    ) -> Result<LoopOutcome, EngineError> {
        for rec in &mut self.passes[start..end] {
            compiler.run_pass_init(rec)?;
        }
        let outcome = run_loop(
            compiler,
            &mut self.passes[start..end],
            self.validity.as_mut(),
            &self.cancel,
            &self.telemetry,
        );
        if let Err(EngineError::LoopDivergence { rounds, ref passes }) = outcome {
            warn!(rounds, ?passes, "fixed-point loop diverged");
        }
        let outcome = outcome?;
        for rec in &mut self.passes[start..end] {
            compiler.run_pass_finalize(rec)?;
        }
        Ok(outcome)
    }

    /// Runs one one-shot pass; returns `true` when the pipeline must halt on
    /// its error diagnostics.
    fn run_one_shot(
        &mut self,
        compiler: &mut Compiler,
        index: usize,
    ) -> Result<bool, EngineError> {
        let rec = &mut self.passes[index];
        let region = rec.region_policy().region();
        let changed = compiler.changed_scopes_for(rec.id(), region);
        let errors_before = compiler.diagnostics().error_count();
        compiler.run_pass_init(rec)?;
        compiler.run_pass(rec, &changed)?;
        compiler.run_pass_finalize(rec)?;
        let stamp = compiler.timeline().clock();
        compiler.stamp_pass(*rec.id(), stamp);
        debug!(pass = rec.name(), changed_scopes = changed.len(), "one-shot pass ran");
        self.telemetry.pass_completed(self.passes[index].name());
        if let Some(check) = self.validity.as_mut() {
            run_validity_check(compiler, check)?;
        }
        let halted = compiler.diagnostics().error_count() > errors_before
            && !compiler.options().continue_after_errors;
        Ok(halted)
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let percent = u8::try_from((completed * 100) / total).unwrap_or(100);
        self.telemetry.progress(percent);
    }
}
