// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Fixed-point loop controller.
//!
//! Ordering invariant:
//! - Within one round, passes run in registration order.
//! - Each pass is stamped with the clock value snapshotted *before* its run,
//!   so the changes it produced feed the next round's queries (its own
//!   included — cascading rewrites converge by revisiting their own scopes).
//! - A round that leaves the clock unmoved has converged.
//! - A round past the divergence cap that still moves the clock is fatal,
//!   reported with the passes that changed in that final round.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::change::ChangeSet;
use crate::compiler::{Compiler, EngineError};
use crate::ident::CompactPassId;
use crate::pass::PassRecord;
use crate::pipeline::CancelFlag;
use crate::telemetry::TelemetrySink;

/// How a loop ended, short of a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// A full round produced no changes.
    Converged {
        /// Rounds executed, the quiet final round included.
        rounds: u32,
    },
    /// The cancellation flag was observed between rounds.
    Cancelled,
    /// A pass produced an error-level diagnostic and
    /// `continue_after_errors` is off.
    Halted,
}

/// Runs `passes` to a fixed point, interleaving `validity` between passes.
pub(crate) fn run_loop(
    compiler: &mut Compiler,
    passes: &mut [PassRecord],
    mut validity: Option<&mut PassRecord>,
    cancel: &CancelFlag,
    telemetry: &Arc<dyn TelemetrySink>,
) -> Result<LoopOutcome, EngineError> {
    let cap = compiler.options().max_loop_iterations;
    let mut runs: FxHashMap<CompactPassId, u32> = FxHashMap::default();
    let mut round: u32 = 0;
    loop {
        round += 1;
        if cancel.is_cancelled() {
            return Ok(LoopOutcome::Cancelled);
        }
        let round_start_clock = compiler.timeline().clock();
        let mut changed_passes: Vec<&'static str> = Vec::new();

        for idx in 0..passes.len() {
            let (first_run, t0, changed) = {
                let rec = &passes[idx];
                let first_run = compiler.timeline().stamp_of(rec.id()).is_none();
                let t0 = compiler.timeline().clock();
                let changed = compiler.changed_scopes_for(rec.id(), rec.region_policy().region());
                (first_run, t0, changed)
            };
            // First runs always happen (even over an empty region); after
            // that a pass only runs when something in its region changed.
            if !first_run && changed.is_empty() {
                continue;
            }

            let rec = &mut passes[idx];
            let count = runs.entry(rec.compact).or_insert(0);
            if let Some(pass_cap) = rec.iteration_cap {
                if *count >= pass_cap {
                    return Err(EngineError::LoopDivergence {
                        rounds: *count,
                        passes: vec![rec.name()],
                    });
                }
            }
            *count += 1;

            let errors_before = compiler.diagnostics().error_count();
            let clock_before = compiler.timeline().clock();
            compiler.run_pass(rec, &changed)?;
            compiler.stamp_pass(*rec.id(), t0);
            if compiler.timeline().clock() > clock_before {
                changed_passes.push(rec.name());
            }
            trace!(
                pass = rec.name(),
                round,
                changed_scopes = changed.len(),
                "loop pass ran"
            );

            if let Some(check) = validity.as_deref_mut() {
                run_validity_check(compiler, check)?;
            }

            if compiler.diagnostics().error_count() > errors_before
                && !compiler.options().continue_after_errors
            {
                return Ok(LoopOutcome::Halted);
            }
        }

        if compiler.timeline().clock() == round_start_clock {
            telemetry.loop_converged(round);
            debug!(rounds = round, "fixed-point loop converged");
            return Ok(LoopOutcome::Converged { rounds: round });
        }
        if round > cap {
            telemetry.loop_diverged(round, &changed_passes);
            return Err(EngineError::LoopDivergence {
                rounds: round,
                passes: changed_passes,
            });
        }
    }
}

/// Runs an interleaved validity check; the clock must not move.
pub(crate) fn run_validity_check(
    compiler: &mut Compiler,
    check: &mut PassRecord,
) -> Result<(), EngineError> {
    let clock = compiler.timeline().clock();
    compiler.run_pass(check, &ChangeSet::new())?;
    if compiler.timeline().clock() != clock {
        return Err(EngineError::StructuralInvariant {
            node: None,
            detail: "validity check advanced the clock",
        });
    }
    Ok(())
}
