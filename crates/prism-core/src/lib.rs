// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! prism-core: deterministic compiler pass pipeline engine.
//!
//! The engine sequences AST-rewriting passes, tracks per-scope changes
//! between passes so re-runs touch only invalidated regions, runs fixed-point
//! loops with convergence and divergence detection, and isolates shadow
//! subtrees so rewrites on either side of the boundary never contaminate the
//! other's change tracking.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod change;
mod compiler;
mod cx;
mod diagnostics;
mod ident;
mod intern;
mod loop_ctrl;
mod modload;
mod node;
mod options;
mod pass;
mod pipeline;
mod scope;
mod shadow;
mod state;
mod telemetry;
mod tree;
mod validity;

// Re-exports for stable public API
/// Change-set queries and the monotonic change timeline.
pub use change::{ChangeSet, ChangeTimeline, Region};
/// Core compiler state and engine error taxonomy.
pub use compiler::{Compiler, EngineError};
/// Engine-provided pass context.
pub use cx::PassCx;
/// Diagnostic records, severity levels, and the accumulating log.
pub use diagnostics::{Diagnostic, DiagnosticLog, Level};
/// Canonical identifiers for passes, nodes, and shadows.
pub use ident::{make_pass_id, CompactPassId, Hash, NodeId, PassId, ShadowId};
/// Interned strings and source-file names.
pub use intern::{FileId, FileTable, StringInterner, Symbol};
/// Loop controller outcomes.
pub use loop_ctrl::LoopOutcome;
/// Module-loader contract for import-rewriting passes.
pub use modload::{AliasEntry, LoadError, ModuleLoader, LOAD_WARNING};
/// AST node records: kinds, values, locations, attribute slots.
pub use node::{AstNode, Attributes, NodeKind, NodeValue, SourceLocation};
/// Pipeline configuration.
pub use options::{CompilerOptions, LanguageLevel, DEFAULT_LOOP_CAP};
/// Pass descriptors and the three-method pass interface.
pub use pass::{CompilerPass, OperatesOn, PassKind, PassRecord, PassResult};
/// Pipeline driver, terminal statuses, and cooperative cancellation.
pub use pipeline::{CancelFlag, Pipeline, PipelineStatus};
/// Scope resolution helpers.
pub use scope::{collect_scope_roots, enclosing_scope};
/// Shadow registry and wrap/unwrap lifecycle passes.
pub use shadow::{ShadowEntry, ShadowRegistry, UnwrapIsolatedPass, WrapIsolatedPass};
/// Persisted compiler state codec.
pub use state::{state_digest, StateError};
/// Telemetry sink for pipeline lifecycle events.
pub use telemetry::{NullTelemetrySink, TelemetrySink};
/// Arena-backed AST storage.
pub use tree::AstTree;
/// Structure validity checking.
pub use validity::{structure_check_record, verify_structure, StructureCheckPass};
