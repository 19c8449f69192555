// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Persisted compiler state.
//!
//! Determinism contract
//! - The blob is canonical CBOR over a fixed struct: arena slots in
//!   allocation order, shadow entries in id order, timeline tables as
//!   `BTreeMap`s, file/symbol tables as snapshot vectors.
//! - Restore followed by save is byte-identical when no pass ran in between;
//!   tests pin this with [`state_digest`].
//! - JSON is deliberately not used here: map ordering would not be stable.

use std::collections::BTreeMap;

use blake3::Hasher;
use bytes::Bytes;
use thiserror::Error;

use crate::change::ChangeTimeline;
use crate::compiler::Compiler;
use crate::diagnostics::{Diagnostic, DiagnosticLog};
use crate::ident::{Hash, NodeId, PassId, ShadowId};
use crate::intern::{FileTable, StringInterner};
use crate::node::AstNode;
use crate::options::CompilerOptions;
use crate::shadow::{ShadowEntry, ShadowRegistry};
use crate::tree::AstTree;

/// Persisted-state codec failures.
#[derive(Debug, Error)]
pub enum StateError {
    /// Serialization failed.
    #[error("state encode failed: {0}")]
    Encode(String),
    /// Deserialization failed.
    #[error("state decode failed: {0}")]
    Decode(String),
    /// The blob's layout version is not supported.
    #[error("unsupported state version: {0}")]
    UnsupportedVersion(u32),
}

const STATE_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct SavedState {
    version: u32,
    files: Vec<String>,
    symbols: Vec<String>,
    slots: Vec<Option<AstNode>>,
    externs_root: NodeId,
    program_root: NodeId,
    shadow_entries: Vec<ShadowEntry>,
    shadow_next: u32,
    clock: u64,
    main_marks: BTreeMap<NodeId, u64>,
    shadow_marks: BTreeMap<ShadowId, BTreeMap<NodeId, u64>>,
    pass_stamps: BTreeMap<PassId, u64>,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    /// Serializes the full compiler state: both trees, every shadow with its
    /// host identity, the timeline clock and tables, the pass-timestamp map,
    /// and the diagnostic log.
    pub fn save_state(&self) -> Result<Bytes, StateError> {
        let (shadow_entries, shadow_next) = self.shadows.snapshot();
        let state = SavedState {
            version: STATE_VERSION,
            files: self.files.snapshot(),
            symbols: self.interner.snapshot(),
            slots: self.tree.slots.clone(),
            externs_root: self.externs_root,
            program_root: self.program_root,
            shadow_entries,
            shadow_next,
            clock: self.timeline.clock,
            main_marks: self.timeline.main.clone(),
            shadow_marks: self.timeline.shadows.clone(),
            pass_stamps: self.timeline.pass_stamps.clone(),
            diagnostics: self.diagnostics.entries.clone(),
        };
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&state, &mut buf)
            .map_err(|e| StateError::Encode(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Rebuilds a compiler from a [`Compiler::save_state`] blob.
    ///
    /// Options and the module loader are not part of the blob; the caller
    /// supplies options and re-installs a loader if passes need one.
    pub fn restore_state(blob: &[u8], options: CompilerOptions) -> Result<Self, StateError> {
        let state: SavedState =
            ciborium::de::from_reader(blob).map_err(|e| StateError::Decode(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }
        Ok(Self {
            tree: AstTree::from_slots(state.slots),
            externs_root: state.externs_root,
            program_root: state.program_root,
            shadows: ShadowRegistry::from_snapshot(state.shadow_entries, state.shadow_next),
            timeline: ChangeTimeline {
                clock: state.clock,
                main: state.main_marks,
                shadows: state.shadow_marks,
                pass_stamps: state.pass_stamps,
            },
            diagnostics: DiagnosticLog {
                entries: state.diagnostics,
            },
            files: FileTable::from_snapshot(state.files),
            interner: StringInterner::from_snapshot(state.symbols),
            options,
            loader: None,
            active: None,
        })
    }
}

/// Canonical digest of a persisted-state blob.
#[must_use]
pub fn state_digest(blob: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"prism:state:v1");
    hasher.update(blob);
    hasher.finalize().into()
}
