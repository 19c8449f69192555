// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Diagnostic records and the accumulating log.
//!
//! Batch emission order is total and stable: source file name (diagnostics
//! without a location first), line, column, level (errors before warnings
//! before infos), then key. Duplicates — same key and same location — are
//! collapsed to the first occurrence.

use std::cmp::Ordering;

use crate::intern::FileTable;
use crate::node::SourceLocation;

/// Severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub enum Level {
    /// Blocks compilation unless `continue_after_errors` is set.
    Error,
    /// Surfaced to the caller; never blocks.
    Warning,
    /// Informational only.
    Info,
}

/// One diagnostic: stable key, level, optional location, optional message.
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    /// Stable string key identifying the diagnostic family.
    pub key: String,
    /// Severity.
    pub level: Level,
    /// Source location, when one applies.
    pub loc: Option<SourceLocation>,
    /// Pre-formatted message, when the producer rendered one.
    pub message: Option<String>,
}

impl Diagnostic {
    /// Builds a diagnostic with no location or message.
    #[must_use]
    pub fn new(key: impl Into<String>, level: Level) -> Self {
        Self {
            key: key.into(),
            level,
            loc: None,
            message: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Attaches a rendered message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Accumulating diagnostic log.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    pub(crate) entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        self.entries.push(diag);
    }

    /// All entries in emission order (unsorted, undeduplicated).
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of accumulated entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of error-level entries.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    /// Emits the batch: sorted totally and stably, duplicates collapsed.
    #[must_use]
    pub fn emit_batch(&self, files: &FileTable) -> Vec<Diagnostic> {
        let mut batch: Vec<Diagnostic> = self.entries.clone();
        batch.sort_by(|a, b| compare(a, b, files));
        batch.dedup_by(|next, prev| next.key == prev.key && next.loc == prev.loc);
        batch
    }
}

fn compare(a: &Diagnostic, b: &Diagnostic, files: &FileTable) -> Ordering {
    let file_name = |d: &Diagnostic| -> Option<String> {
        d.loc
            .and_then(|l| files.name(l.file))
            .map(ToString::to_string)
    };
    // Option<String> orders None first, which is the required null placement.
    file_name(a)
        .cmp(&file_name(b))
        .then_with(|| line_col(a).cmp(&line_col(b)))
        .then_with(|| a.level.cmp(&b.level))
        .then_with(|| a.key.cmp(&b.key))
}

fn line_col(d: &Diagnostic) -> (u32, u32) {
    d.loc.map_or((0, 0), |l| (l.line, l.column))
}
