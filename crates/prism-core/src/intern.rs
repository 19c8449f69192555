// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Interned strings and source-file names.
//!
//! Node payloads (identifier names, string literals, jsdoc text) are interned
//! once into the compiler context and referenced by compact [`Symbol`] handles.
//! Source files get the same treatment via [`FileTable`]/[`FileId`]. Both
//! tables snapshot to plain `Vec<String>` for the persisted state blob, so the
//! compact handles remain stable across save/restore.

use rustc_hash::FxHashMap;

/// Compact handle for an interned string.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Append-only string interner.
///
/// Symbols are never removed for the lifetime of the compiler context.
#[derive(Debug, Default)]
pub struct StringInterner {
    map: FxHashMap<Box<str>, Symbol>,
    strings: Vec<Box<str>>,
}

impl StringInterner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text` and returns its handle, reusing an existing entry when present.
    pub fn intern(&mut self, text: &str) -> Symbol {
        if let Some(sym) = self.map.get(text) {
            return *sym;
        }
        let sym = Symbol::from_index(self.strings.len());
        self.strings.push(text.into());
        self.map.insert(text.into(), sym);
        sym
    }

    /// Resolves a handle back to its string, when the handle is valid.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.index()).map(AsRef::as_ref)
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` when nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Snapshot of the interned strings in handle order, for persisted state.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.strings.iter().map(|s| s.to_string()).collect()
    }

    /// Rebuilds an interner from a [`Self::snapshot`] payload.
    #[must_use]
    pub fn from_snapshot(strings: Vec<String>) -> Self {
        let mut interner = Self::default();
        for s in strings {
            interner.intern(&s);
        }
        interner
    }
}

/// Compact handle for a registered source file.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct FileId(u32);

impl FileId {
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registry of source-file names referenced by node locations and diagnostics.
#[derive(Debug, Default)]
pub struct FileTable {
    map: FxHashMap<Box<str>, FileId>,
    names: Vec<Box<str>>,
}

impl FileTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` and returns its id, reusing an existing entry when present.
    pub fn add(&mut self, name: &str) -> FileId {
        if let Some(id) = self.map.get(name) {
            return *id;
        }
        let id = FileId::from_index(self.names.len());
        self.names.push(name.into());
        self.map.insert(name.into(), id);
        id
    }

    /// Resolves a file id back to its name, when the id is valid.
    #[must_use]
    pub fn name(&self, id: FileId) -> Option<&str> {
        self.names.get(id.index()).map(AsRef::as_ref)
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when no file has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Snapshot of the file names in id order, for persisted state.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.names.iter().map(|s| s.to_string()).collect()
    }

    /// Rebuilds a table from a [`Self::snapshot`] payload.
    #[must_use]
    pub fn from_snapshot(names: Vec<String>) -> Self {
        let mut table = Self::default();
        for n in names {
            table.add(&n);
        }
        table
    }
}
