// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory module loader fake for testing without a filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use prism_core::{AliasEntry, LoadError, ModuleLoader};

/// Module loader backed by an explicit file set.
///
/// Relative specifiers resolve against the importing file; bare specifiers
/// resolve against the configured roots. The error taxonomy matches the
/// filesystem resolver so engine tests can assert on the same kinds.
#[derive(Debug, Default)]
pub struct InMemoryModuleLoader {
    files: BTreeSet<PathBuf>,
    roots: Vec<PathBuf>,
    main_entries: BTreeMap<PathBuf, PathBuf>,
    aliased_entries: BTreeMap<PathBuf, AliasEntry>,
}

impl InMemoryModuleLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolvable file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    /// Adds a module root for bare specifiers.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Registers a package main entry.
    #[must_use]
    pub fn with_main_entry(
        mut self,
        package: impl Into<PathBuf>,
        main: impl Into<PathBuf>,
    ) -> Self {
        self.main_entries.insert(package.into(), main.into());
        self
    }

    /// Registers a package alias entry.
    #[must_use]
    pub fn with_alias(mut self, from: impl Into<PathBuf>, entry: AliasEntry) -> Self {
        self.aliased_entries.insert(from.into(), entry);
        self
    }

    fn lookup(&self, candidate: &Path, specifier: &str) -> Result<PathBuf, LoadError> {
        if self.files.contains(candidate) {
            return Ok(candidate.to_path_buf());
        }
        if let Some(main) = self.main_entries.get(candidate) {
            if self.files.contains(main) {
                return Ok(main.clone());
            }
        }
        match self.aliased_entries.get(candidate) {
            Some(AliasEntry::Path(target)) if self.files.contains(target) => {
                return Ok(target.clone())
            }
            Some(AliasEntry::Blacklisted) => {
                return Err(LoadError::NotFound(specifier.to_string()))
            }
            _ => {}
        }
        Err(LoadError::NotFound(specifier.to_string()))
    }
}

impl ModuleLoader for InMemoryModuleLoader {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, LoadError> {
        if specifier.is_empty() || specifier.contains('\0') {
            return Err(LoadError::InvalidPath(specifier.to_string()));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = from.parent().unwrap_or_else(|| Path::new(""));
            let joined = normalize(&base.join(specifier))
                .ok_or_else(|| LoadError::AboveRoot(specifier.to_string()))?;
            return self.lookup(&joined, specifier);
        }
        let mut hits: Vec<PathBuf> = Vec::new();
        for root in &self.roots {
            let candidate = root.join(specifier);
            if self.lookup(&candidate, specifier).is_ok() {
                hits.push(candidate);
            }
        }
        match hits.len() {
            0 => Err(LoadError::NotFound(specifier.to_string())),
            1 => self.lookup(&hits[0], specifier),
            _ => Err(LoadError::AmbiguousRoot(specifier.to_string())),
        }
    }

    fn package_main_entries(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.main_entries
    }

    fn package_aliased_entries(&self) -> &BTreeMap<PathBuf, AliasEntry> {
        &self.aliased_entries
    }
}

/// Lexical normalization; `None` when `..` escapes the path entirely.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::Prefix(p) => parts.push(p.as_os_str().to_os_string()),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(c) => parts.push(c.to_os_string()),
        }
    }
    let mut out = PathBuf::new();
    if absolute {
        out.push(Component::RootDir.as_os_str());
    }
    for p in parts {
        out.push(p);
    }
    Some(out)
}
