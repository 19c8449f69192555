// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`ModuleLoader`] for the Prism engine.
//!
//! Resolution rules:
//! - Relative specifiers (`./x`, `../x`) resolve against the importing
//!   file's directory, then must land under one of the configured module
//!   roots; escaping every root is [`LoadError::AboveRoot`].
//! - Bare specifiers (`pkg/lib`) are tried under each module root; exactly
//!   one root may match, otherwise [`LoadError::AmbiguousRoot`].
//! - A candidate resolves if it exists as-is or with one of the extension
//!   candidates appended, or if the package main/alias maps redirect it to
//!   an existing file. Blacklisted aliases resolve to nothing.
//!
//! Existence checks go to the filesystem by default; a snapshot file set can
//! be injected for hermetic runs.
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
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use prism_core::{AliasEntry, LoadError, ModuleLoader};

/// Default extension candidates tried after the exact path.
const DEFAULT_EXTENSIONS: &[&str] = &["js", "mjs"];

/// Filesystem-backed module resolver.
#[derive(Debug)]
pub struct FsResolver {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    main_entries: BTreeMap<PathBuf, PathBuf>,
    aliased_entries: BTreeMap<PathBuf, AliasEntry>,
    snapshot: Option<BTreeSet<PathBuf>>,
}

impl FsResolver {
    /// Creates a resolver over the given module roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            main_entries: BTreeMap::new(),
            aliased_entries: BTreeMap::new(),
            snapshot: None,
        }
    }

    /// Replaces the extension candidate list.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
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

    /// Replaces filesystem existence checks with an explicit file set.
    #[must_use]
    pub fn with_snapshot(mut self, files: BTreeSet<PathBuf>) -> Self {
        self.snapshot = Some(files);
        self
    }

    fn exists(&self, path: &Path) -> bool {
        match &self.snapshot {
            Some(files) => files.contains(path),
            None => path.is_file(),
        }
    }

    /// Tries a candidate path: exact, with extensions, then map redirects.
    fn try_candidate(&self, candidate: &Path) -> Option<PathBuf> {
        if self.exists(candidate) {
            return Some(candidate.to_path_buf());
        }
        for ext in &self.extensions {
            let mut with_ext: OsString = candidate.as_os_str().to_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if self.exists(&with_ext) {
                return Some(with_ext);
            }
        }
        if let Some(main) = self.main_entries.get(candidate) {
            if self.exists(main) {
                return Some(main.clone());
            }
        }
        if let Some(AliasEntry::Path(target)) = self.aliased_entries.get(candidate) {
            if self.exists(target) {
                return Some(target.clone());
            }
        }
        None
    }

    fn is_blacklisted(&self, candidate: &Path) -> bool {
        matches!(
            self.aliased_entries.get(candidate),
            Some(AliasEntry::Blacklisted)
        )
    }

    fn under_some_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}

impl ModuleLoader for FsResolver {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, LoadError> {
        if specifier.is_empty() || specifier.contains('\0') {
            return Err(LoadError::InvalidPath(specifier.to_string()));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = from.parent().unwrap_or_else(|| Path::new(""));
            let joined = normalize(&base.join(specifier))
                .ok_or_else(|| LoadError::AboveRoot(specifier.to_string()))?;
            if !self.roots.is_empty() && !self.under_some_root(&joined) {
                return Err(LoadError::AboveRoot(specifier.to_string()));
            }
            if self.is_blacklisted(&joined) {
                return Err(LoadError::NotFound(specifier.to_string()));
            }
            return self
                .try_candidate(&joined)
                .ok_or_else(|| LoadError::NotFound(specifier.to_string()));
        }

        let mut hits: Vec<PathBuf> = Vec::new();
        for root in &self.roots {
            let candidate = root.join(specifier);
            if self.is_blacklisted(&candidate) {
                continue;
            }
            if let Some(resolved) = self.try_candidate(&candidate) {
                hits.push(resolved);
            }
        }
        hits.sort();
        hits.dedup();
        match hits.len() {
            0 => Err(LoadError::NotFound(specifier.to_string())),
            1 => Ok(hits.remove(0)),
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
    let mut parts: Vec<OsString> = Vec::new();
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn snapshot_resolver() -> FsResolver {
        let files = [
            "/proj/src/lib.js",
            "/proj/src/util.js",
            "/proj/vendor/pkg/index.js",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        FsResolver::new(vec![PathBuf::from("/proj/src"), PathBuf::from("/proj/vendor")])
            .with_snapshot(files)
    }

    #[test]
    fn relative_specifiers_resolve_with_extension_candidates() {
        let resolver = snapshot_resolver();
        let from = PathBuf::from("/proj/src/lib.js");
        assert_eq!(
            resolver.resolve("./util", &from),
            Ok(PathBuf::from("/proj/src/util.js"))
        );
    }

    #[test]
    fn escaping_every_root_is_above_root() {
        let resolver = snapshot_resolver();
        let from = PathBuf::from("/proj/src/lib.js");
        assert!(matches!(
            resolver.resolve("../../etc/passwd", &from),
            Err(LoadError::AboveRoot(_))
        ));
    }

    #[test]
    fn bare_specifiers_search_roots() {
        let resolver = snapshot_resolver();
        let from = PathBuf::from("/proj/src/lib.js");
        assert_eq!(
            resolver.resolve("pkg/index", &from),
            Ok(PathBuf::from("/proj/vendor/pkg/index.js"))
        );
    }

    #[test]
    fn a_specifier_matching_two_roots_is_ambiguous() {
        let files = ["/a/x.js", "/b/x.js"].into_iter().map(PathBuf::from).collect();
        let resolver =
            FsResolver::new(vec![PathBuf::from("/a"), PathBuf::from("/b")]).with_snapshot(files);
        assert!(matches!(
            resolver.resolve("x", Path::new("/a/main.js")),
            Err(LoadError::AmbiguousRoot(_))
        ));
    }

    #[test]
    fn empty_and_nul_specifiers_are_invalid() {
        let resolver = snapshot_resolver();
        let from = PathBuf::from("/proj/src/lib.js");
        assert!(matches!(
            resolver.resolve("", &from),
            Err(LoadError::InvalidPath(_))
        ));
        assert!(matches!(
            resolver.resolve("a\0b", &from),
            Err(LoadError::InvalidPath(_))
        ));
    }

    #[test]
    fn package_main_entries_redirect() {
        let files = ["/proj/vendor/pkg/lib/main.js"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let resolver = FsResolver::new(vec![PathBuf::from("/proj/vendor")])
            .with_snapshot(files)
            .with_main_entry("/proj/vendor/pkg", "/proj/vendor/pkg/lib/main.js");
        assert_eq!(
            resolver.resolve("pkg", Path::new("/proj/src/lib.js")),
            Ok(PathBuf::from("/proj/vendor/pkg/lib/main.js"))
        );
    }

    #[test]
    fn blacklisted_aliases_resolve_to_nothing() {
        let files = ["/proj/vendor/fs/index.js"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let resolver = FsResolver::new(vec![PathBuf::from("/proj/vendor")])
            .with_snapshot(files)
            .with_alias("/proj/vendor/fs", AliasEntry::Blacklisted);
        assert!(matches!(
            resolver.resolve("fs", Path::new("/proj/src/lib.js")),
            Err(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn real_filesystem_lookup_works() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        };
        let root = dir.path().to_path_buf();
        let file = root.join("mod.js");
        if let Err(e) = std::fs::write(&file, "// empty\n") {
            panic!("write: {e}");
        }
        let resolver = FsResolver::new(vec![root.clone()]);
        let from = root.join("main.js");
        assert_eq!(resolver.resolve("./mod", &from), Ok(file));
    }
}
