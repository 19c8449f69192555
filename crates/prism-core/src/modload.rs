// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Module-loader contract consumed by import-rewriting passes.
//!
//! The engine does not resolve modules itself: it consults an injected
//! [`ModuleLoader`], surfaces resolution failures as [`LOAD_WARNING`]
//! diagnostics, and exposes the loader's package maps so passes can consult
//! them. Concrete loaders live outside the core (see `prism-resolve-fs`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Diagnostic key used when a module specifier fails to resolve.
pub const LOAD_WARNING: &str = "load-warning";

/// Module resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No module exists for the specifier.
    #[error("module not found: {0}")]
    NotFound(String),
    /// The specifier matches under more than one module root.
    #[error("specifier resolves under multiple roots: {0}")]
    AmbiguousRoot(String),
    /// Resolution escaped above every configured module root.
    #[error("specifier escapes the module roots: {0}")]
    AboveRoot(String),
    /// The specifier is not a usable path.
    #[error("invalid module path: {0}")]
    InvalidPath(String),
}

/// Entry in the package alias map: a redirect, or a blacklist marker for
/// aliases that must never be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasEntry {
    /// Alias redirects to this path.
    Path(PathBuf),
    /// Alias is blacklisted; imports of it resolve to nothing.
    Blacklisted,
}

/// Resolver contract the engine consumes.
pub trait ModuleLoader {
    /// Resolves `specifier` as imported from the file `from`.
    fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, LoadError>;

    /// Package-root → main-entry mapping.
    fn package_main_entries(&self) -> &BTreeMap<PathBuf, PathBuf>;

    /// Package alias mapping, including blacklist markers.
    fn package_aliased_entries(&self) -> &BTreeMap<PathBuf, AliasEntry>;
}
