// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! AST node records: kinds, values, locations, attributes.

use std::path::PathBuf;

use crate::ident::{NodeId, ShadowId};
use crate::intern::{FileId, Symbol};

/// Token kind of an AST node.
///
/// The set is closed on purpose: validity checks and scope resolution branch
/// on it exhaustively, and new kinds are a deliberate engine change rather
/// than a pass-local extension (no class hierarchy, no open polymorphism).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// Root of a whole AST (externs or program).
    Program,
    /// One source file's top-level body.
    Script,
    /// Body of a loadable module.
    ModuleBody,
    /// Function literal.
    Function,
    /// Function parameter list.
    ParamList,
    /// Statement block.
    Block,
    /// `var` declaration statement.
    Var,
    /// Identifier reference or declaration name.
    Name,
    /// Numeric literal.
    Number,
    /// String literal.
    Str,
    /// `null` literal.
    Null,
    /// `true` literal.
    True,
    /// `false` literal.
    False,
    /// Assignment expression.
    Assign,
    /// Expression statement.
    ExprResult,
    /// `return` statement.
    Return,
    /// `if` statement.
    If,
    /// `switch` statement.
    Switch,
    /// `case` clause.
    Case,
    /// `for (… in …)` loop.
    ForIn,
    /// `for (… of …)` loop.
    ForOf,
    /// `try` statement.
    Try,
    /// `catch` clause.
    Catch,
    /// Call expression.
    Call,
    /// Optional-chaining call expression (`a?.()`).
    OptChainCall,
    /// Property access (`a.b`).
    GetProp,
    /// Optional-chaining property access (`a?.b`).
    OptChainGetProp,
    /// Object literal.
    ObjectLit,
    /// String-keyed member of an object literal.
    StringKey,
    /// Class declaration or expression.
    Class,
    /// `export` declaration.
    Export,
    /// `import` declaration.
    Import,
}

impl NodeKind {
    /// Returns `true` for kinds that anchor change-tracking scopes.
    ///
    /// Blocks are lexical scopes in the source language but are deliberately
    /// not scope roots for change tracking.
    #[must_use]
    pub fn is_scope_root(self) -> bool {
        matches!(
            self,
            Self::Program | Self::Script | Self::Function | Self::ModuleBody
        )
    }
}

/// Literal payload carried by value-bearing nodes (`Name`, `Str`, `Number`, …).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum NodeValue {
    /// Interned identifier or string payload.
    Str(Symbol),
    /// Numeric payload.
    Number(f64),
    /// Boolean payload.
    Bool(bool),
}

// Equality over the raw bit pattern so NaN payloads compare stably; structural
// equivalence and digests must not depend on float semantics.
impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for NodeValue {}

/// Source position of a node: file, 1-based line, 0-based column.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    /// Originating file.
    pub file: FileId,
    /// 1-based line number.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl SourceLocation {
    /// Builds a location triple.
    #[must_use]
    pub fn new(file: FileId, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

/// Attribute slots attached to every node.
///
/// All slots default to unset; passes write them through the pass context so
/// the change timeline observes attribute mutations.
#[derive(Clone, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Attributes {
    /// Declared type annotation, when the doc comment carried one.
    pub declared_type: Option<Symbol>,
    /// Declared-constant flag (`const` semantics from annotations).
    pub declared_const: bool,
    /// Inferred-constant flag set by analysis passes.
    pub inferred_const: bool,
    /// Whether the name is exported from its module.
    pub exported: bool,
    /// Attached jsdoc reference.
    pub jsdoc: Option<Symbol>,
    /// Marker for subtrees that must be isolated behind a shadow during the
    /// wrapped pipeline prefix.
    pub isolated: bool,
    /// Module path attached by import-rewriting passes after resolution.
    pub resolved_module: Option<PathBuf>,
}

/// One node of the AST arena.
///
/// Children are owned (forward edges); `parent` is a back-reference kept
/// consistent by every tree mutation. The shadow slot is not a child edge:
/// traversals of the main tree do not descend through it.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
pub struct AstNode {
    pub(crate) kind: NodeKind,
    pub(crate) value: Option<NodeValue>,
    pub(crate) loc: SourceLocation,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) attrs: Attributes,
    pub(crate) shadow: Option<ShadowId>,
}

impl AstNode {
    pub(crate) fn new(kind: NodeKind, value: Option<NodeValue>, loc: SourceLocation) -> Self {
        Self {
            kind,
            value,
            loc,
            parent: None,
            children: Vec::new(),
            attrs: Attributes::default(),
            shadow: None,
        }
    }
}
