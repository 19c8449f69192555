// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builders for the small program trees the engine tests exercise.

use prism_core::{
    Compiler, EngineError, NodeId, NodeKind, NodeValue, SourceLocation, Symbol,
};

/// Handles into the alias-inlining program:
///
/// ```text
/// var a = {}; a.b = function(){}; var c = a; c.b = 0; use(a.b);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AliasProgram {
    /// The script holding all five statements.
    pub script: NodeId,
    /// `var c = a;` — the alias declaration's `Name c` node.
    pub alias_decl_name: NodeId,
    /// The `Name a` initializer under the alias declaration.
    pub alias_init: NodeId,
    /// The `Name c` use inside `c.b = 0`.
    pub alias_use: NodeId,
}

/// Handles into the shadow-isolation program: one literal `1` inside an
/// isolated-marked block and one outside it.
#[derive(Debug, Clone, Copy)]
pub struct IsolationProgram {
    /// The script.
    pub script: NodeId,
    /// The outer `Number 1` literal.
    pub outer_literal: NodeId,
    /// The isolated-marked block.
    pub isolated_block: NodeId,
    /// The inner `Number 1` literal.
    pub inner_literal: NodeId,
}

struct Builder<'a> {
    compiler: &'a mut Compiler,
    loc: SourceLocation,
}

impl Builder<'_> {
    fn node(&mut self, kind: NodeKind) -> NodeId {
        self.compiler.tree_mut().new_node(kind, self.loc)
    }

    fn name(&mut self, text: &str) -> NodeId {
        let sym = self.sym(text);
        self.compiler
            .tree_mut()
            .new_node_with_value(NodeKind::Name, NodeValue::Str(sym), self.loc)
    }

    fn string(&mut self, text: &str) -> NodeId {
        let sym = self.sym(text);
        self.compiler
            .tree_mut()
            .new_node_with_value(NodeKind::Str, NodeValue::Str(sym), self.loc)
    }

    fn number(&mut self, value: f64) -> NodeId {
        self.compiler
            .tree_mut()
            .new_node_with_value(NodeKind::Number, NodeValue::Number(value), self.loc)
    }

    fn sym(&mut self, text: &str) -> Symbol {
        self.compiler.interner_mut().intern(text)
    }

    fn attach(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), EngineError> {
        for &child in children {
            self.compiler.tree_mut().append_child(parent, child)?;
        }
        Ok(())
    }
}

/// Builds the alias-inlining program under a fresh script.
pub fn build_alias_program(compiler: &mut Compiler) -> Result<AliasProgram, EngineError> {
    let script = compiler.add_script("alias.js")?;
    let loc = compiler
        .tree()
        .loc(script)
        .ok_or(EngineError::UnknownNode(script))?;
    let mut b = Builder { compiler, loc };

    // var a = {};
    let var_a = b.node(NodeKind::Var);
    let name_a = b.name("a");
    let obj = b.node(NodeKind::ObjectLit);
    b.attach(name_a, &[obj])?;
    b.attach(var_a, &[name_a])?;

    // a.b = function(){};
    let stmt_fn = b.node(NodeKind::ExprResult);
    let assign_fn = b.node(NodeKind::Assign);
    let target_fn = b.node(NodeKind::GetProp);
    let obj_name = b.name("a");
    let prop_b = b.string("b");
    b.attach(target_fn, &[obj_name, prop_b])?;
    let func = b.node(NodeKind::Function);
    let fn_name = b.name("");
    let params = b.node(NodeKind::ParamList);
    let body = b.node(NodeKind::Block);
    b.attach(func, &[fn_name, params, body])?;
    b.attach(assign_fn, &[target_fn, func])?;
    b.attach(stmt_fn, &[assign_fn])?;

    // var c = a;
    let var_c = b.node(NodeKind::Var);
    let alias_decl_name = b.name("c");
    let alias_init = b.name("a");
    b.attach(alias_decl_name, &[alias_init])?;
    b.attach(var_c, &[alias_decl_name])?;

    // c.b = 0;
    let stmt_zero = b.node(NodeKind::ExprResult);
    let assign_zero = b.node(NodeKind::Assign);
    let target_zero = b.node(NodeKind::GetProp);
    let alias_use = b.name("c");
    let prop_b2 = b.string("b");
    b.attach(target_zero, &[alias_use, prop_b2])?;
    let zero = b.number(0.0);
    b.attach(assign_zero, &[target_zero, zero])?;
    b.attach(stmt_zero, &[assign_zero])?;

    // use(a.b);
    let stmt_use = b.node(NodeKind::ExprResult);
    let call = b.node(NodeKind::Call);
    let callee = b.name("use");
    let arg = b.node(NodeKind::GetProp);
    let arg_obj = b.name("a");
    let arg_prop = b.string("b");
    b.attach(arg, &[arg_obj, arg_prop])?;
    b.attach(call, &[callee, arg])?;
    b.attach(stmt_use, &[call])?;

    b.attach(script, &[var_a, stmt_fn, var_c, stmt_zero, stmt_use])?;

    Ok(AliasProgram {
        script,
        alias_decl_name,
        alias_init,
        alias_use,
    })
}

/// Builds the shadow-isolation program: a marked-isolated block with a
/// literal `1` inside, and a literal `1` outside.
pub fn build_isolation_program(compiler: &mut Compiler) -> Result<IsolationProgram, EngineError> {
    let script = compiler.add_script("isolated.js")?;
    let loc = compiler
        .tree()
        .loc(script)
        .ok_or(EngineError::UnknownNode(script))?;
    let mut b = Builder { compiler, loc };

    let outer_stmt = b.node(NodeKind::ExprResult);
    let outer_literal = b.number(1.0);
    b.attach(outer_stmt, &[outer_literal])?;

    let isolated_block = b.node(NodeKind::Block);
    let inner_stmt = b.node(NodeKind::ExprResult);
    let inner_literal = b.number(1.0);
    b.attach(inner_stmt, &[inner_literal])?;
    b.attach(isolated_block, &[inner_stmt])?;

    b.attach(script, &[outer_stmt, isolated_block])?;

    if let Some(attrs) = b.compiler.tree_mut().attrs_mut(isolated_block) {
        attrs.isolated = true;
    }

    Ok(IsolationProgram {
        script,
        outer_literal,
        isolated_block,
        inner_literal,
    })
}
