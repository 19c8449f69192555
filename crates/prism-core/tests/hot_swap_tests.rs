// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]
use prism_core::{
    Compiler, CompilerOptions, EngineError, NodeId, NodeKind, NodeValue, OperatesOn, PassRecord,
    Pipeline, verify_structure,
};
use prism_dry_tests::{shared_log, LiteralRewritePass, NoOpPass, RewriteTarget, SharedLog};

fn options_with_hot_swap() -> CompilerOptions {
    CompilerOptions {
        allow_hot_swap_replace_script: true,
        ..CompilerOptions::default()
    }
}

fn add_script_with_literal(compiler: &mut Compiler, file: &str, value: f64) -> NodeId {
    let script = compiler.add_script(file).unwrap();
    attach_literal(compiler, script, value);
    script
}

fn attach_literal(compiler: &mut Compiler, script: NodeId, value: f64) {
    let loc = compiler.tree().loc(script).unwrap();
    let stmt = compiler.tree_mut().new_node(NodeKind::ExprResult, loc);
    let lit = compiler
        .tree_mut()
        .new_node_with_value(NodeKind::Number, NodeValue::Number(value), loc);
    compiler.tree_mut().append_child(stmt, lit).unwrap();
    compiler.tree_mut().append_child(script, stmt).unwrap();
}

fn rewrite_pipeline(log: &SharedLog) -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline
        .register(
            PassRecord::loop_member(
                "rewrite-ones",
                LiteralRewritePass {
                    from: 1.0,
                    to: 2.0,
                    target: RewriteTarget::Main,
                    log: log.clone(),
                },
            )
            .operates_on(OperatesOn::MainOnly),
        )
        .unwrap();
    pipeline
}

#[test]
fn incremental_reprocessing_touches_only_the_replaced_script() {
    let mut compiler = Compiler::new(options_with_hot_swap());
    let s1 = add_script_with_literal(&mut compiler, "one.js", 1.0);
    let _s2 = add_script_with_literal(&mut compiler, "two.js", 1.0);

    let log = shared_log();
    let mut pipeline = rewrite_pipeline(&log);
    pipeline.process(&mut compiler).unwrap();
    let runs_after_first = usize::try_from(log.borrow().runs).unwrap();

    // Replace one input with an edited source.
    let replacement = compiler.new_detached_script("one.js");
    attach_literal(&mut compiler, replacement, 1.0);
    compiler.replace_script(s1, replacement).unwrap();
    verify_structure(&compiler).unwrap();
    assert!(!compiler.tree().contains(s1));

    // Incremental run: the pass's recorded timestamp precedes the swap, so
    // its change set is exactly the replaced script's scope.
    pipeline.process(&mut compiler).unwrap();
    let log = log.borrow();
    let first_incremental = &log.change_sets[runs_after_first];
    assert_eq!(first_incremental.as_slice(), &[replacement]);

    // The edited script was processed.
    let stmt = compiler.tree().children(replacement)[0];
    let lit = compiler.tree().children(stmt)[0];
    assert_eq!(compiler.tree().value(lit), Some(NodeValue::Number(2.0)));
}

#[test]
fn every_incremental_change_set_is_confined_to_the_new_script() {
    let mut compiler = Compiler::new(options_with_hot_swap());
    let s1 = add_script_with_literal(&mut compiler, "one.js", 1.0);
    let _s2 = add_script_with_literal(&mut compiler, "two.js", 1.0);

    let log = shared_log();
    let mut pipeline = rewrite_pipeline(&log);
    pipeline.process(&mut compiler).unwrap();
    let runs_after_first = usize::try_from(log.borrow().runs).unwrap();

    let replacement = compiler.new_detached_script("one.js");
    attach_literal(&mut compiler, replacement, 1.0);
    compiler.replace_script(s1, replacement).unwrap();
    pipeline.process(&mut compiler).unwrap();

    // Other main scopes never reappear in the incremental run's queries.
    let log = log.borrow();
    for set in &log.change_sets[runs_after_first..] {
        assert_eq!(set.as_slice(), &[replacement]);
    }
}

#[test]
fn hot_swap_requires_the_option() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let s1 = add_script_with_literal(&mut compiler, "one.js", 1.0);
    let replacement = compiler.new_detached_script("one.js");
    let err = compiler.replace_script(s1, replacement).unwrap_err();
    assert!(matches!(err, EngineError::HotSwapDisabled));
}

#[test]
fn hot_swap_rejects_non_script_nodes() {
    let mut compiler = Compiler::new(options_with_hot_swap());
    let s1 = add_script_with_literal(&mut compiler, "one.js", 1.0);
    let stmt = compiler.tree().children(s1)[0];
    let replacement = compiler.new_detached_script("one.js");
    let err = compiler.replace_script(stmt, replacement).unwrap_err();
    assert!(matches!(err, EngineError::NotAScript(n) if n == stmt));

    // A NoOp pipeline still runs fine afterwards; nothing was mutated.
    let log = shared_log();
    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::one_shot("audit", NoOpPass { log: log.clone() }))
        .unwrap();
    pipeline.process(&mut compiler).unwrap();
    assert_eq!(log.borrow().runs, 1);
}
