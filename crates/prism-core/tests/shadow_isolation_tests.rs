// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]
use prism_core::{
    structure_check_record, Compiler, CompilerOptions, NodeValue, OperatesOn, PassRecord,
    Pipeline, PipelineStatus, Region, UnwrapIsolatedPass, WrapIsolatedPass,
};
use prism_dry_tests::{build_isolation_program, shared_log, LiteralRewritePass, RewriteTarget};

#[test]
fn shadow_and_main_rewrites_never_contaminate_each_other() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let program = build_isolation_program(&mut compiler).unwrap();
    let main_log = shared_log();
    let shadow_log = shared_log();

    let mut pipeline = Pipeline::new();
    pipeline.set_validity_check(structure_check_record()).unwrap();
    pipeline
        .register(PassRecord::one_shot("wrap-isolated", WrapIsolatedPass))
        .unwrap();
    pipeline
        .register(
            PassRecord::loop_member(
                "rewrite-main-literals",
                LiteralRewritePass {
                    from: 1.0,
                    to: 2.0,
                    target: RewriteTarget::Main,
                    log: main_log.clone(),
                },
            )
            .operates_on(OperatesOn::MainOnly),
        )
        .unwrap();
    pipeline
        .register(
            PassRecord::loop_member(
                "rewrite-shadow-literals",
                LiteralRewritePass {
                    from: 1.0,
                    to: 4.0,
                    target: RewriteTarget::Shadows,
                    log: shadow_log.clone(),
                },
            )
            .operates_on(OperatesOn::ShadowOnly),
        )
        .unwrap();
    pipeline
        .register(PassRecord::one_shot("unwrap-isolated", UnwrapIsolatedPass))
        .unwrap();

    let status = pipeline.process(&mut compiler).unwrap();
    assert_eq!(status, PipelineStatus::Completed);

    // Outer literal rewritten by the main pass, inner by the shadow pass.
    assert_eq!(
        compiler.tree().value(program.outer_literal),
        Some(NodeValue::Number(2.0))
    );
    assert_eq!(
        compiler.tree().value(program.inner_literal),
        Some(NodeValue::Number(4.0))
    );

    // Each pass applied its rewrite in round one and went quiet after its
    // own revisit; the loop converged in two rounds.
    assert_eq!(main_log.borrow().runs, 2);
    assert_eq!(shadow_log.borrow().runs, 2);

    // Neither pass ever saw the other's region in a change set.
    for set in &main_log.borrow().change_sets {
        assert!(
            !set.contains(&program.isolated_block),
            "main pass saw a shadow scope: {set:?}"
        );
    }
    for set in &shadow_log.borrow().change_sets {
        assert_eq!(
            set.as_slice(),
            &[program.isolated_block],
            "shadow pass saw outside its region"
        );
    }

    // Everything unwrapped.
    assert!(compiler.shadows().is_empty());
}

#[test]
fn shadow_marks_are_invisible_to_main_queries() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let program = build_isolation_program(&mut compiler).unwrap();
    compiler.wrap_isolated_subtrees().unwrap();
    let stamp = compiler.timeline().clock();

    // Mutate inside the shadow through the report path.
    compiler.report_change(program.inner_literal).unwrap();

    assert!(compiler
        .timeline()
        .changed_since(stamp, Region::Main)
        .is_empty());
    assert_eq!(
        compiler.timeline().changed_since(stamp, Region::AllShadows),
        [program.isolated_block].into_iter().collect()
    );

    // And symmetrically: a main mutation stays out of shadow queries.
    let stamp = compiler.timeline().clock();
    compiler.report_change(program.outer_literal).unwrap();
    assert!(compiler
        .timeline()
        .changed_since(stamp, Region::AllShadows)
        .is_empty());
    assert_eq!(
        compiler.timeline().changed_since(stamp, Region::Main),
        [program.script].into_iter().collect()
    );
}

#[test]
fn unwrap_after_wrap_restores_structural_equivalence() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let program = build_isolation_program(&mut compiler).unwrap();
    let digest_before = compiler.tree().subtree_digest(compiler.program_root());

    let wrapped = compiler.wrap_isolated_subtrees().unwrap();
    assert_eq!(wrapped, 1);
    assert_eq!(compiler.shadows().len(), 1);
    // The stub host stands in for the block; the main tree differs now.
    assert_ne!(
        compiler.tree().subtree_digest(compiler.program_root()),
        digest_before
    );
    // The shadow slot is not a child edge: the inner literal is unreachable
    // from the program root while wrapped.
    let reachable = compiler.tree().collect_subtree(compiler.program_root());
    assert!(!reachable.contains(&program.inner_literal));

    let unwrapped = compiler.unwrap_isolated_subtrees().unwrap();
    assert_eq!(unwrapped, 1);
    assert!(compiler.shadows().is_empty());
    assert_eq!(
        compiler.tree().subtree_digest(compiler.program_root()),
        digest_before
    );
}

#[test]
fn nested_isolated_markers_wrap_outermost_only() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let program = build_isolation_program(&mut compiler).unwrap();
    // Mark a child of the isolated block as isolated too.
    let inner_stmt = compiler.tree().children(program.isolated_block)[0];
    if let Some(attrs) = compiler.tree_mut().attrs_mut(inner_stmt) {
        attrs.isolated = true;
    }
    let wrapped = compiler.wrap_isolated_subtrees().unwrap();
    assert_eq!(wrapped, 1);
    assert_eq!(compiler.shadows().len(), 1);
}
