// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
use prism_core::{
    Compiler, CompilerOptions, EngineError, OperatesOn, PassRecord, Pipeline,
};
use prism_dry_tests::{shared_log, AlwaysChangePass, NoOpPass};

fn options_with_cap(cap: u32) -> CompilerOptions {
    CompilerOptions {
        max_loop_iterations: cap,
        ..CompilerOptions::default()
    }
}

#[test]
fn always_reporting_pass_hits_the_divergence_cap() {
    let cap = 5;
    let mut compiler = Compiler::new(options_with_cap(cap));
    compiler.add_script("main.js").unwrap();
    let log = shared_log();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::loop_member(
            "always-change",
            AlwaysChangePass { log: log.clone() },
        ))
        .unwrap();

    let clock_before = compiler.timeline().clock();
    let err = pipeline.process(&mut compiler).unwrap_err();
    match err {
        EngineError::LoopDivergence { rounds, passes } => {
            assert_eq!(rounds, cap + 1);
            assert_eq!(passes, vec!["always-change"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // One mark per round, cap + 1 rounds ran before the loop gave up.
    assert_eq!(
        compiler.timeline().clock(),
        clock_before + u64::from(cap) + 1
    );
    assert_eq!(log.borrow().runs, cap + 1);
}

#[test]
fn pass_that_never_reports_runs_exactly_once_per_loop() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.add_script("main.js").unwrap();
    let log = shared_log();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::loop_member("no-op", NoOpPass { log: log.clone() }))
        .unwrap();

    let clock_before = compiler.timeline().clock();
    pipeline.process(&mut compiler).unwrap();
    assert_eq!(log.borrow().runs, 1);
    assert_eq!(compiler.timeline().clock(), clock_before);
}

#[test]
fn empty_region_pass_is_still_invoked_once() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.add_script("main.js").unwrap();
    let log = shared_log();

    // No shadows exist, so this pass's region is empty.
    let mut pipeline = Pipeline::new();
    pipeline
        .register(
            PassRecord::loop_member("shadow-only-no-op", NoOpPass { log: log.clone() })
                .operates_on(OperatesOn::ShadowOnly),
        )
        .unwrap();

    pipeline.process(&mut compiler).unwrap();
    let log = log.borrow();
    assert_eq!(log.runs, 1);
    assert_eq!(log.change_sets, vec![Vec::new()]);
}

#[test]
fn per_pass_iteration_cap_is_fatal_when_exceeded() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.add_script("main.js").unwrap();
    let log = shared_log();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(
            PassRecord::loop_member("capped", AlwaysChangePass { log: log.clone() })
                .iteration_cap(3),
        )
        .unwrap();

    let err = pipeline.process(&mut compiler).unwrap_err();
    match err {
        EngineError::LoopDivergence { rounds, passes } => {
            assert_eq!(rounds, 3);
            assert_eq!(passes, vec!["capped"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(log.borrow().runs, 3);
}

#[test]
fn duplicate_pass_registration_is_rejected() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::loop_member("dup", NoOpPass { log: shared_log() }))
        .unwrap();
    let err = pipeline
        .register(PassRecord::one_shot("dup", NoOpPass { log: shared_log() }))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicatePassName("dup")));
}
