// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]
use prism_core::{
    ChangeSet, Compiler, CompilerOptions, CompilerPass, Diagnostic, Level, NodeId, PassCx,
    PassRecord, PassResult, Pipeline, PipelineStatus, SourceLocation,
};

/// Emits one diagnostic per run.
struct EmitDiagnosticPass {
    key: &'static str,
    level: Level,
}

impl CompilerPass for EmitDiagnosticPass {
    fn process(
        &mut self,
        cx: &mut PassCx<'_>,
        _externs_root: NodeId,
        _program_root: NodeId,
        _changed: &ChangeSet,
    ) -> PassResult {
        cx.report_diagnostic(Diagnostic::new(self.key, self.level));
        Ok(())
    }
}

#[test]
fn batch_emission_order_is_total_and_duplicates_collapse() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    let file_a = compiler.files_mut().add("fileA.js");
    let file_b = compiler.files_mut().add("fileB.js");
    let at_a = SourceLocation::new(file_a, 10, 5);
    let at_b = SourceLocation::new(file_b, 1, 1);

    compiler
        .diagnostics_mut()
        .push(Diagnostic::new("err-key", Level::Error).at(at_a));
    compiler
        .diagnostics_mut()
        .push(Diagnostic::new("err-key", Level::Error).at(at_a)); // duplicate
    compiler
        .diagnostics_mut()
        .push(Diagnostic::new("warn-key", Level::Warning).at(at_b));

    let batch = compiler.diagnostics().emit_batch(compiler.files());
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].key, "err-key");
    assert_eq!(batch[0].loc, Some(at_a));
    assert_eq!(batch[1].key, "warn-key");
    assert_eq!(batch[1].loc, Some(at_b));
}

#[test]
fn identical_inputs_produce_identical_sequences() {
    let build = || {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let f1 = compiler.files_mut().add("b.js");
        let f2 = compiler.files_mut().add("a.js");
        compiler
            .diagnostics_mut()
            .push(Diagnostic::new("k2", Level::Warning).at(SourceLocation::new(f1, 2, 0)));
        compiler
            .diagnostics_mut()
            .push(Diagnostic::new("k1", Level::Error).at(SourceLocation::new(f2, 9, 3)));
        compiler
            .diagnostics_mut()
            .push(Diagnostic::new("k0", Level::Info));
        compiler
    };
    let c1 = build();
    let c2 = build();
    assert_eq!(
        c1.diagnostics().emit_batch(c1.files()),
        c2.diagnostics().emit_batch(c2.files())
    );
    // Null locations first, then by file name.
    let batch = c1.diagnostics().emit_batch(c1.files());
    let keys: Vec<&str> = batch.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, ["k0", "k1", "k2"]);
}

#[test]
fn error_diagnostics_halt_the_pipeline_by_default() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.add_script("main.js").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::one_shot(
            "report-error",
            EmitDiagnosticPass {
                key: "bad-thing",
                level: Level::Error,
            },
        ))
        .unwrap();
    pipeline
        .register(PassRecord::one_shot(
            "never-reached",
            EmitDiagnosticPass {
                key: "unreached",
                level: Level::Info,
            },
        ))
        .unwrap();

    let status = pipeline.process(&mut compiler).unwrap();
    assert_eq!(status, PipelineStatus::Halted);
    assert_eq!(compiler.diagnostics().len(), 1);
}

#[test]
fn continue_after_errors_lets_the_pipeline_finish() {
    let options = CompilerOptions {
        continue_after_errors: true,
        ..CompilerOptions::default()
    };
    let mut compiler = Compiler::new(options);
    compiler.add_script("main.js").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::one_shot(
            "report-error",
            EmitDiagnosticPass {
                key: "bad-thing",
                level: Level::Error,
            },
        ))
        .unwrap();
    pipeline
        .register(PassRecord::one_shot(
            "reached",
            EmitDiagnosticPass {
                key: "info-key",
                level: Level::Info,
            },
        ))
        .unwrap();

    let status = pipeline.process(&mut compiler).unwrap();
    assert_eq!(status, PipelineStatus::Completed);
    assert_eq!(compiler.diagnostics().len(), 2);
}

#[test]
fn warnings_do_not_halt_the_pipeline() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.add_script("main.js").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .register(PassRecord::one_shot(
            "report-warning",
            EmitDiagnosticPass {
                key: "mild-thing",
                level: Level::Warning,
            },
        ))
        .unwrap();

    let status = pipeline.process(&mut compiler).unwrap();
    assert_eq!(status, PipelineStatus::Completed);
}
