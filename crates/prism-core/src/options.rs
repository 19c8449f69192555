// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pipeline configuration.

/// Source-language level, for input and output pinning.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum LanguageLevel {
    /// ECMAScript 3.
    Es3,
    /// ECMAScript 5.
    Es5,
    /// ECMAScript 2015.
    Es2015,
    /// ECMAScript 2017.
    Es2017,
    /// ECMAScript 2020.
    Es2020,
    /// Latest supported level.
    #[default]
    EsNext,
}

/// Default divergence cap for fixed-point loops: a loop still reporting
/// changes after this many rounds is declared non-convergent.
pub const DEFAULT_LOOP_CAP: u32 = 30;

/// Options recognized by the pipeline.
#[derive(Clone, Debug)]
pub struct CompilerOptions {
    /// Source language level of the inputs.
    pub language_in: LanguageLevel,
    /// Target language level of the output.
    pub language_out: LanguageLevel,
    /// Enables incremental re-processing of a single replaced script.
    pub allow_hot_swap_replace_script: bool,
    /// Run validation passes only, skipping transformations.
    pub checks_only: bool,
    /// Proceed to the next pass after a pass reports error diagnostics.
    pub continue_after_errors: bool,
    /// Override of the loop divergence cap.
    pub max_loop_iterations: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            language_in: LanguageLevel::EsNext,
            language_out: LanguageLevel::Es5,
            allow_hot_swap_replace_script: false,
            checks_only: false,
            continue_after_errors: false,
            max_loop_iterations: DEFAULT_LOOP_CAP,
        }
    }
}
