//! Compiler toolchains driven through a [`CompilerHost`].
//!
//! The [`Toolchain`] and [`Program`] traits are the seam the driver works
//! against. [`ReferenceToolchain`] implements them for a small module
//! language:
//!
//! ```text
//! import util from "./util"
//! declare console
//! export let total = util(1, 2) * 3
//! total += 1
//! ```
//!
//! It resolves imports through the host, reports syntax, program and name
//! diagnostics, and emits CommonJS-style script.

mod checker;
mod emitter;
mod lexer;
mod parser;
mod program;

use crate::bridge::BridgeResult;
use crate::diagnostic::Diagnostic;
use crate::host::{CompilerHost, LanguageTarget};

pub use emitter::output_path;
pub use program::{ReferenceProgram, ReferenceToolchain};

/// Options a program is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompilerOptions {
    pub target: LanguageTarget,
    /// Skip loading the default library declarations.
    pub no_default_lib: bool,
}

/// What an emit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitResult {
    pub diagnostics: Vec<Diagnostic>,
    /// Output paths written through the host, in order.
    pub emitted_files: Vec<String>,
}

/// Creates programs from a root file.
pub trait Toolchain {
    type Program: Program;

    fn name(&self) -> &str;

    /// Load the root file and everything it references through `host`.
    ///
    /// Fails only when the host's transport fails; missing or malformed
    /// files surface as diagnostics on the program.
    fn create_program(
        &self,
        root: &str,
        options: &CompilerOptions,
        host: &mut dyn CompilerHost,
    ) -> BridgeResult<Self::Program>;
}

/// A loaded set of source files.
pub trait Program {
    fn root(&self) -> &str;

    /// Paths of all loaded files, in dependency order.
    fn source_paths(&self) -> Vec<&str>;

    fn syntactic_diagnostics(&self) -> Vec<Diagnostic>;

    /// Problems with the program as a whole, such as a missing root.
    fn global_diagnostics(&self) -> Vec<Diagnostic>;

    fn semantic_diagnostics(&self) -> Vec<Diagnostic>;

    /// Write output for every emittable file through `host`.
    fn emit(&self, host: &mut dyn CompilerHost) -> EmitResult;
}
