//! Compiler-process driver: one root file in, emitted text out.
//!
//! The driver walks a fixed sequence of stages and stops at the first one
//! that produces diagnostics:
//!
//! ```text
//! Idle → SourceLoading → TypeChecking → Emitting → Done
//!              │               │            │
//!              └───────────────┴────────────┴──→ Failed
//! ```
//!
//! With [`DiagnosticStages::Unified`] the type-checking stage is folded into
//! emitting: type diagnostics are gathered together with emit diagnostics
//! and any of them discard the output.
//!
//! # Example
//!
//! ```ignore
//! use srcbridge::bridge::StdioBridge;
//! use srcbridge::compile::{compile, CompileOptions};
//!
//! let bridge = StdioBridge::stdio(None)?;
//! let output = compile("src/main.ts", &bridge, CompileOptions::default())?;
//! print!("{}", output.text);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::{BridgeError, SourceBridge};
use crate::diagnostic::{Diagnostic, DiagnosticSink, StderrSink};
use crate::host::{BridgeHost, DefaultLibLayout, HostOptions, LanguageTarget, NewLine};
use crate::toolchain::{CompilerOptions, Program, ReferenceToolchain, Toolchain};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that end a compile invocation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The toolchain reported diagnostics. They have already been written
    /// to the diagnostic sink.
    #[error("Could not compile source file {root}")]
    CompilationFailed {
        root: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::CompilationFailed { diagnostics, .. } => diagnostics,
            Self::Bridge(_) => &[],
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// How diagnostics are collected across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStages {
    /// Type checking is its own stage and runs before emit.
    #[default]
    Separate,
    /// Type diagnostics are gathered with emit diagnostics.
    Unified,
}

impl DiagnosticStages {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Separate => "separate",
            Self::Unified => "unified",
        }
    }
}

impl std::str::FromStr for DiagnosticStages {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "separate" => Ok(Self::Separate),
            "unified" => Ok(Self::Unified),
            other => Err(format!("unknown diagnostic stages: {other}")),
        }
    }
}

/// Options for one compile invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompileOptions {
    pub target: LanguageTarget,
    pub stages: DiagnosticStages,
    pub lib_layout: DefaultLibLayout,
    pub new_line: NewLine,
    pub no_default_lib: bool,
    /// Whether the parent answers existence queries directly.
    pub supports_exists_query: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: LanguageTarget::default(),
            stages: DiagnosticStages::default(),
            lib_layout: DefaultLibLayout::default(),
            new_line: NewLine::default(),
            no_default_lib: false,
            supports_exists_query: true,
        }
    }
}

impl CompileOptions {
    pub fn with_target(mut self, target: LanguageTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_stages(mut self, stages: DiagnosticStages) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_lib_layout(mut self, layout: DefaultLibLayout) -> Self {
        self.lib_layout = layout;
        self
    }

    pub fn with_new_line(mut self, new_line: NewLine) -> Self {
        self.new_line = new_line;
        self
    }

    pub fn with_no_default_lib(mut self, no_default_lib: bool) -> Self {
        self.no_default_lib = no_default_lib;
        self
    }

    pub fn with_exists_query(mut self, supported: bool) -> Self {
        self.supports_exists_query = supported;
        self
    }

    pub fn host_options(&self) -> HostOptions {
        HostOptions {
            target: self.target,
            lib_layout: self.lib_layout,
            new_line: self.new_line,
            supports_exists_query: self.supports_exists_query,
        }
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            target: self.target,
            no_default_lib: self.no_default_lib,
        }
    }

    /// Command-line flags that reproduce these options in a child process.
    pub fn to_child_args(&self) -> Vec<String> {
        let mut args = vec![
            "--target".to_string(),
            self.target.to_string(),
            "--stages".to_string(),
            self.stages.as_str().to_string(),
            "--lib-layout".to_string(),
            self.lib_layout.as_str().to_string(),
            "--new-line".to_string(),
            self.new_line.name().to_string(),
        ];
        if self.no_default_lib {
            args.push("--no-default-lib".to_string());
        }
        if !self.supports_exists_query {
            args.push("--no-exists-query".to_string());
        }
        args
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Output of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub root: String,
    /// Everything the toolchain emitted, in write order.
    pub text: String,
    /// Output paths, in write order.
    pub files: Vec<String>,
    /// Files the program loaded, dependencies first.
    pub sources: Vec<String>,
}

/// Driver progress through one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    SourceLoading,
    TypeChecking,
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SourceLoading => "source-loading",
            Self::TypeChecking => "type-checking",
            Self::Emitting => "emitting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Runs a toolchain over one root file per call.
///
/// The driver holds no per-compile state: every call builds a fresh host,
/// so the same driver can compile any number of roots, and compiling the
/// same root against unchanged sources yields identical output.
pub struct Driver<T> {
    toolchain: T,
    options: CompileOptions,
}

impl Driver<ReferenceToolchain> {
    pub fn reference(options: CompileOptions) -> Self {
        Self::new(ReferenceToolchain, options)
    }
}

impl<T: Toolchain> Driver<T> {
    pub fn new(toolchain: T, options: CompileOptions) -> Self {
        Self { toolchain, options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `root`, resolving every file through `bridge`.
    ///
    /// On failure the collected diagnostics are reported to `sink` before
    /// the error is returned.
    pub fn compile(
        &self,
        root: &str,
        bridge: &dyn SourceBridge,
        sink: &mut dyn DiagnosticSink,
    ) -> CompileResult<CompileOutput> {
        let mut host = BridgeHost::new(bridge, self.options.host_options());
        let mut state = DriverState::Idle;

        let fail = |state: DriverState, diagnostics: Vec<Diagnostic>, sink: &mut dyn DiagnosticSink| {
            debug!(root, from = %state, to = %DriverState::Failed, count = diagnostics.len(), "stage");
            for diagnostic in &diagnostics {
                sink.report(diagnostic);
            }
            CompileError::CompilationFailed {
                root: root.to_string(),
                diagnostics,
            }
        };

        state = self.advance(state, root);
        let program = self
            .toolchain
            .create_program(root, &self.options.compiler_options(), &mut host)?;
        let mut diagnostics = host.take_diagnostics();
        diagnostics.extend(program.syntactic_diagnostics());
        if !diagnostics.is_empty() {
            return Err(fail(state, diagnostics, sink));
        }

        state = self.advance(state, root);
        if state == DriverState::TypeChecking {
            let diagnostics = type_diagnostics(&program);
            if !diagnostics.is_empty() {
                return Err(fail(state, diagnostics, sink));
            }
            state = self.advance(state, root);
        }

        let mut diagnostics = match self.options.stages {
            DiagnosticStages::Unified => type_diagnostics(&program),
            DiagnosticStages::Separate => Vec::new(),
        };
        let emitted = program.emit(&mut host);
        diagnostics.extend(host.take_diagnostics());
        diagnostics.extend(emitted.diagnostics);
        if !diagnostics.is_empty() {
            return Err(fail(state, diagnostics, sink));
        }

        state = self.advance(state, root);
        debug_assert_eq!(state, DriverState::Done);

        let sources = program.source_paths().into_iter().map(String::from).collect();
        let output = host.into_output();
        info!(
            root,
            toolchain = self.toolchain.name(),
            files = output.files().len(),
            bytes = output.text().len(),
            "compiled"
        );
        Ok(CompileOutput {
            root: root.to_string(),
            files: output.files().to_vec(),
            text: output.into_text(),
            sources,
        })
    }

    fn advance(&self, state: DriverState, root: &str) -> DriverState {
        let next = match (state, self.options.stages) {
            (DriverState::Idle, _) => DriverState::SourceLoading,
            (DriverState::SourceLoading, DiagnosticStages::Separate) => DriverState::TypeChecking,
            (DriverState::SourceLoading, DiagnosticStages::Unified) => DriverState::Emitting,
            (DriverState::TypeChecking, _) => DriverState::Emitting,
            (DriverState::Emitting, _) => DriverState::Done,
            (terminal, _) => terminal,
        };
        debug!(root, from = %state, to = %next, "stage");
        next
    }
}

/// Global diagnostics first; semantic checks only run on a sound program.
fn type_diagnostics<P: Program>(program: &P) -> Vec<Diagnostic> {
    let global = program.global_diagnostics();
    if !global.is_empty() {
        return global;
    }
    program.semantic_diagnostics()
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile `root` with the reference toolchain, reporting diagnostics to
/// stderr.
pub fn compile(
    root: &str,
    bridge: &dyn SourceBridge,
    options: CompileOptions,
) -> CompileResult<CompileOutput> {
    Driver::reference(options).compile(root, bridge, &mut StderrSink)
}
