//! Compiler-process side of a session.
//!
//! The compiler process reads nothing from disk. Its stdin and stdout are
//! the source bridge; its stderr carries diagnostics and logs. Once the
//! compile finishes, the emitted text is written to stdout as a framed
//! output block after the last request, and the exit code tells the parent
//! how it went.

use std::io::{self, Write};
use std::time::Duration;

use tracing::error;

use crate::bridge::protocol::encode_output;
use crate::bridge::{SourceBridge, StdioBridge};
use crate::compile::{CompileError, CompileOptions, Driver};
use crate::diagnostic::{DiagnosticSink, StderrSink};

/// The compile succeeded and its output was written.
pub const EXIT_OK: u8 = 0;

/// The toolchain reported diagnostics; they are on stderr.
pub const EXIT_COMPILATION_FAILED: u8 = 1;

/// The bridge to the parent failed.
pub const EXIT_BRIDGE_FAILED: u8 = 2;

/// Compile `root` over this process's stdin and stdout.
pub fn run_child(root: &str, options: CompileOptions, timeout: Option<Duration>) -> u8 {
    let bridge = match StdioBridge::stdio(timeout) {
        Ok(bridge) => bridge,
        Err(err) => {
            error!(%err, "failed to start bridge reader");
            return EXIT_BRIDGE_FAILED;
        }
    };
    run_with_bridge(root, options, &bridge, &mut StderrSink, &mut io::stdout())
}

/// Compile `root` against an arbitrary bridge, writing output to `out`.
pub fn run_with_bridge(
    root: &str,
    options: CompileOptions,
    bridge: &dyn SourceBridge,
    sink: &mut dyn DiagnosticSink,
    out: &mut dyn Write,
) -> u8 {
    match Driver::reference(options).compile(root, bridge, sink) {
        Ok(output) => match out
            .write_all(&encode_output(output.text.as_bytes()))
            .and_then(|()| out.flush())
        {
            Ok(()) => EXIT_OK,
            Err(err) => {
                error!(root, %err, "failed to write compiled output");
                EXIT_BRIDGE_FAILED
            }
        },
        Err(CompileError::CompilationFailed { .. }) => EXIT_COMPILATION_FAILED,
        Err(CompileError::Bridge(err)) => {
            error!(root, %err, "bridge failed");
            EXIT_BRIDGE_FAILED
        }
    }
}
