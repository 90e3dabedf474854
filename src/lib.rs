//! # srcbridge
//!
//! Runs a compiler in a child process that cannot touch the file system.
//! Every file it needs is requested from the parent over the child's stdio.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Parent: session + responder (SourceResolver)      │
//! └─────────────────────────────────────────────────────────┘
//!              │ responses (stdin)       ▲ requests (stdout)
//!              ▼                         │
//! ┌─────────────────────────────────────────────────────────┐
//! │           Bridge client + framing codec                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [host]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Compiler host (memo, default lib, output)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile]
//! ┌─────────────────────────────────────────────────────────┐
//! │       Driver: load → type check → emit (toolchain)       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod cache;
pub mod compile;
pub mod config;
pub mod diagnostic;
pub mod host;
pub mod logging;
pub mod responder;
pub mod session;
pub mod toolchain;

pub use bridge::{BridgeClient, BridgeError, BridgeResult, SourceBridge, StdioBridge};
pub use compile::{compile, CompileError, CompileOptions, CompileOutput, DiagnosticStages, Driver};
pub use diagnostic::{Diagnostic, Severity};
pub use session::{Compiler, CompilerCommand, SessionError, SessionOutput};
