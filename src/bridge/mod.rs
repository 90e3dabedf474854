//! Cross-process source bridge.
//!
//! The compiler process does not read source files itself. It asks the
//! parent process for them over a stream pair, one request at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Compiler process (child, blocking)              │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                       BridgeClient                        │  │
//! │  │  - One request in flight, guarded by a mutex              │  │
//! │  │  - Tagged request lines, byte-counted responses           │  │
//! │  │  - Optional read deadline (TimedReader)                   │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                   │
//! │          stdout (requests)   │   stdin (responses)              │
//! │                              ▼                                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         Parent process (owns resolution, see `session`)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests and responses carry no identifiers. Every request receives
//! exactly one response, in the order sent.
//!
//! # Example
//!
//! ```ignore
//! use srcbridge::bridge::StdioBridge;
//!
//! let bridge = StdioBridge::stdio(Some(Duration::from_secs(30)))?;
//! if bridge.file_exists("lib/util.ts")? {
//!     let bytes = bridge.read_file("lib/util.ts")?;
//! }
//! ```

mod client;
mod error;
pub mod protocol;
mod timed;

pub use client::{BridgeClient, SourceBridge, StdioBridge};
pub use error::{BridgeError, BridgeResult};
pub use protocol::{RequestKind, SourceRequest, SourceResponse};
pub use timed::TimedReader;
