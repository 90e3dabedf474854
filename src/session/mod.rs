//! Compiler sessions: one child process per root file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Parent (tokio)                          │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                         Compiler                          │  │
//! │  │  - Cache lookup keyed by root digest                      │  │
//! │  │  - Spawns `srcbridge child <root>` per compile            │  │
//! │  │  - Serves requests, then reads the framed output block    │  │
//! │  │  - Maps exit status and stderr to SessionError            │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │        │ stdin (responses)   ▲ stdout (requests + output)       │
//! │        ▼                     │          stderr (diagnostics) ▲  │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                     │                               │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Compiler process (see `session::child`)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions are independent: each has its own process and stream pair, so
//! any number can run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use srcbridge::responder::DirectorySources;
//! use srcbridge::session::{Compiler, CompilerCommand};
//!
//! let compiler = Compiler::new(
//!     CompilerCommand::current_exe()?,
//!     Arc::new(DirectorySources::working_dir()),
//! );
//! let output = compiler.compile("src/main.ts").await?;
//! print!("{}", output.text);
//! ```

pub mod child;
mod error;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use std::{env, io};

use futures::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::cache::{cache_key, CodeCache, NoopCache};
use crate::compile::CompileOptions;
use crate::config::{Settings, SettingsError};
use crate::diagnostic::Diagnostic;
use crate::responder::{serve, SourceResolver};

pub use child::{EXIT_BRIDGE_FAILED, EXIT_COMPILATION_FAILED, EXIT_OK};
pub use error::{SessionError, SessionResult};

/// How to start a compiler process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl CompilerCommand {
    /// A compiler binary that accepts the child flags directly, with no
    /// subcommand in front of them.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// A srcbridge binary running its hidden `child` subcommand.
    pub fn srcbridge(program: impl Into<PathBuf>) -> Self {
        Self::new(program).arg("child")
    }

    /// This executable, running its hidden `child` subcommand.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::srcbridge(env::current_exe()?))
    }

    /// The srcbridge binary named by `[session] program`, or this
    /// executable when none is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        match settings.compiler_program()? {
            Some(program) => Ok(Self::srcbridge(program)),
            None => Self::current_exe().map_err(|err| {
                SettingsError::InvalidConfig(format!("cannot locate the srcbridge executable: {err}"))
            }),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Output of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    pub root: String,
    pub text: String,
    /// Requests the compiler made. Zero for cache hits.
    pub requests: usize,
    pub cached: bool,
}

/// Compiles root files by running a compiler process per root and serving
/// its file requests.
pub struct Compiler {
    command: CompilerCommand,
    options: CompileOptions,
    timeout: Option<Duration>,
    resolver: Arc<dyn SourceResolver>,
    cache: Arc<dyn CodeCache>,
}

impl Compiler {
    pub fn new(command: CompilerCommand, resolver: Arc<dyn SourceResolver>) -> Self {
        Self {
            command,
            options: CompileOptions::default(),
            timeout: None,
            resolver,
            cache: Arc::new(NoopCache),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound each session, and each bridge request inside it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CodeCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one root file.
    pub async fn compile(&self, root: &str) -> SessionResult<SessionOutput> {
        let session_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("session", %session_id, root);
        self.compile_inner(root).instrument(span).await
    }

    /// Compile several roots, at most `max_concurrent` at a time. Results
    /// come back in input order.
    pub async fn compile_all(
        &self,
        roots: &[String],
        max_concurrent: usize,
    ) -> Vec<SessionResult<SessionOutput>> {
        stream::iter(roots)
            .map(|root| self.compile(root))
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }

    async fn compile_inner(&self, root: &str) -> SessionResult<SessionOutput> {
        let key = self.cache_key(root);
        if let Some(key) = &key {
            if let Some(text) = self.cache.get(key) {
                debug!("cache hit");
                return Ok(SessionOutput {
                    root: root.to_string(),
                    text,
                    requests: 0,
                    cached: true,
                });
            }
        }

        let (text, requests) = self.run(root).await?;
        if let Some(key) = &key {
            self.cache.put(key, &text);
        }
        info!(requests, bytes = text.len(), "session finished");
        Ok(SessionOutput {
            root: root.to_string(),
            text,
            requests,
            cached: false,
        })
    }

    /// The root's cache key, or `None` when the root cannot be read here.
    fn cache_key(&self, root: &str) -> Option<String> {
        let source = match self.resolver.resolve(root) {
            Ok(Some(source)) => source,
            Ok(None) => return None,
            Err(err) => {
                debug!(%err, "root unreadable, skipping cache");
                return None;
            }
        };
        match cache_key(root, &source, &self.options) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(%err, "failed to compute cache key");
                None
            }
        }
    }

    fn child_command(&self, root: &str) -> Command {
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .args(self.options.to_child_args());
        if let Some(limit) = self.timeout {
            command.arg("--timeout-ms").arg(limit.as_millis().to_string());
        }
        command
            .arg("--")
            .arg(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Run one compiler process; returns its output text and request count.
    async fn run(&self, root: &str) -> SessionResult<(String, usize)> {
        let mut child = self
            .child_command(root)
            .spawn()
            .map_err(SessionError::SpawnFailed)?;
        debug!(pid = child.id(), "compiler spawned");

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(SessionError::Io(io::Error::other(
                "compiler stdio not captured",
            )));
        };

        let stderr_task = tokio::spawn(async move {
            let mut bytes = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut bytes).await;
            String::from_utf8_lossy(&bytes).into_owned()
        });

        let resolver = self.resolver.as_ref();
        let session = async {
            let served = serve(BufReader::new(stdout), stdin, resolver).await;
            let status = child.wait().await;
            (served, status)
        };

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, session).await.ok(),
            None => Some(session.await),
        };
        let Some((served, status)) = finished else {
            let limit = self.timeout.unwrap_or_default();
            warn!(?limit, "compiler timed out, killing it");
            let _ = child.kill().await;
            return Err(SessionError::Timeout {
                root: root.to_string(),
                limit,
            });
        };

        let status = status.map_err(SessionError::Io)?;
        let stderr = stderr_task.await.unwrap_or_default();
        let root = root.to_string();

        match status.code() {
            Some(0) => {
                let outcome = served.map_err(SessionError::Io)?;
                let text = outcome.output_text().ok_or_else(|| {
                    SessionError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "compiler exited without sending its output",
                    ))
                })?;
                Ok((text, outcome.requests))
            }
            Some(code) if code == i32::from(EXIT_COMPILATION_FAILED) => {
                let diagnostics: Vec<Diagnostic> =
                    stderr.lines().filter_map(Diagnostic::parse).collect();
                debug!(count = diagnostics.len(), "compilation failed");
                Err(SessionError::CompilationFailed { root, diagnostics })
            }
            Some(code) if code == i32::from(EXIT_BRIDGE_FAILED) => Err(SessionError::BridgeFailed {
                root,
                message: stderr.trim().to_string(),
            }),
            Some(code) => Err(SessionError::ChildFailed {
                root,
                code,
                stderr: stderr.trim().to_string(),
            }),
            None => Err(SessionError::Aborted { root }),
        }
    }
}
