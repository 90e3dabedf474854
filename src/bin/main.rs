//! srcbridge CLI - Compile source files through a sandboxed compiler process
//!
//! Usage:
//!   srcbridge compile <FILES>... [--target <target>] [--source-root <dir>]...
//!
//! Examples:
//!   srcbridge compile src/main.ts
//!   srcbridge compile src/a.ts src/b.ts --target es2015 --cache disk
//!   srcbridge compile main.ts --source-root ./src --source-root ./vendor --output verbose

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;

use srcbridge::cache::{open_cache, CacheKind};
use srcbridge::compile::{CompileOptions, DiagnosticStages};
use srcbridge::config::Settings;
use srcbridge::diagnostic::format_diagnostics;
use srcbridge::host::{DefaultLibLayout, LanguageTarget, NewLine};
use srcbridge::logging::{self, LogFormat};
use srcbridge::responder::{DirectorySources, MemoizedResolver, SourceResolver};
use srcbridge::session::{child, Compiler, CompilerCommand, SessionError, SessionOutput};

#[derive(Parser)]
#[command(name = "srcbridge")]
#[command(about = "srcbridge - Compile sources through a compiler that reads only from its parent")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one or more root files
    Compile {
        /// Root files, resolved against the source roots
        #[arg(required = true)]
        files: Vec<String>,

        /// Path to a srcbridge.toml (defaults to the usual search path)
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        flags: CompileFlags,

        /// Directory to resolve sources from (repeatable, searched in order)
        #[arg(long = "source-root")]
        source_roots: Vec<PathBuf>,

        /// Compiled-output cache
        #[arg(long)]
        cache: Option<CacheArg>,

        /// Bound on each request and each compiler process; 0 disables
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Compiler processes to run at once
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "js")]
        output: OutputFormat,
    },

    /// Run as a compiler process for a parent session
    #[command(hide = true)]
    Child {
        /// Root file to request from the parent
        root: String,

        #[command(flatten)]
        flags: CompileFlags,

        /// Bound on each request; omitted waits forever
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

/// Flags shared by `compile` and the compiler process.
#[derive(Args, Clone, Default)]
struct CompileFlags {
    /// Language level to emit
    #[arg(long)]
    target: Option<TargetArg>,

    /// Whether type checking runs as its own stage
    #[arg(long)]
    stages: Option<StagesArg>,

    /// Default library file naming
    #[arg(long)]
    lib_layout: Option<LibLayoutArg>,

    /// Line terminator in emitted output
    #[arg(long)]
    new_line: Option<NewLineArg>,

    /// Do not load the default library
    #[arg(long)]
    no_default_lib: bool,

    /// Answer existence checks by reading the file instead
    #[arg(long)]
    no_exists_query: bool,
}

impl CompileFlags {
    /// Override `options` with every flag that was given.
    fn apply(&self, mut options: CompileOptions) -> CompileOptions {
        if let Some(target) = self.target {
            options = options.with_target(target.into());
        }
        if let Some(stages) = self.stages {
            options = options.with_stages(stages.into());
        }
        if let Some(layout) = self.lib_layout {
            options = options.with_lib_layout(layout.into());
        }
        if let Some(new_line) = self.new_line {
            options = options.with_new_line(new_line.into());
        }
        if self.no_default_lib {
            options = options.with_no_default_lib(true);
        }
        if self.no_exists_query {
            options = options.with_exists_query(false);
        }
        options
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Es3,
    Es5,
    Es2015,
}

impl From<TargetArg> for LanguageTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Es3 => LanguageTarget::Es3,
            TargetArg::Es5 => LanguageTarget::Es5,
            TargetArg::Es2015 => LanguageTarget::Es2015,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StagesArg {
    /// Type check before emitting
    Separate,
    /// Gather type diagnostics during emit
    Unified,
}

impl From<StagesArg> for DiagnosticStages {
    fn from(arg: StagesArg) -> Self {
        match arg {
            StagesArg::Separate => DiagnosticStages::Separate,
            StagesArg::Unified => DiagnosticStages::Unified,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LibLayoutArg {
    Current,
    Legacy,
}

impl From<LibLayoutArg> for DefaultLibLayout {
    fn from(arg: LibLayoutArg) -> Self {
        match arg {
            LibLayoutArg::Current => DefaultLibLayout::Current,
            LibLayoutArg::Legacy => DefaultLibLayout::Legacy,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum NewLineArg {
    Lf,
    Crlf,
    Native,
}

impl From<NewLineArg> for NewLine {
    fn from(arg: NewLineArg) -> Self {
        match arg {
            NewLineArg::Lf => NewLine::Lf,
            NewLineArg::Crlf => NewLine::CrLf,
            NewLineArg::Native => NewLine::Native,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CacheArg {
    None,
    Memory,
    Disk,
}

impl From<CacheArg> for CacheKind {
    fn from(arg: CacheArg) -> Self {
        match arg {
            CacheArg::None => CacheKind::None,
            CacheArg::Memory => CacheKind::Memory,
            CacheArg::Disk => CacheKind::Disk,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output emitted code only
    Js,
    /// Output emitted code with a header per root
    Verbose,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            files,
            config,
            flags,
            source_roots,
            cache,
            timeout_ms,
            max_concurrent,
            output,
        } => {
            if let Err(err) = logging::init(cli.log_format.into(), "info", true) {
                eprintln!("{err}");
            }
            let settings = match config {
                Some(path) => Settings::from_file(path),
                None => Settings::load(),
            };
            let mut settings = match settings {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if !source_roots.is_empty() {
                settings.sources.roots = source_roots
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect();
            }
            if let Some(cache) = cache {
                settings.cache.kind = cache.into();
            }
            if let Some(timeout_ms) = timeout_ms {
                settings.bridge.timeout_ms = timeout_ms;
            }
            if let Some(max_concurrent) = max_concurrent {
                settings.session.max_concurrent = max_concurrent.max(1);
            }
            cmd_compile(files, settings, flags, output)
        }
        Commands::Child {
            root,
            flags,
            timeout_ms,
        } => {
            // Stderr is read back by the parent; keep it free of escape codes.
            let _ = logging::init(cli.log_format.into(), "warn", false);
            let options = flags.apply(CompileOptions::default());
            let timeout = timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis);
            ExitCode::from(child::run_child(&root, options, timeout))
        }
    }
}

fn cmd_compile(
    files: Vec<String>,
    settings: Settings,
    flags: CompileFlags,
    output: OutputFormat,
) -> ExitCode {
    let compiler = match build_compiler(&settings, &flags) {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("Setup error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let results =
        runtime.block_on(compiler.compile_all(&files, settings.session.max_concurrent));

    let mut failed = false;
    for result in results {
        match result {
            Ok(compiled) => print_output(&compiled, compiler.options(), &output),
            Err(err) => {
                failed = true;
                report_failure(&err);
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn build_compiler(settings: &Settings, flags: &CompileFlags) -> Result<Compiler, String> {
    let roots = settings.source_roots().map_err(|e| e.to_string())?;
    debug!(?roots, "source roots");
    let sources = DirectorySources::new(roots);
    let resolver: Arc<dyn SourceResolver> = if settings.sources.memoize {
        Arc::new(MemoizedResolver::new(sources))
    } else {
        Arc::new(sources)
    };

    let cache_dir = settings.cache_dir().map_err(|e| e.to_string())?;
    let cache = open_cache(settings.cache.kind, cache_dir.as_deref()).map_err(|e| e.to_string())?;

    let command = CompilerCommand::from_settings(settings).map_err(|e| e.to_string())?;

    Ok(Compiler::new(command, resolver)
        .with_options(flags.apply(settings.compile_options()))
        .with_timeout(settings.timeout())
        .with_cache(Arc::from(cache)))
}

fn print_output(compiled: &SessionOutput, options: &CompileOptions, output: &OutputFormat) {
    match output {
        OutputFormat::Js => print!("{}", compiled.text),
        OutputFormat::Verbose => {
            println!("// srcbridge compiled output");
            println!("// Source: {}", compiled.root);
            println!("// Target: {}", options.target);
            if compiled.cached {
                println!("// Cached: yes");
            } else {
                println!("// Requests: {}", compiled.requests);
            }
            println!();
            print!("{}", compiled.text);
        }
    }
}

fn report_failure(err: &SessionError) {
    let diagnostics = err.diagnostics();
    if !diagnostics.is_empty() {
        eprintln!("{}", format_diagnostics(diagnostics));
    }
    eprintln!("Compilation error: {}", err);
}
