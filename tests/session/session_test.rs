//! End-to-end tests: a real compiler process per session, served from memory.

use std::sync::Arc;
use std::time::Duration;

use srcbridge::cache::InMemoryCache;
use srcbridge::compile::CompileOptions;
use srcbridge::config::Settings;
use srcbridge::host::NewLine;
use srcbridge::responder::MemorySources;
use srcbridge::session::{Compiler, CompilerCommand, SessionError};

fn child_command() -> CompilerCommand {
    CompilerCommand::srcbridge(env!("CARGO_BIN_EXE_srcbridge"))
}

fn sources() -> MemorySources {
    MemorySources::new()
        .with("typescript/lib/lib.core.d.ts", "declare console\n")
        .with("a.ts", "export x = 1")
        .with("main.ts", "import a from './a'\nconsole(a)\n")
        .with("broken.ts", "x += ")
        .with("dangling.ts", "import gone from './gone'\n")
        .with(
            "tagged.ts",
            "declare SRCBRIDGE_READFILEx\nlet before = 1\nSRCBRIDGE_READFILEx\nlet after = 2\n",
        )
}

fn compiler() -> Compiler {
    Compiler::new(child_command(), Arc::new(sources()))
        .with_options(CompileOptions::default().with_new_line(NewLine::Lf))
        .with_timeout(Some(Duration::from_secs(30)))
}

// ============================================================================
// Successful Sessions
// ============================================================================

#[tokio::test]
async fn test_compile_through_child_process() {
    let output = compiler().compile("main.ts").await.unwrap();

    assert!(!output.cached);
    assert_eq!(output.root, "main.ts");
    assert_eq!(
        output.text,
        "var x = 1;\nexports.x = x;\nvar a = require(\"./a\");\nconsole(a);\n"
    );
    // lib, main.ts, exists a.ts, a.ts
    assert_eq!(output.requests, 4);
}

#[tokio::test]
async fn test_without_exists_query() {
    let compiler = Compiler::new(child_command(), Arc::new(sources())).with_options(
        CompileOptions::default()
            .with_new_line(NewLine::Lf)
            .with_exists_query(false),
    );
    let output = compiler.compile("main.ts").await.unwrap();

    // lib, main.ts, a.ts
    assert_eq!(output.requests, 3);
}

#[tokio::test]
async fn test_output_lines_that_look_like_requests() {
    let output = compiler().compile("tagged.ts").await.unwrap();

    assert_eq!(
        output.text,
        "var before = 1;\nSRCBRIDGE_READFILEx;\nvar after = 2;\n"
    );
    // lib, tagged.ts
    assert_eq!(output.requests, 2);
}

#[tokio::test]
async fn test_configured_program_runs_the_child_subcommand() {
    let settings = Settings::parse(&format!(
        "[session]\nprogram = '{}'\n",
        env!("CARGO_BIN_EXE_srcbridge")
    ))
    .unwrap();
    let command = CompilerCommand::from_settings(&settings).unwrap();
    assert_eq!(command.args(), ["child"]);

    let output = Compiler::new(command, Arc::new(sources()))
        .with_options(CompileOptions::default().with_new_line(NewLine::Lf))
        .compile("a.ts")
        .await
        .unwrap();
    assert_eq!(output.text, "var x = 1;\nexports.x = x;\n");
}

#[tokio::test]
async fn test_cache_hit_skips_the_child() {
    let cache = Arc::new(InMemoryCache::new());
    let compiler = compiler().with_cache(cache.clone());

    let first = compiler.compile("a.ts").await.unwrap();
    let second = compiler.compile("a.ts").await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.requests, 0);
    assert_eq!(first.text, second.text);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_compile_all_keeps_input_order() {
    let roots: Vec<String> = ["a.ts", "broken.ts", "main.ts", "a.ts"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = compiler().compile_all(&roots, 2).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().root, "a.ts");
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().root, "main.ts");
    assert_eq!(results[3].as_ref().unwrap().root, "a.ts");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_diagnostics_cross_the_process_boundary() {
    let err = compiler().compile("broken.ts").await.unwrap_err();

    assert_eq!(err.to_string(), "Could not compile source file broken.ts");
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "TS1109");
    assert_eq!(diagnostics[0].file.as_deref(), Some("broken.ts"));
    assert!(!err.is_abnormal_exit());
}

#[tokio::test]
async fn test_unresolved_import_fails() {
    let err = compiler().compile("dangling.ts").await.unwrap_err();

    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(
        err.diagnostics()[0].message,
        "Cannot find module './gone'."
    );
}

#[tokio::test]
async fn test_missing_root() {
    let err = compiler().compile("nope.ts").await.unwrap_err();
    assert_eq!(err.diagnostics()[0].code, "TS6053");
}

#[tokio::test]
async fn test_spawn_failure() {
    let compiler = Compiler::new(
        CompilerCommand::new("/definitely/not/a/compiler"),
        Arc::new(sources()),
    );
    let err = compiler.compile("a.ts").await.unwrap_err();
    assert!(matches!(err, SessionError::SpawnFailed(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unexpected_exit_status() {
    let command = CompilerCommand::new("sh").arg("-c").arg("echo oops >&2; exit 7");
    let err = Compiler::new(command, Arc::new(sources()))
        .compile("a.ts")
        .await
        .unwrap_err();

    match err {
        SessionError::ChildFailed { code, stderr, .. } => {
            assert_eq!(code, 7);
            assert_eq!(stderr, "oops");
        }
        other => panic!("expected ChildFailed, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_session_timeout_kills_the_child() {
    let command = CompilerCommand::new("sh").arg("-c").arg("sleep 10");
    let err = Compiler::new(command, Arc::new(sources()))
        .with_timeout(Some(Duration::from_millis(200)))
        .compile("a.ts")
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Timeout { .. }));
    assert!(err.is_abnormal_exit());
}
