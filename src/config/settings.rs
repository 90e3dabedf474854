//! TOML-based configuration for srcbridge.
//!
//! Supports a config file (srcbridge.toml) with environment variable
//! expansion in path values.
//!
//! Example configuration:
//! ```toml
//! [bridge]
//! supports_exists_query = true
//! timeout_ms = 30000  # 0 waits forever
//!
//! [compiler]
//! target = "es2015"
//! stages = "separate"
//! lib_layout = "current"
//! new_line = "lf"
//! no_default_lib = false
//!
//! [sources]
//! roots = ["./src", "${SHARED_SOURCES}"]
//! memoize = true
//!
//! [cache]
//! kind = "disk"
//! dir = "${HOME}/.cache/srcbridge"
//!
//! [session]
//! max_concurrent = 4
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheKind;
use crate::compile::{CompileOptions, DiagnosticStages};
use crate::host::{DefaultLibLayout, LanguageTarget, NewLine};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SRCBRIDGE_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub bridge: BridgeSettings,
    pub compiler: CompilerSettings,
    pub sources: SourceSettings,
    pub cache: CacheSettings,
    pub session: SessionSettings,
}

/// Transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Whether the parent answers existence queries directly.
    pub supports_exists_query: bool,

    /// How long a single request may wait for its response, in
    /// milliseconds. Also bounds a whole compiler session. 0 disables.
    pub timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            supports_exists_query: true,
            timeout_ms: 30_000,
        }
    }
}

/// Toolchain settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub target: LanguageTarget,
    pub stages: DiagnosticStages,
    pub lib_layout: DefaultLibLayout,
    pub new_line: NewLine,
    pub no_default_lib: bool,
}

/// Where the parent resolves files from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Directories searched in order (supports ${ENV_VAR} expansion).
    pub roots: Vec<String>,

    /// Keep every file read for the lifetime of the parent process.
    pub memoize: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            roots: vec![".".to_string()],
            memoize: true,
        }
    }
}

/// Compiled-output cache settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub kind: CacheKind,

    /// Cache directory for the disk cache. Defaults to the platform cache
    /// directory.
    pub dir: Option<String>,
}

/// Compiler process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Compiler binary. Defaults to the running executable.
    pub program: Option<String>,

    /// Maximum compiler processes running at once.
    pub max_concurrent: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            program: None,
            max_concurrent: 4,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SRCBRIDGE_CONFIG`
    /// 2. `./srcbridge.toml`
    /// 3. `~/.config/srcbridge/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("srcbridge.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("srcbridge").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.session.max_concurrent == 0 {
            return Err(SettingsError::InvalidConfig(
                "session.max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile options for every compiler process.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            target: self.compiler.target,
            stages: self.compiler.stages,
            lib_layout: self.compiler.lib_layout,
            new_line: self.compiler.new_line,
            no_default_lib: self.compiler.no_default_lib,
            supports_exists_query: self.bridge.supports_exists_query,
        }
    }

    /// Per-request and per-session bound, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.bridge.timeout_ms > 0).then(|| Duration::from_millis(self.bridge.timeout_ms))
    }

    /// Source roots with environment variables expanded.
    pub fn source_roots(&self) -> Result<Vec<PathBuf>, SettingsError> {
        self.sources
            .roots
            .iter()
            .map(|root| expand_env_vars(root).map(PathBuf::from))
            .collect()
    }

    /// Disk cache directory with environment variables expanded.
    pub fn cache_dir(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.cache
            .dir
            .as_deref()
            .map(|dir| expand_env_vars(dir).map(PathBuf::from))
            .transpose()
    }

    /// Configured compiler binary with environment variables expanded.
    pub fn compiler_program(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.session
            .program
            .as_deref()
            .map(|program| expand_env_vars(program).map(PathBuf::from))
            .transpose()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let var_name: String = if braced {
            let name = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            chars.next(); // closing '}'
            name
        } else {
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };

        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
