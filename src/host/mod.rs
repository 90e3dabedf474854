//! The compiler host: every question a toolchain asks about its environment.
//!
//! A toolchain never touches the filesystem. It reads sources, probes for
//! files, and writes output through a [`CompilerHost`]. [`BridgeHost`] is
//! the implementation used in the compiler process: it forwards file
//! queries over the source bridge and collects emitted text in memory.

mod bridge_host;
mod source;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeResult;
use crate::diagnostic::Diagnostic;

pub use bridge_host::{BridgeHost, EmitBuffer, HostOptions};
pub use source::{decode_source, SourceFile};

// ============================================================================
// Host Trait
// ============================================================================

/// Capabilities a toolchain requires from its host.
///
/// Methods that need the parent return [`BridgeResult`]; a transport failure
/// aborts the compilation. A missing file is never an error.
pub trait CompilerHost {
    /// Path of the default library declarations for the configured target.
    fn default_library_path(&self) -> String;

    /// Directory relative paths are resolved against. Empty means the root.
    fn current_directory(&self) -> String;

    fn use_case_sensitive_names(&self) -> bool;

    /// Canonical key for a path, used to deduplicate files.
    fn canonical_name(&self, path: &str) -> String;

    /// Line terminator for emitted text.
    fn new_line(&self) -> &str;

    /// Load and decode a source file, `None` when it does not exist.
    fn get_source_file(
        &mut self,
        path: &str,
        target: LanguageTarget,
    ) -> BridgeResult<Option<SourceFile>>;

    /// Read a file as text, `None` when it does not exist.
    fn read_file(&mut self, path: &str) -> BridgeResult<Option<String>>;

    fn file_exists(&mut self, path: &str) -> BridgeResult<bool>;

    /// Append emitted output.
    fn write_file(&mut self, path: &str, text: &str);

    /// Report a problem the host ran into while serving the toolchain.
    fn report(&mut self, diagnostic: Diagnostic);
}

// ============================================================================
// Configuration Values
// ============================================================================

/// Language level the toolchain parses and emits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTarget {
    Es3,
    #[default]
    Es5,
    #[serde(alias = "es6")]
    Es2015,
}

impl LanguageTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es3 => "es3",
            Self::Es5 => "es5",
            Self::Es2015 => "es2015",
        }
    }

    /// Whether block-scoped declarations survive emit.
    pub fn has_block_scoping(self) -> bool {
        matches!(self, Self::Es2015)
    }
}

impl fmt::Display for LanguageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es3" => Ok(Self::Es3),
            "es5" => Ok(Self::Es5),
            "es2015" | "es6" => Ok(Self::Es2015),
            other => Err(format!("unknown language target: {other}")),
        }
    }
}

/// Where the toolchain's default library declarations live.
///
/// Toolchain releases moved the files around; the layout picks the naming
/// scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultLibLayout {
    /// `typescript/lib/lib.core.d.ts` and `typescript/lib/lib.core.es6.d.ts`.
    #[default]
    Current,
    /// `typescript/bin/lib.d.ts` and `typescript/bin/lib.es6.d.ts`.
    Legacy,
}

impl DefaultLibLayout {
    pub fn library_path(self, target: LanguageTarget) -> String {
        let es2015 = target == LanguageTarget::Es2015;
        match self {
            Self::Current if es2015 => "typescript/lib/lib.core.es6.d.ts".to_string(),
            Self::Current => "typescript/lib/lib.core.d.ts".to_string(),
            Self::Legacy if es2015 => "typescript/bin/lib.es6.d.ts".to_string(),
            Self::Legacy => "typescript/bin/lib.d.ts".to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        }
    }
}

impl FromStr for DefaultLibLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown default library layout: {other}")),
        }
    }
}

/// Line terminator used in emitted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewLine {
    Lf,
    CrLf,
    /// The platform's separator.
    #[default]
    Native,
}

impl NewLine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Native if cfg!(windows) => "\r\n",
            Self::Native => "\n",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lf => "lf",
            Self::CrLf => "crlf",
            Self::Native => "native",
        }
    }
}

impl FromStr for NewLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown newline style: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_library_paths() {
        use DefaultLibLayout::*;
        use LanguageTarget::*;

        assert_eq!(Current.library_path(Es5), "typescript/lib/lib.core.d.ts");
        assert_eq!(Current.library_path(Es3), "typescript/lib/lib.core.d.ts");
        assert_eq!(
            Current.library_path(Es2015),
            "typescript/lib/lib.core.es6.d.ts"
        );
        assert_eq!(Legacy.library_path(Es5), "typescript/bin/lib.d.ts");
        assert_eq!(Legacy.library_path(Es2015), "typescript/bin/lib.es6.d.ts");
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("ES6".parse::<LanguageTarget>(), Ok(LanguageTarget::Es2015));
        assert_eq!("es3".parse::<LanguageTarget>(), Ok(LanguageTarget::Es3));
        assert!("es2099".parse::<LanguageTarget>().is_err());
    }

    #[test]
    fn test_newline() {
        assert_eq!(NewLine::Lf.as_str(), "\n");
        assert_eq!(NewLine::CrLf.as_str(), "\r\n");
        assert_eq!("CRLF".parse::<NewLine>(), Ok(NewLine::CrLf));
    }
}
