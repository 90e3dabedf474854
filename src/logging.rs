//! Tracing setup shared by the parent CLI and the compiler process.
//!
//! Logs always go to stderr. In the compiler process stdout is the bridge,
//! so nothing else may write there.

use std::fmt;
use std::io;
use std::str::FromStr;

use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. Installing twice is an error.
pub fn init(format: LogFormat, default_level: &str, ansi: bool) -> Result<(), String> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = subscriber_fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(ansi);

    match format {
        LogFormat::Text => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    }
    .map_err(|err| format!("failed to init tracing: {err}"))
}
