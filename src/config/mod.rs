//! Configuration module for srcbridge.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, BridgeSettings, CacheSettings, CompilerSettings, SessionSettings, Settings,
    SettingsError, SourceSettings, CONFIG_ENV,
};
