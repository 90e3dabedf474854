//! Compiled-output cache.
//!
//! Keyed by a digest of the root path, the root's contents, and the compile
//! options. A hit skips spawning the compiler entirely.
//!
//! # Layout
//!
//! ```text
//! {cache_dir}/{digest}.js    -> emitted text
//! ```
//!
//! The disk cache never fails a compile: read and write errors are logged
//! and treated as misses.

mod hash;
pub use hash::{compute_digest, digest_bytes};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compile::CompileOptions;

/// Errors that can occur while setting up a cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Which cache implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    None,
    Memory,
    Disk,
}

/// Identity of one compile's inputs.
#[derive(Debug, Serialize)]
struct KeyMaterial<'a> {
    root: &'a str,
    source: String,
    options: &'a CompileOptions,
}

/// Cache key for compiling `root` with `source` as its contents.
pub fn cache_key(root: &str, source: &[u8], options: &CompileOptions) -> CacheResult<String> {
    Ok(compute_digest(&KeyMaterial {
        root,
        source: digest_bytes(source),
        options,
    })?)
}

/// Storage for compiled output.
pub trait CodeCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, output: &str);
}

/// Caches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CodeCache for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _output: &str) {}
}

/// Process-lifetime cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CodeCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, output: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), output.to_string());
    }
}

/// Persistent cache: one file per entry, fronted by an in-memory cache.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    memory: InMemoryCache,
}

impl DiskCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: InMemoryCache::new(),
        })
    }

    /// Open the cache in the platform cache directory.
    pub fn open_default() -> CacheResult<Self> {
        Self::open(default_cache_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.js"))
    }
}

impl CodeCache for DiskCache {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(hit) = self.memory.get(key) {
            return Some(hit);
        }
        match fs::read_to_string(self.entry_path(key)) {
            Ok(output) => {
                self.memory.put(key, &output);
                Some(output)
            }
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(key, %err, "disk cache read failed");
                }
                None
            }
        }
    }

    fn put(&self, key: &str, output: &str) {
        self.memory.put(key, output);
        if let Err(err) = fs::write(self.entry_path(key), output) {
            warn!(key, dir = %self.dir.display(), %err, "disk cache write failed");
        }
    }
}

/// `{platform cache dir}/srcbridge`.
pub fn default_cache_dir() -> CacheResult<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("srcbridge"))
        .ok_or(CacheError::NoCacheDir)
}

/// Build the cache a configuration asks for.
pub fn open_cache(kind: CacheKind, dir: Option<&Path>) -> CacheResult<Box<dyn CodeCache>> {
    Ok(match kind {
        CacheKind::None => Box::new(NoopCache),
        CacheKind::Memory => Box::new(InMemoryCache::new()),
        CacheKind::Disk => match dir {
            Some(dir) => Box::new(DiskCache::open(dir)?),
            None => Box::new(DiskCache::open_default()?),
        },
    })
}
