//! Built-in source resolvers.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::SourceResolver;

/// Sources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P: Into<String>, C: Into<Vec<u8>>> FromIterator<(P, C)> for MemorySources {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut sources = Self::new();
        for (path, contents) in iter {
            sources.insert(path, contents);
        }
        sources
    }
}

impl SourceResolver for MemorySources {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.files.contains_key(path))
    }
}

/// Sources read from the filesystem.
///
/// Relative paths are tried against each root in order. Absolute paths are
/// read as given. Existence is answered by reading, so a file that exists
/// but cannot be read is absent to both queries.
#[derive(Debug, Clone, Default)]
pub struct DirectorySources {
    roots: Vec<PathBuf>,
}

impl DirectorySources {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve against the process working directory only.
    pub fn working_dir() -> Self {
        Self::new([PathBuf::from(".")])
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates<'a>(&'a self, path: &'a str) -> Box<dyn Iterator<Item = PathBuf> + 'a> {
        let path = Path::new(path);
        if path.is_absolute() {
            Box::new(std::iter::once(path.to_path_buf()))
        } else {
            Box::new(self.roots.iter().map(move |root| root.join(path)))
        }
    }
}

impl SourceResolver for DirectorySources {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        for candidate in self.candidates(path) {
            if !candidate.is_file() {
                continue;
            }
            match fs::read(&candidate) {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Tries each resolver in turn; the first that has the file wins.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl SourceResolver for ResolverChain {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        for resolver in &self.resolvers {
            if let Some(bytes) = resolver.resolve(path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        for resolver in &self.resolvers {
            if resolver.exists(path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Remembers every answer of the wrapped resolver.
///
/// Files read or probed once stay pinned for the resolver's lifetime, so a
/// long session keeps seeing the contents it started with, and an exists
/// answer always matches the read that follows it.
pub struct MemoizedResolver<R> {
    inner: R,
    memo: Mutex<HashMap<String, Option<Vec<u8>>>>,
}

impl<R: SourceResolver> MemoizedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Forget everything; later lookups go back to the wrapped resolver.
    pub fn clear(&self) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<R: SourceResolver> SourceResolver for MemoizedResolver<R> {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        if let Some(entry) = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(entry.clone());
        }

        let contents = self.inner.resolve(path)?;
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), contents.clone());
        Ok(contents)
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.resolve(path)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_memory_sources() {
        let sources: MemorySources = [("a.ts", "1"), ("b.ts", "2")].into_iter().collect();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.resolve("a.ts").unwrap(), Some(b"1".to_vec()));
        assert!(!sources.exists("c.ts").unwrap());
    }

    #[test]
    fn test_directory_sources_search_roots_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("a.ts"), "second").unwrap();
        fs::create_dir(first.path().join("lib")).unwrap();
        fs::write(first.path().join("lib/b.ts"), "first").unwrap();
        fs::write(second.path().join("lib.ts"), "x").unwrap();

        let sources = DirectorySources::new([first.path(), second.path()]);
        assert_eq!(sources.resolve("a.ts").unwrap(), Some(b"second".to_vec()));
        assert_eq!(sources.resolve("lib/b.ts").unwrap(), Some(b"first".to_vec()));
        assert_eq!(sources.resolve("missing.ts").unwrap(), None);
        // A directory is not a file.
        assert_eq!(sources.resolve("lib").unwrap(), None);
        assert!(!sources.exists("lib").unwrap());
        assert!(sources.exists("lib.ts").unwrap());

        let absolute = second.path().join("a.ts");
        assert!(DirectorySources::default()
            .exists(absolute.to_str().unwrap())
            .unwrap());
    }

    #[test]
    fn test_chain_first_match_wins() {
        let chain = ResolverChain::new()
            .with(MemorySources::new().with("a.ts", "overlay"))
            .with(MemorySources::new().with("a.ts", "base").with("b.ts", "base"));

        assert_eq!(chain.resolve("a.ts").unwrap(), Some(b"overlay".to_vec()));
        assert_eq!(chain.resolve("b.ts").unwrap(), Some(b"base".to_vec()));
        assert!(!chain.exists("c.ts").unwrap());
    }

    #[test]
    fn test_memoized_resolver() {
        struct Counting(AtomicUsize);
        impl SourceResolver for Counting {
            fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok((path == "a.ts").then(|| b"a".to_vec()))
            }
        }

        let resolver = MemoizedResolver::new(Counting(AtomicUsize::new(0)));
        for _ in 0..3 {
            assert_eq!(resolver.resolve("a.ts").unwrap(), Some(b"a".to_vec()));
            assert_eq!(resolver.resolve("b.ts").unwrap(), None);
            assert!(!resolver.exists("b.ts").unwrap());
        }
        assert_eq!(resolver.inner().0.load(Ordering::SeqCst), 2);

        resolver.clear();
        resolver.resolve("a.ts").unwrap();
        assert_eq!(resolver.inner().0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_memoized_exists_pins_the_answer() {
        struct Vanishing(AtomicBool);
        impl SourceResolver for Vanishing {
            fn resolve(&self, _path: &str) -> io::Result<Option<Vec<u8>>> {
                Ok(self.0.load(Ordering::SeqCst).then(|| b"a".to_vec()))
            }
        }

        let resolver = MemoizedResolver::new(Vanishing(AtomicBool::new(true)));
        assert!(resolver.exists("a.ts").unwrap());

        // Deleted after the exists answer; the read still agrees with it.
        resolver.inner().0.store(false, Ordering::SeqCst);
        assert_eq!(resolver.resolve("a.ts").unwrap(), Some(b"a".to_vec()));
        assert!(resolver.exists("a.ts").unwrap());
        assert!(!resolver.inner().exists("a.ts").unwrap());
    }
}
