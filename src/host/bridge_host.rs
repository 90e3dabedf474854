//! Compiler host backed by the source bridge.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::source::{decode_source, SourceFile};
use super::{CompilerHost, DefaultLibLayout, LanguageTarget, NewLine};
use crate::bridge::{BridgeResult, SourceBridge};
use crate::diagnostic::Diagnostic;

/// Settings fixed when a host is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOptions {
    pub target: LanguageTarget,
    pub lib_layout: DefaultLibLayout,
    pub new_line: NewLine,
    /// Whether the parent answers existence queries. When it does not,
    /// existence is derived from a read.
    pub supports_exists_query: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            target: LanguageTarget::default(),
            lib_layout: DefaultLibLayout::default(),
            new_line: NewLine::default(),
            supports_exists_query: true,
        }
    }
}

/// Emitted output, in the order the toolchain wrote it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitBuffer {
    text: String,
    files: Vec<String>,
}

impl EmitBuffer {
    pub fn append(&mut self, path: &str, text: &str) {
        self.files.push(path.to_string());
        self.text.push_str(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Paths passed to each write, in order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// [`CompilerHost`] that resolves files through the parent process.
///
/// One host serves one compile invocation. Every answer from the parent,
/// including absence, is memoized, so the toolchain sees a consistent
/// filesystem for the whole compilation and never asks twice for the same
/// path.
pub struct BridgeHost<'b> {
    bridge: &'b dyn SourceBridge,
    options: HostOptions,
    /// Decoded text per canonical path; `None` records known absence.
    sources: HashMap<String, Option<Arc<str>>>,
    output: EmitBuffer,
    diagnostics: Vec<Diagnostic>,
}

impl<'b> BridgeHost<'b> {
    pub fn new(bridge: &'b dyn SourceBridge, options: HostOptions) -> Self {
        Self {
            bridge,
            options,
            sources: HashMap::new(),
            output: EmitBuffer::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn output(&self) -> &EmitBuffer {
        &self.output
    }

    pub fn into_output(self) -> EmitBuffer {
        self.output
    }

    /// Drain diagnostics reported since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn load(&mut self, path: &str) -> BridgeResult<Option<Arc<str>>> {
        let key = self.canonical_name(path);
        if let Some(entry) = self.sources.get(&key) {
            trace!(path, "source memo hit");
            return Ok(entry.clone());
        }

        let text = match self.bridge.read_file(path)? {
            Some(bytes) => Some(self.decode(path, &bytes)),
            None => None,
        };
        debug!(path, found = text.is_some(), "loaded source");
        self.sources.insert(key, text.clone());
        Ok(text)
    }

    fn decode(&mut self, path: &str, bytes: &[u8]) -> Arc<str> {
        match decode_source(bytes) {
            Ok(text) => Arc::from(text),
            Err(err) => {
                self.diagnostics.push(Diagnostic::error(
                    "TS5012",
                    format!("Cannot read file '{path}': {err}."),
                ));
                Arc::from("")
            }
        }
    }
}

impl CompilerHost for BridgeHost<'_> {
    fn default_library_path(&self) -> String {
        self.options.lib_layout.library_path(self.options.target)
    }

    fn current_directory(&self) -> String {
        String::new()
    }

    fn use_case_sensitive_names(&self) -> bool {
        true
    }

    fn canonical_name(&self, path: &str) -> String {
        path.to_string()
    }

    fn new_line(&self) -> &str {
        self.options.new_line.as_str()
    }

    fn get_source_file(
        &mut self,
        path: &str,
        target: LanguageTarget,
    ) -> BridgeResult<Option<SourceFile>> {
        Ok(self
            .load(path)?
            .map(|text| SourceFile::new(path, text, target)))
    }

    fn read_file(&mut self, path: &str) -> BridgeResult<Option<String>> {
        Ok(self.load(path)?.map(|text| text.to_string()))
    }

    fn file_exists(&mut self, path: &str) -> BridgeResult<bool> {
        let key = self.canonical_name(path);
        if let Some(entry) = self.sources.get(&key) {
            return Ok(entry.is_some());
        }

        if !self.options.supports_exists_query {
            return Ok(self.load(path)?.is_some());
        }

        let exists = self.bridge.file_exists(path)?;
        if !exists {
            self.sources.insert(key, None);
        }
        Ok(exists)
    }

    fn write_file(&mut self, path: &str, text: &str) {
        debug!(path, bytes = text.len(), "emitted");
        self.output.append(path, text);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
