//! Decoded source files.

use std::str::Utf8Error;
use std::sync::Arc;

use super::LanguageTarget;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode file bytes as UTF-8, dropping a leading byte order mark.
pub fn decode_source(bytes: &[u8]) -> Result<&str, Utf8Error> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(bytes)
}

/// A source file handed to the toolchain.
///
/// Cloning is cheap; the text is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: String,
    text: Arc<str>,
    target: LanguageTarget,
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<Arc<str>>, target: LanguageTarget) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            path: path.into(),
            text,
            target,
            line_starts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn target(&self) -> LanguageTarget {
        self.target
    }

    /// Declaration files contribute names but produce no output.
    pub fn is_declaration(&self) -> bool {
        self.path.ends_with(".d.ts")
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line and column (in characters) of a byte offset.
    ///
    /// Offsets past the end clamp to the end of the text.
    pub fn line_and_column(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..offset)
            .map_or(offset - start, |prefix| prefix.chars().count());
        (line as u32 + 1, column as u32 + 1)
    }
}
