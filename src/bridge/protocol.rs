//! Wire format for the source bridge.
//!
//! Requests travel from the compiler process to the parent as one
//! human-readable line:
//!
//! ```text
//! SRCBRIDGE_READFILE<path>\n
//! SRCBRIDGE_FILEEXISTS<path>\n
//! ```
//!
//! Responses travel back as binary-safe frames:
//!
//! ```text
//! read, found      <decimal byte count> SP <exactly that many raw bytes>
//! read, not found  -1 SP
//! exists           '1' | '0'
//! ```
//!
//! The byte count is authoritative. File contents may contain newlines,
//! spaces or any other byte, so nothing after the separator is scanned.
//!
//! After its last request the compiler process sends its compiled output
//! the same way, behind a marker line, and then closes the stream:
//!
//! ```text
//! SRCBRIDGE_OUTPUT\n<decimal byte count> SP <exactly that many raw bytes>
//! ```

use std::io::{self, Read, Write};

use super::error::{BridgeError, BridgeResult};

// ============================================================================
// Constants
// ============================================================================

/// Tag that prefixes a read-file request line.
pub const READ_FILE_TAG: &str = "SRCBRIDGE_READFILE";

/// Tag that prefixes a file-exists request line.
pub const FILE_EXISTS_TAG: &str = "SRCBRIDGE_FILEEXISTS";

/// Marker line announcing the compiled-output frame.
pub const OUTPUT_TAG: &str = "SRCBRIDGE_OUTPUT";

/// Terminates a request line.
pub const TERMINATOR: u8 = b'\n';

/// Separates the byte count from the body of a read response.
pub const SEPARATOR: u8 = b' ';

/// Byte count sent when the parent does not have the requested file.
pub const NOT_FOUND: i64 = -1;

/// Longest accepted byte-count header, sign included.
const MAX_HEADER_LEN: usize = 20;

/// Initial buffer size for a response body. The buffer grows as bytes
/// arrive, so a bogus count does not allocate up front.
const INITIAL_BODY_CAPACITY: usize = 64 * 1024;

// ============================================================================
// Requests
// ============================================================================

/// The two request kinds the bridge supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Fetch the full contents of a file.
    ReadFile,
    /// Ask whether a file exists without transferring it.
    FileExists,
}

impl RequestKind {
    /// The literal prefix used on the wire.
    pub fn tag(self) -> &'static str {
        match self {
            Self::ReadFile => READ_FILE_TAG,
            Self::FileExists => FILE_EXISTS_TAG,
        }
    }
}

/// A single request from the compiler process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub kind: RequestKind,
    pub path: String,
}

impl SourceRequest {
    pub fn read_file(path: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::ReadFile,
            path: path.into(),
        }
    }

    pub fn file_exists(path: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::FileExists,
            path: path.into(),
        }
    }

    /// Encode the request line, terminator included.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidPath`] if the path contains the line
    /// terminator, which would split the request in two.
    pub fn encode(&self) -> BridgeResult<Vec<u8>> {
        if self.path.as_bytes().contains(&TERMINATOR) {
            return Err(BridgeError::InvalidPath(self.path.clone()));
        }

        let tag = self.kind.tag();
        let mut line = Vec::with_capacity(tag.len() + self.path.len() + 1);
        line.extend_from_slice(tag.as_bytes());
        line.extend_from_slice(self.path.as_bytes());
        line.push(TERMINATOR);
        Ok(line)
    }

    /// Write the request line and flush it.
    ///
    /// A failed write or flush means the parent is gone and is reported as
    /// [`BridgeError::BridgeUnavailable`].
    pub fn write_to<W: Write>(&self, writer: &mut W) -> BridgeResult<()> {
        let line = self.encode()?;
        writer
            .write_all(&line)
            .map_err(BridgeError::BridgeUnavailable)?;
        writer.flush().map_err(BridgeError::BridgeUnavailable)
    }

    /// Parse one line read by the parent.
    ///
    /// A trailing terminator is ignored. Returns `None` when the line does
    /// not start with a request tag; such lines are ordinary process output.
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let line = line.strip_suffix(&[TERMINATOR]).unwrap_or(line);

        let (kind, rest) = if let Some(rest) = line.strip_prefix(FILE_EXISTS_TAG.as_bytes()) {
            (RequestKind::FileExists, rest)
        } else if let Some(rest) = line.strip_prefix(READ_FILE_TAG.as_bytes()) {
            (RequestKind::ReadFile, rest)
        } else {
            return None;
        };

        Some(Self {
            kind,
            path: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// Whether `line` is the output marker, terminator optional.
pub fn is_output_marker(line: &[u8]) -> bool {
    line.strip_suffix(&[TERMINATOR]).unwrap_or(line) == OUTPUT_TAG.as_bytes()
}

/// Encode the compiled-output block: the marker line, then a byte-counted
/// frame holding `text`.
pub fn encode_output(text: &[u8]) -> Vec<u8> {
    let mut block = OUTPUT_TAG.as_bytes().to_vec();
    block.push(TERMINATOR);
    block.extend(SourceResponse::Contents(text.to_vec()).encode());
    block
}

// ============================================================================
// Responses
// ============================================================================

/// A single response from the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResponse {
    /// Answer to a read: the file's bytes.
    Contents(Vec<u8>),
    /// Answer to a read: the parent has no such file.
    NotFound,
    /// Answer to an exists query.
    Exists(bool),
}

impl SourceResponse {
    /// Build a read response from an optional body.
    pub fn from_contents(contents: Option<Vec<u8>>) -> Self {
        match contents {
            Some(bytes) => Self::Contents(bytes),
            None => Self::NotFound,
        }
    }

    /// Encode the response frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Contents(bytes) => {
                let count = bytes.len().to_string();
                let mut frame = Vec::with_capacity(count.len() + 1 + bytes.len());
                frame.extend_from_slice(count.as_bytes());
                frame.push(SEPARATOR);
                frame.extend_from_slice(bytes);
                frame
            }
            Self::NotFound => {
                let mut frame = NOT_FOUND.to_string().into_bytes();
                frame.push(SEPARATOR);
                frame
            }
            Self::Exists(exists) => vec![if *exists { b'1' } else { b'0' }],
        }
    }

    /// Read the response to a request of the given kind.
    pub fn read_from<R: Read>(kind: RequestKind, reader: &mut R) -> BridgeResult<Self> {
        match kind {
            RequestKind::ReadFile => read_contents(reader).map(Self::from_contents),
            RequestKind::FileExists => read_exists(reader).map(Self::Exists),
        }
    }
}

/// Read a read-file response: `Some(bytes)` or `None` for not found.
///
/// # Errors
///
/// - [`BridgeError::TruncatedStream`] if the stream ends inside the header
///   or before the announced number of bytes arrived.
/// - [`BridgeError::MalformedFrame`] if the header is not a decimal count.
/// - [`BridgeError::ReadFailed`] for other I/O failures.
pub fn read_contents<R: Read>(reader: &mut R) -> BridgeResult<Option<Vec<u8>>> {
    let count = match read_header(reader)? {
        n if n < 0 => return Ok(None),
        n => usize::try_from(n)
            .map_err(|_| BridgeError::malformed(format!("byte count {n} does not fit in memory")))?,
    };

    let mut body = Vec::with_capacity(count.min(INITIAL_BODY_CAPACITY));
    reader
        .by_ref()
        .take(count as u64)
        .read_to_end(&mut body)
        .map_err(BridgeError::ReadFailed)?;

    if body.len() < count {
        return Err(BridgeError::truncated(count, body.len()));
    }
    Ok(Some(body))
}

/// Read an exists response: a single `1` or `0` byte.
pub fn read_exists<R: Read>(reader: &mut R) -> BridgeResult<bool> {
    match read_byte(reader)? {
        Some(b'1') => Ok(true),
        Some(b'0') => Ok(false),
        Some(other) => Err(BridgeError::malformed(format!(
            "expected '0' or '1' for an exists response, got byte 0x{other:02x}"
        ))),
        None => Err(BridgeError::truncated(1, 0)),
    }
}

/// Read the signed decimal count up to and including the separator.
fn read_header<R: Read>(reader: &mut R) -> BridgeResult<i64> {
    let mut header = String::new();

    loop {
        let byte = match read_byte(reader)? {
            Some(b) => b,
            // At least the separator is still missing.
            None => return Err(BridgeError::truncated(header.len() + 1, header.len())),
        };

        if byte == SEPARATOR {
            break;
        }

        let valid = byte.is_ascii_digit() || (byte == b'-' && header.is_empty());
        if !valid {
            return Err(BridgeError::malformed(format!(
                "unexpected byte 0x{byte:02x} in byte count header {header:?}"
            )));
        }
        if header.len() == MAX_HEADER_LEN {
            return Err(BridgeError::malformed(format!(
                "byte count header longer than {MAX_HEADER_LEN} characters"
            )));
        }
        header.push(char::from(byte));
    }

    header
        .parse::<i64>()
        .map_err(|_| BridgeError::malformed(format!("invalid byte count {header:?}")))
}

fn read_byte<R: Read>(reader: &mut R) -> BridgeResult<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BridgeError::ReadFailed(e)),
        }
    }
}
