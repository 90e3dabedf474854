//! Parent side of the source bridge.
//!
//! The parent owns file resolution. It reads the compiler's stdout line by
//! line, answers every tagged request through a [`SourceResolver`], and
//! finally decodes the framed output block.

mod resolvers;

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::bridge::protocol::{is_output_marker, read_contents, TERMINATOR};
use crate::bridge::{RequestKind, SourceRequest, SourceResponse};

pub use resolvers::{DirectorySources, MemoizedResolver, MemorySources, ResolverChain};

/// Where the parent looks up files the compiler asks for.
///
/// `Ok(None)` means the file does not exist. Errors are logged and answered
/// as absence; the wire format has no way to carry them.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.resolve(path)?.is_some())
    }
}

/// Build the response to one request.
pub fn answer(request: &SourceRequest, resolver: &dyn SourceResolver) -> SourceResponse {
    match request.kind {
        RequestKind::ReadFile => match resolver.resolve(&request.path) {
            Ok(contents) => SourceResponse::from_contents(contents),
            Err(err) => {
                warn!(path = %request.path, %err, "source lookup failed, answering not found");
                SourceResponse::NotFound
            }
        },
        RequestKind::FileExists => match resolver.exists(&request.path) {
            Ok(exists) => SourceResponse::Exists(exists),
            Err(err) => {
                warn!(path = %request.path, %err, "existence check failed, answering absent");
                SourceResponse::Exists(false)
            }
        },
    }
}

/// What a served session produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeOutcome {
    /// The framed output block, if the compiler sent one.
    pub output: Option<Vec<u8>>,
    /// Requests answered.
    pub requests: usize,
}

impl ServeOutcome {
    pub fn output_text(&self) -> Option<String> {
        self.output
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Answer requests from `reader` on `writer` until the compiler sends its
/// output block or `reader` reaches end of stream.
///
/// Each response is flushed before the next line is read, so requests are
/// answered strictly in arrival order. Output arrives only as a byte-counted
/// frame, so none of it is ever scanned for request tags.
///
/// # Errors
///
/// Fails with [`io::ErrorKind::InvalidData`] on a line that is neither a
/// request nor the output marker, on a malformed output frame, or on bytes
/// trailing the output frame.
pub async fn serve<R, W>(
    mut reader: R,
    mut writer: W,
    resolver: &dyn SourceResolver,
) -> io::Result<ServeOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut outcome = ServeOutcome::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(TERMINATOR, &mut line).await? == 0 {
            break;
        }

        if is_output_marker(&line) {
            outcome.output = Some(read_output(&mut reader).await?);
            break;
        }

        let Some(request) = SourceRequest::parse_line(&line) else {
            return Err(invalid_data(format!(
                "unexpected line from compiler: {:?}",
                String::from_utf8_lossy(&line)
            )));
        };
        let response = answer(&request, resolver);
        debug!(kind = ?request.kind, path = %request.path, "answering request");
        writer.write_all(&response.encode()).await?;
        writer.flush().await?;
        outcome.requests += 1;
    }

    Ok(outcome)
}

/// Read the output frame. It is the last thing the compiler writes.
async fn read_output<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).await?;

    let mut frame = rest.as_slice();
    let output = read_contents(&mut frame)
        .map_err(|err| invalid_data(format!("bad output frame: {err}")))?
        .ok_or_else(|| invalid_data("output frame marked as not found".to_string()))?;
    if !frame.is_empty() {
        return Err(invalid_data(format!(
            "{} unexpected bytes after the output frame",
            frame.len()
        )));
    }
    Ok(output)
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::encode_output;
    use tokio::io::BufReader;

    fn sources() -> MemorySources {
        MemorySources::new().with("a.ts", "export x = 1").with("empty.ts", "")
    }

    #[test]
    fn test_answer() {
        let sources = sources();
        assert_eq!(
            answer(&SourceRequest::read_file("a.ts"), &sources).encode(),
            b"12 export x = 1"
        );
        assert_eq!(
            answer(&SourceRequest::read_file("empty.ts"), &sources).encode(),
            b"0 "
        );
        assert_eq!(
            answer(&SourceRequest::read_file("missing.ts"), &sources).encode(),
            b"-1 "
        );
        assert_eq!(
            answer(&SourceRequest::file_exists("a.ts"), &sources),
            SourceResponse::Exists(true)
        );
    }

    #[test]
    fn test_resolver_errors_answer_absent() {
        struct Failing;
        impl SourceResolver for Failing {
            fn resolve(&self, _path: &str) -> io::Result<Option<Vec<u8>>> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        }

        assert_eq!(
            answer(&SourceRequest::read_file("a.ts"), &Failing),
            SourceResponse::NotFound
        );
        assert_eq!(
            answer(&SourceRequest::file_exists("a.ts"), &Failing),
            SourceResponse::Exists(false)
        );
    }

    #[test]
    fn test_unreadable_file_answers_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "export x = 1").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();
        }

        let sources = DirectorySources::new([dir.path()]);
        let read = answer(&SourceRequest::read_file("a.ts"), &sources);
        let exists = answer(&SourceRequest::file_exists("a.ts"), &sources);
        // Root may still read the file; either way both answers must agree.
        assert_eq!(
            read == SourceResponse::NotFound,
            exists == SourceResponse::Exists(false),
            "read: {read:?}, exists: {exists:?}"
        );
    }

    #[tokio::test]
    async fn test_serve_answers_requests_then_reads_output() {
        let mut child_stdout = b"SRCBRIDGE_READFILEa.ts\nSRCBRIDGE_FILEEXISTSb.ts\n".to_vec();
        child_stdout.extend(encode_output(b"var x = 1;\nexports.x = x;\n"));
        let (parent_end, mut child_end) = tokio::io::duplex(1024);

        let outcome = serve(BufReader::new(child_stdout.as_slice()), parent_end, &sources())
            .await
            .unwrap();

        assert_eq!(outcome.requests, 2);
        assert_eq!(
            outcome.output_text().as_deref(),
            Some("var x = 1;\nexports.x = x;\n")
        );

        let mut answers = Vec::new();
        child_end.read_to_end(&mut answers).await.unwrap();
        assert_eq!(answers, b"12 export x = 10");
    }

    #[tokio::test]
    async fn test_output_is_never_read_as_requests() {
        let text = b"SRCBRIDGE_READFILEa.ts\nSRCBRIDGE_FILEEXISTSa.ts\n";
        let outcome = serve(
            BufReader::new(encode_output(text).as_slice()),
            tokio::io::sink(),
            &sources(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.requests, 0);
        assert_eq!(outcome.output.as_deref(), Some(&text[..]));
    }

    #[tokio::test]
    async fn test_no_output_block() {
        let outcome = serve(
            BufReader::new(&b"SRCBRIDGE_READFILEa.ts\n"[..]),
            tokio::io::sink(),
            &sources(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.requests, 1);
        assert_eq!(outcome.output, None);
    }

    #[tokio::test]
    async fn test_serve_rejects_stray_bytes() {
        for stream in [
            b"var x = 1;\n".to_vec(),
            b"SRCBRIDGE_OUTPUT\n10 short".to_vec(),
            b"SRCBRIDGE_OUTPUT\n-1 ".to_vec(),
            [encode_output(b"x"), b"more".to_vec()].concat(),
        ] {
            let err = serve(BufReader::new(stream.as_slice()), tokio::io::sink(), &sources())
                .await
                .unwrap_err();
            assert_eq!(
                err.kind(),
                io::ErrorKind::InvalidData,
                "{:?}",
                String::from_utf8_lossy(&stream)
            );
        }
    }
}
