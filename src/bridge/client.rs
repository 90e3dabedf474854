//! Blocking client used inside the compiler process.

use std::io::{self, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{BridgeError, BridgeResult};
use super::protocol::{SourceRequest, SourceResponse};
use super::timed::TimedReader;

/// Client side of the source bridge.
///
/// Each call writes one request and blocks until the matching response has
/// been framed back. The protocol has no request identifiers, so the whole
/// round trip runs under a lock: callers sharing one client are serialized
/// and responses are always consumed in the order requests were sent.
///
/// After any transport failure the client is poisoned and every later call
/// fails with [`BridgeError::Poisoned`].
///
/// # Example
///
/// ```ignore
/// use srcbridge::bridge::StdioBridge;
///
/// let client = StdioBridge::stdio(None)?;
/// match client.read_file("lib/util.ts")? {
///     Some(bytes) => println!("{} bytes", bytes.len()),
///     None => println!("no such file"),
/// }
/// ```
pub struct BridgeClient<R, W> {
    channel: Mutex<Channel<R, W>>,
    timeout: Option<Duration>,
}

struct Channel<R, W> {
    reader: R,
    writer: W,
    poisoned: bool,
    round_trips: u64,
}

/// A client speaking over the current process's stdin and stdout.
pub type StdioBridge = BridgeClient<Box<dyn Read + Send>, io::Stdout>;

impl<R: Read, W: Write> BridgeClient<R, W> {
    /// Create a client over an arbitrary stream pair with no read deadline.
    pub fn new(reader: R, writer: W) -> Self {
        Self::from_parts(reader, writer, None)
    }

    fn from_parts(reader: R, writer: W, timeout: Option<Duration>) -> Self {
        Self {
            channel: Mutex::new(Channel {
                reader,
                writer,
                poisoned: false,
                round_trips: 0,
            }),
            timeout,
        }
    }

    /// Fetch a file's bytes from the parent.
    ///
    /// Returns `Ok(None)` when the parent does not have the file. Absence is
    /// an ordinary answer, not an error.
    pub fn read_file(&self, path: &str) -> BridgeResult<Option<Vec<u8>>> {
        match self.request(&SourceRequest::read_file(path))? {
            SourceResponse::Contents(bytes) => Ok(Some(bytes)),
            SourceResponse::NotFound => Ok(None),
            SourceResponse::Exists(_) => Err(BridgeError::malformed(
                "exists answer received for a read request",
            )),
        }
    }

    /// Ask the parent whether a file exists.
    pub fn file_exists(&self, path: &str) -> BridgeResult<bool> {
        match self.request(&SourceRequest::file_exists(path))? {
            SourceResponse::Exists(exists) => Ok(exists),
            _ => Err(BridgeError::malformed(
                "read answer received for an exists request",
            )),
        }
    }

    /// Perform one request/response round trip.
    pub fn request(&self, request: &SourceRequest) -> BridgeResult<SourceResponse> {
        let mut channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if channel.poisoned {
            return Err(BridgeError::Poisoned);
        }

        // Poison first so a panic mid-exchange also leaves the session unusable.
        channel.poisoned = true;
        let result =
            Self::round_trip(&mut channel, request).map_err(|e| e.with_deadline(self.timeout));

        match &result {
            Ok(response) => {
                channel.poisoned = false;
                channel.round_trips += 1;
                debug!(
                    kind = ?request.kind,
                    path = %request.path,
                    response = %describe(response),
                    "bridge round trip"
                );
            }
            Err(BridgeError::InvalidPath(_)) => {
                // Nothing was written; the stream is still in step.
                channel.poisoned = false;
            }
            Err(err) => {
                warn!(kind = ?request.kind, path = %request.path, %err, "bridge transport failed");
            }
        }

        result
    }

    fn round_trip(
        channel: &mut Channel<R, W>,
        request: &SourceRequest,
    ) -> BridgeResult<SourceResponse> {
        request.write_to(&mut channel.writer)?;
        SourceResponse::read_from(request.kind, &mut channel.reader)
    }

    /// Number of completed round trips.
    pub fn round_trips(&self) -> u64 {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .round_trips
    }

    /// Whether an earlier failure made the session unusable.
    pub fn is_poisoned(&self) -> bool {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poisoned
    }

    /// The read deadline, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Take back the underlying streams.
    pub fn into_inner(self) -> (R, W) {
        let channel = self
            .channel
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (channel.reader, channel.writer)
    }
}

impl<W: Write> BridgeClient<TimedReader, W> {
    /// Create a client whose reads fail with [`BridgeError::Timeout`] when the
    /// parent stays silent for longer than `timeout`.
    pub fn with_timeout<R>(reader: R, writer: W, timeout: Duration) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let reader = TimedReader::spawn(reader, timeout)?;
        Ok(Self::from_parts(reader, writer, Some(timeout)))
    }
}

impl StdioBridge {
    /// Create a client over stdin/stdout, optionally with a read deadline.
    pub fn stdio(timeout: Option<Duration>) -> io::Result<Self> {
        let reader: Box<dyn Read + Send> = match timeout {
            Some(limit) => Box::new(TimedReader::spawn(io::stdin(), limit)?),
            None => Box::new(io::stdin()),
        };
        Ok(Self::from_parts(reader, io::stdout(), timeout))
    }
}

/// The two source queries a compiler host needs from its parent.
///
/// Implemented by [`BridgeClient`]; tests and in-process embedders can
/// provide their own.
pub trait SourceBridge {
    /// Fetch a file's bytes, `None` when the parent does not have it.
    fn read_file(&self, path: &str) -> BridgeResult<Option<Vec<u8>>>;

    /// Whether the parent has the file.
    fn file_exists(&self, path: &str) -> BridgeResult<bool>;
}

impl<R: Read, W: Write> SourceBridge for BridgeClient<R, W> {
    fn read_file(&self, path: &str) -> BridgeResult<Option<Vec<u8>>> {
        BridgeClient::read_file(self, path)
    }

    fn file_exists(&self, path: &str) -> BridgeResult<bool> {
        BridgeClient::file_exists(self, path)
    }
}

fn describe(response: &SourceResponse) -> String {
    match response {
        SourceResponse::Contents(bytes) => format!("{} bytes", bytes.len()),
        SourceResponse::NotFound => "not found".to_string(),
        SourceResponse::Exists(exists) => format!("exists={exists}"),
    }
}
