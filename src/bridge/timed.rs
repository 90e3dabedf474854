//! A reader with a per-read deadline.
//!
//! Blocking pipe reads cannot be interrupted, so a background thread pumps
//! chunks from the underlying stream into a channel and [`TimedReader`]
//! waits on that channel with `recv_timeout`. A read that waits longer than
//! the deadline fails with [`io::ErrorKind::TimedOut`].

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

const CHUNK_SIZE: usize = 8 * 1024;

/// Chunks buffered between the pump thread and the reader.
const CHANNEL_DEPTH: usize = 16;

/// Reader side of a pumped stream.
pub struct TimedReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
    timeout: Duration,
    eof: bool,
}

impl TimedReader {
    /// Start pumping `inner` on a background thread.
    ///
    /// The thread exits when `inner` reaches end of stream, fails, or the
    /// `TimedReader` is dropped and the next chunk cannot be delivered.
    pub fn spawn<R>(inner: R, timeout: Duration) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        thread::Builder::new()
            .name("srcbridge-reader".to_string())
            .spawn(move || pump(inner, tx))?;

        Ok(Self {
            chunks: rx,
            current: Vec::new(),
            pos: 0,
            timeout,
            eof: false,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Read for TimedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pos == self.current.len() {
            if self.eof {
                return Ok(0);
            }
            match self.chunks.recv_timeout(self.timeout) {
                Ok(Ok(chunk)) if chunk.is_empty() => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no data within {:?}", self.timeout),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.eof = true;
                    return Ok(0);
                }
            }
        }

        let available = &self.current[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

fn pump<R: Read>(mut inner: R, tx: SyncSender<io::Result<Vec<u8>>>) {
    loop {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        match inner.read(&mut chunk) {
            Ok(0) => {
                let _ = tx.send(Ok(Vec::new()));
                return;
            }
            Ok(n) => {
                chunk.truncate(n);
                if tx.send(Ok(chunk)).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}
