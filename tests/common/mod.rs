//! In-process stand-in for the parent side of the bridge.
//!
//! The writer half parses each request line as it arrives and queues the
//! response; the reader half drains that queue. A `BridgeClient` over the
//! pair behaves exactly as it would against a real parent process.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use srcbridge::bridge::{BridgeClient, SourceRequest};
use srcbridge::responder::{answer, MemorySources};

#[derive(Default)]
struct State {
    sources: MemorySources,
    pending: Vec<u8>,
    responses: VecDeque<u8>,
    log: Vec<SourceRequest>,
    /// Cut the response to this path short after this many bytes.
    truncate: Option<(String, usize)>,
}

/// Shared handle to a loopback parent.
#[derive(Clone, Default)]
pub struct Loopback {
    state: Arc<Mutex<State>>,
}

pub struct LoopbackReader(Arc<Mutex<State>>);

pub struct LoopbackWriter(Arc<Mutex<State>>);

impl Loopback {
    pub fn new<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let loopback = Self::default();
        {
            let mut state = loopback.state.lock().unwrap();
            for (path, contents) in files {
                state.sources.insert(path, contents);
            }
        }
        loopback
    }

    /// Add a file whose contents need not be text.
    pub fn with_bytes(self, path: &str, contents: &[u8]) -> Self {
        self.state.lock().unwrap().sources.insert(path, contents.to_vec());
        self
    }

    /// Send only the first `keep` bytes of the response for `path`, then
    /// close the stream.
    pub fn truncate(self, path: &str, keep: usize) -> Self {
        self.state.lock().unwrap().truncate = Some((path.to_string(), keep));
        self
    }

    pub fn client(&self) -> BridgeClient<LoopbackReader, LoopbackWriter> {
        BridgeClient::new(
            LoopbackReader(Arc::clone(&self.state)),
            LoopbackWriter(Arc::clone(&self.state)),
        )
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<SourceRequest> {
        self.state.lock().unwrap().log.clone()
    }

    /// Request lines as they appeared on the wire, without terminators.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{}{}", r.kind.tag(), r.path))
            .collect()
    }
}

impl Read for LoopbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.0.lock().unwrap();
        let n = buf.len().min(state.responses.len());
        for (slot, byte) in buf.iter_mut().zip(state.responses.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for LoopbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.lock().unwrap();
        state.pending.extend_from_slice(buf);

        while let Some(end) = state.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = state.pending.drain(..=end).collect();
            let request = SourceRequest::parse_line(&line).expect("request line");
            let mut response = answer(&request, &state.sources).encode();
            if let Some((path, keep)) = &state.truncate {
                if *path == request.path {
                    response.truncate(*keep);
                }
            }
            state.responses.extend(response);
            state.log.push(request);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
