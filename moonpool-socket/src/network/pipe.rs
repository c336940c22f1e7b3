//! One-directional in-memory byte pipe.
//!
//! A pipe has exactly one [`PipeWriter`] and one [`PipeReader`]. Bytes are
//! delivered in write order. The buffer is bounded: writers block while it is
//! full and resume as the reader drains it.
//!
//! ```text
//!   PipeWriter ──write──► [ buffer (capacity) ] ──read──► PipeReader
//!        │                                                    │
//!   close: reader drains, then sees EndOfStream      close: writer fails with Closed
//! ```

use crate::error::{SocketError, SocketResult};
use crate::time::Deadline;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Result of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were copied into the buffer.
    Data(usize),
    /// The peer shut down its output and every byte it wrote has been read.
    EndOfStream,
}

impl ReadOutcome {
    /// Bytes read, with end-of-stream reported as 0 like [`std::io::Read`].
    pub fn len(&self) -> usize {
        match self {
            ReadOutcome::Data(n) => *n,
            ReadOutcome::EndOfStream => 0,
        }
    }

    /// No bytes were copied: an empty buffer or end-of-stream.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the read hit end-of-stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReadOutcome::EndOfStream)
    }
}

#[derive(Debug)]
struct PipeState {
    buffer: VecDeque<u8>,
    capacity: usize,
    writer_closed: bool,
    reader_closed: bool,
}

#[derive(Debug)]
struct PipeShared {
    state: Mutex<PipeState>,
    readable: Condvar,
    writable: Condvar,
}

/// Create a pipe buffering at most `capacity` bytes.
pub(crate) fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(PipeShared {
        state: Mutex::new(PipeState {
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
            writer_closed: false,
            reader_closed: false,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

/// Producing end of a pipe.
#[derive(Debug)]
pub(crate) struct PipeWriter {
    shared: Arc<PipeShared>,
}

impl PipeWriter {
    /// Write all of `data`, blocking while the buffer is full.
    ///
    /// Fails with `Closed` if this end was closed, or if the reader went away
    /// before everything was buffered.
    pub(crate) fn write(&self, data: &[u8]) -> SocketResult<usize> {
        let mut state = self.shared.state.lock();
        let mut written = 0;
        loop {
            if state.writer_closed {
                return Err(SocketError::closed("output"));
            }
            if state.reader_closed {
                return Err(SocketError::closed("peer input"));
            }
            if written == data.len() {
                break;
            }

            let space = state.capacity.saturating_sub(state.buffer.len());
            if space == 0 {
                self.shared.writable.wait(&mut state);
                continue;
            }

            let chunk = space.min(data.len() - written);
            state
                .buffer
                .extend(data[written..written + chunk].iter().copied());
            written += chunk;
            self.shared.readable.notify_all();
        }
        tracing::trace!("pipe write of {} bytes complete", written);
        Ok(written)
    }

    /// Signal end-of-stream to the reader. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.writer_closed {
            return false;
        }
        state.writer_closed = true;
        self.shared.readable.notify_all();
        self.shared.writable.notify_all();
        true
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consuming end of a pipe.
#[derive(Debug)]
pub(crate) struct PipeReader {
    shared: Arc<PipeShared>,
}

impl PipeReader {
    /// Read up to `buf.len()` bytes, blocking until data, end-of-stream, or `deadline`.
    pub(crate) fn read(&self, buf: &mut [u8], deadline: Deadline) -> SocketResult<ReadOutcome> {
        let mut state = self.shared.state.lock();
        loop {
            if state.reader_closed {
                return Err(SocketError::closed("input"));
            }
            if buf.is_empty() {
                return Ok(ReadOutcome::Data(0));
            }
            if !state.buffer.is_empty() {
                let n = buf.len().min(state.buffer.len());
                for (dst, src) in buf.iter_mut().zip(state.buffer.drain(..n)) {
                    *dst = src;
                }
                self.shared.writable.notify_all();
                tracing::trace!("pipe read of {} bytes", n);
                return Ok(ReadOutcome::Data(n));
            }
            if state.writer_closed {
                return Ok(ReadOutcome::EndOfStream);
            }

            let woke = deadline.wait(&self.shared.readable, &mut state);
            if !woke && state.buffer.is_empty() && !state.writer_closed && !state.reader_closed {
                return Err(SocketError::timeout("read", deadline.timeout()));
            }
        }
    }

    /// Bytes readable without blocking.
    pub(crate) fn available(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Stop reading: discard buffered bytes and fail further writes.
    /// Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.reader_closed {
            return false;
        }
        state.reader_closed = true;
        state.buffer.clear();
        self.shared.readable.notify_all();
        self.shared.writable.notify_all();
        true
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.close();
    }
}
