//! Connected simulated socket.
//!
//! Both the connecting side and the accepted side are a [`SimStream`]. Each
//! owns one [`DuplexChannel`](super::channel::DuplexChannel) and a
//! [`StreamState`] tracking which halves are still open.
//!
//! ## Half-close
//!
//! ```text
//!            shutdown_input              shutdown_output
//!   Open ─────────────────► InputShut ─────────────────► Closed
//!     │                                                    ▲
//!     │ shutdown_output                   shutdown_input   │
//!     └───────────────────► OutputShut ────────────────────┘
//!
//!   close() from any state ──► Closed (no-op when already Closed)
//! ```
//!
//! Shutting down the output closes only the write end of the pipe: the peer
//! drains what was written and then reads end-of-stream, while this side can
//! still read. Shutting down a half twice fails with `Closed`.

use super::channel::DuplexChannel;
use super::pipe::ReadOutcome;
use super::registry::ClientPortLease;
use super::types::{ConnectionId, INTERNAL_IP};
use crate::error::{SocketError, SocketResult};
use crate::time::{normalize_timeout, Deadline};
use parking_lot::Mutex;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;
use tracing::instrument;

/// Which halves of a connection are still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Both directions open.
    #[default]
    Open,
    /// Input shut down, output still usable.
    InputShut,
    /// Output shut down, input still usable.
    OutputShut,
    /// Both directions shut down.
    Closed,
}

impl StreamState {
    /// The state reached by shutting down `how`.
    ///
    /// Every state change of a stream goes through here. `Shutdown::Both` on a
    /// closed stream is accepted so that `close` stays idempotent; shutting
    /// down an already shut half is not.
    pub fn apply(self, how: Shutdown) -> SocketResult<StreamState> {
        use StreamState::*;
        match (self, how) {
            (Closed, Shutdown::Both) => Ok(Closed),
            (Closed, _) => Err(SocketError::closed("socket")),
            (InputShut, Shutdown::Read) => Err(SocketError::closed("input")),
            (OutputShut, Shutdown::Write) => Err(SocketError::closed("output")),
            (Open, Shutdown::Read) => Ok(InputShut),
            (Open, Shutdown::Write) => Ok(OutputShut),
            (InputShut, Shutdown::Write) | (OutputShut, Shutdown::Read) => Ok(Closed),
            (_, Shutdown::Both) => Ok(Closed),
        }
    }

    /// Whether reads are still allowed.
    pub fn input_open(self) -> bool {
        matches!(self, StreamState::Open | StreamState::OutputShut)
    }

    /// Whether writes are still allowed.
    pub fn output_open(self) -> bool {
        matches!(self, StreamState::Open | StreamState::InputShut)
    }

    fn input_error(self) -> SocketError {
        match self {
            StreamState::Closed => SocketError::closed("socket"),
            _ => SocketError::closed("input"),
        }
    }

    fn output_error(self) -> SocketError {
        match self {
            StreamState::Closed => SocketError::closed("socket"),
            _ => SocketError::closed("output"),
        }
    }
}

/// One end of an established simulated connection.
///
/// All methods take `&self`, so a stream can be shared between a reading and
/// a writing thread. Dropping the stream closes it.
#[derive(Debug)]
pub struct SimStream {
    connection_id: ConnectionId,
    local_port: u16,
    peer_port: u16,
    channel: DuplexChannel,
    /// Set once the handshake completed; never cleared.
    connected: bool,
    state: Mutex<StreamState>,
    read_timeout: Mutex<Option<Duration>>,
    client_port: Option<ClientPortLease>,
}

impl SimStream {
    pub(crate) fn new(
        channel: DuplexChannel,
        connection_id: ConnectionId,
        local_port: u16,
        peer_port: u16,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            connection_id,
            local_port,
            peer_port,
            channel,
            connected: true,
            state: Mutex::new(StreamState::Open),
            read_timeout: Mutex::new(normalize_timeout(read_timeout)),
            client_port: None,
        }
    }

    /// Hold `lease` on the synthesized local port until this stream is dropped.
    pub(crate) fn with_client_port(mut self, lease: ClientPortLease) -> Self {
        self.client_port = Some(lease);
        self
    }

    /// Identifier shared by both ends of the connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Local port: the listener's port on the accepted side, a synthesized one on the client.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Port of the other end.
    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }

    /// Local address.
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(INTERNAL_IP, self.local_port)
    }

    /// Address of the other end.
    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(INTERNAL_IP, self.peer_port)
    }

    /// Current half-close state.
    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    /// Whether the connection was established. Stays `true` after `close`;
    /// use [`is_closed`](Self::is_closed) for that.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Both halves shut down.
    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    /// Whether [`shutdown_input`](Self::shutdown_input) or `close` happened.
    pub fn is_input_shutdown(&self) -> bool {
        !self.state().input_open()
    }

    /// Whether [`shutdown_output`](Self::shutdown_output) or `close` happened.
    pub fn is_output_shutdown(&self) -> bool {
        !self.state().output_open()
    }

    /// Timeout applied to reads; `None` blocks indefinitely.
    pub fn read_timeout(&self) -> Option<Duration> {
        *self.read_timeout.lock()
    }

    /// Set the timeout for subsequent reads. `None` or zero disables it.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self.read_timeout.lock() = normalize_timeout(timeout);
    }

    /// Bytes that can be read without blocking.
    pub fn available(&self) -> usize {
        if self.state().input_open() {
            self.channel.available()
        } else {
            0
        }
    }

    /// Read into `buf`, blocking up to the read timeout.
    ///
    /// Returns [`ReadOutcome::EndOfStream`] once the peer shut down its output
    /// and everything it wrote was consumed.
    pub fn read(&self, buf: &mut [u8]) -> SocketResult<ReadOutcome> {
        let state = self.state();
        if !state.input_open() {
            return Err(state.input_error());
        }
        self.channel.read(buf, Deadline::after(self.read_timeout()))
    }

    /// Write all of `data`, blocking while the peer's buffer is full.
    pub fn write(&self, data: &[u8]) -> SocketResult<usize> {
        let state = self.state();
        if !state.output_open() {
            return Err(state.output_error());
        }
        self.channel.write(data)
    }

    /// Writes are delivered immediately; this only checks the output is still open.
    pub fn flush(&self) -> SocketResult<()> {
        let state = self.state();
        if !state.output_open() {
            return Err(state.output_error());
        }
        Ok(())
    }

    /// Reader half usable with [`std::io::Read`]. Fails if input is shut.
    pub fn input_stream(&self) -> SocketResult<SocketReader<'_>> {
        let state = self.state();
        if !state.input_open() {
            return Err(state.input_error());
        }
        Ok(SocketReader { stream: self })
    }

    /// Writer half usable with [`std::io::Write`]. Fails if output is shut.
    pub fn output_stream(&self) -> SocketResult<SocketWriter<'_>> {
        let state = self.state();
        if !state.output_open() {
            return Err(state.output_error());
        }
        Ok(SocketWriter { stream: self })
    }

    /// Stop reading. Buffered and future peer bytes are discarded and the
    /// peer's writes fail.
    pub fn shutdown_input(&self) -> SocketResult<()> {
        self.shutdown(Shutdown::Read)
    }

    /// Stop writing. The peer reads what was written, then end-of-stream.
    pub fn shutdown_output(&self) -> SocketResult<()> {
        self.shutdown(Shutdown::Write)
    }

    /// Shut down both halves. Idempotent.
    pub fn close(&self) {
        // `Both` is accepted in every state.
        let _ = self.shutdown(Shutdown::Both);
    }

    /// Apply a shutdown and close the pipe ends that went from open to shut.
    #[instrument(skip(self), fields(conn = %self.connection_id))]
    pub fn shutdown(&self, how: Shutdown) -> SocketResult<()> {
        let mut state = self.state.lock();
        let previous = *state;
        let next = previous.apply(how)?;
        *state = next;

        if previous.output_open() && !next.output_open() {
            self.channel.close_write();
        }
        if previous.input_open() && !next.input_open() {
            self.channel.close_read();
        }
        if previous != next {
            tracing::debug!("{} {:?} -> {:?}", self.connection_id, previous, next);
        }
        Ok(())
    }
}

impl Drop for SimStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl io::Read for &SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(SimStream::read(*self, buf)?.len())
    }
}

impl io::Read for SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(SimStream::read(self, buf)?.len())
    }
}

impl io::Write for &SimStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(SimStream::write(*self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(SimStream::flush(*self)?)
    }
}

impl io::Write for SimStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(SimStream::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(SimStream::flush(self)?)
    }
}

/// Borrowed input half of a [`SimStream`].
#[derive(Debug)]
pub struct SocketReader<'a> {
    stream: &'a SimStream,
}

impl io::Read for SocketReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.stream.read(buf)?.len())
    }
}

/// Borrowed output half of a [`SimStream`].
#[derive(Debug)]
pub struct SocketWriter<'a> {
    stream: &'a SimStream,
}

impl io::Write for SocketWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.stream.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.stream.flush()?)
    }
}
