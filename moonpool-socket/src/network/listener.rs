//! Listening endpoint and its backlog.
//!
//! ```text
//!  connect ──submit──► [ Request | Request | ... ] ──accept──► SimStream (server side)
//!                                │
//!                      close: drain, refuse every Request, push Terminator
//! ```
//!
//! The backlog is a [`BlockingQueue`] of [`BacklogEntry`] values. Closing the
//! listener pushes a single `Terminator`; an acceptor that takes it puts it
//! back at the head before returning `Closed`, so every other blocked
//! acceptor wakes in turn.

use super::channel::DuplexChannel;
use super::registry::PortRegistry;
use super::request::ConnectionRequest;
use super::stream::SimStream;
use super::types::{ListenerId, INTERNAL_IP};
use crate::error::{SocketError, SocketResult};
use crate::queue::BlockingQueue;
use crate::time::{normalize_timeout, Deadline};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// A backlog slot.
#[derive(Debug)]
pub(crate) enum BacklogEntry {
    Request(Arc<ConnectionRequest>),
    /// Pushed on close to wake blocked acceptors.
    Terminator,
}

impl BacklogEntry {
    fn is_live(&self) -> bool {
        match self {
            BacklogEntry::Request(request) => request.is_pending(),
            BacklogEntry::Terminator => true,
        }
    }
}

/// Listener state shared between the [`SimListener`] handle and the registry.
#[derive(Debug)]
pub(crate) struct ListenerCore {
    id: ListenerId,
    port: u16,
    backlog: usize,
    pipe_capacity: usize,
    /// Lifecycle lock: `submit` and `close` serialize on it so no request can
    /// slip into the queue after it was drained.
    closed: Mutex<bool>,
    queue: BlockingQueue<BacklogEntry>,
}

impl ListenerCore {
    pub(crate) fn new(port: u16, backlog: usize, pipe_capacity: usize) -> Self {
        Self {
            id: ListenerId::next(),
            port,
            backlog: backlog.max(1),
            pipe_capacity,
            closed: Mutex::new(false),
            queue: BlockingQueue::new(),
        }
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Queue a connect attempt.
    ///
    /// Cancelled entries are pruned first, so only requests still waiting
    /// count against the backlog.
    pub(crate) fn submit(&self, request: Arc<ConnectionRequest>) -> SocketResult<()> {
        let closed = self.closed.lock();
        if *closed {
            return Err(SocketError::closed("listener"));
        }

        self.queue.retain(BacklogEntry::is_live);
        if self.queue.len() >= self.backlog {
            return Err(SocketError::QueueFull {
                port: self.port,
                backlog: self.backlog,
            });
        }

        tracing::trace!("{} queued on {}", request.connection_id(), self.id);
        self.queue.put(BacklogEntry::Request(request));
        Ok(())
    }

    /// Take the next live request and accept it.
    ///
    /// Requests whose connector already timed out are skipped, and the wait
    /// continues until the same deadline.
    pub(crate) fn accept(
        &self,
        deadline: Deadline,
    ) -> SocketResult<(DuplexChannel, Arc<ConnectionRequest>)> {
        if self.is_closed() {
            return Err(SocketError::closed("listener"));
        }

        loop {
            match self.queue.get(deadline) {
                None => return Err(SocketError::timeout("accept", deadline.timeout())),
                Some(BacklogEntry::Terminator) => {
                    self.queue.put_front(BacklogEntry::Terminator);
                    return Err(SocketError::closed("listener"));
                }
                Some(BacklogEntry::Request(request)) => {
                    match request.accept(self.pipe_capacity) {
                        Some(server) => return Ok((server, request)),
                        None => {
                            tracing::debug!(
                                "{} skipping cancelled {}",
                                self.id,
                                request.connection_id()
                            );
                        }
                    }
                }
            }
        }
    }

    /// Requests queued and still waiting.
    pub(crate) fn pending(&self) -> usize {
        let mut pending = 0;
        self.queue.retain(|entry| {
            if let BacklogEntry::Request(request) = entry {
                if request.is_pending() {
                    pending += 1;
                    return true;
                }
                return false;
            }
            true
        });
        pending
    }

    /// Close: refuse everything queued and wake acceptors.
    ///
    /// Every queued request is resolved before this returns. Returns `false`
    /// if the listener was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut closed = self.closed.lock();
        if *closed {
            return false;
        }
        *closed = true;

        let refused = self
            .queue
            .drain()
            .into_iter()
            .filter(|entry| match entry {
                BacklogEntry::Request(request) => request.refuse(),
                BacklogEntry::Terminator => false,
            })
            .count();
        self.queue.put(BacklogEntry::Terminator);

        tracing::debug!(
            "{} on port {} closed, refused {} queued connects",
            self.id,
            self.port,
            refused
        );
        true
    }
}

/// A bound, listening socket.
///
/// Dropping the listener closes it.
#[derive(Debug)]
pub struct SimListener {
    core: Arc<ListenerCore>,
    registry: Arc<PortRegistry>,
    accept_timeout: Mutex<Option<Duration>>,
    read_timeout: Option<Duration>,
}

impl SimListener {
    pub(crate) fn new(
        core: Arc<ListenerCore>,
        registry: Arc<PortRegistry>,
        accept_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            core,
            registry,
            accept_timeout: Mutex::new(normalize_timeout(accept_timeout)),
            read_timeout,
        }
    }

    /// Identifier distinguishing this listener from earlier binders of the port.
    pub fn id(&self) -> ListenerId {
        self.core.id()
    }

    /// Port this listener is bound to (the assigned one when bound with 0).
    pub fn local_port(&self) -> u16 {
        self.core.port()
    }

    /// Address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(INTERNAL_IP, self.core.port())
    }

    /// Maximum number of queued, unaccepted connects.
    pub fn backlog(&self) -> usize {
        self.core.backlog
    }

    /// Number of connects queued and still waiting to be accepted.
    pub fn pending(&self) -> usize {
        self.core.pending()
    }

    /// Timeout used by [`accept`](Self::accept); `None` blocks indefinitely.
    pub fn accept_timeout(&self) -> Option<Duration> {
        *self.accept_timeout.lock()
    }

    /// Change the timeout used by later [`accept`](Self::accept) calls. Zero means none.
    pub fn set_accept_timeout(&self, timeout: Option<Duration>) {
        *self.accept_timeout.lock() = normalize_timeout(timeout);
    }

    /// Wait for the next connection using the listener's accept timeout.
    pub fn accept(&self) -> SocketResult<SimStream> {
        self.accept_within(self.accept_timeout())
    }

    /// Wait for the next connection, giving up after `timeout` (`None` or zero: never).
    ///
    /// Returns `Timeout` if nothing arrived in time and `Closed` if the
    /// listener is or becomes closed.
    #[instrument(skip(self), fields(port = self.core.port()))]
    pub fn accept_within(&self, timeout: Option<Duration>) -> SocketResult<SimStream> {
        let (channel, request) = self.core.accept(Deadline::after(timeout))?;
        tracing::debug!(
            "{} accepted {} from port {}",
            self.core.id(),
            request.connection_id(),
            request.peer_port()
        );
        Ok(SimStream::new(
            channel,
            request.connection_id(),
            self.core.port(),
            request.peer_port(),
            self.read_timeout,
        ))
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Stop listening: refuse queued connects, release the port, wake acceptors.
    ///
    /// Idempotent.
    pub fn close(&self) {
        if self.core.close() {
            self.registry.unbind(self.core.port(), self.core.id());
        }
    }
}

impl Drop for SimListener {
    fn drop(&mut self) {
        self.close();
    }
}
