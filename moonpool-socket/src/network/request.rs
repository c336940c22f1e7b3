//! The rendezvous between one connecting party and the listener.
//!
//! A [`ConnectionRequest`] is shared (through `Arc`) between the connector
//! blocked in `connect` and the listener backlog holding it. Three actors race
//! to resolve it, and its own mutex makes the first one win:
//!
//! ```text
//!                    ┌──── accept (listener) ────► Accepted ──► both sides get a channel
//!   Pending ─────────┼──── close  (listener) ────► Refused  ──► connector sees Refused
//!                    └──── deadline (connector) ─► Cancelled ─► connector sees Timeout,
//!                                                               listener skips the entry
//! ```

use super::channel::DuplexChannel;
use super::types::ConnectionId;
use crate::error::{SocketError, SocketResult};
use crate::time::Deadline;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
enum RequestState {
    Pending,
    /// Holds the client side until the connector picks it up.
    Accepted(Option<DuplexChannel>),
    Refused,
    Cancelled,
}

impl RequestState {
    fn name(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Accepted(_) => "accepted",
            RequestState::Refused => "refused",
            RequestState::Cancelled => "cancelled",
        }
    }
}

/// A single connect attempt waiting in a listener backlog.
#[derive(Debug)]
pub(crate) struct ConnectionRequest {
    connection_id: ConnectionId,
    port: u16,
    peer_port: u16,
    state: Mutex<RequestState>,
    resolved: Condvar,
}

impl ConnectionRequest {
    /// New pending request for `port`, from a client reporting `peer_port` as its own.
    pub(crate) fn new(port: u16, peer_port: u16) -> Self {
        Self {
            connection_id: ConnectionId::next(),
            port,
            peer_port,
            state: Mutex::new(RequestState::Pending),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub(crate) fn peer_port(&self) -> u16 {
        self.peer_port
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), RequestState::Pending)
    }

    /// Resolve as accepted, returning the server side of a fresh channel pair.
    ///
    /// Returns `None` if the connector already gave up. Both channels are built
    /// and published under the request lock, so the connector can never see a
    /// half-built connection.
    ///
    /// # Panics
    ///
    /// If the request was already accepted or refused: a backlog entry is
    /// resolved by exactly one listener action.
    pub(crate) fn accept(&self, pipe_capacity: usize) -> Option<DuplexChannel> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state {
            RequestState::Pending => {
                let (server, client) = DuplexChannel::pair(pipe_capacity);
                *state = RequestState::Accepted(Some(client));
                self.resolved.notify_all();
                Some(server)
            }
            RequestState::Cancelled => None,
            _ => panic!(
                "{} on port {} accepted while {}",
                self.connection_id,
                self.port,
                state.name()
            ),
        }
    }

    /// Resolve as refused. Returns `false` if the connector already gave up.
    ///
    /// # Panics
    ///
    /// If the request was already accepted or refused.
    pub(crate) fn refuse(&self) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state {
            RequestState::Pending => {
                *state = RequestState::Refused;
                self.resolved.notify_all();
                true
            }
            RequestState::Cancelled => false,
            _ => panic!(
                "{} on port {} refused while {}",
                self.connection_id,
                self.port,
                state.name()
            ),
        }
    }

    /// Block until the request is resolved or `deadline` passes.
    ///
    /// On expiry a still-pending request is cancelled and `Timeout` returned;
    /// if a listener resolved it first, that resolution wins.
    pub(crate) fn wait(&self, deadline: Deadline) -> SocketResult<DuplexChannel> {
        let mut state = self.state.lock();
        while matches!(*state, RequestState::Pending) {
            if !deadline.wait(&self.resolved, &mut state)
                && matches!(*state, RequestState::Pending)
            {
                *state = RequestState::Cancelled;
                tracing::debug!(
                    "{} to port {} cancelled after {:?}",
                    self.connection_id,
                    self.port,
                    deadline.timeout()
                );
            }
        }

        match &mut *state {
            RequestState::Accepted(client) => client
                .take()
                .ok_or_else(|| SocketError::closed("socket")),
            RequestState::Refused => Err(SocketError::Refused { port: self.port }),
            RequestState::Cancelled => Err(SocketError::timeout("connect", deadline.timeout())),
            RequestState::Pending => unreachable!("loop exits only once resolved"),
        }
    }
}
