use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by simulated sockets.
///
/// End-of-stream is not an error: reads report it through
/// [`ReadOutcome::EndOfStream`](crate::ReadOutcome::EndOfStream).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// The requested port is already bound, or no free ephemeral port was found (port 0).
    #[error("port {port} is already in use")]
    BindConflict {
        /// Port that was requested.
        port: u16,
    },

    /// The listener backlog was full when the connect request was submitted.
    ///
    /// Connecting callers never see this directly; it is reported as [`SocketError::Refused`].
    #[error("backlog of port {port} is full ({backlog} pending)")]
    QueueFull {
        /// Listener port.
        port: u16,
        /// Backlog capacity of the listener.
        backlog: usize,
    },

    /// Nothing is listening on the port, or the listener closed before accepting.
    #[error("connection refused on port {port}")]
    Refused {
        /// Target port.
        port: u16,
    },

    /// A blocking operation exceeded its deadline. The operation may be retried.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out (`accept`, `connect`, `read`).
        operation: &'static str,
        /// Configured timeout.
        after: Duration,
    },

    /// The resource is closed, or was closed while the operation waited.
    #[error("{resource} is closed")]
    Closed {
        /// What was closed (`listener`, `input`, `output`, `socket`).
        resource: &'static str,
    },
}

/// A type alias for `Result<T, SocketError>`.
pub type SocketResult<T> = Result<T, SocketError>;

impl SocketError {
    pub(crate) fn closed(resource: &'static str) -> Self {
        SocketError::Closed { resource }
    }

    pub(crate) fn timeout(operation: &'static str, after: Option<Duration>) -> Self {
        SocketError::Timeout {
            operation,
            after: after.unwrap_or_default(),
        }
    }

    /// Whether retrying the same operation on the same resource can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SocketError::BindConflict { .. } | SocketError::Timeout { .. }
        )
    }
}

impl From<SocketError> for io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match &err {
            SocketError::BindConflict { .. } => io::ErrorKind::AddrInUse,
            SocketError::QueueFull { .. } | SocketError::Refused { .. } => {
                io::ErrorKind::ConnectionRefused
            }
            SocketError::Timeout { .. } => io::ErrorKind::TimedOut,
            SocketError::Closed { resource: "output" } => io::ErrorKind::BrokenPipe,
            SocketError::Closed { .. } => io::ErrorKind::NotConnected,
        };
        io::Error::new(kind, err)
    }
}
