//! Configuration for the simulated socket layer.
//!
//! | Setting | Field | Default |
//! |---------|-------|---------|
//! | Backlog used when `bind` gets 0 | `default_backlog` | 50 |
//! | Bytes buffered per direction | `pipe_capacity` | 64 KiB |
//! | Ephemeral ports tried first | `ephemeral_short_range` | 1024..10000 |
//! | Full ephemeral range | `ephemeral_range` | 1024..65535 |
//! | Random candidates before giving up | `ephemeral_attempts` | 100 |
//! | Synthesized client ports | `peer_port_range` | 40000..60000 |
//! | Read timeout of new connections | `default_read_timeout` | none |
//! | Accept timeout of new listeners | `default_accept_timeout` | none |
//!
//! ```rust
//! use moonpool_socket::SocketConfiguration;
//! use std::time::Duration;
//!
//! let mut config = SocketConfiguration::small_buffers();
//! config.default_read_timeout = Some(Duration::from_secs(5));
//! assert_eq!(config.pipe_capacity, 16);
//! ```

use std::ops::Range;
use std::time::Duration;

/// Tunables shared by every listener and connection of a [`SimNetwork`](crate::SimNetwork).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfiguration {
    /// Backlog applied when `bind` is called with a backlog of 0.
    pub default_backlog: usize,
    /// Maximum bytes buffered in one direction before writers block.
    pub pipe_capacity: usize,
    /// Range sampled for the first half of ephemeral attempts, keeping port numbers short.
    pub ephemeral_short_range: Range<u16>,
    /// Range sampled for the remaining ephemeral attempts.
    pub ephemeral_range: Range<u16>,
    /// Random candidates tried before an ephemeral bind fails.
    pub ephemeral_attempts: u32,
    /// Range for the local port reported by client-side connections. Each
    /// live connection holds a distinct port from it.
    pub peer_port_range: Range<u16>,
    /// Read timeout installed on newly established connections.
    pub default_read_timeout: Option<Duration>,
    /// Accept timeout installed on newly bound listeners.
    pub default_accept_timeout: Option<Duration>,
}

impl Default for SocketConfiguration {
    fn default() -> Self {
        Self {
            default_backlog: 50,
            pipe_capacity: 64 * 1024,
            ephemeral_short_range: 1024..10_000,
            ephemeral_range: 1024..65_535,
            ephemeral_attempts: 100,
            peer_port_range: 40_000..60_000,
            default_read_timeout: None,
            default_accept_timeout: None,
        }
    }
}

impl SocketConfiguration {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiny pipe buffers so writers block almost immediately.
    ///
    /// Useful for exercising backpressure and interleaved reads/writes.
    pub fn small_buffers() -> Self {
        Self {
            pipe_capacity: 16,
            ..Self::default()
        }
    }

    /// Backlog to use for a `bind` request, replacing 0 with the default.
    pub(crate) fn effective_backlog(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_backlog.max(1)
        } else {
            requested
        }
    }

    /// Pipe capacity, never below one byte.
    pub(crate) fn effective_pipe_capacity(&self) -> usize {
        self.pipe_capacity.max(1)
    }
}
