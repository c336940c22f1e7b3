//! Entry points: binding listeners and connecting to them.

use super::listener::{ListenerCore, SimListener};
use super::registry::PortRegistry;
use super::request::ConnectionRequest;
use super::stream::SimStream;
use crate::config::SocketConfiguration;
use crate::error::{SocketError, SocketResult};
use crate::time::Deadline;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

static GLOBAL: Lazy<SimNetwork> = Lazy::new(SimNetwork::new);

/// An isolated simulated network: one port registry plus the configuration
/// applied to everything bound or connected through it.
///
/// Cloning is cheap and yields a handle to the same network. Tests that run
/// in parallel should each build their own instance instead of sharing
/// [`SimNetwork::global`].
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    registry: Arc<PortRegistry>,
    config: Arc<SocketConfiguration>,
}

impl SimNetwork {
    /// Network with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network with a custom configuration.
    pub fn with_configuration(config: SocketConfiguration) -> Self {
        Self {
            registry: Arc::new(PortRegistry::new()),
            config: Arc::new(config),
        }
    }

    /// The process-wide network used by [`bind`](crate::bind) and [`connect`](crate::connect).
    pub fn global() -> &'static SimNetwork {
        &GLOBAL
    }

    /// Configuration of this network.
    pub fn configuration(&self) -> &SocketConfiguration {
        &self.config
    }

    /// Port registry of this network.
    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Bind a listener to `port` (0 picks a free ephemeral port).
    ///
    /// A `backlog` of 0 uses the configured default. Fails with
    /// `BindConflict` when the port is taken or no ephemeral port was found.
    #[instrument(skip(self))]
    pub fn bind(&self, port: u16, backlog: usize) -> SocketResult<SimListener> {
        let backlog = self.config.effective_backlog(backlog);
        let pipe_capacity = self.config.effective_pipe_capacity();
        let core = self.registry.bind(port, &self.config, |port| {
            Arc::new(ListenerCore::new(port, backlog, pipe_capacity))
        })?;

        Ok(SimListener::new(
            core,
            Arc::clone(&self.registry),
            self.config.default_accept_timeout,
            self.config.default_read_timeout,
        ))
    }

    /// Connect to the listener on `port`, waiting at most `timeout` for it to
    /// accept (`None` or zero: wait indefinitely).
    ///
    /// The client side gets a local port from `peer_port_range` that no other
    /// live connection of this network holds.
    ///
    /// Fails immediately with `Refused` when nothing is bound, the backlog is
    /// full, or every client port is taken. Fails later with `Refused` if the
    /// listener closes first, and with `Timeout` if the deadline passes
    /// before an accept.
    #[instrument(skip(self))]
    pub fn connect(&self, port: u16, timeout: Option<Duration>) -> SocketResult<SimStream> {
        let Some(listener) = self.registry.resolve(port) else {
            tracing::debug!("nothing bound on port {}", port);
            return Err(SocketError::Refused { port });
        };

        let Some(lease) = self.registry.lease_client_port(&self.config) else {
            tracing::debug!("no free client port for a connect to port {}", port);
            return Err(SocketError::Refused { port });
        };
        let local_port = lease.port();
        let request = Arc::new(ConnectionRequest::new(port, local_port));
        if let Err(err) = listener.submit(Arc::clone(&request)) {
            tracing::debug!("{} to port {} rejected: {}", request.connection_id(), port, err);
            return Err(SocketError::Refused { port });
        }

        let channel = request.wait(Deadline::after(timeout))?;
        tracing::debug!(
            "{} established {} -> {}",
            request.connection_id(),
            local_port,
            port
        );
        Ok(SimStream::new(
            channel,
            request.connection_id(),
            local_port,
            port,
            self.config.default_read_timeout,
        )
        .with_client_port(lease))
    }

    /// Forget every binding of this network. Returns how many were dropped.
    pub fn reset_all_bindings(&self) -> usize {
        self.registry.reset_all_bindings()
    }

    /// First port at or above `start` with nothing bound.
    pub fn find_unbound_port(&self, start: u16) -> Option<u16> {
        self.registry.find_unbound_port(start)
    }
}

/// Bind on the [global](SimNetwork::global) network.
pub fn bind(port: u16, backlog: usize) -> SocketResult<SimListener> {
    SimNetwork::global().bind(port, backlog)
}

/// Connect on the [global](SimNetwork::global) network.
pub fn connect(port: u16, timeout: Option<Duration>) -> SocketResult<SimStream> {
    SimNetwork::global().connect(port, timeout)
}

/// Reset the [global](SimNetwork::global) network's bindings.
pub fn reset_all_bindings() -> usize {
    SimNetwork::global().reset_all_bindings()
}
