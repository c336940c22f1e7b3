//! Port → listener bindings.
//!
//! The registry is the only mutable state shared between otherwise unrelated
//! listeners and connections. One lock guards the whole map and is only held
//! for the short bind/resolve/unbind sections, never while blocking, and never
//! together with a listener or request lock.
//!
//! Client-side ports synthesized for outgoing connections are tracked in a
//! separate set under their own lock, so two live connections never report
//! the same local port. They do not occupy the listener namespace.

use super::listener::ListenerCore;
use super::types::ListenerId;
use crate::config::SocketConfiguration;
use crate::error::{SocketError, SocketResult};
use crate::rng::sim_random_range;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Mapping from port number to the listener currently bound to it.
#[derive(Debug, Default)]
pub struct PortRegistry {
    bindings: Mutex<HashMap<u16, Arc<ListenerCore>>>,
    client_ports: Mutex<HashSet<u16>>,
}

/// A synthesized client port held by one live connection. Dropping it frees the port.
#[derive(Debug)]
pub(crate) struct ClientPortLease {
    registry: Arc<PortRegistry>,
    port: u16,
}

impl ClientPortLease {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for ClientPortLease {
    fn drop(&mut self) {
        self.registry.client_ports.lock().remove(&self.port);
    }
}

impl PortRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener built by `make` to `port`, or to a free ephemeral port when `port` is 0.
    ///
    /// `make` receives the port actually assigned and runs under the registry
    /// lock, so it must not block.
    pub(crate) fn bind(
        &self,
        port: u16,
        config: &SocketConfiguration,
        make: impl FnOnce(u16) -> Arc<ListenerCore>,
    ) -> SocketResult<Arc<ListenerCore>> {
        let mut bindings = self.bindings.lock();

        let port = if port == 0 {
            pick_ephemeral(&bindings, config).ok_or(SocketError::BindConflict { port: 0 })?
        } else if bindings.contains_key(&port) {
            return Err(SocketError::BindConflict { port });
        } else {
            port
        };

        let listener = make(port);
        bindings.insert(port, Arc::clone(&listener));
        tracing::debug!("port {} bound to {}", port, listener.id());
        Ok(listener)
    }

    /// Listener bound to `port`, if any.
    pub(crate) fn resolve(&self, port: u16) -> Option<Arc<ListenerCore>> {
        self.bindings.lock().get(&port).cloned()
    }

    /// Remove the binding of `port` if it still belongs to `owner`.
    ///
    /// A listener whose binding was wiped by [`reset_all_bindings`](Self::reset_all_bindings)
    /// must not remove a newer binder of the same port when it finally closes.
    pub(crate) fn unbind(&self, port: u16, owner: ListenerId) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(&port) {
            Some(listener) if listener.id() == owner => {
                bindings.remove(&port);
                tracing::debug!("port {} unbound from {}", port, owner);
                true
            }
            _ => false,
        }
    }

    /// Whether some listener is bound to `port`.
    pub fn is_bound(&self, port: u16) -> bool {
        self.bindings.lock().contains_key(&port)
    }

    /// Currently bound ports in ascending order.
    pub fn bound_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.bindings.lock().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// First unbound port at or above `start`, skipping 0.
    pub fn find_unbound_port(&self, start: u16) -> Option<u16> {
        let bindings = self.bindings.lock();
        (start.max(1)..=u16::MAX).find(|port| !bindings.contains_key(port))
    }

    /// Reserve a client port from `peer_port_range` that no live connection uses.
    ///
    /// Random candidates first, then a scan of the whole range. `None` when
    /// every port in the range is taken.
    pub(crate) fn lease_client_port(
        self: &Arc<Self>,
        config: &SocketConfiguration,
    ) -> Option<ClientPortLease> {
        let mut in_use = self.client_ports.lock();
        let range = config.peer_port_range.clone();
        let port = (0..config.ephemeral_attempts)
            .map(|_| sim_random_range(range.clone()))
            .find(|port| range.contains(port) && !in_use.contains(port))
            .or_else(|| range.clone().find(|port| !in_use.contains(port)))?;

        in_use.insert(port);
        Some(ClientPortLease {
            registry: Arc::clone(self),
            port,
        })
    }

    /// Number of client ports held by live connections.
    pub fn client_ports_in_use(&self) -> usize {
        self.client_ports.lock().len()
    }

    /// Forget every binding. Returns how many were dropped.
    ///
    /// Listeners stay open, but new connects can no longer reach them and
    /// their ports can be bound again.
    pub fn reset_all_bindings(&self) -> usize {
        let mut bindings = self.bindings.lock();
        let cleared = bindings.len();
        bindings.clear();
        tracing::debug!("reset {} port bindings", cleared);
        cleared
    }
}

/// Pick a random unbound port: the first half of the attempts sample the
/// short range, the rest the full ephemeral range.
fn pick_ephemeral(
    bindings: &HashMap<u16, Arc<ListenerCore>>,
    config: &SocketConfiguration,
) -> Option<u16> {
    let short_attempts = config.ephemeral_attempts / 2;
    (0..config.ephemeral_attempts)
        .map(|attempt| {
            let range = if attempt < short_attempts {
                config.ephemeral_short_range.clone()
            } else {
                config.ephemeral_range.clone()
            };
            sim_random_range(range)
        })
        .find(|port| *port != 0 && !bindings.contains_key(port))
}
