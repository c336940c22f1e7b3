//! Simulated in-process sockets.
//!
//! Listeners bind ports in a [`PortRegistry`]; a connect finds the listener
//! through the registry, queues a request in its backlog and blocks until an
//! `accept` pairs it with a [`SimStream`] on the server side.

mod channel;
mod listener;
mod pipe;
mod provider;
mod registry;
mod request;
mod stream;
mod types;

pub use listener::SimListener;
pub use pipe::ReadOutcome;
pub use provider::{bind, connect, reset_all_bindings, SimNetwork};
pub use registry::PortRegistry;
pub use stream::{SimStream, SocketReader, SocketWriter, StreamState};
pub use types::{ConnectionId, ListenerId, INTERNAL_IP};
