//! # Moonpool Socket
//!
//! In-process stream sockets for tests and simulations. Listeners bind
//! numbered ports, clients connect to them, and both ends exchange bytes over
//! bounded in-memory pipes. Nothing touches the operating system's network
//! stack, so a whole cluster of services can talk to each other inside one
//! process.
//!
//! Supported: blocking accept and connect with optional timeouts, per-listener
//! backlogs, ephemeral port assignment, half-close, and closing a listener
//! with connects still queued (they are refused).
//!
//! ## Example Usage
//!
//! ```rust
//! use moonpool_socket::SimNetwork;
//! use std::io::{Read, Write};
//!
//! let network = SimNetwork::new();
//! let listener = network.bind(0, 0).expect("bind");
//! let port = listener.local_port();
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         let mut server = listener.accept().expect("accept");
//!         let mut request = String::new();
//!         server.read_to_string(&mut request).expect("read");
//!         server.write_all(request.to_uppercase().as_bytes()).expect("write");
//!     });
//!
//!     let mut client = network.connect(port, None).expect("connect");
//!     client.write_all(b"ping").expect("write");
//!     client.shutdown_output().expect("half-close");
//!
//!     let mut reply = String::new();
//!     client.read_to_string(&mut reply).expect("read");
//!     assert_eq!(reply, "PING");
//! });
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Tunables for ports, backlogs and buffers.
pub mod config;
/// Error types for socket operations.
pub mod error;
/// Listeners, connections and the port registry.
pub mod network;
/// Blocking FIFO used for listener backlogs.
pub mod queue;
/// Thread-local random number generation for port selection.
pub mod rng;
/// Deadlines for blocking operations.
pub mod time;

pub use config::SocketConfiguration;
pub use error::{SocketError, SocketResult};
pub use network::{
    bind, connect, reset_all_bindings, ConnectionId, ListenerId, PortRegistry, ReadOutcome,
    SimListener, SimNetwork, SimStream, SocketReader, SocketWriter, StreamState, INTERNAL_IP,
};
pub use queue::BlockingQueue;
pub use rng::{get_current_sim_seed, reset_sim_rng, set_sim_seed, sim_random_range};
pub use time::Deadline;
