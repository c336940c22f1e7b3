//! Port binding: conflicts, ephemeral assignment and release on close.

use moonpool_socket::{
    set_sim_seed, SimNetwork, SocketConfiguration, SocketError, INTERNAL_IP,
};
use std::net::SocketAddr;

#[test]
fn test_bind_specific_port() {
    super::init_tracing();
    let network = SimNetwork::new();

    let listener = network.bind(8080, 5).unwrap();
    assert_eq!(listener.local_port(), 8080);
    assert_eq!(listener.backlog(), 5);
    assert_eq!(listener.local_addr(), SocketAddr::new(INTERNAL_IP, 8080));
    assert!(network.registry().is_bound(8080));
}

#[test]
fn test_bind_taken_port_conflicts() {
    let network = SimNetwork::new();
    let _first = network.bind(8081, 0).unwrap();

    let err = network.bind(8081, 0).unwrap_err();
    assert_eq!(err, SocketError::BindConflict { port: 8081 });
    assert!(err.is_retryable());
}

#[test]
fn test_close_releases_port() {
    let network = SimNetwork::new();
    let listener = network.bind(8082, 0).unwrap();
    listener.close();
    assert!(listener.is_closed());
    assert!(!network.registry().is_bound(8082));

    let again = network.bind(8082, 0).unwrap();
    assert_ne!(again.id(), listener.id());
}

#[test]
fn test_drop_releases_port() {
    let network = SimNetwork::new();
    drop(network.bind(8083, 0).unwrap());
    network.bind(8083, 0).unwrap();
}

/// Ephemeral binds never collide and come from the short range first.
#[test]
fn test_ephemeral_ports_are_unique() {
    set_sim_seed(42);
    let network = SimNetwork::new();
    let config = network.configuration().clone();

    let listeners: Vec<_> = (0..50).map(|_| network.bind(0, 0).unwrap()).collect();
    let mut ports: Vec<u16> = listeners.iter().map(|l| l.local_port()).collect();
    assert!(ports.iter().all(|p| config.ephemeral_short_range.contains(p)));

    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), listeners.len());
    assert_eq!(network.registry().bound_ports(), ports);
}

#[test]
fn test_ephemeral_exhaustion() {
    let network = SimNetwork::with_configuration(SocketConfiguration {
        ephemeral_short_range: 3000..3002,
        ephemeral_range: 3000..3002,
        ephemeral_attempts: 64,
        ..SocketConfiguration::default()
    });

    let _a = network.bind(0, 0).unwrap();
    let _b = network.bind(0, 0).unwrap();
    assert_eq!(
        network.bind(0, 0).unwrap_err(),
        SocketError::BindConflict { port: 0 }
    );
}

#[test]
fn test_find_unbound_port() {
    let network = SimNetwork::new();
    let _a = network.bind(2000, 0).unwrap();
    let _b = network.bind(2002, 0).unwrap();

    assert_eq!(network.find_unbound_port(2000), Some(2001));
    let _c = network.bind(2001, 0).unwrap();
    assert_eq!(network.find_unbound_port(2000), Some(2003));
}
