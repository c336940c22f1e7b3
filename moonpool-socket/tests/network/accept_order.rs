//! Connects are accepted in the order they were queued.

use moonpool_socket::SimNetwork;
use std::collections::HashSet;
use std::io::Read;
use std::time::Duration;

#[test]
fn test_accept_in_arrival_order() {
    super::init_tracing();
    let network = SimNetwork::new();
    let listener = network.bind(0, 10).unwrap();
    let port = listener.local_port();

    std::thread::scope(|s| {
        let mut clients = Vec::new();
        for tag in 0..5u8 {
            let network = &network;
            clients.push(s.spawn(move || {
                let client = network.connect(port, None).unwrap();
                client.write(&[tag]).unwrap();
                client
            }));
            // Wait until this connect is queued before starting the next one.
            while listener.pending() < usize::from(tag) + 1 {
                std::thread::yield_now();
            }
        }

        for expected in 0..5u8 {
            let mut server = listener.accept().unwrap();
            let mut tag = [0u8; 1];
            server.read_exact(&mut tag).unwrap();
            assert_eq!(tag[0], expected);
        }

        for client in clients {
            client.join().unwrap();
        }
    });
}

/// A connect that timed out is skipped rather than accepted.
#[test]
fn test_accept_skips_abandoned_connect() {
    let network = SimNetwork::new();
    let listener = network.bind(0, 10).unwrap();
    let port = listener.local_port();

    assert!(network
        .connect(port, Some(Duration::from_millis(10)))
        .unwrap_err()
        .is_retryable());

    std::thread::scope(|s| {
        let client = s.spawn(|| network.connect(port, None).unwrap());
        let server = listener.accept().unwrap();
        let client = client.join().unwrap();
        assert_eq!(server.connection_id(), client.connection_id());
    });
}

/// Many concurrent clients against two acceptors: everyone gets exactly one partner.
#[test]
fn test_concurrent_connects_all_paired() {
    let network = SimNetwork::new();
    let listener = network.bind(0, 64).unwrap();
    let port = listener.local_port();

    std::thread::scope(|s| {
        let acceptors: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    let mut ids = Vec::new();
                    while let Ok(server) = listener.accept_within(Some(Duration::from_millis(200))) {
                        ids.push(server.connection_id());
                    }
                    ids
                })
            })
            .collect();

        let clients: Vec<_> = (0..20)
            .map(|_| s.spawn(|| network.connect(port, None).unwrap().connection_id()))
            .collect();

        let connected: HashSet<_> = clients.into_iter().map(|c| c.join().unwrap()).collect();
        let accepted: Vec<_> = acceptors
            .into_iter()
            .flat_map(|a| a.join().unwrap())
            .collect();

        assert_eq!(connected.len(), 20);
        assert_eq!(accepted.len(), 20);
        assert_eq!(accepted.into_iter().collect::<HashSet<_>>(), connected);
    });
}

/// With backlog N the first N connects queue and the next one is refused at once.
#[test]
fn test_backlog_overflow_refused() {
    let network = SimNetwork::new();
    let listener = network.bind(0, 3).unwrap();
    let port = listener.local_port();

    std::thread::scope(|s| {
        let queued: Vec<_> = (0..3)
            .map(|_| s.spawn(|| network.connect(port, None).unwrap()))
            .collect();
        while listener.pending() < 3 {
            std::thread::yield_now();
        }

        assert_eq!(
            network.connect(port, None).unwrap_err(),
            moonpool_socket::SocketError::Refused { port }
        );

        for _ in 0..3 {
            listener.accept().unwrap();
        }
        for client in queued {
            client.join().unwrap();
        }
    });
}
