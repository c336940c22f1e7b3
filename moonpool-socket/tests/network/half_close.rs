//! Half-close: shutting one direction leaves the other usable.

use moonpool_socket::{ReadOutcome, SimNetwork, SimStream, SocketError};
use std::io::Read;

fn connected(network: &SimNetwork) -> (SimStream, SimStream) {
    let listener = network.bind(0, 0).unwrap();
    let port = listener.local_port();
    std::thread::scope(|s| {
        let client = s.spawn(|| network.connect(port, None).unwrap());
        let server = listener.accept().unwrap();
        (server, client.join().unwrap())
    })
}

/// Server writes a response and drops; the client still reads all of it.
#[test]
fn test_server_write_drop_client_reads_all() {
    super::init_tracing();
    let network = SimNetwork::new();
    let (server, mut client) = connected(&network);

    let response = b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nHello, World!";
    server.write(response).unwrap();
    drop(server);

    let mut received = Vec::new();
    client.read_to_end(&mut received).unwrap();
    assert_eq!(received, response);
}

#[test]
fn test_shutdown_output_keeps_input_open() {
    let network = SimNetwork::new();
    let (server, client) = connected(&network);

    client.write(b"request").unwrap();
    client.shutdown_output().unwrap();
    assert!(client.is_output_shutdown());
    assert!(client.is_connected());

    let mut buf = [0u8; 16];
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(7));
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
    // End-of-stream is sticky.
    assert!(server.read(&mut buf).unwrap().is_end_of_stream());

    server.write(b"response").unwrap();
    assert_eq!(client.read(&mut buf).unwrap(), ReadOutcome::Data(8));
    assert_eq!(&buf[..8], b"response");

    assert_eq!(
        client.write(b"late").unwrap_err(),
        SocketError::Closed { resource: "output" }
    );
    assert_eq!(
        client.shutdown_output().unwrap_err(),
        SocketError::Closed { resource: "output" }
    );
}

#[test]
fn test_shutdown_input_fails_peer_writes() {
    let network = SimNetwork::new();
    let (server, client) = connected(&network);

    server.write(b"discarded").unwrap();
    client.shutdown_input().unwrap();
    assert!(client.is_input_shutdown());
    assert_eq!(client.available(), 0);

    let mut buf = [0u8; 4];
    assert_eq!(
        client.read(&mut buf).unwrap_err(),
        SocketError::Closed { resource: "input" }
    );
    assert!(server.write(b"more").is_err());

    // The other direction still works.
    client.write(b"ok").unwrap();
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(2));
}

#[test]
fn test_both_halves_then_close() {
    let network = SimNetwork::new();
    let (server, client) = connected(&network);

    client.shutdown_output().unwrap();
    client.shutdown_input().unwrap();
    assert!(client.is_closed());
    assert!(client.is_connected());

    client.close();
    client.close();
    assert!(client.is_connected());
    assert_eq!(
        client.shutdown_input().unwrap_err(),
        SocketError::Closed { resource: "socket" }
    );

    let mut buf = [0u8; 4];
    assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
}

#[test]
fn test_close_wakes_blocked_peer_reader() {
    let network = SimNetwork::new();
    let (server, client) = connected(&network);

    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut buf = [0u8; 4];
            server.read(&mut buf)
        });
        std::thread::sleep(super::SETTLE);
        client.close();
        assert_eq!(reader.join().unwrap(), Ok(ReadOutcome::EndOfStream));
    });
}
