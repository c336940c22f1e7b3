//! Byte exchange in both directions, including payloads far larger than the
//! pipe buffer.

use moonpool_socket::{ReadOutcome, SimNetwork, SocketConfiguration};
use std::io::{Read, Write};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Client sends `len` bytes and half-closes; the server echoes everything back.
fn echo(network: &SimNetwork, len: usize) {
    let listener = network.bind(0, 0).unwrap();
    let port = listener.local_port();
    let data = payload(len);

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut server = listener.accept().unwrap();
            let mut received = Vec::new();
            server.read_to_end(&mut received).unwrap();
            server.write_all(&received).unwrap();
        });

        let client = network.connect(port, None).unwrap();
        let echoed = std::thread::scope(|inner| {
            inner.spawn(|| {
                let mut output = client.output_stream().unwrap();
                output.write_all(&data).unwrap();
                client.shutdown_output().unwrap();
            });

            let mut echoed = Vec::new();
            client.input_stream().unwrap().read_to_end(&mut echoed).unwrap();
            echoed
        });

        assert_eq!(echoed.len(), len);
        assert!(echoed == data, "echo of {len} bytes differs");
    });
}

#[test]
fn test_round_trip_sizes() {
    super::init_tracing();
    let network = SimNetwork::new();
    for len in [0, 1, 4096, 1_000_000] {
        echo(&network, len);
    }
}

#[test]
fn test_round_trip_with_tiny_buffers() {
    let network = SimNetwork::with_configuration(SocketConfiguration::small_buffers());
    echo(&network, 10_000);
}

#[test]
fn test_both_directions_at_once() {
    let network = SimNetwork::new();
    let listener = network.bind(0, 0).unwrap();
    let port = listener.local_port();
    let upstream = payload(300_000);
    let downstream: Vec<u8> = payload(200_000).into_iter().rev().collect();

    std::thread::scope(|s| {
        let server = s.spawn(|| {
            let server = listener.accept().unwrap();
            std::thread::scope(|inner| {
                inner.spawn(|| {
                    (&server).write_all(&downstream).unwrap();
                    server.shutdown_output().unwrap();
                });
                let mut received = Vec::new();
                (&server).read_to_end(&mut received).unwrap();
                received
            })
        });

        let client = network.connect(port, None).unwrap();
        let received = std::thread::scope(|inner| {
            inner.spawn(|| {
                (&client).write_all(&upstream).unwrap();
                client.shutdown_output().unwrap();
            });
            let mut received = Vec::new();
            (&client).read_to_end(&mut received).unwrap();
            received
        });

        assert!(received == downstream);
        assert!(server.join().unwrap() == upstream);
    });
}

#[test]
fn test_available_and_small_reads() {
    let network = SimNetwork::new();
    let listener = network.bind(0, 0).unwrap();
    let port = listener.local_port();

    std::thread::scope(|s| {
        let client = s.spawn(|| network.connect(port, None).unwrap());
        let server = listener.accept().unwrap();
        let client = client.join().unwrap();

        client.write(b"abcdef").unwrap();
        assert_eq!(server.available(), 6);

        let mut buf = [0u8; 4];
        assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(server.available(), 2);
        assert_eq!(server.read(&mut buf).unwrap(), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], b"ef");

        // An empty buffer never blocks.
        assert_eq!(server.read(&mut []).unwrap(), ReadOutcome::Data(0));
    });
}
