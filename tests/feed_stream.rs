use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use courtview::feed::{self, StreamConfig};
use courtview::state::{ConnectionStatus, Delta};
use tungstenite::{Message, WebSocket};

static FRAME_JSON: &str = r#"{"id": "31", "ts": 5.0, "persons": [{"id": "7", "bbox": [1, 2, 3, 4], "conf": 0.5, "transformed_leg_coordinates": [[0.5, 1.0]]}]}"#;

fn local_config(port: u16) -> StreamConfig {
    StreamConfig {
        host: "127.0.0.1".to_string(),
        port,
        secure: false,
    }
}

fn wait_for_ping(socket: &mut WebSocket<TcpStream>) {
    loop {
        match socket.read().expect("client should send a ping on open") {
            Message::Text(text) if text == "ping" => return,
            _ => {}
        }
    }
}

fn drain_until_close(socket: &mut WebSocket<TcpStream>) {
    while socket.read().is_ok() {}
}

fn next_status(rx: &mpsc::Receiver<Delta>) -> ConnectionStatus {
    loop {
        match rx
            .recv_timeout(Duration::from_secs(5))
            .expect("status delta before timeout")
        {
            Delta::Status(status) => return status,
            _ => {}
        }
    }
}

#[test]
fn reconnects_once_after_close_and_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();

    let server = thread::spawn(move || {
        // First connection: one good frame, one malformed payload, then close.
        let (stream, _) = listener.accept().expect("first dial");
        let mut socket = tungstenite::accept(stream).expect("first handshake");
        wait_for_ping(&mut socket);
        socket
            .send(Message::Text(FRAME_JSON.to_string()))
            .expect("send frame");
        socket
            .send(Message::Text("not json".to_string()))
            .expect("send malformed payload");
        socket.close(None).expect("close");
        drain_until_close(&mut socket);

        // Second connection: the reconnect. Held open until the client
        // shuts down.
        let (stream, _) = listener.accept().expect("second dial");
        let mut socket = tungstenite::accept(stream).expect("second handshake");
        wait_for_ping(&mut socket);
        drain_until_close(&mut socket);
    });

    let (tx, rx) = mpsc::channel();
    let handle = feed::spawn_stream_with(tx, local_config(port));

    assert_eq!(next_status(&rx), ConnectionStatus::Connected);

    let mut saw_frame = false;
    let mut dropped_payloads = 0;
    loop {
        match rx
            .recv_timeout(Duration::from_secs(5))
            .expect("delta before server close")
        {
            Delta::Frame(frame) => {
                assert_eq!(frame.id, "31");
                assert_eq!(frame.persons.len(), 1);
                saw_frame = true;
            }
            Delta::Log(line) if line.contains("Dropped payload") => dropped_payloads += 1,
            Delta::Log(_) => {}
            Delta::Status(status) => {
                assert_eq!(status, ConnectionStatus::Disconnected);
                break;
            }
        }
    }
    assert!(saw_frame);
    assert_eq!(dropped_payloads, 1);

    // Exactly one reconnect follows the close.
    assert_eq!(next_status(&rx), ConnectionStatus::Connected);

    handle.shutdown();

    // After shutdown the worker is gone: no further dials, channel closed.
    let mut late_connects = 0;
    while let Ok(delta) = rx.try_recv() {
        if let Delta::Status(ConnectionStatus::Connected) = delta {
            late_connects += 1;
        }
    }
    assert_eq!(late_connects, 0);
    assert!(rx.recv().is_err());

    server.join().expect("server thread");
}
