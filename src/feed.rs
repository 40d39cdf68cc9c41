use std::env;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket, connect};

use crate::frame::parse_frame_json;
use crate::state::{ConnectionStatus, Delta};

/// Application-level keep-alive cadence while a connection is open.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Fixed pause between a connection ending and the next attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Socket read timeout; bounds how long the worker goes without servicing
/// the ping timer and the shutdown flag.
const READ_TICK: Duration = Duration::from_millis(400);

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl StreamConfig {
    /// Reads `APP_WS_HOST` / `APP_WS_PORT` / `APP_WS_SECURE`, defaulting to
    /// the local dev producer. Read once at spawn; changes need a restart.
    pub fn from_env() -> Self {
        let host = env::var("APP_WS_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("APP_WS_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(8000);
        let secure = env::var("APP_WS_SECURE")
            .ok()
            .and_then(|val| val.parse::<bool>().ok())
            .unwrap_or(false);
        Self { host, port, secure }
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/ws", self.host, self.port)
    }
}

/// Worker-local connection lifecycle. The worker owns at most one socket and
/// never dials while one is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamPhase {
    Idle,
    Connecting,
    Open,
    Closed,
}

enum CloseReason {
    /// Peer close frame or an already-closed socket.
    Clean,
    /// Read or write failure mid-connection.
    Failed(WsError),
    /// Shutdown flag observed; the loop must not reconnect.
    Shutdown,
}

pub struct StreamHandle {
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Cancels the reconnect loop, closes any open socket, joins the worker.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn spawn_stream(tx: Sender<Delta>) -> StreamHandle {
    spawn_stream_with(tx, StreamConfig::from_env())
}

/// Same as `spawn_stream` with an explicit endpoint instead of the env.
pub fn spawn_stream_with(tx: Sender<Delta>, config: StreamConfig) -> StreamHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let worker = thread::spawn(move || run(tx, config, flag));
    StreamHandle {
        shutdown,
        worker: Some(worker),
    }
}

fn run(tx: Sender<Delta>, config: StreamConfig, shutdown: Arc<AtomicBool>) {
    let url = config.url();
    let _ = tx.send(Delta::Log(format!("[INFO] Stream target: {url}")));

    let mut phase = StreamPhase::Idle;
    while !shutdown.load(Ordering::Relaxed) {
        debug_assert!(phase != StreamPhase::Open);
        if phase == StreamPhase::Closed {
            let _ = tx.send(Delta::Log("[INFO] Reconnecting".to_string()));
        }
        phase = StreamPhase::Connecting;

        match connect(url.as_str()) {
            Ok((socket, _response)) => {
                phase = StreamPhase::Open;
                if tx.send(Delta::Status(ConnectionStatus::Connected)).is_err() {
                    return;
                }
                let reason = run_open_connection(socket, &tx, &shutdown);
                debug_assert_eq!(phase, StreamPhase::Open);
                phase = StreamPhase::Closed;
                match reason {
                    CloseReason::Clean => {
                        let _ = tx.send(Delta::Status(ConnectionStatus::Disconnected));
                    }
                    CloseReason::Failed(err) => {
                        let _ = tx.send(Delta::Status(ConnectionStatus::Error));
                        let _ = tx.send(Delta::Log(format!("[WARN] Stream error: {err}")));
                    }
                    CloseReason::Shutdown => return,
                }
            }
            Err(err) => {
                phase = StreamPhase::Closed;
                if tx.send(Delta::Status(ConnectionStatus::Error)).is_err() {
                    return;
                }
                let _ = tx.send(Delta::Log(format!("[WARN] Connect failed: {err}")));
            }
        }

        sleep_unless_shutdown(&shutdown, RECONNECT_DELAY);
    }
}

fn run_open_connection(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    tx: &Sender<Delta>,
    shutdown: &AtomicBool,
) -> CloseReason {
    if let Err(err) = set_read_timeout(&socket) {
        let _ = tx.send(Delta::Log(format!("[WARN] Read timeout setup: {err}")));
    }

    // Probe on open, then keep-alive on the interval.
    if let Err(err) = socket.send(Message::Text("ping".to_string())) {
        return CloseReason::Failed(err);
    }
    let mut last_ping = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            let _ = socket.close(None);
            let _ = socket.flush();
            return CloseReason::Shutdown;
        }

        if last_ping.elapsed() >= PING_INTERVAL && socket.can_write() {
            if let Err(err) = socket.send(Message::Text("ping".to_string())) {
                return CloseReason::Failed(err);
            }
            last_ping = Instant::now();
        }

        match socket.read() {
            Ok(Message::Text(raw)) => match parse_frame_json(&raw) {
                Ok(frame) => {
                    if tx.send(Delta::Frame(frame)).is_err() {
                        return CloseReason::Shutdown;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!("[WARN] Dropped payload: {err}")));
                }
            },
            Ok(Message::Ping(payload)) => {
                if let Err(err) = socket.send(Message::Pong(payload)) {
                    return CloseReason::Failed(err);
                }
            }
            Ok(Message::Close(_)) => return CloseReason::Clean,
            Ok(_) => {}
            Err(WsError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                return CloseReason::Clean;
            }
            Err(err) => return CloseReason::Failed(err),
        }
    }
}

fn set_read_timeout(socket: &WebSocket<MaybeTlsStream<TcpStream>>) -> Result<()> {
    let stream = match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream,
        MaybeTlsStream::Rustls(tls) => tls.get_ref(),
        _ => return Ok(()),
    };
    stream
        .set_read_timeout(Some(READ_TICK))
        .context("set_read_timeout")?;
    Ok(())
}

fn sleep_unless_shutdown(shutdown: &AtomicBool, total: Duration) {
    let slice = Duration::from_millis(100);
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        thread::sleep(slice);
    }
}
