//! Session engine: owns the TCP connection to the experiment controller.
//!
//! A connection attempt (socket open + handshake) runs on its own task and
//! retries forever with a fixed delay. Once the handshake is confirmed a
//! read-loop task forwards every inbound line, in order, to the receiver
//! returned by [`Session::new`]. When the peer closes the socket or a read
//! fails the read loop requests a fresh connection.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `host:port` of the controller
    pub addr: String,
    /// First line sent after the socket opens
    pub hello: String,
    /// Reply that confirms the handshake
    pub confirm: String,
    pub retry_delay: Duration,
    pub handshake_timeout: Duration,
}

const INBOUND_CAPACITY: usize = 64;

type LineReader = Lines<BufReader<OwnedReadHalf>>;

struct Shared {
    config: SessionConfig,
    state: watch::Sender<ConnectionState>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    inbound: mpsc::Sender<String>,
    attempt_in_flight: AtomicBool,
    closed: AtomicBool,
    attempts: AtomicU64,
    connector: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the controller connection. Cheap to clone; all clones drive
/// the same socket.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    writer.write_all(format!("{line}\n").as_bytes()).await?;
    writer.flush().await
}

impl Session {
    /// Create a disconnected session. Returns the receiver for inbound lines.
    pub fn new(config: SessionConfig) -> (Self, mpsc::Receiver<String>) {
        let (inbound, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let session = Self {
            shared: Arc::new(Shared {
                config,
                state,
                writer: tokio::sync::Mutex::new(None),
                inbound,
                attempt_in_flight: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                attempts: AtomicU64::new(0),
                connector: Mutex::new(None),
                reader: Mutex::new(None),
            }),
        };
        (session, inbound_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of socket open attempts made so far
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.shared.state.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state: {previous:?} -> {state:?}");
        }
    }

    /// Request a (re)connection.
    ///
    /// Tears down the current connection, if any, and starts a connection
    /// attempt in the background. While an attempt is already in flight this
    /// is a no-op, so at most one socket is being opened at any time.
    pub fn connect(&self) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.shared.attempt_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Connection attempt already in flight");
            return;
        }

        if let Some(reader) = lock(&self.shared.reader).take() {
            reader.abort();
        }
        self.set_state(ConnectionState::Connecting);

        let session = self.clone();
        let handle = tokio::spawn(async move { session.establish().await });
        *lock(&self.shared.connector) = Some(handle);
    }

    async fn establish(self) {
        self.shared.writer.lock().await.take();
        tracing::info!("Connecting to {}...", self.shared.config.addr);

        loop {
            self.set_state(ConnectionState::Connecting);
            self.shared.attempts.fetch_add(1, Ordering::SeqCst);

            match self.open().await {
                Ok(lines) => {
                    self.set_state(ConnectionState::Connected);
                    tracing::info!("Connected to {}", self.shared.config.addr);
                    self.start_reader(lines);
                    return;
                }
                Err(e) => {
                    self.shared.writer.lock().await.take();
                    tracing::warn!(
                        "Connection to {} failed: {e}. Reconnecting in {:?}",
                        self.shared.config.addr,
                        self.shared.config.retry_delay
                    );
                    tokio::time::sleep(self.shared.config.retry_delay).await;
                }
            }
        }
    }

    /// Open the socket and run the handshake. On success the write half is
    /// installed and the line reader is returned.
    async fn open(&self) -> io::Result<LineReader> {
        let config = &self.shared.config;
        let stream = TcpStream::connect(&config.addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!("Socket opened");
        self.set_state(ConnectionState::Handshaking);

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_line(&mut write_half, &config.hello).await?;
        let reply = tokio::time::timeout(config.handshake_timeout, lines.next_line())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))??;

        match reply {
            Some(line) if line == config.confirm => {
                *self.shared.writer.lock().await = Some(write_half);
                Ok(lines)
            }
            Some(line) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected handshake reply {line:?}"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed during handshake",
            )),
        }
    }

    fn start_reader(&self, lines: LineReader) {
        // Hold the slot while the in-flight flag drops so a concurrent
        // connect() cannot miss the new reader.
        let mut slot = lock(&self.shared.reader);
        self.shared.attempt_in_flight.store(false, Ordering::SeqCst);
        let session = self.clone();
        *slot = Some(tokio::spawn(async move { session.read_loop(lines).await }));
    }

    async fn read_loop(self, mut lines: LineReader) {
        tracing::debug!("Receiving data...");
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::debug!("Received: {line}");
                    if self.shared.inbound.send(line).await.is_err() {
                        tracing::debug!("Inbound channel closed, stopping read loop");
                        return;
                    }
                }
                Ok(None) => {
                    tracing::info!("Controller closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Read failed: {e}");
                    break;
                }
            }
        }
        self.connect();
    }

    /// Send one line to the controller.
    ///
    /// Delivery is best effort: without an established connection the line
    /// is dropped and only a diagnostic is logged.
    pub async fn send(&self, line: &str) {
        if self.state() != ConnectionState::Connected {
            tracing::debug!("Out channel not available, dropping {line}");
            return;
        }

        let mut writer = self.shared.writer.lock().await;
        if self.shared.closed.load(Ordering::SeqCst) {
            writer.take();
            tracing::debug!("Session closed, dropping {line}");
            return;
        }
        let Some(writer) = writer.as_mut() else {
            tracing::debug!("Out channel not available, dropping {line}");
            return;
        };
        match write_line(writer, line).await {
            Ok(()) => tracing::debug!("{line} sent to controller"),
            Err(e) => tracing::warn!("Failed to send {line}: {e}"),
        }
    }

    /// Forward every line from `rx` to [`Session::send`], in order
    pub fn spawn_sender(&self, mut rx: mpsc::Receiver<String>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                session.send(&line).await;
            }
        })
    }

    /// Stop reconnecting and drop the connection. Further `connect()` calls
    /// are ignored.
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(connector) = lock(&self.shared.connector).take() {
            connector.abort();
        }
        if let Some(reader) = lock(&self.shared.reader).take() {
            reader.abort();
        }
        match self.shared.writer.try_lock() {
            Ok(mut writer) => {
                writer.take();
            }
            Err(_) => {
                // A send holds the writer; drop it once that send is done
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    shared.writer.lock().await.take();
                });
            }
        }
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Session closed");
    }
}
