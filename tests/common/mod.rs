#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use moose::experiment::{Collaborators, Haptics, Lifecycle, TrialLogger};
use moose::net::{ConnectionState, Session, SessionConfig};
use moose::touch::TouchEvent;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub const WAIT: Duration = Duration::from_secs(3);

/// Collaborator double that records every call as a short string
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Recorded calls, excluding raw touch events
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.starts_with("event:"))
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("event:"))
            .count()
    }
}

impl TrialLogger for Recorder {
    fn log_event(&self, event: &TouchEvent) {
        self.push(format!("event:{:?}", event.action));
    }
    fn log_note(&self, note: &str) {
        self.push(format!("note:{note}"));
    }
    fn log_participant(&self, id: &str) {
        self.push(format!("participant:{id}"));
    }
    fn set_phase(&self, name: &str) {
        self.push(format!("phase:{name}"));
    }
    fn set_subblock(&self, n: i32) {
        self.push(format!("subblock:{n}"));
    }
    fn set_trial(&self, n: i32) {
        self.push(format!("trial:{n}"));
    }
    fn begin_session(&self, description: &str) {
        self.push(format!("session:{description}"));
    }
    fn end_trial(&self) {
        self.push("end_trial".to_string());
    }
    fn end_block(&self) {
        self.push("end_block".to_string());
    }
    fn set_logging_enabled(&self, enabled: bool) {
        self.push(format!("logging:{enabled}"));
    }
}

impl Lifecycle for Recorder {
    fn notify_experiment_begin(&self) {
        self.push("experiment_begin".to_string());
    }
}

impl Haptics for Recorder {
    fn pulse(&self, duration_ms: u64) {
        self.push(format!("pulse:{duration_ms}"));
    }
}

pub fn recording_collaborators() -> (Arc<Recorder>, Collaborators) {
    let recorder = Arc::new(Recorder::default());
    let collaborators = Collaborators {
        logger: recorder.clone(),
        lifecycle: recorder.clone(),
        haptics: recorder.clone(),
    };
    (recorder, collaborators)
}

/// Session config pointing at `addr` with short test delays
pub fn session_config(addr: String) -> SessionConfig {
    SessionConfig {
        addr,
        hello: "MOOSE".to_string(),
        confirm: "CONFIRM".to_string(),
        retry_delay: Duration::from_millis(50),
        handshake_timeout: Duration::from_secs(2),
    }
}

/// Loopback controller stand-in
pub async fn controller() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

pub struct Peer {
    pub lines: Lines<BufReader<OwnedReadHalf>>,
    pub writer: OwnedWriteHalf,
}

impl Peer {
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    /// Read lines until the other side closes, returning how many arrived
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.recv().await.is_some() {
            count += 1;
        }
        count
    }

    /// Stop reading from the socket while keeping the write side open
    pub fn shutdown_read(self) -> Peer {
        let stream = self
            .lines
            .into_inner()
            .into_inner()
            .reunite(self.writer)
            .unwrap()
            .into_std()
            .unwrap();
        stream.shutdown(std::net::Shutdown::Read).unwrap();
        let (reader, writer) = tokio::net::TcpStream::from_std(stream).unwrap().into_split();
        Peer {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }
}

/// Accept one connection and read the hello line, without answering it
pub async fn accept(listener: &TcpListener) -> (Peer, String) {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("timed out waiting for a connection")
        .unwrap();
    let (reader, writer) = stream.into_split();
    let mut peer = Peer {
        lines: BufReader::new(reader).lines(),
        writer,
    };
    let hello = peer.recv().await.expect("connection closed before hello");
    (peer, hello)
}

/// Accept one connection and confirm its handshake
pub async fn accept_confirmed(listener: &TcpListener) -> Peer {
    let (mut peer, hello) = accept(listener).await;
    assert_eq!(hello, "MOOSE");
    peer.send("CONFIRM").await;
    peer
}

pub async fn wait_for_state(session: &Session, wanted: impl Fn(ConnectionState) -> bool) {
    let mut rx = session.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|state| wanted(*state)))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
