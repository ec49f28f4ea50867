//! Wires the gesture engine, the session engine and the command router
//! together:
//!
//! touch events -> gesture loop -> actions -> tokens -> session.send
//! socket lines -> session read loop -> router -> gesture controls / logger

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::experiment::Collaborators;
use crate::gesture::{GestureControls, GestureEngine, spawn_gesture_loop};
use crate::net::{CommandRouter, Session};
use crate::touch::TouchEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Running client: owns the pipeline tasks
pub struct Moose {
    session: Session,
    controls: Arc<GestureControls>,
    touch_tx: mpsc::Sender<TouchEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Moose {
    /// Spawn every pipeline task and start connecting. Must be called from
    /// within a tokio runtime.
    pub fn start(config: &Config, collaborators: Collaborators) -> Self {
        let controls = Arc::new(GestureControls::new(
            config.gesture.technique.unwrap_or_default(),
        ));

        let (session, inbound_rx) = Session::new(config.session_config());
        let router = CommandRouter::new(
            config.protocol.delimiter.clone(),
            controls.clone(),
            &collaborators,
            session.clone(),
        );

        let engine = GestureEngine::new(
            controls.clone(),
            config.gesture_settings(),
            collaborators.logger.clone(),
            collaborators.haptics.clone(),
        );

        let (touch_tx, touch_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (action_tx, mut action_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (line_tx, line_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let protocol = config.protocol.clone();
        let tokens = tokio::spawn(async move {
            while let Some(action) = action_rx.recv().await {
                if line_tx.send(protocol.token(action).to_string()).await.is_err() {
                    break;
                }
            }
        });

        let tasks = vec![
            spawn_gesture_loop(engine, touch_rx, action_tx),
            tokens,
            session.spawn_sender(line_rx),
            router.spawn(inbound_rx),
        ];

        session.connect();

        Self {
            session,
            controls,
            touch_tx,
            tasks,
        }
    }

    /// Entry point for touch events
    pub fn touch_sender(&self) -> mpsc::Sender<TouchEvent> {
        self.touch_tx.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn controls(&self) -> &Arc<GestureControls> {
        &self.controls
    }

    pub fn shutdown(self) {
        self.session.shutdown();
        for task in self.tasks {
            task.abort();
        }
    }
}
