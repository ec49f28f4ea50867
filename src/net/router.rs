use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::protocol::{CommandKind, ProtocolCommand, ProtocolError};
use super::session::Session;
use crate::experiment::{Collaborators, Lifecycle, TrialLogger};
use crate::gesture::GestureControls;

/// Dispatches inbound controller commands to their effects.
///
/// Unknown command names are ignored. Errors are confined to the command
/// that caused them.
pub struct CommandRouter {
    delimiter: String,
    gesture: Arc<GestureControls>,
    logger: Arc<dyn TrialLogger>,
    lifecycle: Arc<dyn Lifecycle>,
    session: Session,
}

impl CommandRouter {
    pub fn new(
        delimiter: impl Into<String>,
        gesture: Arc<GestureControls>,
        collaborators: &Collaborators,
        session: Session,
    ) -> Self {
        Self {
            delimiter: delimiter.into(),
            gesture,
            logger: collaborators.logger.clone(),
            lifecycle: collaborators.lifecycle.clone(),
            session,
        }
    }

    /// Parse and route one line, logging instead of returning failures
    pub fn dispatch_line(&self, line: &str) {
        tracing::debug!("Process: {line}");
        if let Err(e) = self.route_line(line) {
            tracing::warn!("Ignoring command: {e}");
        }
    }

    pub fn route_line(&self, line: &str) -> Result<(), ProtocolError> {
        let command = ProtocolCommand::parse(line, &self.delimiter)?;
        self.route(&command)
    }

    pub fn route(&self, command: &ProtocolCommand) -> Result<(), ProtocolError> {
        let Some(kind) = command.kind() else {
            tracing::debug!("Unmatched command {command}");
            return Ok(());
        };

        match kind {
            CommandKind::Technique => {
                self.gesture.set_technique(&command.param);
            }
            CommandKind::Pid => self.logger.log_participant(&command.param),
            CommandKind::BeginPhase => self.logger.set_phase(&command.param),
            CommandKind::Subblock => self.logger.set_subblock(command.int_param()?),
            CommandKind::Trial => self.logger.set_trial(command.int_param()?),
            CommandKind::BeginExperiment => {
                self.lifecycle.notify_experiment_begin();
                self.logger.begin_session(&command.param);
                self.logger.set_logging_enabled(true);
            }
            CommandKind::BeginBlock => {
                let block = command.int_param()?;
                tracing::debug!("Block {block} begins");
            }
            CommandKind::EndTrial => self.logger.end_trial(),
            CommandKind::EndBlock => self.logger.end_block(),
            CommandKind::EndExperiment => self.logger.set_logging_enabled(false),
            CommandKind::BeginLog => self.gesture.set_trial_running(true),
            CommandKind::EndLog => self.gesture.set_trial_running(false),
            CommandKind::Disconnect => {
                tracing::info!("Controller requested reconnect");
                self.session.connect();
            }
        }
        Ok(())
    }

    /// Route every inbound line from `rx`, one at a time and in order
    pub fn spawn(self, mut rx: mpsc::Receiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                self.dispatch_line(&line);
            }
        })
    }
}
