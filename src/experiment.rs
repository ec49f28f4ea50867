//! Collaborators outside the gesture/session core: the trial logger, the
//! experiment lifecycle and haptic feedback.
//!
//! The core only talks to these through the traits below. The default
//! implementations write everything to `tracing` under the `moose::trial`
//! target.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::touch::TouchEvent;

/// Write-only sink for trial bookkeeping
pub trait TrialLogger: Send + Sync {
    /// Record a raw touch sample (only while logging is enabled)
    fn log_event(&self, event: &TouchEvent);
    /// Record a free-form note about a recognized gesture
    fn log_note(&self, note: &str);
    fn log_participant(&self, id: &str);
    fn set_phase(&self, name: &str);
    fn set_subblock(&self, n: i32);
    fn set_trial(&self, n: i32);
    fn begin_session(&self, description: &str);
    fn end_trial(&self);
    fn end_block(&self);
    fn set_logging_enabled(&self, enabled: bool);
}

pub trait Lifecycle: Send + Sync {
    fn notify_experiment_begin(&self);
}

pub trait Haptics: Send + Sync {
    fn pulse(&self, duration_ms: u64);
}

/// The set of collaborators handed to the engines
#[derive(Clone)]
pub struct Collaborators {
    pub logger: Arc<dyn TrialLogger>,
    pub lifecycle: Arc<dyn Lifecycle>,
    pub haptics: Arc<dyn Haptics>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            logger: Arc::new(TraceLogger::default()),
            lifecycle: Arc::new(TraceLifecycle),
            haptics: Arc::new(NoHaptics),
        }
    }
}

/// Current trial coordinates as last set by the controller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialContext {
    pub participant: Option<String>,
    pub session: Option<String>,
    pub phase: Option<String>,
    pub subblock: i32,
    pub trial: i32,
    pub logging: bool,
}

/// Trial logger that emits structured `tracing` events
#[derive(Debug, Default)]
pub struct TraceLogger {
    context: Mutex<TrialContext>,
}

impl TraceLogger {
    fn context(&self) -> MutexGuard<'_, TrialContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current trial coordinates
    pub fn snapshot(&self) -> TrialContext {
        self.context().clone()
    }
}

impl TrialLogger for TraceLogger {
    fn log_event(&self, event: &TouchEvent) {
        let ctx = self.context();
        if !ctx.logging {
            return;
        }
        tracing::info!(
            target: "moose::trial",
            phase = ctx.phase.as_deref().unwrap_or(""),
            subblock = ctx.subblock,
            trial = ctx.trial,
            "event {event}"
        );
    }

    fn log_note(&self, note: &str) {
        let ctx = self.context();
        if ctx.logging {
            tracing::info!(target: "moose::trial", trial = ctx.trial, "{note}");
        }
    }

    fn log_participant(&self, id: &str) {
        tracing::info!(target: "moose::trial", "participant {id}");
        self.context().participant = Some(id.to_string());
    }

    fn set_phase(&self, name: &str) {
        self.context().phase = Some(name.to_string());
    }

    fn set_subblock(&self, n: i32) {
        self.context().subblock = n;
    }

    fn set_trial(&self, n: i32) {
        self.context().trial = n;
    }

    fn begin_session(&self, description: &str) {
        tracing::info!(target: "moose::trial", "begin session {description}");
        self.context().session = Some(description.to_string());
    }

    fn end_trial(&self) {
        let ctx = self.context();
        tracing::info!(target: "moose::trial", subblock = ctx.subblock, trial = ctx.trial, "end trial");
    }

    fn end_block(&self) {
        let ctx = self.context();
        tracing::info!(target: "moose::trial", subblock = ctx.subblock, "end block");
    }

    fn set_logging_enabled(&self, enabled: bool) {
        self.context().logging = enabled;
    }
}

/// Lifecycle hook that only reports the transition
#[derive(Debug, Default)]
pub struct TraceLifecycle;

impl Lifecycle for TraceLifecycle {
    fn notify_experiment_begin(&self) {
        tracing::info!("Experiment begins");
    }
}

/// For hosts without a vibration motor
#[derive(Debug, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, duration_ms: u64) {
        tracing::debug!("Haptic pulse ({duration_ms} ms) skipped, no device");
    }
}
