//! Gesture recognition: turns the touch stream into PRESS / RELEASE / CLICK
//! actions according to the active technique.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::experiment::{Haptics, TrialLogger};
use crate::geometry::Point;
use crate::touch::{TouchAction, TouchEvent};

/// Gesture classification algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Technique {
    #[default]
    Unset,
    /// Swipe the top-left finger down to press, lift it to release
    Swipe,
    /// Quick tap with the top-left finger to click
    Tap,
    /// Reserved for pointer pass-through, recognizes nothing yet
    Mouse,
}

impl Technique {
    /// Parse a technique name as sent by the controller
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SWIPE" => Some(Self::Swipe),
            "TAP" => Some(Self::Tap),
            "MOUSE" => Some(Self::Mouse),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Swipe => 1,
            Self::Tap => 2,
            Self::Mouse => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Swipe,
            2 => Self::Tap,
            3 => Self::Mouse,
            _ => Self::Unset,
        }
    }
}

/// High-level remote action emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
    Click,
}

/// Thresholds and feedback options
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSettings {
    /// Minimum downward travel for a swipe press, also the tap cancel radius
    pub swipe_dy_min: f32,
    /// A tap must be released strictly sooner than this
    pub tap_duration_max_ms: i64,
    pub vibrate: bool,
    pub vibrate_ms: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            swipe_dy_min: 50.0,
            tap_duration_max_ms: 300,
            vibrate: false,
            vibrate_ms: 100,
        }
    }
}

/// Runtime switches shared between the gesture engine and the command router.
///
/// The router writes these from the network side, the engine reads them on
/// every event.
#[derive(Debug, Default)]
pub struct GestureControls {
    technique: AtomicU8,
    trial_running: AtomicBool,
}

impl GestureControls {
    pub fn new(technique: Technique) -> Self {
        Self {
            technique: AtomicU8::new(technique.to_u8()),
            trial_running: AtomicBool::new(false),
        }
    }

    /// Switch technique by name. Unknown names leave the current technique
    /// in place and return `None`.
    pub fn set_technique(&self, name: &str) -> Option<Technique> {
        tracing::debug!("Technique requested: {name}");
        let technique = Technique::from_name(name)?;
        self.technique.store(technique.to_u8(), Ordering::SeqCst);
        tracing::info!("Technique set: {technique:?}");
        Some(technique)
    }

    pub fn technique(&self) -> Technique {
        Technique::from_u8(self.technique.load(Ordering::SeqCst))
    }

    pub fn set_trial_running(&self, running: bool) {
        self.trial_running.store(running, Ordering::SeqCst);
    }

    pub fn is_trial_running(&self) -> bool {
        self.trial_running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SwipeState {
    tracked: Option<Point>,
    pressed: bool,
}

#[derive(Debug, Default)]
struct TapState {
    tracked: Option<Point>,
    started_at_ms: Option<i64>,
    cancelled: bool,
}

/// Per-technique state machine over the touch stream
pub struct GestureEngine {
    controls: Arc<GestureControls>,
    settings: GestureSettings,
    swipe: SwipeState,
    tap: TapState,
    logger: Arc<dyn TrialLogger>,
    haptics: Arc<dyn Haptics>,
}

impl GestureEngine {
    pub fn new(
        controls: Arc<GestureControls>,
        settings: GestureSettings,
        logger: Arc<dyn TrialLogger>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        Self {
            controls,
            settings,
            swipe: SwipeState::default(),
            tap: TapState::default(),
            logger,
            haptics,
        }
    }

    pub fn controls(&self) -> &Arc<GestureControls> {
        &self.controls
    }

    pub fn set_technique(&self, name: &str) -> Option<Technique> {
        self.controls.set_technique(name)
    }

    pub fn technique(&self) -> Technique {
        self.controls.technique()
    }

    pub fn is_trial_running(&self) -> bool {
        self.controls.is_trial_running()
    }

    /// Feed one touch sample; returns the action it completes, if any
    pub fn process(&mut self, event: &TouchEvent) -> Option<Action> {
        self.logger.log_event(event);

        match self.controls.technique() {
            Technique::Swipe => self.process_swipe(event),
            Technique::Tap => self.process_tap(event),
            Technique::Mouse | Technique::Unset => None,
        }
    }

    fn process_swipe(&mut self, event: &TouchEvent) -> Option<Action> {
        match event.action {
            // Any finger landing re-anchors on the current top-left finger
            TouchAction::Down | TouchAction::PointerDown => {
                self.swipe.tracked = event.top_left_pointer_pos;
                None
            }
            TouchAction::Move => {
                let (Some(origin), Some(pos)) = (self.swipe.tracked, event.top_left_pointer_pos)
                else {
                    return None;
                };
                let dy = pos.dy_from(&origin);
                if dy <= self.settings.swipe_dy_min || self.swipe.pressed {
                    return None;
                }

                self.swipe.pressed = true;
                tracing::debug!("Swipe press: {origin} -> {pos}");
                self.logger.log_note(&format!(
                    "{event}--dX={}--dY={dy}",
                    pos.dx_from(&origin)
                ));
                Some(Action::Press)
            }
            TouchAction::Up | TouchAction::PointerUp => {
                if !event.is_primary_pointer || !self.swipe.pressed {
                    return None;
                }

                self.swipe.pressed = false;
                tracing::debug!("Swipe release");
                self.logger.log_note(&event.to_string());
                Some(Action::Release)
            }
        }
    }

    fn process_tap(&mut self, event: &TouchEvent) -> Option<Action> {
        match event.action {
            TouchAction::Down | TouchAction::PointerDown => {
                self.tap.tracked = event.top_left_pointer_pos;
                if event.is_primary_pointer {
                    self.tap.started_at_ms = Some(event.timestamp_ms);
                    self.tap.cancelled = false;
                }
                None
            }
            TouchAction::Move => {
                if let (Some(origin), Some(pos)) = (self.tap.tracked, event.top_left_pointer_pos) {
                    if pos.dist(&origin) >= self.settings.swipe_dy_min {
                        self.tap.cancelled = true;
                    }
                }
                None
            }
            TouchAction::Up | TouchAction::PointerUp => {
                let started_at = self.tap.started_at_ms?;
                let dt = event.timestamp_ms.checked_sub(started_at)?;
                if self.tap.cancelled || dt >= self.settings.tap_duration_max_ms {
                    return None;
                }

                tracing::debug!("Tap recognized (dt={dt} ms)");
                if self.settings.vibrate {
                    self.haptics.pulse(self.settings.vibrate_ms);
                }
                self.logger.log_note(&format!("{event}--dt={dt}"));
                Some(Action::Click)
            }
        }
    }
}

/// Run `engine` over every event from `events`, forwarding recognized actions
/// to `actions` in order. Stops when either channel closes.
pub fn spawn_gesture_loop(
    mut engine: GestureEngine,
    mut events: mpsc::Receiver<TouchEvent>,
    actions: mpsc::Sender<Action>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(action) = engine.process(&event) else {
                continue;
            };
            if actions.send(action).await.is_err() {
                tracing::debug!("Action channel closed, stopping gesture loop");
                break;
            }
        }
    })
}
