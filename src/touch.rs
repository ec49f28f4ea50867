//! Normalized touch samples and the JSON-lines input adapter that feeds them
//! into the gesture engine.

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::geometry::Point;

/// Kind of raw touch sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    /// First finger touches the surface
    Down,
    /// An additional finger touches the surface
    PointerDown,
    Move,
    /// Last finger leaves the surface
    Up,
    /// A finger leaves while others remain
    PointerUp,
}

impl TouchAction {
    pub fn is_down(self) -> bool {
        matches!(self, Self::Down | Self::PointerDown)
    }

    pub fn is_up(self) -> bool {
        matches!(self, Self::Up | Self::PointerUp)
    }
}

/// One touch sample, as delivered by the input source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Whether the finger that triggered this sample is the primary
    /// (top-left) pointer
    #[serde(default)]
    pub is_primary_pointer: bool,
    /// Position of the top-left pointer, absent when no finger is tracked
    #[serde(default)]
    pub top_left_pointer_pos: Option<Point>,
    pub timestamp_ms: i64,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pos: Option<Point>, timestamp_ms: i64) -> Self {
        Self {
            action,
            is_primary_pointer: true,
            top_left_pointer_pos: pos,
            timestamp_ms,
        }
    }

    pub fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary_pointer = is_primary;
        self
    }
}

impl std::fmt::Display for TouchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{}", self.action, self.timestamp_ms)?;
        if let Some(pos) = self.top_left_pointer_pos {
            write!(f, " tl={pos}")?;
        }
        if !self.is_primary_pointer {
            write!(f, " secondary")?;
        }
        Ok(())
    }
}

/// Read one JSON-encoded [`TouchEvent`] per line from `reader` and push each
/// onto `tx` in order.
///
/// Blank lines are skipped; lines that fail to parse are logged and skipped.
/// Returns the number of events forwarded once the reader hits end of input
/// or the receiving side goes away.
pub async fn pump_json_lines<R>(reader: R, tx: mpsc::Sender<TouchEvent>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<TouchEvent>(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Skipping malformed touch event {line:?}: {e}");
                continue;
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Gesture loop closed, stopping input");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
