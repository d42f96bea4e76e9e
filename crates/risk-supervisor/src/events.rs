//! Notification sink for status updates.
//!
//! Consumers (chat relay, UI, log shipper) read from an unbounded channel. Sending never blocks
//! the control loop and a dropped receiver is ignored.

use serde::Serialize;
use tokio::sync::mpsc;

use hedger_core::{Position, Ticket};

/// How the supervisor classifies a position this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionRole {
    Original { hedge: Option<Ticket> },
    Hedge { original: Ticket },
    OrphanedHedge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupervisorEvent {
    StatusText { text: String },
    PositionStatus { position: Position, role: PositionRole },
}

#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SupervisorEvent>>,
}

impl EventSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn status_text(&self, text: impl Into<String>) {
        self.emit(SupervisorEvent::StatusText { text: text.into() });
    }

    pub fn position_status(&self, position: &Position, role: PositionRole) {
        self.emit(SupervisorEvent::PositionStatus {
            position: position.clone(),
            role,
        });
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
