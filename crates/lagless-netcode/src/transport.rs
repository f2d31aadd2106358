//! Transport-facing contracts
//!
//! The wire transport itself (framing, reconnection) lives outside this
//! crate. What it exchanges with the engines is defined here:
//! - `MoveSender` - outbound move messages
//! - `ServerMessage` - everything the server pushes to the client
//! - `Inbox` - the queue that carries inbound messages onto the thread that
//!   owns the render loop, where `ClientSession::tick` drains it

use crate::error::{Error, Result};
use lagless_core::{ensure_finite, EntityId, Millis, MovePayload, Sequence};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

/// Authoritative position for the local actor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerConfirmation {
    pub x: f64,
    pub y: f64,
    pub chunk_x: i32,
    pub chunk_y: i32,
    /// Last input sequence the server has applied; `None` skips reconciliation
    #[serde(default)]
    pub sequence: Option<Sequence>,
    pub timestamp: Millis,
}

/// Unconditional server-issued teleport (desync recovery, anti-cheat)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCorrection {
    pub x: f64,
    pub y: f64,
    pub chunk_x: i32,
    pub chunk_y: i32,
    #[serde(default)]
    pub reason: String,
}

/// One snapshot of a remote entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub health: Option<f64>,
}

/// Connection quality measurement reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityHint {
    pub rtt_ms: f64,
    #[serde(default)]
    pub jitter_ms: f64,
}

/// Everything the server can push to the client core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Confirmation(ServerConfirmation),
    PositionCorrection(PositionCorrection),
    EntityUpdate(EntitySnapshot),
    EntityJoin(EntitySnapshot),
    EntityLeave { id: EntityId },
    QualityHint(QualityHint),
}

impl ServerMessage {
    /// Reject non-finite numbers before they reach the engines
    pub fn validate(&self) -> Result<()> {
        self.check_finite()
            .map_err(|e| Error::MalformedMessage(format!("{}: {}", self.kind(), e)))
    }

    fn check_finite(&self) -> lagless_core::Result<()> {
        match self {
            ServerMessage::Confirmation(c) => {
                ensure_finite("confirmation.x", c.x)?;
                ensure_finite("confirmation.y", c.y)?;
                ensure_finite("confirmation.timestamp", c.timestamp)?;
            }
            ServerMessage::PositionCorrection(c) => {
                ensure_finite("correction.x", c.x)?;
                ensure_finite("correction.y", c.y)?;
            }
            ServerMessage::EntityUpdate(s) | ServerMessage::EntityJoin(s) => {
                ensure_finite("entity.x", s.x)?;
                ensure_finite("entity.y", s.y)?;
                if let Some(rotation) = s.rotation {
                    ensure_finite("entity.rotation", rotation)?;
                }
                if let Some(health) = s.health {
                    ensure_finite("entity.health", health)?;
                }
            }
            ServerMessage::EntityLeave { .. } => {}
            ServerMessage::QualityHint(h) => {
                ensure_finite("quality.rtt_ms", h.rtt_ms)?;
                ensure_finite("quality.jitter_ms", h.jitter_ms)?;
            }
        }
        Ok(())
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Confirmation(_) => "confirmation",
            ServerMessage::PositionCorrection(_) => "position-correction",
            ServerMessage::EntityUpdate(_) => "entity-update",
            ServerMessage::EntityJoin(_) => "entity-join",
            ServerMessage::EntityLeave { .. } => "entity-leave",
            ServerMessage::QualityHint(_) => "quality-hint",
        }
    }
}

/// Outbound half of the transport
///
/// Users implement this for their chosen network stack (UDP, WebSocket, etc.).
pub trait MoveSender {
    /// Error type for this transport
    type Error: std::error::Error + 'static;

    /// Send one move message
    fn send(&mut self, payload: &MovePayload) -> std::result::Result<(), Self::Error>;
}

/// Collecting sender, handy for tests and local simulations
impl MoveSender for Vec<MovePayload> {
    type Error = std::convert::Infallible;

    fn send(&mut self, payload: &MovePayload) -> std::result::Result<(), Self::Error> {
        self.push(*payload);
        Ok(())
    }
}

/// Cloneable handle the transport uses to enqueue inbound messages
///
/// `Send`, so network callbacks running on other threads can post into the
/// render thread's inbox.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: Sender<ServerMessage>,
}

impl InboxSender {
    /// Enqueue a message; fails only if the inbox has been dropped
    pub fn post(&self, message: ServerMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::Transport("inbox closed".to_string()))
    }
}

/// Inbound message queue, drained once per tick on the owning thread
///
/// Messages come out in the order they were posted.
#[derive(Debug)]
pub struct Inbox {
    tx: Sender<ServerMessage>,
    rx: Receiver<ServerMessage>,
}

impl Inbox {
    /// Create an empty inbox
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// Handle for posting into this inbox
    pub fn sender(&self) -> InboxSender {
        InboxSender {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue a message from the owning thread
    pub fn push(&self, message: ServerMessage) {
        // The receiver lives in `self`, so this send cannot fail
        let _ = self.tx.send(message);
    }

    /// Take every message queued so far, oldest first
    pub fn drain(&self) -> Vec<ServerMessage> {
        self.rx.try_iter().collect()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
