//! Per-client wiring of the latency-hiding engines
//!
//! `ClientSession` owns one prediction engine, one remote interpolator, the
//! quality adapter, and the inbound message queue. The game loop calls
//! `process_input` when the player acts and `tick` once per rendered frame;
//! the transport only ever touches the session through `InboxSender` and the
//! `MoveSender` it passes to `process_input`.

use crate::config::NetcodeConfig;
use crate::error::{Error, Result};
use crate::interpolation::RemoteEntityInterpolator;
use crate::prediction::PredictionEngine;
use crate::quality::{NetworkQuality, NetworkQualityAdapter, QualityProfile};
use crate::transport::{Inbox, InboxSender, MoveSender, ServerMessage};
use lagless_core::{
    DVec2, LocalMovementState, MovePayload, MovementInput, SystemClock, TimeSource,
};
use lagless_rollback_buffer::RollbackBuffer;
use log::{debug, warn};

/// What one `tick` did with the queued messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages applied to the engines
    pub applied: usize,
    /// Messages dropped because they failed validation or application
    pub rejected: usize,
}

/// Latency hiding for one connected client
pub struct ClientSession<C: TimeSource + Clone = SystemClock> {
    prediction: PredictionEngine<RollbackBuffer, C>,
    interpolator: RemoteEntityInterpolator<C>,
    quality: NetworkQualityAdapter,
    inbox: Inbox,
}

impl<C: TimeSource + Clone> ClientSession<C> {
    /// Build every component from `config`, sharing `clock` between them
    pub fn new(config: NetcodeConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let mut prediction = PredictionEngine::from_config(config.prediction, clock.clone())?;
        let mut interpolator = RemoteEntityInterpolator::new(config.interpolation, clock)?;
        let mut quality = NetworkQualityAdapter::new(config.quality);
        if let Some(tier) = config.initial_quality {
            quality.apply(tier, &mut prediction, &mut interpolator)?;
        }

        Ok(Self {
            prediction,
            interpolator,
            quality,
            inbox: Inbox::new(),
        })
    }

    /// Set the local actor's starting position
    pub fn initialize(&mut self, initial: LocalMovementState) {
        self.prediction.initialize(initial);
    }

    /// Predict `input` locally and hand the move message to `sender`
    ///
    /// The prediction stands even if sending fails; the input stays queued
    /// until a confirmation or teleport supersedes it.
    pub fn process_input<S: MoveSender>(
        &mut self,
        input: MovementInput,
        sender: &mut S,
    ) -> Result<MovePayload> {
        let payload = self.prediction.process_input(input)?;
        sender
            .send(&payload)
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(payload)
    }

    /// Handle for the transport to post inbound messages from any thread
    pub fn inbox_sender(&self) -> InboxSender {
        self.inbox.sender()
    }

    /// Queue an inbound message for the next tick
    pub fn push(&self, message: ServerMessage) {
        self.inbox.push(message);
    }

    /// Apply one inbound message right away
    pub fn apply(&mut self, message: ServerMessage) -> Result<()> {
        message.validate()?;
        match message {
            ServerMessage::Confirmation(confirmation) => {
                self.prediction.process_server_confirmation(&confirmation);
            }
            ServerMessage::PositionCorrection(correction) => {
                self.prediction.process_position_correction(&correction);
            }
            ServerMessage::EntityUpdate(snapshot) | ServerMessage::EntityJoin(snapshot) => {
                self.interpolator.update_entity(
                    snapshot.id,
                    DVec2::new(snapshot.x, snapshot.y),
                    snapshot.rotation,
                    snapshot.health,
                );
            }
            ServerMessage::EntityLeave { id } => {
                self.interpolator.remove_entity(id);
            }
            ServerMessage::QualityHint(hint) => {
                self.quality.apply_hint(
                    hint.rtt_ms,
                    hint.jitter_ms,
                    &mut self.prediction,
                    &mut self.interpolator,
                )?;
            }
        }
        Ok(())
    }

    /// Run one frame
    ///
    /// Applies every queued message in arrival order, then runs both
    /// engines' per-frame maintenance. A bad message is logged and skipped;
    /// it never stops the rest of the frame.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for message in self.inbox.drain() {
            let kind = message.kind();
            match self.apply(message) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("Dropped {} message: {}", kind, e);
                    report.rejected += 1;
                }
            }
        }

        self.prediction.update();
        self.interpolator.update();
        report
    }

    /// Switch to a quality tier explicitly
    pub fn set_quality(&mut self, quality: NetworkQuality) -> Result<QualityProfile> {
        self.quality
            .apply(quality, &mut self.prediction, &mut self.interpolator)
    }

    /// Local actor as the renderer should draw it
    pub fn current_state(&self) -> LocalMovementState {
        self.prediction.current_state()
    }

    /// Drop all prediction state, tracked entities, and queued messages
    pub fn reset(&mut self) {
        let discarded = self.inbox.drain().len();
        self.prediction.reset();
        self.interpolator.clear();
        debug!("Session reset, discarded {} queued messages", discarded);
    }

    pub fn prediction(&self) -> &PredictionEngine<RollbackBuffer, C> {
        &self.prediction
    }

    pub fn prediction_mut(&mut self) -> &mut PredictionEngine<RollbackBuffer, C> {
        &mut self.prediction
    }

    pub fn interpolator(&self) -> &RemoteEntityInterpolator<C> {
        &self.interpolator
    }

    pub fn interpolator_mut(&mut self) -> &mut RemoteEntityInterpolator<C> {
        &mut self.interpolator
    }

    pub fn quality(&self) -> &NetworkQualityAdapter {
        &self.quality
    }
}
