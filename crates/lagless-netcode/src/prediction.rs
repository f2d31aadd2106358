//! Client-side prediction engine
//!
//! Applies local inputs immediately so movement feels instantaneous, keeps
//! them until the server confirms them, and replays the unconfirmed tail
//! whenever an authoritative position shows the prediction drifted.
//!
//! Works with any `StateHistory` implementation for snapshot storage and any
//! `TimeSource` for "now".

use crate::config::PredictionConfig;
use crate::error::{Error, Result};
use crate::input_buffer::InputBuffer;
use crate::reconciliation::{replay, Correction, ReconcileOutcome, Reconciler};
use crate::smoothing::CorrectionSmoother;
use crate::transport::{PositionCorrection, ServerConfirmation};
use lagless_core::{
    DVec2, InputRecord, LocalMovementState, MovePayload, MovementInput, Sequence, StateHistory,
    StateSnapshot, SystemClock, TimeSource,
};
use lagless_rollback_buffer::RollbackBuffer;
use log::{debug, warn};

/// Advance `state` by one fixed step of `input`
///
/// Pure in its arguments: replaying the same inputs from the same state
/// always lands on the same position, which reconciliation depends on.
pub fn predict_step(
    state: &LocalMovementState,
    input: &MovementInput,
    config: &PredictionConfig,
) -> LocalMovementState {
    let mut next = *state;
    let step = input.direction() * config.step_distance();
    next.set_position(state.position() + step);
    if let Some(size) = config.chunk_size {
        next.chunk_x = (next.x / size).floor() as i32;
        next.chunk_y = (next.y / size).floor() as i32;
    }
    next
}

/// Counters describing what the engine has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionStats {
    /// Reconciliation passes started
    pub reconciliations: u64,
    /// Passes that moved local state
    pub corrections: u64,
    /// Passes skipped because drift was inside the dead zone
    pub suppressed: u64,
    /// Passes skipped because the confirmed snapshot was gone
    pub history_misses: u64,
    /// Inputs dropped because the queue was full
    pub evicted_inputs: u64,
    /// Server teleports applied
    pub hard_corrections: u64,
    /// Inputs awaiting confirmation right now
    pub pending_inputs: usize,
    /// Highest sequence the server has confirmed
    pub last_confirmed_sequence: Sequence,
}

/// Client-side prediction engine for the local actor
///
/// Lifecycle: UNINITIALIZED until `initialize` (or a server teleport) sets a
/// baseline, READY afterwards. Every method is synchronous and non-blocking.
///
/// Generic over `H: StateHistory` to allow different snapshot stores.
pub struct PredictionEngine<H: StateHistory = RollbackBuffer, C: TimeSource = SystemClock> {
    config: PredictionConfig,
    /// Local state right after each input, by sequence
    history: H,
    /// Inputs not yet confirmed by the server
    input_buffer: InputBuffer,
    reconciler: Reconciler,
    smoother: CorrectionSmoother,
    clock: C,
    /// Predicted local state
    local: LocalMovementState,
    /// Last authoritative state received
    server: LocalMovementState,
    initialized: bool,
    next_sequence: Sequence,
    stats: PredictionStats,
}

impl<C: TimeSource> PredictionEngine<RollbackBuffer, C> {
    /// Create an engine with a ring-buffer history sized from `config`
    pub fn from_config(config: PredictionConfig, clock: C) -> Result<Self> {
        let history = RollbackBuffer::new(config.history_capacity);
        Self::new(config, history, clock)
    }

    /// Create an engine with default settings
    pub fn with_defaults(clock: C) -> Self {
        let config = PredictionConfig::default();
        let history = RollbackBuffer::new(config.history_capacity);
        Self::build(config, history, clock)
    }
}

impl<H: StateHistory, C: TimeSource> PredictionEngine<H, C> {
    /// Create a new prediction engine
    pub fn new(config: PredictionConfig, history: H, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, history, clock))
    }

    fn build(config: PredictionConfig, history: H, clock: C) -> Self {
        Self {
            input_buffer: InputBuffer::new(config.max_pending_inputs),
            reconciler: Reconciler::new(config.dead_zone),
            smoother: CorrectionSmoother::new(),
            history,
            clock,
            local: LocalMovementState::default(),
            server: LocalMovementState::default(),
            initialized: false,
            next_sequence: 1,
            stats: PredictionStats::default(),
            config,
        }
    }

    /// Set the baseline position
    ///
    /// Local state, the cached server state, and the render target all start
    /// out equal. Sequence numbers keep counting across re-initialization.
    pub fn initialize(&mut self, initial: LocalMovementState) {
        let mut state = initial;
        state.timestamp = self.clock.now_ms();
        self.local = state;
        self.server = state;
        self.input_buffer.clear();
        self.history.clear();
        self.smoother.cancel();
        self.initialized = true;
        debug!("Prediction initialized at ({}, {})", state.x, state.y);
    }

    /// Predict a local input
    ///
    /// Assigns the next sequence, queues the input for reconciliation, applies
    /// it to local state at once, and records the resulting snapshot. The
    /// returned payload is what the transport should send.
    pub fn process_input(&mut self, input: MovementInput) -> Result<MovePayload> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let now = self.clock.now_ms();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let record = InputRecord {
            input,
            timestamp: now,
            sequence,
        };
        if let Some(evicted) = self.input_buffer.push(record) {
            self.stats.evicted_inputs += 1;
            warn!(
                "Input queue full, dropped unconfirmed input #{}",
                evicted.sequence
            );
        }

        self.apply_prediction(&input);
        self.local.timestamp = now;
        self.history
            .save_state(StateSnapshot::capture(&self.local, sequence));

        Ok(MovePayload::from(&record))
    }

    /// Integrate one fixed step of `input` into local state
    pub fn apply_prediction(&mut self, input: &MovementInput) {
        self.local = predict_step(&self.local, input, &self.config);
    }

    /// Handle an authoritative position for the local actor
    ///
    /// Confirmed inputs leave the queue; if any did, the prediction is
    /// reconciled. The render position then eases onto the result.
    pub fn process_server_confirmation(&mut self, confirmation: &ServerConfirmation) {
        if !self.initialized {
            warn!("Server confirmation ignored: prediction not initialized");
            return;
        }

        let rendered = self.interpolated_position();
        self.server = LocalMovementState {
            x: confirmation.x,
            y: confirmation.y,
            chunk_x: confirmation.chunk_x,
            chunk_y: confirmation.chunk_y,
            timestamp: confirmation.timestamp,
        };

        match confirmation.sequence {
            Some(sequence) => {
                let confirmed = self.input_buffer.acknowledge(sequence);
                if confirmed > 0 {
                    self.reconcile(confirmation.x, confirmation.y, sequence);
                }
                self.history.clear_before(sequence);
            }
            None => debug!("Confirmation without sequence, skipping reconciliation"),
        }

        let target = self.local.position();
        self.begin_smoothing(rendered, target);
    }

    /// Correct the prediction against the server's view of `confirmed_sequence`
    ///
    /// Measures the drift between the server position and the snapshot taken
    /// when that input was predicted. Drift inside the dead zone is ignored.
    /// Otherwise local state is rebased onto the server position and every
    /// input after `confirmed_sequence` is replayed in order.
    pub fn reconcile(
        &mut self,
        server_x: f64,
        server_y: f64,
        confirmed_sequence: Sequence,
    ) -> ReconcileOutcome {
        self.stats.reconciliations += 1;

        let Some(historical) = self.history.get_state(confirmed_sequence).copied() else {
            self.stats.history_misses += 1;
            warn!(
                "No predicted state for confirmed input #{}, skipping reconciliation",
                confirmed_sequence
            );
            return ReconcileOutcome::HistoryMiss;
        };

        let delta = match self
            .reconciler
            .evaluate(historical.position(), DVec2::new(server_x, server_y))
        {
            Correction::WithinDeadZone { error } => {
                self.stats.suppressed += 1;
                return ReconcileOutcome::Suppressed { error };
            }
            Correction::Required { delta } => delta,
        };

        let baseline = LocalMovementState {
            chunk_x: self.server.chunk_x,
            chunk_y: self.server.chunk_y,
            ..self.local
        }
        .with_position(historical.position() + delta);

        let pending: Vec<InputRecord> = self
            .input_buffer
            .inputs_after(confirmed_sequence)
            .copied()
            .collect();
        let history = &mut self.history;
        self.local = replay(baseline, &pending, &self.config, |record, state| {
            let mut snapshot = StateSnapshot::capture(state, record.sequence);
            snapshot.timestamp = record.timestamp;
            history.save_state(snapshot);
        });

        self.stats.corrections += 1;
        debug!(
            "Reconciled at #{}: shifted by ({:.2}, {:.2}), replayed {} inputs",
            confirmed_sequence,
            delta.x,
            delta.y,
            pending.len()
        );
        ReconcileOutcome::Corrected {
            delta,
            replayed: pending.len(),
        }
    }

    /// Ease the rendered position from where it is now onto `(target_x, target_y)`
    ///
    /// The render lands on the target exactly once the window elapses and
    /// stays there until the next window opens. Local movement during and
    /// after the window carries through to the rendered position.
    pub fn start_interpolation(&mut self, target_x: f64, target_y: f64) {
        let rendered = self.interpolated_position();
        self.begin_smoothing(rendered, DVec2::new(target_x, target_y));
    }

    fn begin_smoothing(&mut self, rendered: DVec2, target: DVec2) {
        let now = self.clock.now_ms();
        self.smoother.start(
            rendered,
            target,
            self.local.position(),
            now,
            self.config.smoothing_ms,
        );
    }

    /// Position the renderer should draw the local actor at
    pub fn interpolated_position(&self) -> DVec2 {
        self.local.position() + self.smoother.offset_at(self.clock.now_ms())
    }

    /// Local state as the renderer should see it
    pub fn current_state(&self) -> LocalMovementState {
        self.local.with_position(self.interpolated_position())
    }

    /// Per-frame maintenance
    ///
    /// Closes an elapsed easing window and prunes old snapshots and stale
    /// unconfirmed inputs.
    pub fn update(&mut self) {
        let now = self.clock.now_ms();
        self.smoother.advance(now);
        self.history
            .clear_older_than(now - self.config.history_max_age_ms);
        let pruned = self
            .input_buffer
            .prune_older_than(now - self.config.input_max_age_ms);
        if pruned > 0 {
            debug!("Pruned {} stale unconfirmed inputs", pruned);
        }
    }

    /// Apply a server teleport
    ///
    /// Overwrites local state outright and voids every in-flight prediction.
    /// Also serves as a baseline if the engine was never initialized.
    pub fn process_position_correction(&mut self, correction: &PositionCorrection) {
        let rendered = if self.initialized {
            self.interpolated_position()
        } else {
            DVec2::new(correction.x, correction.y)
        };

        let state = LocalMovementState {
            x: correction.x,
            y: correction.y,
            chunk_x: correction.chunk_x,
            chunk_y: correction.chunk_y,
            timestamp: self.clock.now_ms(),
        };
        self.local = state;
        self.server = state;
        self.input_buffer.clear();
        self.history.clear();
        self.initialized = true;
        self.stats.hard_corrections += 1;
        debug!(
            "Position corrected to ({}, {}): {}",
            correction.x, correction.y, correction.reason
        );

        self.begin_smoothing(rendered, state.position());
    }

    /// Replace the configuration
    ///
    /// Pending inputs beyond a smaller queue capacity are dropped oldest first.
    /// `history_capacity` only sizes the history at construction and is
    /// ignored here. A new `tick_ms` or `move_speed` also applies to inputs
    /// that are already in flight, so the next replay may move local state.
    pub fn configure(&mut self, config: PredictionConfig) -> Result<()> {
        config.validate()?;
        if config.history_capacity != self.config.history_capacity {
            warn!(
                "history_capacity is fixed at construction, keeping {:?}",
                self.history.capacity()
            );
        }
        let dropped = self.input_buffer.set_capacity(config.max_pending_inputs);
        if dropped > 0 {
            self.stats.evicted_inputs += dropped as u64;
            warn!("Input queue shrunk, dropped {} unconfirmed inputs", dropped);
        }
        self.reconciler.set_dead_zone(config.dead_zone);
        self.config = config;
        Ok(())
    }

    /// Return to the UNINITIALIZED state
    pub fn reset(&mut self) {
        self.history.clear();
        self.input_buffer.reset();
        self.smoother.cancel();
        self.local = LocalMovementState::default();
        self.server = LocalMovementState::default();
        self.initialized = false;
        self.next_sequence = 1;
        self.stats = PredictionStats::default();
    }

    /// Predicted local state without render easing
    pub fn local_state(&self) -> &LocalMovementState {
        &self.local
    }

    /// Last authoritative state received
    pub fn server_state(&self) -> &LocalMovementState {
        &self.server
    }

    /// Whether a baseline has been set
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a correction is still being eased in
    pub fn is_smoothing(&self) -> bool {
        self.smoother.is_active()
    }

    /// Sequence the next input will receive
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Get the number of pending inputs
    pub fn pending_inputs(&self) -> usize {
        self.input_buffer.len()
    }

    /// Get the queue of unconfirmed inputs
    pub fn input_buffer(&self) -> &InputBuffer {
        &self.input_buffer
    }

    /// Get access to the state history
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Current configuration
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Counters, with live queue figures filled in
    pub fn stats(&self) -> PredictionStats {
        PredictionStats {
            pending_inputs: self.input_buffer.len(),
            last_confirmed_sequence: self.input_buffer.last_acknowledged(),
            ..self.stats
        }
    }
}
