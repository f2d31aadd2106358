//! Lagless Netcode - Latency hiding for a networked client
//!
//! This crate keeps a client responsive while the server stays authoritative:
//!
//! - **Prediction**: Apply local inputs before the server confirms them
//! - **Reconciliation**: Rebase onto the server's position and replay what it
//!   has not seen yet, ignoring drift inside a dead zone
//! - **Correction smoothing**: Ease the rendered local actor onto corrections
//! - **Interpolation**: Render remote entities a fixed delay in the past,
//!   blending between buffered snapshots
//! - **Quality adaptation**: Trade delay for jitter tolerance per connection tier
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ClientSession                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │ Input Buffer │─▶│  Prediction  │─▶│    Smoothing     │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! │         │                  ▲                   │            │
//! │         ▼                  │                   ▼            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  MoveSender  │  │Reconciliation│  │     Render       │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! │                            ▲                   ▲            │
//! │  ┌──────────────┐          │         ┌──────────────────┐  │
//! │  │    Inbox     │──────────┴────────▶│  Interpolation   │  │
//! │  └──────────────┘                    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use lagless_core::{LocalMovementState, ManualClock, MovementInput};
//! use lagless_netcode::{ClientSession, NetcodeConfig, ServerConfirmation, ServerMessage};
//!
//! let clock = ManualClock::new();
//! let mut session = ClientSession::new(NetcodeConfig::default(), clock.clone()).unwrap();
//! session.initialize(LocalMovementState::new(0.0, 0.0, 0, 0));
//!
//! // Predict locally and collect the outbound move messages
//! let mut outbound = Vec::new();
//! for _ in 0..3 {
//!     clock.advance(16.0);
//!     session.process_input(MovementInput::new(1.0, 0.0), &mut outbound).unwrap();
//! }
//!
//! // The transport posts the server's answer; the next tick applies it
//! session.push(ServerMessage::Confirmation(ServerConfirmation {
//!     x: 6.4,
//!     y: 0.0,
//!     chunk_x: 0,
//!     chunk_y: 0,
//!     sequence: Some(2),
//!     timestamp: 48.0,
//! }));
//! session.tick();
//!
//! assert_eq!(session.prediction().pending_inputs(), 1);
//! let render = session.current_state();
//! assert!((render.x - 9.6).abs() < 1e-9);
//! ```

mod config;
mod error;
mod input_buffer;
mod interpolation;
mod prediction;
mod quality;
mod reconciliation;
mod session;
mod smoothing;
mod transport;

pub use config::{InterpolationConfig, NetcodeConfig, PredictionConfig};
pub use error::{Error, Result};
pub use input_buffer::InputBuffer;
pub use interpolation::{
    EntitySample, RemoteEntity, RemoteEntityInterpolator, RenderState, Sample, SampleKind,
};
pub use prediction::{predict_step, PredictionEngine, PredictionStats};
pub use quality::{NetworkQuality, NetworkQualityAdapter, QualityProfile, QualityProfiles};
pub use reconciliation::{replay, Correction, ReconcileOutcome, Reconciler};
pub use session::{ClientSession, TickReport};
pub use smoothing::CorrectionSmoother;
pub use transport::{
    EntitySnapshot, Inbox, InboxSender, MoveSender, PositionCorrection, QualityHint,
    ServerConfirmation, ServerMessage,
};

// Re-export core trait for convenience
pub use lagless_core::StateHistory;
